//! Error types for scriptcast.
//!
//! Each stage of a run has its own error type so callers can tell a bad
//! script apart from a dead terminal or a broken filter chain:
//!
//! - [`ConfigError`]: invalid script, detected before any session starts
//! - [`SessionError`]: the terminal died or a write failed mid-script
//! - [`RecordError`]: the recorder could not accept a stamp or finalize the log
//! - [`CastError`]: the asciicast log could not be read or written
//! - [`FilterError`]: a filter in the pipeline failed (wraps [`FilterFailure`])

use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

use crate::config::ScriptFormat;
use crate::filter::FilterKind;

/// Result alias using the crate-wide [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Umbrella error for a full scripted recording run.
#[derive(Debug, Error)]
pub enum Error {
    /// Script could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Terminal session failed while the script was being typed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Recorder failed to accept a stamp or to finalize the log.
    #[error("recorder error: {0}")]
    Record(#[from] RecordError),

    /// Session log could not be read or written.
    #[error("session log error: {0}")]
    Cast(#[from] CastError),

    /// A filter in the pipeline failed.
    #[error("filter pipeline error: {0}")]
    Filter(#[from] FilterError),
}

/// Invalid script or configuration. Always detected before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A delay range is negative, non-finite, or has `min > max`.
    #[error("invalid delay range [{min}, {max}]: {reason}")]
    InvalidDelayRange {
        /// Lower bound in seconds.
        min: f64,
        /// Upper bound in seconds.
        max: f64,
        /// What is wrong with the range.
        reason: &'static str,
    },

    /// A scalar setting is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Setting name as written in the script.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// A replacement filter's pattern does not compile.
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        /// The pattern as written in the script.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// The pipeline lists the same trim filter twice.
    #[error("the filter list contains more than one {0}")]
    DuplicateTrim(FilterKind),

    /// The script format could not be inferred from the file name.
    #[error("cannot infer script format from '{0}', use --json, --toml or --yaml")]
    UnknownFormat(String),

    /// The script file could not be read.
    #[error("failed to read script {}: {source}", .path.display())]
    Read {
        /// Script path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The script file could not be written.
    #[error("failed to write script {}: {source}", .path.display())]
    Write {
        /// Script path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The script content is malformed.
    #[error("failed to parse {format} script: {message}")]
    Parse {
        /// Format the content was parsed as.
        format: ScriptFormat,
        /// Parser diagnostic.
        message: String,
    },

    /// The script could not be serialized.
    #[error("failed to serialize {format} script: {message}")]
    Serialize {
        /// Target format.
        format: ScriptFormat,
        /// Serializer diagnostic.
        message: String,
    },
}

fn progress(completed: &Option<usize>) -> String {
    match completed {
        Some(index) => format!("after action {index}"),
        None => "before the first action completed".to_string(),
    }
}

/// The terminal session failed while the script was running.
///
/// `completed` is the index of the last action that finished, if any. The
/// recorder keeps whatever it captured up to that point.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The terminal could not be started.
    #[error("failed to spawn terminal session: {0}")]
    Spawn(String),

    /// The process behind the terminal exited before the script finished.
    #[error("terminal session ended unexpectedly {}", progress(.completed))]
    Terminated {
        /// Last completed action.
        completed: Option<usize>,
    },

    /// Writing to the terminal failed.
    #[error("failed to write to terminal {}: {source}", progress(.completed))]
    Write {
        /// Last completed action.
        completed: Option<usize>,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The recorder refused a marker or comment stamp.
    #[error("recorder rejected a stamp {}: {source}", progress(.completed))]
    Stamp {
        /// Last completed action.
        completed: Option<usize>,
        /// Recorder error.
        #[source]
        source: RecordError,
    },

    /// The run was cancelled (e.g. Ctrl-C).
    #[error("session aborted {}", progress(.completed))]
    Aborted {
        /// Last completed action.
        completed: Option<usize>,
    },

    /// The terminal could not be shut down cleanly.
    #[error("failed to close terminal session: {0}")]
    Close(#[source] io::Error),
}

impl SessionError {
    /// Index of the last action that completed before the failure.
    #[must_use]
    pub fn completed(&self) -> Option<usize> {
        match self {
            Self::Terminated { completed }
            | Self::Write { completed, .. }
            | Self::Stamp { completed, .. }
            | Self::Aborted { completed } => *completed,
            Self::Spawn(_) | Self::Close(_) => None,
        }
    }
}

/// The recorder could not accept a stamp or produce the session log.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Stamps must arrive in time order.
    #[error("stamp at {time}s is earlier than the previous stamp at {previous}s")]
    OutOfOrder {
        /// Rejected stamp time.
        time: f64,
        /// Time of the last accepted stamp.
        previous: f64,
    },

    /// The recorder was already stopped.
    #[error("recorder is stopped")]
    Stopped,

    /// The GNU screen configuration for comment overlays could not be written.
    #[error("failed to prepare screen configuration: {0}")]
    ScreenRc(#[source] io::Error),

    /// The recorded log could not be loaded.
    #[error(transparent)]
    Cast(#[from] CastError),
}

/// The asciicast session log could not be read or written.
#[derive(Debug, Error)]
pub enum CastError {
    /// Reading the log failed.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Log path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing the log failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Log path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The log has no records at all.
    #[error("session log is empty")]
    Empty,

    /// The first record is not a JSON object.
    #[error("line {line}: missing asciicast header")]
    MissingHeader {
        /// 1-based line number.
        line: usize,
    },

    /// The header record does not match the asciicast v2 schema.
    #[error("line {line}: invalid header: {source}")]
    InvalidHeader {
        /// 1-based line number.
        line: usize,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Only asciicast version 2 is supported.
    #[error("unsupported asciicast version {0}")]
    UnsupportedVersion(u64),

    /// An event record is malformed.
    #[error("line {line}: invalid event: {reason}")]
    InvalidEvent {
        /// 1-based line number.
        line: usize,
        /// What is wrong with the record.
        reason: String,
    },

    /// An event record has a code other than `o`, `i`, `m` or `r`.
    #[error("line {line}: unknown event code '{code}'")]
    UnknownCode {
        /// 1-based line number.
        line: usize,
        /// The offending code.
        code: String,
    },

    /// An event is timestamped before its predecessor.
    #[error("line {line}: timestamp {time} precedes the previous event")]
    OutOfOrder {
        /// 1-based line number.
        line: usize,
        /// The offending timestamp.
        time: f64,
    },

    /// A comment event reached the writer without passing a comment filter.
    #[error("event {index} is an unrendered comment; add a CommentFilter to the pipeline")]
    UnfilteredComment {
        /// Event position in the stream.
        index: usize,
    },

    /// A payload cannot be stored in a JSON string.
    #[error("event {index} has a payload that is not valid UTF-8")]
    NonText {
        /// Event position in the stream.
        index: usize,
    },

    /// JSON encoding failed.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An output payload could not be decoded as text.
#[derive(Debug, Error)]
#[error("event {index}: payload is not valid UTF-8: {source}")]
pub struct DecodeError {
    /// Event position in the stream.
    pub index: usize,
    /// Decoder error.
    #[source]
    pub source: Utf8Error,
}

/// Why a single filter failed.
#[derive(Debug, Error)]
pub enum FilterFailure {
    /// A trim filter references a label that is not in the stream.
    #[error("marker '{label}' not found")]
    MarkerNotFound {
        /// The missing label.
        label: String,
    },

    /// The end marker comes before the start marker.
    #[error("end marker '{end}' at {end_time}s precedes start marker '{start}' at {start_time}s")]
    InvertedWindow {
        /// Start label.
        start: String,
        /// Start marker time.
        start_time: f64,
        /// End label.
        end: String,
        /// End marker time.
        end_time: f64,
    },

    /// A text filter met a payload that is not valid UTF-8.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A filter in the pipeline failed; nothing from the pipeline is applied.
#[derive(Debug, Error)]
#[error("filter {index} ({kind}) failed: {source}")]
pub struct FilterError {
    /// Zero-based position of the filter in the pipeline.
    pub index: usize,
    /// Which filter failed.
    pub kind: FilterKind,
    /// Underlying failure.
    #[source]
    pub source: FilterFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_reports_progress() {
        let err = SessionError::Terminated { completed: Some(3) };
        assert_eq!(err.completed(), Some(3));
        assert!(err.to_string().contains("after action 3"));

        let err = SessionError::Aborted { completed: None };
        assert!(err.to_string().contains("before the first action"));
    }

    #[test]
    fn test_filter_error_names_filter() {
        let err = FilterError {
            index: 1,
            kind: FilterKind::EndMarker,
            source: FilterFailure::MarkerNotFound {
                label: "END".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("EndMarkerFilter"));
        assert!(message.contains("'END'"));
    }
}
