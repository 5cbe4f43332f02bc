//! In-memory model of an asciicast v2 session log.
//!
//! An [`EventStream`] is a header plus an ordered list of [`Event`]s. Streams
//! are read with [`EventStream::parse`] or [`EventStream::load`] and written
//! with [`EventStream::to_bytes`] or [`EventStream::save_atomic`]. Reading a
//! log and writing it back without changes reproduces the input byte for byte.

mod event;
mod format;

pub use event::{CommentOverlay, Event, EventKind, OverlayPosition};

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CastError;

/// The asciicast header record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: u64,
    pub width: u16,
    pub height: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    /// Keys this crate does not model (e.g. `theme`), kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Header {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            version: 2,
            width,
            height,
            timestamp: None,
            duration: None,
            idle_time_limit: None,
            command: None,
            title: None,
            env: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A recorded session: header plus time-ordered events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStream {
    header: Header,
    header_source: Option<String>,
    events: Vec<Event>,
}

impl EventStream {
    pub fn new(header: Header) -> Self {
        Self::from_events(header, Vec::new())
    }

    pub fn from_events(header: Header, events: Vec<Event>) -> Self {
        Self {
            header,
            header_source: None,
            events,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Swap in a new event list, keeping the header (and its encoding).
    pub fn replace_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// `true` if timestamps never decrease.
    pub fn is_ordered(&self) -> bool {
        self.events.windows(2).all(|w| w[0].time() <= w[1].time())
    }

    /// Position of the first marker with `label`.
    pub fn find_marker(&self, label: &str) -> Option<usize> {
        self.events.iter().position(|e| e.label() == Some(label))
    }

    /// Marker events as `(time, label)` pairs, in stream order.
    pub fn markers(&self) -> impl Iterator<Item = (f64, &str)> {
        self.events
            .iter()
            .filter_map(|e| e.label().map(|label| (e.time(), label)))
    }

    pub fn has_comments(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.kind(), EventKind::Comment(_)))
    }

    /// Merge `extra` into the stream by timestamp.
    ///
    /// Existing events keep their relative order; an inserted event lands
    /// after every existing event with the same or an earlier timestamp.
    pub fn insert_sorted(mut self, mut extra: Vec<Event>) -> Self {
        if extra.is_empty() {
            return self;
        }
        extra.sort_by(|a, b| a.time().total_cmp(&b.time()));
        debug!(count = extra.len(), "merging stamped events");

        let existing = std::mem::take(&mut self.events);
        let mut merged = Vec::with_capacity(existing.len() + extra.len());
        let mut extra = extra.into_iter().peekable();
        for event in existing {
            while let Some(next) = extra.next_if(|next| next.time() < event.time()) {
                merged.push(next);
            }
            merged.push(event);
        }
        merged.extend(extra);
        self.events = merged;
        self
    }

    /// Parse an asciicast v2 log.
    pub fn parse(content: &str) -> Result<Self, CastError> {
        format::parse(content)
    }

    /// Read and parse an asciicast v2 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CastError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CastError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Encode the stream as asciicast v2.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CastError> {
        let mut out = Vec::new();
        format::write(self, &mut out)?;
        Ok(out)
    }

    /// Write the stream to `path` through a temporary file in the same
    /// directory, so the target is either fully written or left untouched.
    pub fn save_atomic(&self, path: impl AsRef<Path>) -> Result<(), CastError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let write_err = |source| CastError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        debug!(path = %path.display(), events = self.events.len(), "saved session log");
        Ok(())
    }
}
