//! Session recording.
//!
//! The recorder owns the raw session log. Output is captured by `asciinema`
//! running inside the terminal; markers and comments are stamped here and
//! merged into the log by time once recording stops.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cast::{CommentOverlay, Event, EventStream, OverlayPosition};
use crate::error::{CastError, RecordError};

/// What a [`Stamp`] records.
#[derive(Debug, Clone, PartialEq)]
pub enum StampKind {
    Marker(String),
    Comment(CommentOverlay),
}

/// A marker or comment placed at a session time.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamp {
    /// Seconds since recording started.
    pub time: f64,
    pub kind: StampKind,
}

impl Stamp {
    pub fn marker(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            kind: StampKind::Marker(label.into()),
        }
    }

    pub fn comment(time: f64, overlay: CommentOverlay) -> Self {
        Self {
            time,
            kind: StampKind::Comment(overlay),
        }
    }

    pub fn into_event(self) -> Event {
        match self.kind {
            StampKind::Marker(label) => Event::marker(self.time, label),
            StampKind::Comment(overlay) => Event::comment(self.time, overlay),
        }
    }
}

/// Sink for a recorded session.
#[async_trait(?Send)]
pub trait Recorder {
    /// Record a marker or comment. Stamps must arrive in time order.
    fn stamp(&mut self, stamp: Stamp) -> Result<(), RecordError>;

    /// Finish recording and return the session log with all stamps merged in.
    async fn stop(&mut self) -> Result<EventStream, RecordError>;
}

/// Keeps stamps sorted and rejects out-of-order ones.
#[derive(Debug, Default)]
pub(crate) struct StampLog {
    stamps: Vec<Stamp>,
    stopped: bool,
}

impl StampLog {
    pub(crate) fn push(&mut self, stamp: Stamp) -> Result<(), RecordError> {
        if self.stopped {
            return Err(RecordError::Stopped);
        }
        if let Some(previous) = self.stamps.last().map(|s| s.time) {
            if stamp.time < previous {
                return Err(RecordError::OutOfOrder {
                    time: stamp.time,
                    previous,
                });
            }
        }
        self.stamps.push(stamp);
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<Vec<Event>, RecordError> {
        if self.stopped {
            return Err(RecordError::Stopped);
        }
        self.stopped = true;
        Ok(std::mem::take(&mut self.stamps)
            .into_iter()
            .map(Stamp::into_event)
            .collect())
    }
}

/// Records through the `asciinema` CLI.
///
/// The terminal session must run [`AsciinemaRecorder::command`]; asciinema
/// then writes the raw log to `raw_path` while the typist drives its shell.
#[derive(Debug)]
pub struct AsciinemaRecorder {
    raw_path: PathBuf,
    cols: u16,
    rows: u16,
    screen_rc: Option<NamedTempFile>,
    log: StampLog,
}

impl AsciinemaRecorder {
    /// `status_line` reserves a screen row for comment overlays by running
    /// the shell under GNU screen with a blank hard status line there.
    pub fn new(
        raw_path: impl Into<PathBuf>,
        cols: u16,
        rows: u16,
        status_line: Option<OverlayPosition>,
    ) -> Result<Self, RecordError> {
        let screen_rc = status_line.map(write_screen_rc).transpose()?;
        Ok(Self {
            raw_path: raw_path.into(),
            cols,
            rows,
            screen_rc,
            log: StampLog::default(),
        })
    }

    /// Program and arguments to run inside the terminal.
    pub fn command(&self) -> Vec<String> {
        let mut argv = vec![
            "asciinema".to_string(),
            "rec".to_string(),
            "--overwrite".to_string(),
            "--cols".to_string(),
            self.cols.to_string(),
            "--rows".to_string(),
            self.rows.to_string(),
        ];
        if let Some(rc) = &self.screen_rc {
            argv.push("-c".to_string());
            argv.push(format!("screen -c '{}'", rc.path().display()));
        }
        argv.push(self.raw_path.display().to_string());
        argv
    }
}

fn screen_rc_contents(position: OverlayPosition) -> String {
    let line = match position {
        OverlayPosition::Top => "firstline",
        OverlayPosition::Bottom => "lastline",
    };
    format!("hardstatus always{line}\nhardstatus string \" \"\naltscreen on\n")
}

fn write_screen_rc(position: OverlayPosition) -> Result<NamedTempFile, RecordError> {
    let mut file = tempfile::Builder::new()
        .prefix("scriptcast-")
        .suffix(".screenrc")
        .tempfile()
        .map_err(RecordError::ScreenRc)?;
    file.write_all(screen_rc_contents(position).as_bytes())
        .and_then(|()| file.flush())
        .map_err(RecordError::ScreenRc)?;
    debug!(path = %file.path().display(), ?position, "wrote screen configuration");
    Ok(file)
}

#[async_trait(?Send)]
impl Recorder for AsciinemaRecorder {
    fn stamp(&mut self, stamp: Stamp) -> Result<(), RecordError> {
        self.log.push(stamp)
    }

    async fn stop(&mut self) -> Result<EventStream, RecordError> {
        let stamps = self.log.close()?;
        let content = tokio::fs::read_to_string(&self.raw_path)
            .await
            .map_err(|source| CastError::Read {
                path: self.raw_path.clone(),
                source,
            })?;
        let stream = EventStream::parse(&content)?;
        info!(
            path = %self.raw_path.display(),
            events = stream.len(),
            stamps = stamps.len(),
            "recording stopped"
        );
        Ok(stream.insert_sorted(stamps))
    }
}
