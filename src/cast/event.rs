use std::fmt;

/// Where a comment overlay is drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    /// First terminal row.
    Top,
    /// Last terminal row.
    Bottom,
}

impl OverlayPosition {
    pub fn from_top(top: bool) -> Self {
        if top { Self::Top } else { Self::Bottom }
    }
}

/// Payload of a comment-display event.
///
/// Comments travel through the stream as their own event kind rather than as
/// specially named markers, so a user label can never be mistaken for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentOverlay {
    pub text: String,
    pub position: OverlayPosition,
}

impl CommentOverlay {
    pub fn new(text: impl Into<String>, position: OverlayPosition) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }
}

/// What happened at a point in the recorded session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Bytes the program wrote to the terminal (`"o"`).
    Output(Vec<u8>),
    /// Bytes typed into the terminal (`"i"`).
    Input(Vec<u8>),
    /// A named marker (`"m"`).
    Marker(String),
    /// Terminal resize (`"r"`).
    Resize { cols: u16, rows: u16 },
    /// A comment overlay update. Only exists in memory; a
    /// [`CommentFilter`](crate::filter::CommentFilter) must render it before
    /// the stream can be written.
    Comment(CommentOverlay),
}

impl EventKind {
    /// The asciicast event code, or `None` for in-memory kinds.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Output(_) => Some("o"),
            Self::Input(_) => Some("i"),
            Self::Marker(_) => Some("m"),
            Self::Resize { .. } => Some("r"),
            Self::Comment(_) => None,
        }
    }
}

/// A timestamped session event.
///
/// Events read from a log remember the exact line they came from. Any change
/// to the time or payload drops that line, so untouched events are written
/// back byte for byte and touched ones are re-encoded.
#[derive(Debug, Clone)]
pub struct Event {
    time: f64,
    kind: EventKind,
    source: Option<String>,
}

impl Event {
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self {
            time,
            kind,
            source: None,
        }
    }

    pub fn output(time: f64, data: impl Into<Vec<u8>>) -> Self {
        Self::new(time, EventKind::Output(data.into()))
    }

    pub fn input(time: f64, data: impl Into<Vec<u8>>) -> Self {
        Self::new(time, EventKind::Input(data.into()))
    }

    pub fn marker(time: f64, label: impl Into<String>) -> Self {
        Self::new(time, EventKind::Marker(label.into()))
    }

    pub fn comment(time: f64, overlay: CommentOverlay) -> Self {
        Self::new(time, EventKind::Comment(overlay))
    }

    /// Seconds since the start of the session.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The marker label, if this is a marker event.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Marker(label) => Some(label),
            _ => None,
        }
    }

    /// The line this event was read from, including its terminator.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub(crate) fn with_source(mut self, line: impl Into<String>) -> Self {
        self.source = Some(line.into());
        self
    }

    /// Move the event `offset` seconds earlier. A zero offset keeps the
    /// original encoding.
    pub fn shifted(self, offset: f64) -> Self {
        if offset == 0.0 {
            return self;
        }
        Self::new(round_micros(self.time - offset), self.kind)
    }

    /// Replace the payload, keeping the timestamp.
    pub fn with_kind(self, kind: EventKind) -> Self {
        if kind == self.kind {
            return self;
        }
        Self::new(self.time, kind)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.kind == other.kind
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Output(data) => {
                write!(f, "{:.6} o {:?}", self.time, String::from_utf8_lossy(data))
            }
            EventKind::Input(data) => {
                write!(f, "{:.6} i {:?}", self.time, String::from_utf8_lossy(data))
            }
            EventKind::Marker(label) => write!(f, "{:.6} m {label:?}", self.time),
            EventKind::Resize { cols, rows } => write!(f, "{:.6} r {cols}x{rows}", self.time),
            EventKind::Comment(overlay) => write!(f, "{:.6} comment {:?}", self.time, overlay.text),
        }
    }
}

/// Round to whole microseconds so shifted times do not pick up float noise.
pub(crate) fn round_micros(time: f64) -> f64 {
    (time * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_drops_source() {
        let event = Event::output(2.5, "x").with_source("[2.5, \"o\", \"x\"]\n");
        assert!(event.source().is_some());

        let shifted = event.shifted(0.5);
        assert_eq!(shifted.time(), 2.0);
        assert!(shifted.source().is_none());
    }

    #[test]
    fn test_zero_shift_keeps_source() {
        let event = Event::marker(1.0, "A").with_source("[1.0, \"m\", \"A\"]\n");
        assert!(event.shifted(0.0).source().is_some());
    }

    #[test]
    fn test_shift_rounds_float_noise() {
        let shifted = Event::output(0.3, "x").shifted(0.1);
        assert_eq!(shifted.time(), 0.2);
    }

    #[test]
    fn test_same_kind_keeps_source() {
        let event = Event::output(1.0, "a").with_source("line\n");
        let same = event.clone().with_kind(EventKind::Output(b"a".to_vec()));
        assert!(same.source().is_some());
        let changed = event.with_kind(EventKind::Output(b"b".to_vec()));
        assert!(changed.source().is_none());
    }

    #[test]
    fn test_codes() {
        assert_eq!(EventKind::Marker("x".into()).code(), Some("m"));
        let overlay = CommentOverlay::new("hi", OverlayPosition::Top);
        assert_eq!(EventKind::Comment(overlay).code(), None);
    }
}
