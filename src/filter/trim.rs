use crate::cast::{Event, EventKind, EventStream};
use crate::error::FilterFailure;

/// Drops everything before the first marker labelled `start_label` and shifts
/// the rest so that marker sits at t=0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartMarkerFilter {
    pub start_label: String,
}

impl StartMarkerFilter {
    pub fn new(start_label: impl Into<String>) -> Self {
        Self {
            start_label: start_label.into(),
        }
    }

    pub fn apply(&self, stream: EventStream) -> Result<EventStream, FilterFailure> {
        let window = TrimWindow {
            start: Some(&self.start_label),
            ..TrimWindow::default()
        };
        window.cut(stream).map_err(|(_, failure)| failure)
    }
}

/// Drops everything after the first marker labelled `end_label`. The marker
/// itself becomes the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndMarkerFilter {
    pub end_label: String,
}

impl EndMarkerFilter {
    pub fn new(end_label: impl Into<String>) -> Self {
        Self {
            end_label: end_label.into(),
        }
    }

    pub fn apply(&self, stream: EventStream) -> Result<EventStream, FilterFailure> {
        let window = TrimWindow {
            end: Some(&self.end_label),
            ..TrimWindow::default()
        };
        window.cut(stream).map_err(|(_, failure)| failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Bound {
    Start,
    End,
}

/// Both trim bounds, located against the same stream before either cut.
#[derive(Debug, Default)]
pub(super) struct TrimWindow<'a> {
    pub start: Option<&'a str>,
    pub start_index: Option<usize>,
    pub end: Option<&'a str>,
    pub end_index: Option<usize>,
}

impl TrimWindow<'_> {
    /// The end marker is searched for from the start marker onward, so an
    /// end label that also occurs earlier in the session does not invert the
    /// window. An overlay still showing at the start marker is carried over
    /// to t=0.
    pub fn cut(&self, mut stream: EventStream) -> Result<EventStream, (Bound, FilterFailure)> {
        let not_found = |label: &str, bound: Bound| {
            let label = label.to_string();
            (bound, FilterFailure::MarkerNotFound { label })
        };
        let first = match self.start {
            None => None,
            Some(label) => {
                let index = stream.find_marker(label);
                Some(index.ok_or_else(|| not_found(label, Bound::Start))?)
            }
        };
        let from = first.unwrap_or(0);
        let last = match self.end {
            None => None,
            Some(label) => match find_marker_from(&stream, label, from) {
                Some(index) => Some(index),
                None => {
                    let earlier = stream
                        .find_marker(label)
                        .ok_or_else(|| not_found(label, Bound::End))?;
                    let events = stream.events();
                    return Err((
                        Bound::End,
                        FilterFailure::InvertedWindow {
                            start: self.start.unwrap_or_default().to_string(),
                            start_time: events[from].time(),
                            end: label.to_string(),
                            end_time: events[earlier].time(),
                        },
                    ));
                }
            },
        };

        let offset = first.map_or(0.0, |i| stream.events()[i].time());
        let hi = last.map_or(stream.len(), |i| i + 1);

        let mut events = stream.take_events();
        events.truncate(hi);
        // An empty comment clears the overlay, so there is nothing to carry.
        let active = events[..from]
            .iter()
            .rev()
            .find_map(|event| match event.kind() {
                EventKind::Comment(overlay) => Some(overlay),
                _ => None,
            })
            .filter(|overlay| !overlay.text.is_empty())
            .map(|overlay| Event::comment(0.0, overlay.clone()));
        let mut kept: Vec<Event> = events
            .drain(from..)
            .map(|event| event.shifted(offset))
            .collect();
        if let Some(comment) = active {
            kept.insert(1, comment);
        }
        Ok(stream.replace_events(kept))
    }
}

fn find_marker_from(stream: &EventStream, label: &str, from: usize) -> Option<usize> {
    stream.events()[from..]
        .iter()
        .position(|event| event.label() == Some(label))
        .map(|index| index + from)
}
