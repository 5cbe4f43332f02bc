use std::borrow::Cow;

use regex::Regex;

use crate::cast::{EventKind, EventStream};
use crate::error::{ConfigError, DecodeError, FilterFailure};

/// Rewrites text inside output events.
///
/// Every output chunk is matched on its own, so a match that straddles two
/// chunks is not replaced. Payloads that are not UTF-8 fail the filter rather
/// than passing through unredacted.
#[derive(Debug, Clone)]
pub struct RegexReplacementFilter {
    regex: Regex,
    replacement: String,
}

impl RegexReplacementFilter {
    /// `replacement` may reference capture groups (`$1`, `${name}`).
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            replacement: replacement.into(),
        })
    }

    pub fn apply(&self, mut stream: EventStream) -> Result<EventStream, FilterFailure> {
        let events = stream.take_events();
        let mut rewritten = Vec::with_capacity(events.len());

        for (index, event) in events.into_iter().enumerate() {
            let EventKind::Output(data) = event.kind() else {
                rewritten.push(event);
                continue;
            };
            let text = std::str::from_utf8(data).map_err(|source| DecodeError { index, source })?;
            let replaced = match self.regex.replace_all(text, self.replacement.as_str()) {
                Cow::Borrowed(_) => None,
                Cow::Owned(replaced) => Some(replaced),
            };
            match replaced {
                Some(replaced) => {
                    rewritten.push(event.with_kind(EventKind::Output(replaced.into_bytes())));
                }
                None => rewritten.push(event),
            }
        }

        Ok(stream.replace_events(rewritten))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::{Event, Header};

    fn stream(events: Vec<Event>) -> EventStream {
        EventStream::from_events(Header::new(80, 24), events)
    }

    #[test]
    fn test_replaces_within_output() {
        let filter = RegexReplacementFilter::new("Hello World", "Goodbye World").unwrap();
        let out = filter
            .apply(stream(vec![Event::output(1.0, "Hello World\n")]))
            .unwrap();
        assert_eq!(out.events()[0], Event::output(1.0, "Goodbye World\n"));
    }

    #[test]
    fn test_no_match_is_noop() {
        let filter = RegexReplacementFilter::new("Hello World", "Goodbye World").unwrap();
        let input = EventStream::parse(
            "{\"version\": 2, \"width\": 10, \"height\": 5}\n[0.5, \"o\", \"hello world\"]\n",
        )
        .unwrap();
        let before = input.to_bytes().unwrap();
        let out = filter.apply(input).unwrap();
        assert_eq!(out.to_bytes().unwrap(), before);
    }

    #[test]
    fn test_capture_groups_and_multiple_matches() {
        let filter = RegexReplacementFilter::new(r"token=(\w+)", "token=<$1-redacted>").unwrap();
        let out = filter
            .apply(stream(vec![Event::output(0.0, "token=abc token=def")]))
            .unwrap();
        assert_eq!(
            out.events()[0].kind(),
            &EventKind::Output(b"token=<abc-redacted> token=<def-redacted>".to_vec())
        );
    }

    #[test]
    fn test_only_output_events_change() {
        let filter = RegexReplacementFilter::new("secret", "XXXXXX").unwrap();
        let input = stream(vec![
            Event::input(0.1, "secret"),
            Event::marker(0.2, "secret"),
            Event::output(0.3, "secret"),
        ]);
        let out = filter.apply(input).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.events()[0].kind(), &EventKind::Input(b"secret".to_vec()));
        assert_eq!(out.events()[1].label(), Some("secret"));
        assert_eq!(out.events()[2].kind(), &EventKind::Output(b"XXXXXX".to_vec()));
        assert_eq!(out.events()[2].time(), 0.3);
    }

    #[test]
    fn test_matches_across_chunks_are_not_merged() {
        let filter = RegexReplacementFilter::new("password", "********").unwrap();
        let input = stream(vec![Event::output(0.1, "pass"), Event::output(0.2, "word")]);
        let out = filter.apply(input.clone()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_non_utf8_payload_fails() {
        let filter = RegexReplacementFilter::new("x", "y").unwrap();
        let input = stream(vec![Event::output(0.1, "ok"), Event::output(0.2, vec![0xc3, 0x28])]);
        let err = filter.apply(input).unwrap_err();
        assert!(matches!(err, FilterFailure::Decode(DecodeError { index: 1, .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            RegexReplacementFilter::new("[unclosed", "x"),
            Err(ConfigError::InvalidRegex { .. })
        ));
    }
}
