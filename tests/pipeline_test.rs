use proptest::prelude::*;
use scriptcast::error::FilterFailure;
use scriptcast::{
    CommentOverlay, Event, EventKind, EventStream, FilterKind, FilterPipeline, FilterSpec,
    OverlayPosition, Script, ScriptFormat,
};

const SESSION: &str = r#"{"version": 2, "width": 40, "height": 10, "timestamp": 1700000000, "env": {"SHELL": "/bin/bash", "TERM": "xterm-256color"}}
[0.31, "o", "$ "]
[0.802, "m", "Setup"]
[1.2, "o", "l"]
[1.27, "o", "s"]
[1.5, "o", "\r\n"]
[1.52, "o", "Hello World   secret.txt\r\n$ "]
[2.4, "m", "END"]
[2.9, "o", "exit\r\n"]
"#;

fn session() -> EventStream {
    EventStream::parse(SESSION).unwrap()
}

fn pipeline(yaml: &str) -> FilterPipeline {
    let filters: Vec<FilterSpec> = serde_yaml::from_str(yaml).unwrap();
    FilterPipeline::from_specs(&filters).unwrap()
}

fn outputs(stream: &EventStream) -> String {
    stream
        .events()
        .iter()
        .filter_map(|e| match e.kind() {
            EventKind::Output(data) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_unfiltered_round_trip_is_byte_identical() {
    let bytes = session().to_bytes().unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), SESSION);
}

#[test]
fn test_empty_pipeline_preserves_bytes() {
    let out = FilterPipeline::default().apply(session()).unwrap();
    assert_eq!(out.to_bytes().unwrap(), SESSION.as_bytes());
}

#[test]
fn test_trim_and_redact() {
    let pipeline = pipeline(
        r#"
- filter_id: RegexReplacementFilter
  regex: "Hello World"
  replacement: "Goodbye World"
- filter_id: EndMarkerFilter
  end_label: END
- filter_id: StartMarkerFilter
  start_label: Setup
"#,
    );
    let out = pipeline.apply(session()).unwrap();

    assert_eq!(out.events().first().unwrap().label(), Some("Setup"));
    assert_eq!(out.events().first().unwrap().time(), 0.0);
    assert_eq!(out.events().last().unwrap().label(), Some("END"));
    assert!((out.events().last().unwrap().time() - 1.598).abs() < 1e-9);
    assert_eq!(outputs(&out), "ls\r\nGoodbye World   secret.txt\r\n$ ");
    assert!(out.is_ordered());

    // The header survives untouched.
    let text = String::from_utf8(out.to_bytes().unwrap()).unwrap();
    assert!(text.starts_with(SESSION.lines().next().unwrap()));
}

#[test]
fn test_missing_end_marker_fails_without_output() {
    let pipeline = pipeline("- filter_id: EndMarkerFilter\n  end_label: FINISH\n");
    let err = pipeline.apply(session()).unwrap_err();
    assert_eq!(err.index, 0);
    assert_eq!(err.kind, FilterKind::EndMarker);
    assert!(matches!(err.source, FilterFailure::MarkerNotFound { ref label } if label == "FINISH"));
}

#[test]
fn test_script_pipeline_with_comments() {
    let script = Script::parse(
        r#"
output_file = "demo.cast"
with_comments = true
comments_at_top = true

[[filters]]
filter_id = "StartMarkerFilter"
start_label = "Setup"
"#,
        ScriptFormat::Toml,
    )
    .unwrap();
    let pipeline = script.pipeline().unwrap();
    assert_eq!(pipeline.filters().len(), 2);

    let overlay = CommentOverlay::new("Listing files", OverlayPosition::Top);
    let recorded = session().insert_sorted(vec![Event::comment(1.0, overlay)]);
    let out = pipeline.apply(recorded).unwrap();

    assert!(!out.has_comments());
    assert!(outputs(&out).contains("\x1b[s\x1b[1;1H\x1b[7m"));
    assert!(outputs(&out).contains("Listing files"));
    assert!(out.to_bytes().is_ok());
}

fn arb_stream() -> impl Strategy<Value = EventStream> {
    prop::collection::vec((0u32..5_000, 0u8..4, "[a-z ]{0,6}"), 0..40).prop_map(|mut raw| {
        raw.sort_by_key(|(t, _, _)| *t);
        let mut events: Vec<Event> = raw
            .into_iter()
            .map(|(t, kind, text)| {
                let time = f64::from(t) / 1000.0;
                match kind {
                    0 => Event::marker(time, text),
                    _ => Event::output(time, text),
                }
            })
            .collect();
        events.insert(0, Event::marker(0.0, "A"));
        events.push(Event::marker(5.0, "B"));
        EventStream::from_events(scriptcast::Header::new(80, 24), events)
    })
}

proptest! {
    #[test]
    fn test_filters_keep_events_ordered(stream in arb_stream()) {
        let pipeline = pipeline(
            r#"
- filter_id: StartMarkerFilter
  start_label: A
- filter_id: RegexReplacementFilter
  regex: "[aeiou]+"
  replacement: "*"
- filter_id: EndMarkerFilter
  end_label: B
"#,
        );
        let out = pipeline.apply(stream).unwrap();
        prop_assert!(out.is_ordered());
        prop_assert_eq!(out.events().first().and_then(|e| e.label()), Some("A"));
        prop_assert_eq!(out.events().last().and_then(|e| e.label()), Some("B"));
    }
}
