//! Marker listings for embedding a recording in a web page.

use crate::cast::EventStream;

/// One HTML seek link per marker, in stream order.
///
/// With `data_video_id` each link targets that player element.
pub fn marker_links(stream: &EventStream, data_video_id: Option<&str>) -> Vec<String> {
    let video_attr = data_video_id
        .map(|id| format!(" data-video=\"{}\"", escape_html(id)))
        .unwrap_or_default();
    stream
        .markers()
        .map(|(time, label)| {
            format!(
                "<a{video_attr} data-seek-to=\"{time}\" href=\"javascript:;\">{}</a>",
                escape_html(label)
            )
        })
        .collect()
}

/// Marker links as a numbered Markdown list, one item per line.
pub fn marker_list(stream: &EventStream, data_video_id: Option<&str>) -> String {
    marker_links(stream, data_video_id)
        .iter()
        .enumerate()
        .map(|(ix, link)| format!("{}. {link}\n", ix + 1))
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::{Event, Header};

    fn stream() -> EventStream {
        EventStream::from_events(
            Header::new(80, 24),
            vec![
                Event::output(0.2, "$ "),
                Event::marker(0.8, "List files"),
                Event::output(1.0, "ls\r\n"),
                Event::marker(2.5, "Disk <usage>"),
            ],
        )
    }

    #[test]
    fn test_links_without_video_id() {
        let links = marker_links(&stream(), None);
        assert_eq!(
            links,
            vec![
                "<a data-seek-to=\"0.8\" href=\"javascript:;\">List files</a>",
                "<a data-seek-to=\"2.5\" href=\"javascript:;\">Disk &lt;usage&gt;</a>",
            ]
        );
    }

    #[test]
    fn test_numbered_list_with_video_id() {
        let list = marker_list(&stream(), Some("demo"));
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "1. <a data-video=\"demo\" data-seek-to=\"0.8\" href=\"javascript:;\">List files</a>"
        );
        assert!(lines[1].starts_with("2. <a data-video=\"demo\" data-seek-to=\"2.5\""));
    }

    #[test]
    fn test_no_markers() {
        let empty = EventStream::from_events(Header::new(80, 24), vec![Event::output(0.1, "x")]);
        assert!(marker_list(&empty, None).is_empty());
    }
}
