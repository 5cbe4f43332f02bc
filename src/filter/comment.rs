use crate::cast::{CommentOverlay, Event, EventKind, EventStream, OverlayPosition};

/// Renders comment events as a status line on the first or last terminal row.
///
/// Each comment replaces the previous one. The line is drawn in reverse video,
/// centered across the terminal width from the header, and the cursor is
/// saved and restored around it so the recorded program is not disturbed. The
/// last active overlay is cleared at the final event of the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentFilter;

impl CommentFilter {
    pub fn apply(&self, mut stream: EventStream) -> EventStream {
        if !stream.has_comments() {
            return stream;
        }
        let width = usize::from(stream.header().width);
        let height = stream.header().height;

        let events = stream.take_events();
        let mut rendered = Vec::with_capacity(events.len() + 1);
        let mut active: Option<OverlayPosition> = None;

        for event in events {
            let EventKind::Comment(overlay) = event.kind() else {
                rendered.push(event);
                continue;
            };
            let time = event.time();
            let row = row_for(overlay.position, height);

            if let Some(previous) = active.filter(|p| *p != overlay.position) {
                rendered.push(Event::output(time, clear(row_for(previous, height))));
            }
            if overlay.text.is_empty() {
                rendered.push(Event::output(time, clear(row)));
                active = None;
            } else {
                rendered.push(Event::output(time, draw(overlay, row, width)));
                active = Some(overlay.position);
            }
        }

        if let (Some(position), Some(last)) = (active, rendered.last()) {
            let time = last.time();
            rendered.push(Event::output(time, clear(row_for(position, height))));
        }

        stream.replace_events(rendered)
    }
}

fn row_for(position: OverlayPosition, height: u16) -> u16 {
    match position {
        OverlayPosition::Top => 1,
        OverlayPosition::Bottom => height.max(1),
    }
}

fn draw(overlay: &CommentOverlay, row: u16, width: usize) -> String {
    format!(
        "\x1b[s\x1b[{row};1H\x1b[7m{}\x1b[m\x1b[u",
        center(&overlay.text, width)
    )
}

fn clear(row: u16) -> String {
    format!("\x1b[s\x1b[{row};1H\x1b[2K\x1b[u")
}

/// Center `text` in `width` columns; extra padding goes on the right.
fn center(text: &str, width: usize) -> String {
    let text: String = text.chars().take(width).collect();
    let len = text.chars().count();
    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{text}{}", " ".repeat(left), " ".repeat(right))
}
