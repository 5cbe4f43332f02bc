//! asciicast v2 line codec.
//!
//! One JSON object (the header) followed by one `[time, code, data]` array per
//! line. Each parsed record keeps its source line so an unmodified stream can
//! be written back verbatim.

use serde_json::Value;

use super::{Event, EventKind, EventStream, Header};
use crate::error::CastError;

const SUPPORTED_VERSION: u64 = 2;

pub(super) fn parse(content: &str) -> Result<EventStream, CastError> {
    let mut lines = content.split_inclusive('\n').enumerate().peekable();

    // Blank lines before the header are kept with it.
    let mut leading = String::new();
    while let Some((_, line)) = lines.next_if(|(_, line)| line.trim().is_empty()) {
        leading.push_str(line);
    }
    let (header_idx, header_line) = lines.next().ok_or(CastError::Empty)?;
    let header = parse_header(header_idx + 1, header_line)?;
    leading.push_str(header_line);

    let mut stream = EventStream::new(header);
    stream.header_source = Some(leading);

    let mut previous = f64::NEG_INFINITY;
    for (idx, line) in lines {
        if line.trim().is_empty() {
            // Blank lines stay attached to the record before them.
            match stream.events.pop() {
                Some(last) => {
                    let mut source = last.source().unwrap_or_default().to_string();
                    source.push_str(line);
                    stream.events.push(last.with_source(source));
                }
                None => {
                    if let Some(header_source) = stream.header_source.as_mut() {
                        header_source.push_str(line);
                    }
                }
            }
            continue;
        }

        let line_no = idx + 1;
        let event = parse_event(line_no, line)?;
        if event.time() < previous {
            return Err(CastError::OutOfOrder {
                line: line_no,
                time: event.time(),
            });
        }
        previous = event.time();
        stream.events.push(event.with_source(line));
    }

    Ok(stream)
}

fn parse_header(line_no: usize, line: &str) -> Result<Header, CastError> {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|_| CastError::MissingHeader { line: line_no })?;
    if !value.is_object() {
        return Err(CastError::MissingHeader { line: line_no });
    }
    let header: Header = serde_json::from_value(value).map_err(|source| {
        CastError::InvalidHeader {
            line: line_no,
            source,
        }
    })?;
    if header.version != SUPPORTED_VERSION {
        return Err(CastError::UnsupportedVersion(header.version));
    }
    Ok(header)
}

fn parse_event(line_no: usize, line: &str) -> Result<Event, CastError> {
    let invalid = |reason: String| CastError::InvalidEvent {
        line: line_no,
        reason,
    };

    let record: Value = serde_json::from_str(line.trim()).map_err(|e| invalid(e.to_string()))?;
    let fields = match record.as_array() {
        Some(fields) if fields.len() == 3 => fields,
        _ => return Err(invalid("expected a [time, code, data] array".to_string())),
    };

    let time = match &fields[0] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|t| t.is_finite())
    .ok_or_else(|| invalid(format!("invalid event time {}", fields[0])))?;

    let code = fields[1]
        .as_str()
        .ok_or_else(|| invalid(format!("invalid event code {}", fields[1])))?;
    let data = fields[2]
        .as_str()
        .ok_or_else(|| invalid(format!("event data must be a string, got {}", fields[2])))?;

    let kind = match code {
        "o" => EventKind::Output(data.as_bytes().to_vec()),
        "i" => EventKind::Input(data.as_bytes().to_vec()),
        "m" => EventKind::Marker(data.to_string()),
        "r" => {
            let (cols, rows) = parse_resize(data)
                .ok_or_else(|| invalid(format!("invalid resize data '{data}'")))?;
            EventKind::Resize { cols, rows }
        }
        other => {
            return Err(CastError::UnknownCode {
                line: line_no,
                code: other.to_string(),
            });
        }
    };

    Ok(Event::new(time, kind))
}

fn parse_resize(data: &str) -> Option<(u16, u16)> {
    let (cols, rows) = data.split_once('x')?;
    if cols.is_empty() || rows.is_empty() {
        return None;
    }
    if !cols.bytes().chain(rows.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((cols.parse().ok()?, rows.parse().ok()?))
}

pub(super) fn write(stream: &EventStream, out: &mut Vec<u8>) -> Result<(), CastError> {
    match &stream.header_source {
        Some(source) => out.extend_from_slice(source.as_bytes()),
        None => {
            serde_json::to_writer(&mut *out, &stream.header)?;
            out.push(b'\n');
        }
    }

    for (index, event) in stream.events.iter().enumerate() {
        if let Some(source) = event.source() {
            terminate_line(out);
            out.extend_from_slice(source.as_bytes());
            continue;
        }
        let line = encode_event(index, event)?;
        terminate_line(out);
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    Ok(())
}

/// A verbatim last line may lack its newline; never glue a record onto it.
fn terminate_line(out: &mut Vec<u8>) {
    if out.last().is_some_and(|b| *b != b'\n') {
        out.push(b'\n');
    }
}

fn encode_event(index: usize, event: &Event) -> Result<String, CastError> {
    let text = |data: &[u8]| {
        std::str::from_utf8(data)
            .map(str::to_string)
            .map_err(|_| CastError::NonText { index })
    };

    let kind = event.kind();
    let code = kind.code().ok_or(CastError::UnfilteredComment { index })?;
    let data = match kind {
        EventKind::Output(data) | EventKind::Input(data) => text(data)?,
        EventKind::Marker(label) => label.clone(),
        EventKind::Resize { cols, rows } => format!("{cols}x{rows}"),
        EventKind::Comment(_) => return Err(CastError::UnfilteredComment { index }),
    };
    Ok(serde_json::to_string(&(event.time(), code, data))?)
}
