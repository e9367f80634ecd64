//! Line format of the durable log.
//!
//! One record per line, fields joined with `,`:
//!
//! ```text
//! event,<unix_ts>,<participant>,<channel>,<event_kind>,<aux_data>
//! msg,<unix_ts>,<participant>,<channel>,<text>
//! url,<unix_ts>,<participant>,<url>
//! ```
//!
//! Every field is passed through [`escape`] before joining, so a raw `,` in
//! a line is always a field boundary.  Backslashes and line breaks are
//! escaped as well; without that a text ending in `\` would swallow the
//! following delimiter.
//!
//! Older logs wrote message text and quit reasons without escaping.  The
//! last field of every record therefore absorbs any surplus fields, with
//! the commas put back.

use chrono::{DateTime, Utc};

use crate::error::LineError;
use crate::models::{EventKind, LogRecord};

pub const DELIMITER: char = ',';
const ESCAPE: char = '\\';

/// Escape a field so it contains no raw delimiter or line break.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ESCAPE => out.push_str("\\\\"),
            DELIMITER => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`].
///
/// Unknown escape sequences and a dangling trailing backslash are kept
/// verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(ESCAPE) => out.push(ESCAPE),
            Some(DELIMITER) => out.push(DELIMITER),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push(ESCAPE);
                out.push(other);
            }
            None => out.push(ESCAPE),
        }
    }
    out
}

/// Split a line on unescaped delimiters.  Fields are returned still escaped.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == DELIMITER {
            fields.push(&line[start..i]);
            start = i + c.len_utf8();
        }
    }
    fields.push(&line[start..]);
    fields
}

/// Serialize a record to one log line, without the trailing newline.
pub fn encode_line(record: &LogRecord) -> String {
    let ts = |t: &DateTime<Utc>| t.timestamp().to_string();
    let fields: Vec<String> = match record {
        LogRecord::Event {
            timestamp,
            participant,
            channel,
            kind,
            data,
        } => vec![
            ts(timestamp),
            escape(participant),
            escape(channel),
            escape(kind.as_str()),
            escape(data),
        ],
        LogRecord::Message {
            timestamp,
            participant,
            channel,
            text,
        } => vec![ts(timestamp), escape(participant), escape(channel), escape(text)],
        LogRecord::Link {
            timestamp,
            participant,
            url,
        } => vec![ts(timestamp), escape(participant), escape(url)],
    };

    let mut line = String::from(record.tag());
    for field in fields {
        line.push(DELIMITER);
        line.push_str(&field);
    }
    line
}

/// Parse one log line.
pub fn decode_line(line: &str) -> Result<LogRecord, LineError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(LineError::Empty);
    }

    let fields = split_fields(line);
    let (tag, min_fields) = match fields[0] {
        "event" => ("event", 5),
        "msg" => ("msg", 5),
        "url" => ("url", 4),
        other => return Err(LineError::UnknownTag(other.to_string())),
    };
    if fields.len() < min_fields {
        return Err(LineError::FieldCount {
            tag,
            expected: min_fields,
            found: fields.len(),
        });
    }

    let timestamp = parse_timestamp(fields[1])?;
    let participant = unescape(fields[2]);
    if participant.is_empty() {
        return Err(LineError::MissingParticipant);
    }

    let record = match tag {
        "event" => LogRecord::Event {
            timestamp,
            participant,
            channel: unescape(fields[3]),
            kind: EventKind::from(unescape(fields[4]).as_str()),
            data: join_tail(&fields, 5),
        },
        "msg" => LogRecord::Message {
            timestamp,
            participant,
            channel: unescape(fields[3]),
            text: join_tail(&fields, 4),
        },
        _ => LogRecord::Link {
            timestamp,
            participant,
            url: join_tail(&fields, 3),
        },
    };
    Ok(record)
}

fn parse_timestamp(field: &str) -> Result<DateTime<Utc>, LineError> {
    field
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| LineError::Timestamp(field.to_string()))
}

/// Unescape and re-join everything from `from` onwards.  Empty when the
/// optional trailing field is absent.
fn join_tail(fields: &[&str], from: usize) -> String {
    fields
        .get(from..)
        .unwrap_or_default()
        .iter()
        .map(|f| unescape(f))
        .collect::<Vec<_>>()
        .join(",")
}
