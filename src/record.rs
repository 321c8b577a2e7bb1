// src/record.rs
//
// Structured extraction from decoded telemetry lines.
//
// Line format (ESP-IDF console logs):
//   <level> (<timestamp>) <tag>: <message>[: <data>]
//
// Example:
//   `I (12345) APP: hello: payload-data` -> timestamp "12345",
//   message "hello", data "payload-data"

use serde::Serialize;

/// Structured record derived from one decoded line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub message: String,
    /// Optional payload after the second `:` of the body.
    pub data: Option<String>,
}

impl LogRecord {
    /// Render the record as delimiter-joined text for the output file.
    pub fn to_delimited(&self, delimiter: &str) -> String {
        match &self.data {
            Some(data) => format!(
                "{}{}{}{}{}",
                self.timestamp, delimiter, self.message, delimiter, data
            ),
            None => format!("{}{}{}", self.timestamp, delimiter, self.message),
        }
    }
}

/// Parse failure. Never fatal to a session: the caller falls back to
/// persisting the raw line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// No `(` found, so the line carries no timestamp segment.
    NoTimestampMarker,
    /// A `(` with no closing `)` after it.
    UnterminatedTimestamp,
    /// Fewer than two `:`-separated parts after the timestamp.
    MalformedBody,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::NoTimestampMarker => write!(f, "no timestamp marker '(' in line"),
            ParseError::UnterminatedTimestamp => write!(f, "unterminated timestamp segment"),
            ParseError::MalformedBody => write!(f, "malformed body after timestamp"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Extract a `LogRecord` from a decoded line.
///
/// Scans to the first `(`, collects up to the first `)` as the timestamp,
/// then splits the remainder on `:` into at most three parts. The second
/// part (trimmed) is the message; a third part (trimmed) is the data
/// payload. The leading part before the first `:` is discarded.
pub fn parse_record(line: &str) -> Result<LogRecord, ParseError> {
    let open = line.find('(').ok_or(ParseError::NoTimestampMarker)?;
    let after_open = &line[open + 1..];
    let close = after_open
        .find(')')
        .ok_or(ParseError::UnterminatedTimestamp)?;
    let timestamp = &after_open[..close];
    let body = &after_open[close + 1..];

    let mut parts = body.splitn(3, ':');
    let _head = parts.next();
    let message = parts.next().ok_or(ParseError::MalformedBody)?;
    let data = parts.next();

    Ok(LogRecord {
        timestamp: timestamp.to_string(),
        message: message.trim().to_string(),
        data: data.map(|d| d.trim().to_string()),
    })
}
