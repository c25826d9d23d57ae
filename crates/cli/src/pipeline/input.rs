//! Newline-delimited JSON input.
//!
//! Each non-blank line must be a JSON object. The record timestamp is taken
//! from a configurable field; records without it are stamped with local now.

use chrono::{DateTime, Local, NaiveDateTime};
use contracts::{TimedRecord, Value};

use crate::error::{CliError, Result};

/// Naive layouts accepted besides RFC 3339
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses input lines into timed records
#[derive(Debug, Clone)]
pub struct RecordParser {
    timestamp_field: String,
}

impl RecordParser {
    pub fn new(timestamp_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
        }
    }

    /// Parse one line. `Ok(None)` for blank lines.
    pub fn parse_line(&self, line_no: usize, line: &str) -> Result<Option<TimedRecord>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let record = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(CliError::invalid_record(
                    line_no,
                    format!("expected a JSON object, got {}", json_kind(&other)),
                ))
            }
            Err(e) => return Err(CliError::invalid_record(line_no, e.to_string())),
        };

        let timestamp = match record.get(&self.timestamp_field) {
            None | Some(Value::Null) => Local::now().naive_local(),
            Some(Value::String(raw)) => parse_timestamp(raw).ok_or_else(|| {
                CliError::invalid_record(
                    line_no,
                    format!("unrecognized timestamp '{}' in '{}'", raw, self.timestamp_field),
                )
            })?,
            Some(other) => {
                return Err(CliError::invalid_record(
                    line_no,
                    format!(
                        "timestamp field '{}' must be a string, got {}",
                        self.timestamp_field,
                        json_kind(other)
                    ),
                ))
            }
        };

        Ok(Some(TimedRecord::new(record, timestamp)))
    }
}

/// RFC 3339 (converted to local time) or a naive local timestamp
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_naive_timestamp() {
        let parser = RecordParser::new("ts");
        let item = parser
            .parse_line(1, r#"{"id": 1, "ts": "2024-03-01 23:15:00"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(item.timestamp.hour(), 23);
        assert_eq!(item.timestamp.minute(), 15);
        // timestamp stays part of the record
        assert_eq!(item.record["ts"], "2024-03-01 23:15:00");
    }

    #[test]
    fn test_fractional_and_t_separator() {
        let ts = parse_timestamp("2024-03-01T08:00:00.250").unwrap();
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_rfc3339_is_accepted() {
        assert!(parse_timestamp("2024-03-01T08:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-01T08:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let parser = RecordParser::new("ts");
        let before = Local::now().naive_local();
        let item = parser.parse_line(1, r#"{"id": 1}"#).unwrap().unwrap();
        assert!(item.timestamp >= before);
    }

    #[test]
    fn test_blank_line_is_skipped() {
        let parser = RecordParser::new("ts");
        assert!(parser.parse_line(3, "   ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_lines() {
        let parser = RecordParser::new("ts");
        let err = parser.parse_line(2, "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("got array"));

        assert!(parser.parse_line(4, "{not json").is_err());
        assert!(parser.parse_line(5, r#"{"ts": 12}"#).is_err());
        assert!(parser.parse_line(6, r#"{"ts": "noon"}"#).is_err());
    }
}
