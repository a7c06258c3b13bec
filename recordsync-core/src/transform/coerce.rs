//! Cell coercion helpers shared by report transformers.

use crate::types::CellValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Spreadsheet serial day number of 1970-01-01.
const SERIAL_UNIX_EPOCH: f64 = 25569.0;
const MS_PER_DAY: f64 = 86_400_000.0;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parse a number, ignoring thousands separators ("1,855" -> 1855).
pub fn to_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        CellValue::Null | CellValue::Bool(_) => None,
    }
}

/// "yes", "true", and "on" (any case) are true. Everything else is false.
pub fn to_boolean(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(b) => *b,
        CellValue::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "on"
        ),
        CellValue::Null | CellValue::Number(_) => false,
    }
}

/// Trimmed text for any non-empty, non-zero cell.
pub fn trimmed_text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Null | CellValue::Bool(false) => None,
        CellValue::Number(n) if *n == 0.0 => None,
        CellValue::Text(s) if s.is_empty() => None,
        other => Some(other.to_string().trim().to_string()),
    }
}

/// Interpret a cell as a timestamp (UTC).
///
/// Numbers above 100 are spreadsheet serial dates. Text shorter than eight
/// characters, or mentioning a bed, is not a date.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Number(serial) if *serial > 100.0 => {
            let ms = ((serial - SERIAL_UNIX_EPOCH) * MS_PER_DAY).round() as i64;
            DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
        }
        CellValue::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    if s.len() < 8 || s.to_ascii_lowercase().contains("bed") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_date_only(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d").to_string()
}

pub fn format_date_time(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// How a source cell becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Cell as-is.
    Raw,
    /// Trimmed text, null when blank.
    Text,
    Bool,
    Number,
    /// `YYYY-MM-DD`, null when unparseable.
    Date,
    /// ISO-8601 UTC timestamp, null when unparseable.
    DateTime,
}

impl Coercion {
    pub fn apply(self, cell: &CellValue) -> Value {
        match self {
            Coercion::Raw => cell.to_json(),
            Coercion::Text => trimmed_text(cell).map_or(Value::Null, Value::String),
            Coercion::Bool => Value::Bool(to_boolean(cell)),
            Coercion::Number => to_number(cell)
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
            Coercion::Date => parse_date(cell)
                .map_or(Value::Null, |dt| Value::String(format_date_only(&dt))),
            Coercion::DateTime => parse_date(cell)
                .map_or(Value::Null, |dt| Value::String(format_date_time(&dt))),
        }
    }
}
