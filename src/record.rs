//! Row representation shared by every source, transform and sink.
//!
//! A [`Record`] is an insertion-ordered JSON object keyed by column or field
//! name. Oracle rows arrive keyed by upper-case column names; Salesforce
//! records are keyed by field API names.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Trimmed text value; empty strings and nulls are `None`.
pub fn text(rec: &Record, key: &str) -> Option<String> {
    value_text(rec.get(key)?)
}

pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn integer(rec: &Record, key: &str) -> Option<i64> {
    match rec.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn decimal(rec: &Record, key: &str) -> Option<f64> {
    match rec.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

pub fn date(rec: &Record, key: &str) -> Option<NaiveDate> {
    parse_date(&text(rec, key)?)
}

pub fn datetime(rec: &Record, key: &str) -> Option<NaiveDateTime> {
    let raw = text(rec, key)?;
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), fmt) {
            return Some(dt);
        }
    }
    parse_date(&raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `Y/N`, `1/0`, `true/false`, `yes/no`.
pub fn flag(rec: &Record, key: &str) -> Option<bool> {
    match rec.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "1" | "t" => Some(true),
            "n" | "no" | "false" | "0" | "f" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse the date shapes seen in extracts: ISO dates and timestamps,
/// Australian `DD/MM/YYYY` and the Oracle default `DD-MON-YY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.len() >= 10 && s.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    for fmt in ["%d/%m/%Y", "%d-%b-%y", "%d-%b-%Y", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Remove Salesforce's `attributes` envelope, recursively for nested relationship objects.
pub fn strip_attributes(mut rec: Record) -> Record {
    rec.remove("attributes");
    for value in rec.values_mut() {
        if let Value::Object(inner) = value {
            let cleaned = strip_attributes(std::mem::take(inner));
            *inner = cleaned;
        }
    }
    rec
}
