//! Weakly-typed source records.
//!
//! Fields are source-defined and not statically known, so a [`Record`] keeps
//! the JSON value as-is and offers typed, lenient accessors on top.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of a source collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Record(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Source identifier: `_id` first, then `id`. Numeric ids are rendered.
    pub fn id(&self) -> Option<String> {
        match self.0.get("_id").or_else(|| self.0.get("id"))? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Field lookup by dotted path (`"userId.email"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.0, |current, segment| current.get(segment))
    }

    pub fn str_field(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn bool_field(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Numeric field as an exact decimal. Numeric strings are accepted;
    /// anything else is `None`.
    pub fn number(&self, path: &str) -> Option<Decimal> {
        self.get(path).and_then(decimal_from_value)
    }

    /// Timestamp field, see [`parse_timestamp`].
    pub fn timestamp(&self, path: &str) -> Option<DateTime<Utc>> {
        self.get(path).and_then(parse_timestamp)
    }

    /// First parseable timestamp among `paths`.
    pub fn first_timestamp(&self, paths: &[&str]) -> Option<DateTime<Utc>> {
        paths.iter().find_map(|p| self.timestamp(p))
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record(value)
    }
}

/// Convert a JSON number or numeric string into a decimal.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Some(Decimal::from(u));
            }
            parse_decimal(&n.to_string())
        }
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Parse the timestamp encodings the backends emit.
///
/// Accepted: RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as
/// UTC), bare `YYYY-MM-DD` dates (midnight UTC), integer epoch milliseconds,
/// and `{"$date": ...}` wrappers around any of those.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => map.get("$date").and_then(parse_timestamp),
        _ => None,
    }
}
