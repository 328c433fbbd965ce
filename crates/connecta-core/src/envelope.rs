//! Envelope normalization.
//!
//! The backends disagree on how a list response is wrapped. Rather than
//! probing fields at every call site, a response is classified once into the
//! closed set of shapes below and then flattened into records. An
//! unrecognized shape is not an error: it normalizes to an empty collection.

use serde_json::{Map, Value};

use crate::record::Record;

/// The list-response shapes the admin API is known to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `[ ... ]`
    Bare(Vec<Value>),
    /// `{ "data": [ ... ] }`
    Data(Vec<Value>),
    /// `{ "success": bool, "data": [ ... ] }`
    Success { success: bool, data: Vec<Value> },
    /// `{ "<key>": [ ... ] }` for sources that name their list.
    Keyed { key: String, data: Vec<Value> },
    /// Anything else, including `null`.
    Unrecognized,
}

impl Envelope {
    /// Classify a list response. Only one level of `data` is unwrapped.
    pub fn classify(value: Value) -> Envelope {
        match value {
            Value::Array(items) => Envelope::Bare(items),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(data)) => match map.get("success").and_then(Value::as_bool) {
                    Some(success) => Envelope::Success { success, data },
                    None => Envelope::Data(data),
                },
                _ => Envelope::Unrecognized,
            },
            _ => Envelope::Unrecognized,
        }
    }

    /// Like [`Envelope::classify`], additionally accepting a list stored under
    /// `key` when none of the standard shapes match.
    pub fn classify_keyed(value: Value, key: &str) -> Envelope {
        let keyed = match &value {
            Value::Object(map) if !matches!(map.get("data"), Some(Value::Array(_))) => {
                map.get(key).and_then(Value::as_array).cloned()
            }
            _ => None,
        };
        match (Envelope::classify(value), keyed) {
            (Envelope::Unrecognized, Some(data)) => Envelope::Keyed {
                key: key.to_string(),
                data,
            },
            (envelope, _) => envelope,
        }
    }

    /// Short name of the shape, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Envelope::Bare(_) => "bare",
            Envelope::Data(_) => "data",
            Envelope::Success { .. } => "success",
            Envelope::Keyed { .. } => "keyed",
            Envelope::Unrecognized => "unrecognized",
        }
    }

    /// Flatten into records, preserving order.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Envelope::Bare(items)
            | Envelope::Data(items)
            | Envelope::Success { data: items, .. }
            | Envelope::Keyed { data: items, .. } => items.into_iter().map(Record::new).collect(),
            Envelope::Unrecognized => Vec::new(),
        }
    }
}

/// Normalize a list response into records. Never fails.
pub fn normalize(envelope: &Value) -> Vec<Record> {
    normalize_owned(envelope.clone())
}

/// Owned variant of [`normalize`].
pub fn normalize_owned(envelope: Value) -> Vec<Record> {
    let classified = Envelope::classify(envelope);
    if classified == Envelope::Unrecognized {
        tracing::debug!(shape = "unrecognized", "envelope normalized to empty collection");
    }
    classified.into_records()
}

/// Normalize a list response from a source that may name its list `key`.
pub fn normalize_keyed(envelope: Value, key: Option<&str>) -> Vec<Record> {
    match key {
        Some(key) => Envelope::classify_keyed(envelope, key).into_records(),
        None => normalize_owned(envelope),
    }
}

/// Normalize a single-record response.
///
/// Accepts `{data: {...}}`, `{success, data: {...}}` and a bare object. A
/// `data` field that is not an object, an object carrying `success` without
/// `data`, a list, or a scalar is `None`.
pub fn normalize_single(envelope: &Value) -> Option<Record> {
    let map: &Map<String, Value> = envelope.as_object()?;
    match map.get("data") {
        Some(data @ Value::Object(_)) => Some(Record::new(data.clone())),
        None if !map.contains_key("success") => Some(Record::new(envelope.clone())),
        _ => None,
    }
}
