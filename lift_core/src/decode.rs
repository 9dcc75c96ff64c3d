//! Lenient decoding at the persistence boundary.
//!
//! Documents handed over by the store may arrive either as structured JSON
//! or as a JSON string containing encoded JSON. Shape problems are resolved
//! to safe defaults here so that the analyzers downstream stay total and
//! never see a decode error.

use chrono::{DateTime, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a boundary document that may be structured or string-encoded
///
/// Falls back to `T::default()` on any decode failure. Never errors: a
/// corrupt document is indistinguishable from an empty one to callers.
pub fn decode_document<T>(raw: Value, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match raw {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    "Failed to decode string-encoded {}: {}. Using defaults.",
                    what,
                    e
                );
                T::default()
            }
        },
        other => match serde_json::from_value(other) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Failed to decode {}: {}. Using defaults.", what, e);
                T::default()
            }
        },
    }
}

/// Parse a calendar date from the formats the boundary actually produces
///
/// Accepts plain dates (`2024-01-15`) and RFC 3339 timestamps; timestamps
/// are normalized to the local calendar day.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    tracing::warn!("Unparseable date {:?} dropped", s);
    None
}

/// Serde helper: decode an optional date field leniently
///
/// Anything that is not a recognizable date string becomes `None` rather
/// than a deserialization error.
pub(crate) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_date_str))
}
