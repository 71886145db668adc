//! Server timestamp sentinels.
//!
//! Transforms cannot know the commit time of the write they are building, so
//! they place [`server_timestamp()`] in a field and the store replaces it with
//! its clock's time when the document is written.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel value resolved to the write time by the store
pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: true })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true))
        }
        _ => false,
    }
}

/// Replace every sentinel in `value` (at any depth) with `now`.
///
/// Returns how many sentinels were replaced.
pub fn resolve_server_timestamps(value: &mut Value, now: DateTime<Utc>) -> usize {
    if is_server_timestamp(value) {
        *value = Value::String(format_timestamp(now));
        return 1;
    }

    match value {
        Value::Object(map) => map
            .values_mut()
            .map(|v| resolve_server_timestamps(v, now))
            .sum(),
        Value::Array(items) => items
            .iter_mut()
            .map(|v| resolve_server_timestamps(v, now))
            .sum(),
        _ => 0,
    }
}

/// Persisted timestamp format (RFC 3339, millisecond precision, `Z` suffix)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
