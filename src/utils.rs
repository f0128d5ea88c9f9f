/// Utility functions for reading loosely-typed API payloads
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Extract number from JSON value
pub fn num(v: &Value) -> Option<f64> {
    if let Some(x) = v.as_f64() {
        return Some(x);
    }
    if let Some(s) = v.as_str() {
        return s.trim().parse::<f64>().ok();
    }
    None
}

/// Coerce a string-like primitive into a string.
/// Objects, arrays and null are not coercible.
pub fn primitive_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Pick string value from JSON by trying multiple keys
pub fn s_pick(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find_map(primitive_str)
}

/// Pick number value from JSON by trying multiple keys
pub fn n_pick(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| v.get(*k)).find_map(num)
}

/// Pick timestamp value from JSON by trying multiple keys
pub fn t_pick(v: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    for k in keys {
        if let Some(x) = v.get(*k) {
            if let Some(s) = x.as_str() {
                if let Ok(dt) = s.parse::<DateTime<Utc>>() {
                    return Some(dt);
                }
                if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    return Some(Utc.from_utc_datetime(&ndt));
                }
            } else if let Some(n) = x.as_i64() {
                // Millisecond epochs are common in telemetry payloads.
                let secs = if n > 100_000_000_000 { n / 1000 } else { n };
                if let Some(dt) = Utc.timestamp_opt(secs, 0).single() {
                    return Some(dt);
                }
            }
        }
    }
    None
}

/// Extract the list of records from a collection payload.
/// Accepts a bare array or one wrapped in `values`/`items`.
pub fn collection(json: &Value) -> Option<&Vec<Value>> {
    json.as_array()
        .or_else(|| json.get("values").and_then(|x| x.as_array()))
        .or_else(|| json.get("items").and_then(|x| x.as_array()))
}
