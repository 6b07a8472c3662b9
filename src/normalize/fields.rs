use serde_json::Value;

/// Placeholder written wherever the source record has no value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Walk `path` one key at a time. Stops at the first step where the current
/// value is not an object or lacks the key.
pub fn pluck<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Render the scalar at `path`, or `default` when the path is short, the
/// value is null, or it is not a scalar.
pub fn text_or(value: &Value, path: &[&str], default: &str) -> String {
    pluck(value, path)
        .and_then(scalar_text)
        .unwrap_or_else(|| default.to_string())
}

pub fn text(value: &Value, path: &[&str]) -> String {
    text_or(value, path, NOT_AVAILABLE)
}

pub fn list<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    pluck(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Numeric coordinate at `path`. Some records carry coordinates as strings.
pub fn coordinate(value: &Value, path: &[&str]) -> Option<f64> {
    match pluck(value, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
