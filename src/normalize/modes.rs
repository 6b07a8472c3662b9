use serde_json::Value;

use super::fields::NOT_AVAILABLE;
use crate::export::CourseRow;

/// First two comma-separated attendance codes, raw. Missing or blank
/// tokens become `N/A`.
pub fn split_attendance_modes(value: Option<&Value>) -> (String, String) {
    let raw = value.and_then(Value::as_str).unwrap_or("");
    let mut tokens = raw.split(',').map(str::trim);
    let mut next = || {
        tokens
            .next()
            .filter(|t| !t.is_empty())
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    };
    let first = next();
    let second = next();
    (first, second)
}

pub fn decode_delivery_mode(code: &str) -> &str {
    match code {
        "I" => "Classroom Based",
        "E" => "Online",
        other => other,
    }
}

/// Runs once over the finished table, after every record is collected.
pub fn apply_delivery_modes(rows: &mut [CourseRow]) {
    for row in rows {
        row.delivery_mode_1 = decode_delivery_mode(&row.delivery_mode_1).to_string();
        row.delivery_mode_2 = decode_delivery_mode(&row.delivery_mode_2).to_string();
    }
}
