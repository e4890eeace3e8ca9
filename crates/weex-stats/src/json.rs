//! JSON row packaging for charts

use serde_json::Value;

fn number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Rows of `[timestamp_ms, v1, v2, ...]`, one per timestamp.
///
/// A column shorter than the time vector pads with null.
pub fn zip_vectors(time_ms: &[f64], columns: &[&[Option<f64>]]) -> Value {
    let rows = time_ms
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(number(Some(*ts)));
            row.extend(columns.iter().map(|c| number(c.get(i).copied().flatten())));
            Value::Array(row)
        })
        .collect();
    Value::Array(rows)
}

/// `[timestamp_ms, value]` pairs
pub fn pairs(time_ms: &[f64], values: &[Option<f64>]) -> Value {
    zip_vectors(time_ms, &[values])
}
