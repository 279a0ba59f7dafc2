//! Merging rules for process data.

use serde_json::Value;

/// Merge `patch` into `data`.
///
/// - `null` patches leave the data unchanged.
/// - An object patch over object data overwrites top-level keys.
/// - Any other combination replaces the data with the patch.
///
/// # Example
///
/// ```rust
/// use statecraft::core::merge_value;
/// use serde_json::json;
///
/// let mut data = json!({"amount": 10, "currency": "EUR"});
/// merge_value(&mut data, json!({"amount": 20}));
/// assert_eq!(data, json!({"amount": 20, "currency": "EUR"}));
/// ```
pub fn merge_value(data: &mut Value, patch: Value) {
    match (data, patch) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(fields)) => target.extend(fields),
        (data, patch) => *data = patch,
    }
}
