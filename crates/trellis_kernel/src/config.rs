//! Plugin configuration merging.

use serde_json::Value;

/// Deep-merges `overlay` onto `base`.
///
/// Objects merge key by key, recursively. Anything else in `overlay`,
/// arrays included, replaces the value in `base`.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trellis_kernel::merge_config;
///
/// let merged = merge_config(
///     json!({ "pool": { "size": 4, "hosts": ["a", "b"] }, "debug": false }),
///     &json!({ "pool": { "hosts": ["c"] } }),
/// );
/// assert_eq!(
///     merged,
///     json!({ "pool": { "size": 4, "hosts": ["c"] }, "debug": false })
/// );
/// ```
#[must_use]
pub fn merge_config(base: Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(key) {
                    Some(existing) => merge_config(existing, value),
                    None => value.clone(),
                };
                base.insert(key.clone(), merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay.clone(),
    }
}
