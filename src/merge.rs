use serde_json::Value;

use crate::types::Mapping;

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a mapping for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                base.insert(key, Value::Object(deep_merge(base_map, overlay_map)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}
