//! Layer merge for generator configuration
//!
//! - Objects: deep-merge by key (so `[tools]` can be partially overridden)
//! - Arrays: replace, last layer wins
//! - Scalars: override, last layer wins

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays and scalars: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; later layers take precedence.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
