//! Deep-recursive merge: objects merge key by key, everything else
//! (including arrays) is replaced wholesale by the nearer value.

use serde_json::Value;

/// Merges `overlay` onto `base` in place, nearer (`overlay`) wins.
pub fn recursive_update(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => recursive_update(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
