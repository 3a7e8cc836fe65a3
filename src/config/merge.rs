//! Field-by-field merging of configuration layers.

use serde_json::{Map, Value};

/// Overlay `layer` onto `base` in place.
///
/// Mappings (the `storage:`/`logging:`/`output:` sections) merge key by
/// key. A key that is present but empty in YAML (`level:`) parses as null
/// and leaves the lower tier's value alone. Any other value replaces.
///
/// # Example
/// ```
/// use serde_json::json;
/// use gtd_store::config::merge_into;
///
/// let mut config = json!({ "storage": { "root": "gtd", "debounce_ms": 500 } });
/// merge_into(&mut config, json!({ "storage": { "debounce_ms": 100 } }));
/// assert_eq!(config, json!({ "storage": { "root": "gtd", "debounce_ms": 100 } }));
/// ```
pub fn merge_into(base: &mut Value, layer: Value) {
    match layer {
        Value::Null => {}
        Value::Object(fields) => match base {
            Value::Object(existing) => merge_fields(existing, fields),
            _ => *base = Value::Object(fields),
        },
        other => *base = other,
    }
}

fn merge_fields(existing: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        match existing.get_mut(&key) {
            Some(slot) => merge_into(slot, value),
            None if value.is_null() => {}
            None => {
                existing.insert(key, value);
            }
        }
    }
}

/// Merge tiers lowest first; later layers win.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Object(Map::new());
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sections_merge_per_field() {
        let mut config = json!({
            "storage": {"root": "gtd", "debounce_ms": 500},
            "logging": {"level": "info"}
        });
        merge_into(&mut config, json!({"storage": {"debounce_ms": 50}}));
        assert_eq!(
            config,
            json!({
                "storage": {"root": "gtd", "debounce_ms": 50},
                "logging": {"level": "info"}
            })
        );
    }

    #[test]
    fn empty_yaml_key_keeps_lower_tier() {
        let layer: Value = serde_yaml::from_str("logging:\n  level:\n").unwrap();
        let mut config = json!({"logging": {"level": "warn"}});
        merge_into(&mut config, layer);
        assert_eq!(config, json!({"logging": {"level": "warn"}}));
    }

    #[test]
    fn empty_file_changes_nothing() {
        let layer: Value = serde_yaml::from_str("").unwrap();
        let merged = merge_layers(vec![json!({"output": {"format": "json"}}), layer]);
        assert_eq!(merged, json!({"output": {"format": "json"}}));
    }

    #[test]
    fn later_layers_win() {
        let merged = merge_layers(vec![
            json!({"storage": {"slug_max_len": 50}}),
            json!({"storage": {"root": "/a"}}),
            json!({"storage": {"root": "/b"}}),
        ]);
        assert_eq!(merged, json!({"storage": {"slug_max_len": 50, "root": "/b"}}));
    }
}
