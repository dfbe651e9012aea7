use gram_tl_wire::Value;
use serde_json::{json, Map};

/// Key holding an object's type name in its JSON form.
pub const TYPE_KEY: &str = "_";

/// Converts a decoded value to JSON. Objects carry their type name under
/// `"_"` and list their fields in name order.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(value) => json!(value),
        Value::Int(value) => json!(value),
        Value::Long(value) => json!(value),
        Value::String(value) => json!(value),
        Value::Vector(values) => serde_json::Value::Array(values.iter().map(value_to_json).collect()),
        Value::Object(name, fields) => {
            let mut keys: Vec<_> = fields.keys().collect();
            keys.sort();

            let mut map = Map::new();
            map.insert(TYPE_KEY.to_string(), json!(name));
            for key in keys {
                map.insert(key.clone(), value_to_json(&fields[key]));
            }
            serde_json::Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_json() {
        let value = Value::object("TL_help_Words")
            .with("hash", Value::Int(7))
            .with("words", Value::Vector(vec![Value::String("a".into())]))
            .with("id", Value::Long(1 << 40))
            .with("ok", Value::Bool(true));

        assert_eq!(
            value_to_json(&value),
            json!({"_": "TL_help_Words", "hash": 7, "id": 1_i64 << 40, "ok": true, "words": ["a"]})
        );
    }
}
