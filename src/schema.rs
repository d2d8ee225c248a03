//! Tool schema sanitizer
//!
//! The model backend accepts only a subset of JSON-Schema. `sanitize` strips
//! presentation/protocol keys at every depth and guarantees an object schema
//! with `type` and `properties`. Total and non-mutating.

use serde_json::{json, Map, Value};

/// Keys the function-calling contract rejects.
pub const STRIPPED_KEYS: [&str; 4] = ["title", "$schema", "additionalProperties", "default"];

pub fn sanitize(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return empty_object_schema();
    };

    let mut cleaned = clean_object(map);
    if !cleaned.contains_key("type") {
        cleaned.insert("type".to_string(), json!("object"));
    }
    if !cleaned.contains_key("properties") {
        cleaned.insert("properties".to_string(), json!({}));
    }
    Value::Object(cleaned)
}

pub fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

fn clean_object(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| !STRIPPED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), clean_value(value)))
        .collect()
}

fn clean_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(clean_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(clean_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains_stripped_key(value: &Value) -> bool {
        match value {
            Value::Object(map) => map
                .iter()
                .any(|(k, v)| STRIPPED_KEYS.contains(&k.as_str()) || contains_stripped_key(v)),
            Value::Array(items) => items.iter().any(contains_stripped_key),
            _ => false,
        }
    }

    fn verbose_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "get_gtt_listArguments",
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "status": {
                    "title": "Status",
                    "type": "array",
                    "items": {"type": "string", "title": "Item"}
                },
                "page": {"title": "Page", "type": "integer", "default": 1},
                "orders": {
                    "type": "array",
                    "items": [{"type": "object", "additionalProperties": true, "properties": {}}]
                }
            },
            "required": ["status"]
        })
    }

    #[test]
    fn test_strips_keys_at_every_depth_preserving_order() {
        let cleaned = sanitize(&verbose_schema());
        assert!(!contains_stripped_key(&cleaned));

        let keys: Vec<&String> = cleaned.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["type", "properties", "required"]);

        let props: Vec<&String> = cleaned["properties"].as_object().unwrap().keys().collect();
        assert_eq!(props, ["status", "page", "orders"]);
        assert_eq!(cleaned["properties"]["page"], json!({"type": "integer"}));
        assert_eq!(cleaned["properties"]["status"]["items"], json!({"type": "string"}));
    }

    #[test]
    fn test_idempotent() {
        let once = sanitize(&verbose_schema());
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_does_not_mutate_input() {
        let input = verbose_schema();
        let before = input.clone();
        let _ = sanitize(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_non_objects_become_empty_object_schema() {
        for input in [Value::Null, json!("string"), json!(3), json!([1, 2]), json!(true)] {
            assert_eq!(sanitize(&input), json!({"type": "object", "properties": {}}));
        }
    }

    #[test]
    fn test_fills_missing_type_and_properties() {
        assert_eq!(
            sanitize(&json!({"title": "only a title"})),
            json!({"type": "object", "properties": {}})
        );
        let filled = sanitize(&json!({"description": "x"}));
        assert_eq!(filled["type"], "object");
        assert_eq!(filled["properties"], json!({}));
        assert_eq!(filled["description"], "x");
    }
}
