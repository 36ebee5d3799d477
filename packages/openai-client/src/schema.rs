//! JSON schemas for strict structured output, generated from Rust types.
//!
//! ```rust,ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct Invoice { supplier: String, total: Option<f64> }
//!
//! let schema = Invoice::openai_schema();
//! ```

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A type the model can be asked to produce.
///
/// Implemented for anything that is `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Schema in the form strict mode accepts: every object closed with
    /// `additionalProperties: false`, every property listed as required
    /// (optional fields stay nullable), and no `$ref` indirection.
    fn openai_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = match &mut value {
            Value::Object(root) => {
                root.remove("$schema");
                root.remove("definitions")
            }
            _ => None,
        };

        if let Some(defs) = definitions {
            inline_refs(&mut value, &defs);
        }
        flatten_single_all_of(&mut value);
        close_objects(&mut value);
        value
    }

    /// Schema name, suitable for the `json_schema.name` field.
    fn format_name() -> String {
        <Self as JsonSchema>::schema_name()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();

            if let Some(mut def) = target {
                inline_refs(&mut def, definitions);
                *value = def;
                return;
            }
            map.values_mut().for_each(|v| inline_refs(v, definitions));
        }
        Value::Array(items) => items.iter_mut().for_each(|v| inline_refs(v, definitions)),
        _ => {}
    }
}

/// A documented field of a named type comes out as `allOf: [<type>]` plus a
/// description; strict mode rejects `allOf`, so merge the single entry in.
fn flatten_single_all_of(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let single = match map.get("allOf") {
                Some(Value::Array(items)) if items.len() == 1 && items[0].is_object() => {
                    items[0].as_object().cloned()
                }
                _ => None,
            };
            if let Some(inner) = single {
                map.remove("allOf");
                for (key, v) in inner {
                    map.entry(key).or_insert(v);
                }
            }
            map.values_mut().for_each(flatten_single_all_of);
        }
        Value::Array(items) => items.iter_mut().for_each(flatten_single_all_of),
        _ => {}
    }
}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) {
                map.insert("additionalProperties".into(), Value::Bool(false));
                let required: Vec<Value> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect())
                    .unwrap_or_default();
                map.insert("required".into(), Value::Array(required));
            }
            map.values_mut().for_each(close_objects);
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Line {
        name: String,
        sku: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Order {
        vendor: String,
        lines: Vec<Line>,
    }

    #[test]
    fn test_optional_fields_are_required() {
        let schema = Line::openai_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert!(required.contains(&"name"));
        assert!(required.contains(&"sku"));
        assert_eq!(schema["additionalProperties"], Value::Bool(false));
    }

    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "lowercase")]
    #[allow(dead_code)]
    enum Channel {
        Email,
        Phone,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Contact {
        /// Preferred way to reach the vendor
        channel: Channel,
    }

    #[test]
    fn test_documented_enum_field_has_no_all_of() {
        let schema = Contact::openai_schema();
        let channel = &schema["properties"]["channel"];

        assert!(channel.get("allOf").is_none());
        assert_eq!(channel["type"], "string");
        assert_eq!(channel["enum"], serde_json::json!(["email", "phone"]));
        assert_eq!(channel["description"], "Preferred way to reach the vendor");
    }

    #[test]
    fn test_nested_types_are_inlined_and_closed() {
        let schema = Order::openai_schema();
        let text = serde_json::to_string(&schema).unwrap();

        assert!(!text.contains("$ref"));
        assert!(schema.get("definitions").is_none());
        assert!(schema.get("$schema").is_none());

        let item = &schema["properties"]["lines"]["items"];
        assert_eq!(item["type"], "object");
        assert_eq!(item["additionalProperties"], Value::Bool(false));
        assert_eq!(item["required"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_schema_name_is_sanitized() {
        assert_eq!(Order::format_name(), "Order");
        assert_eq!(<Vec<Line>>::format_name(), "Array_of_Line");
    }
}
