//! JSON Schema document generation.
//!
//! This is a documentation surface, not a validation surface: the output
//! is what gets handed to a producer (typically a language model
//! provider) to describe the shape it should emit. Descriptions are
//! carried through verbatim. Streaming flags do not appear — they only
//! change when a value resolves, not what it looks like.

use serde_json::{Map, Value, json};

use crate::types::{Schema, SchemaKind};

/// Render `schema` as a JSON Schema document.
pub fn to_json_schema(schema: &Schema) -> Value {
    let mut out = match schema.kind() {
        SchemaKind::String => json!({"type": "string"}),
        SchemaKind::Number => json!({"type": "number"}),
        SchemaKind::Boolean => json!({"type": "boolean"}),
        SchemaKind::Literal(value) => json!({"const": value}),
        SchemaKind::Enumeration(values) => json!({"enum": values}),
        SchemaKind::Object(fields) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, field) in fields {
                properties.insert(key.clone(), to_json_schema(field));
                required.push(Value::String(key.clone()));
            }
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })
        }
        SchemaKind::Array(element) => json!({
            "type": "array",
            "items": to_json_schema(element),
        }),
        SchemaKind::AnyOf(options) => json!({
            "anyOf": options.iter().map(|o| to_json_schema(o)).collect::<Vec<_>>(),
        }),
        SchemaKind::Nullish => json!({"type": "null"}),
    };
    if !schema.description().is_empty() {
        if let Some(map) = out.as_object_mut() {
            map.insert(
                "description".to_owned(),
                Value::String(schema.description().to_owned()),
            );
        }
    }
    out
}
