//! Request payload validation against resolved discovery schemas.
//!
//! The schema set is compiled into a single JSON Schema document with every
//! named schema under `$defs`, so references (and cycles) map onto
//! plain `$ref` pointers.

use serde_json::{json, Map, Value};

use crate::error::{DiscoveryError, SchemaError, ValidateError};
use crate::resolver::{SchemaNode, SchemaSet, SchemaType};
use crate::service::Service;

/// Validate a request body for a method.
///
/// # Errors
///
/// Returns `ValidateError::Discovery` if the method cannot be found, has no
/// request schema, or the schemas fail to resolve, and
/// `ValidateError::Invalid` with every violation if the payload doesn't match.
pub fn validate_request(
    service: &Service,
    resource_path: &str,
    method: &str,
    payload: &Value,
) -> Result<(), ValidateError> {
    let found = service.resolve_method(resource_path, method)?;
    let request = found.request.as_deref().ok_or_else(|| {
        DiscoveryError::not_found(
            "request schema",
            format!("{}.{}", resource_path, method),
        )
    })?;

    validate_against_schema(service.schemas()?, request, payload)
}

/// Validate a payload against one named schema of a resolved set.
pub fn validate_against_schema(
    schemas: &SchemaSet,
    name: &str,
    payload: &Value,
) -> Result<(), ValidateError> {
    let document = to_json_schema(schemas, name)?;
    let validator = jsonschema::validator_for(&document).map_err(|e| {
        DiscoveryError::validation(format!("cannot compile schema \"{}\": {}", name, e))
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

/// Compile the named schema and everything it can reach into JSON Schema.
pub fn to_json_schema(schemas: &SchemaSet, name: &str) -> Result<Value, DiscoveryError> {
    if !schemas.contains(name) {
        return Err(DiscoveryError::not_found("schema", name));
    }

    let mut definitions = Map::new();
    for schema in schemas.iter() {
        definitions.insert(
            schema.name().to_string(),
            node_to_json(schemas, schema.definition()),
        );
    }

    Ok(json!({
        "$ref": definition_pointer(name),
        "$defs": definitions,
    }))
}

fn definition_pointer(name: &str) -> String {
    // JSON Pointer escaping (~ -> ~0, / -> ~1)
    format!("#/$defs/{}", name.replace('~', "~0").replace('/', "~1"))
}

fn node_to_json(schemas: &SchemaSet, node: &SchemaNode) -> Value {
    let mut out = Map::new();

    match &node.kind {
        SchemaType::Any => {}
        SchemaType::Null => {
            out.insert("type".into(), json!("null"));
        }
        SchemaType::Boolean => {
            out.insert("type".into(), json!("boolean"));
        }
        SchemaType::Integer => {
            out.insert("type".into(), json!("integer"));
        }
        SchemaType::Number => {
            out.insert("type".into(), json!("number"));
        }
        SchemaType::String => {
            out.insert("type".into(), json!("string"));
        }
        SchemaType::Array(items) => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), node_to_json(schemas, items));
        }
        SchemaType::Object(shape) => {
            out.insert("type".into(), json!("object"));

            let mut properties = Map::new();
            let mut required = Vec::new();
            for (prop_name, prop) in &shape.properties {
                properties.insert(prop_name.clone(), node_to_json(schemas, prop));
                if prop.required {
                    required.push(Value::String(prop_name.clone()));
                }
            }
            if !properties.is_empty() {
                out.insert("properties".into(), Value::Object(properties));
            }
            if !required.is_empty() {
                out.insert("required".into(), Value::Array(required));
            }
            if let Some(additional) = &shape.additional_properties {
                out.insert(
                    "additionalProperties".into(),
                    node_to_json(schemas, additional),
                );
            }
        }
        SchemaType::Ref(handle) => {
            if let Some(target) = schemas.schema(*handle) {
                out.insert("$ref".into(), json!(definition_pointer(target.name())));
            }
        }
    }

    if !node.enum_values.is_empty() {
        out.insert("enum".into(), json!(node.enum_values));
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_schemas;

    fn schemas() -> SchemaSet {
        let raw = json!({
            "Task": {
                "id": "Task",
                "type": "object",
                "properties": {
                    "title": { "type": "string", "required": true },
                    "status": { "type": "string", "enum": ["needsAction", "completed"] },
                    "subtasks": { "type": "array", "items": { "$ref": "Task" } },
                    "links": { "$ref": "Links" }
                }
            },
            "Links": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            }
        });
        resolve_schemas(raw.as_object().unwrap()).unwrap()
    }

    #[test]
    fn compiles_refs_to_definitions() {
        let compiled = to_json_schema(&schemas(), "Task").unwrap();

        assert_eq!(compiled["$ref"], "#/$defs/Task");
        let task = &compiled["$defs"]["Task"];
        assert_eq!(task["required"], json!(["title"]));
        assert_eq!(
            task["properties"]["subtasks"]["items"]["$ref"],
            "#/$defs/Task"
        );
        assert_eq!(
            compiled["$defs"]["Links"]["additionalProperties"]["type"],
            "string"
        );
    }

    #[test]
    fn unknown_schema_name() {
        let err = to_json_schema(&schemas(), "Project").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { .. }));
    }

    #[test]
    fn valid_recursive_payload() {
        let payload = json!({
            "title": "Ship release",
            "status": "needsAction",
            "subtasks": [{ "title": "Tag", "links": { "docs": "https://example.com" } }]
        });
        assert!(validate_against_schema(&schemas(), "Task", &payload).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let payload = json!({
            "status": "archived",
            "subtasks": [{ "title": 7 }]
        });

        match validate_against_schema(&schemas(), "Task", &payload) {
            Err(ValidateError::Invalid { errors }) => {
                // missing title, bad enum value, nested title type
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.path == "/subtasks/0/title"));
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
    }
}
