//! Typed accessors over untyped JSON values.
//!
//! Absent and `null` fields are treated alike. A field that is present but
//! has the wrong JSON type is a validation error, never silently ignored.

use serde_json::{Map, Value};

use crate::error::DiscoveryError;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn field<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get(key).filter(|v| !v.is_null())
}

/// Read an optional string field.
pub fn get_string(node: &Value, key: &str) -> Result<Option<String>, DiscoveryError> {
    match field(node, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DiscoveryError::WrongType {
            field: key.to_string(),
            expected: "a string",
            actual: json_type_name(other),
        }),
    }
}

/// Read a string field that must be present.
pub fn get_required_string(node: &Value, key: &str) -> Result<String, DiscoveryError> {
    get_string(node, key)?.ok_or_else(|| DiscoveryError::MissingField {
        field: key.to_string(),
    })
}

/// Read an optional list of strings; absent yields an empty list.
pub fn get_string_list(node: &Value, key: &str) -> Result<Vec<String>, DiscoveryError> {
    let Some(value) = field(node, key) else {
        return Ok(Vec::new());
    };

    let Value::Array(items) = value else {
        return Err(DiscoveryError::WrongType {
            field: key.to_string(),
            expected: "a list of strings",
            actual: json_type_name(value),
        });
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(DiscoveryError::WrongType {
                field: key.to_string(),
                expected: "a list of strings",
                actual: json_type_name(other),
            }),
        })
        .collect()
}

/// Read an optional object field.
pub fn get_object<'a>(
    node: &'a Value,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, DiscoveryError> {
    match field(node, key) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(DiscoveryError::WrongType {
            field: key.to_string(),
            expected: "an object",
            actual: json_type_name(other),
        }),
    }
}
