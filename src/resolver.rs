//! Schema resolution - turns the `schemas` section of a discovery document
//! into a set of named, cross-linked schema definitions.
//!
//! Schemas reference each other by name through `$ref`, including forward
//! references, self references and cycles. Resolution therefore runs in two
//! phases:
//!
//! 1. **Register**: every entry is re-serialized to canonical text and its
//!    name recorded. No reference is looked at.
//! 2. **Resolve and verify**: every definition is parsed back and built into
//!    a [`SchemaNode`] tree, with each `$ref` name replaced by a [`SchemaRef`]
//!    handle into the finished [`SchemaSet`].
//!
//! Handles are plain indices, so cycles need no special treatment.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DiscoveryError;
use crate::value::json_type_name;

/// Handle to a schema inside the [`SchemaSet`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaRef(usize);

impl SchemaRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Structural type of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    Any,
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array(Box<SchemaNode>),
    Object(ObjectShape),
    /// Link to another named schema.
    Ref(SchemaRef),
}

/// Properties of an object schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    pub properties: BTreeMap<String, SchemaNode>,
    /// Schema for map-like objects with arbitrary keys.
    pub additional_properties: Option<Box<SchemaNode>>,
}

/// A resolved schema definition, or a nested part of one.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaType,
    pub description: Option<String>,
    pub format: Option<String>,
    /// Whether the enclosing object requires this property.
    pub required: bool,
    pub enum_values: Vec<String>,
}

/// A named schema after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    source: String,
    definition: SchemaNode,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical JSON text the definition was resolved from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn definition(&self) -> &SchemaNode {
        &self.definition
    }
}

/// Immutable set of resolved schemas, keyed by schema name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    schemas: Vec<Schema>,
    by_name: BTreeMap<String, SchemaRef>,
}

impl SchemaSet {
    /// Look up a schema by name.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.by_name.get(name).and_then(|r| self.schema(*r))
    }

    /// Handle of the schema with the given name.
    pub fn get_ref(&self, name: &str) -> Option<SchemaRef> {
        self.by_name.get(name).copied()
    }

    /// Follow a handle. Returns `None` for handles from a different set.
    pub fn schema(&self, handle: SchemaRef) -> Option<&Schema> {
        self.schemas.get(handle.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Schemas in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.by_name.values().filter_map(|r| self.schema(*r))
    }
}

/// Names known to the resolver, filled during registration.
#[derive(Debug, Default)]
struct ResolverContext {
    names: BTreeMap<String, SchemaRef>,
}

impl ResolverContext {
    fn register(&mut self, name: &str) -> Result<SchemaRef, DiscoveryError> {
        if self.names.contains_key(name) {
            return Err(inconsistent(name, "", "schema name registered twice"));
        }
        let handle = SchemaRef(self.names.len());
        self.names.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn lookup(&self, name: &str) -> Option<SchemaRef> {
        self.names.get(name).copied()
    }
}

/// Registered but not yet resolved schema.
struct PendingSchema {
    name: String,
    source: String,
}

/// Resolve the `schemas` object of a discovery document.
///
/// # Errors
///
/// Returns `DiscoveryError::UnknownSchemaReference` when a `$ref` names a
/// schema that is never defined, and `DiscoveryError::SchemaResolution` for
/// structural problems (missing type, array without items, a schema whose
/// `id` differs from its key, a chain of bare references that never reaches a
/// concrete type).
///
/// References nested inside a concrete type may form cycles freely: a `Task`
/// whose `parent` property points back at `Task` resolves. A schema that is
/// nothing but a `$ref`, however, must eventually reach a concrete type, so a
/// pure alias cycle such as `{"A": {"$ref": "A"}}` or `A -> B -> A` is
/// refused.
pub fn resolve_schemas(schemas: &Map<String, Value>) -> Result<SchemaSet, DiscoveryError> {
    let mut context = ResolverContext::default();
    let mut pending = Vec::with_capacity(schemas.len());

    // Phase 1: register every name before looking at any reference
    for (key, raw) in schemas {
        let name = schema_name(key, raw)?;
        let source =
            serde_json::to_string(raw).map_err(|source| DiscoveryError::InvalidJson { source })?;
        context.register(&name)?;
        pending.push(PendingSchema { name, source });
    }
    debug!(count = pending.len(), "registered schemas");

    // Phase 2: resolve references against the complete name set
    let mut set = SchemaSet::default();
    for PendingSchema { name, source } in pending {
        let value: Value = serde_json::from_str(&source)
            .map_err(|source| DiscoveryError::InvalidJson { source })?;
        let definition = build_node(&value, &context, &name, "")?;
        let handle = SchemaRef(set.schemas.len());
        set.by_name.insert(name.clone(), handle);
        set.schemas.push(Schema {
            name,
            source,
            definition,
        });
    }

    for schema in &set.schemas {
        verify_concrete(&set, schema)?;
    }
    debug!(count = set.len(), "resolved schema set");

    Ok(set)
}

/// The schema's own `id` must agree with the key it is registered under.
fn schema_name(key: &str, raw: &Value) -> Result<String, DiscoveryError> {
    if !raw.is_object() {
        return Err(inconsistent(
            key,
            "",
            format!("expected object, got {}", json_type_name(raw)),
        ));
    }

    match raw.get("id") {
        None | Some(Value::Null) => Ok(key.to_string()),
        Some(Value::String(id)) if id == key => Ok(id.clone()),
        Some(Value::String(id)) => Err(inconsistent(
            key,
            "/id",
            format!("id \"{}\" does not match its key", id),
        )),
        Some(other) => Err(inconsistent(
            key,
            "/id",
            format!("expected string, got {}", json_type_name(other)),
        )),
    }
}

fn build_node(
    value: &Value,
    context: &ResolverContext,
    schema: &str,
    path: &str,
) -> Result<SchemaNode, DiscoveryError> {
    let Some(map) = value.as_object() else {
        return Err(inconsistent(
            schema,
            path,
            format!("expected object, got {}", json_type_name(value)),
        ));
    };

    let kind = match (map.get("$ref"), map.get("type")) {
        (Some(Value::String(reference)), _) => {
            let handle =
                context
                    .lookup(reference)
                    .ok_or_else(|| DiscoveryError::UnknownSchemaReference {
                        schema: schema.to_string(),
                        reference: reference.clone(),
                    })?;
            SchemaType::Ref(handle)
        }
        (Some(other), _) => {
            return Err(inconsistent(
                schema,
                &format!("{}/$ref", path),
                format!("expected string, got {}", json_type_name(other)),
            ));
        }
        (None, Some(Value::String(type_name))) => {
            build_type(type_name, map, context, schema, path)?
        }
        (None, Some(other)) => {
            return Err(inconsistent(
                schema,
                &format!("{}/type", path),
                format!("expected string, got {}", json_type_name(other)),
            ));
        }
        (None, None) => {
            return Err(inconsistent(schema, path, "neither type nor $ref given"));
        }
    };

    Ok(SchemaNode {
        kind,
        description: string_field(map, "description"),
        format: string_field(map, "format"),
        required: matches!(map.get("required"), Some(Value::Bool(true))),
        enum_values: map
            .get("enum")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn build_type(
    type_name: &str,
    map: &Map<String, Value>,
    context: &ResolverContext,
    schema: &str,
    path: &str,
) -> Result<SchemaType, DiscoveryError> {
    let kind = match type_name {
        "any" => SchemaType::Any,
        "null" => SchemaType::Null,
        "boolean" => SchemaType::Boolean,
        "integer" => SchemaType::Integer,
        "number" => SchemaType::Number,
        "string" => SchemaType::String,
        "array" => {
            let items_path = format!("{}/items", path);
            let Some(items) = map.get("items") else {
                return Err(inconsistent(schema, path, "array without items"));
            };
            SchemaType::Array(Box::new(build_node(items, context, schema, &items_path)?))
        }
        "object" => SchemaType::Object(build_object(map, context, schema, path)?),
        other => {
            return Err(inconsistent(
                schema,
                &format!("{}/type", path),
                format!("unknown type \"{}\"", other),
            ));
        }
    };
    Ok(kind)
}

fn build_object(
    map: &Map<String, Value>,
    context: &ResolverContext,
    schema: &str,
    path: &str,
) -> Result<ObjectShape, DiscoveryError> {
    let mut shape = ObjectShape::default();

    if let Some(props) = map.get("properties") {
        let Some(props) = props.as_object() else {
            return Err(inconsistent(
                schema,
                &format!("{}/properties", path),
                format!("expected object, got {}", json_type_name(props)),
            ));
        };
        for (prop_name, prop_value) in props {
            let prop_path = format!("{}/properties/{}", path, prop_name);
            let node = build_node(prop_value, context, schema, &prop_path)?;
            shape.properties.insert(prop_name.clone(), node);
        }
    }

    // Only a schema object constrains extra keys; booleans are left open
    if let Some(additional) = map.get("additionalProperties").filter(|v| v.is_object()) {
        let additional_path = format!("{}/additionalProperties", path);
        shape.additional_properties = Some(Box::new(build_node(
            additional,
            context,
            schema,
            &additional_path,
        )?));
    }

    // Object-level required list: every name must be a declared property
    if let Some(Value::Array(required)) = map.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            let Some(prop) = shape.properties.get_mut(name) else {
                return Err(inconsistent(
                    schema,
                    &format!("{}/required", path),
                    format!("required property \"{}\" is not declared", name),
                ));
            };
            prop.required = true;
        }
    }

    Ok(shape)
}

/// A schema that is only a `$ref` must eventually reach a concrete type.
fn verify_concrete(set: &SchemaSet, schema: &Schema) -> Result<(), DiscoveryError> {
    let mut seen = BTreeSet::new();
    let mut current = schema;
    while let SchemaType::Ref(next) = current.definition.kind {
        if !seen.insert(next) {
            return Err(inconsistent(
                &schema.name,
                "",
                "reference chain never reaches a concrete type",
            ));
        }
        current = set
            .schema(next)
            .ok_or_else(|| inconsistent(&schema.name, "/$ref", "dangling schema handle"))?;
    }
    Ok(())
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(String::from)
}

fn inconsistent(schema: &str, path: &str, message: impl Into<String>) -> DiscoveryError {
    DiscoveryError::SchemaResolution {
        schema: schema.to_string(),
        path: if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        },
        message: message.into(),
    }
}
