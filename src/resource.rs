//! Resource tree - named groups of methods and nested resources.
//!
//! Resources are addressed by dot-separated paths from the service root,
//! e.g. `"projects.locations.instances"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DiscoveryError;
use crate::types::{DiscoveryVersion, DEFAULT_HTTP_METHOD};
use crate::value::{get_object, get_string, get_string_list, json_type_name};

/// Resources keyed by name.
pub type ResourceMap = BTreeMap<String, Resource>;

/// A named group of methods and sub-resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    name: String,
    methods: BTreeMap<String, Method>,
    resources: ResourceMap,
}

impl Resource {
    /// Build a resource and its whole subtree from one JSON object.
    pub fn build(
        name: &str,
        value: &Value,
        version: DiscoveryVersion,
    ) -> Result<Self, DiscoveryError> {
        if !value.is_object() {
            return Err(DiscoveryError::WrongType {
                field: format!("resources.{}", name),
                expected: "an object",
                actual: json_type_name(value),
            });
        }

        let mut methods = BTreeMap::new();
        if let Some(raw_methods) = get_object(value, "methods")? {
            for (method_name, raw) in raw_methods {
                methods.insert(method_name.clone(), Method::build(method_name, raw, version)?);
            }
        }

        let resources = match get_object(value, "resources")? {
            Some(raw_resources) => build_resource_map(raw_resources, version)?,
            None => ResourceMap::new(),
        };

        Ok(Self {
            name: name.to_string(),
            methods,
            resources,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &BTreeMap<String, Method> {
        &self.methods
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    /// Look up one of this resource's own methods.
    pub fn method(&self, name: &str) -> Result<&Method, DiscoveryError> {
        self.methods
            .get(name)
            .ok_or_else(|| DiscoveryError::not_found("method", format!("{}.{}", self.name, name)))
    }
}

/// Build one [`Resource`] per entry of a `resources` object.
pub fn build_resource_map(
    raw: &Map<String, Value>,
    version: DiscoveryVersion,
) -> Result<ResourceMap, DiscoveryError> {
    let mut resources = ResourceMap::new();
    for (name, value) in raw {
        resources.insert(name.clone(), Resource::build(name, value, version)?);
    }
    Ok(resources)
}

/// Resolve a dot-separated resource path against a resource map.
///
/// `"a.b.c"` looks up `a` in `container`, then `b.c` in `a`'s sub-resources.
///
/// # Errors
///
/// Returns `DiscoveryError::EmptyPathSegment` for empty paths and for
/// leading, trailing or doubled dots, and `DiscoveryError::NotFound` when a
/// segment names no resource.
pub fn resolve_resource<'a>(
    container: &'a ResourceMap,
    path: &str,
) -> Result<&'a Resource, DiscoveryError> {
    descend(container, path, path)
}

fn descend<'a>(
    container: &'a ResourceMap,
    path: &str,
    full_path: &str,
) -> Result<&'a Resource, DiscoveryError> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    if head.is_empty() {
        return Err(DiscoveryError::EmptyPathSegment {
            path: full_path.to_string(),
        });
    }

    let resource = container
        .get(head)
        .ok_or_else(|| DiscoveryError::not_found("resource", head))?;

    match rest {
        Some(rest) => descend(&resource.resources, rest, full_path),
        None => Ok(resource),
    }
}

/// A callable API method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub http_method: String,
    /// Path template relative to the service base URI, e.g. `files/{fileId}`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_order: Vec<String>,
    /// Name of the request body schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Name of the response body schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Method {
    /// Build a method from its JSON description.
    ///
    /// The path template is read from `path` (v1.0) or `restPath` (v0.3).
    pub fn build(
        name: &str,
        value: &Value,
        version: DiscoveryVersion,
    ) -> Result<Self, DiscoveryError> {
        let path_key = version.method_path_key();
        let path = get_string(value, path_key)?.ok_or_else(|| DiscoveryError::MissingField {
            field: format!("{}.{}", name, path_key),
        })?;

        Ok(Self {
            name: name.to_string(),
            id: get_string(value, "id")?,
            http_method: get_string(value, "httpMethod")?
                .unwrap_or_else(|| DEFAULT_HTTP_METHOD.to_string()),
            path,
            description: get_string(value, "description")?,
            parameters: build_parameters(value)?,
            parameter_order: get_string_list(value, "parameterOrder")?,
            request: schema_link(value, "request")?,
            response: schema_link(value, "response")?,
            scopes: get_string_list(value, "scopes")?,
        })
    }

    /// Parameters substituted into the path template.
    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .values()
            .filter(|p| p.location.as_deref() == Some("path"))
    }
}

/// `{"request": {"$ref": "File"}}` -> `Some("File")`
fn schema_link(value: &Value, key: &str) -> Result<Option<String>, DiscoveryError> {
    match value.get(key).filter(|v| !v.is_null()) {
        Some(link) => get_string(link, "$ref"),
        None => Ok(None),
    }
}

/// Build the parameter descriptors of a method or service.
pub fn build_parameters(value: &Value) -> Result<BTreeMap<String, Parameter>, DiscoveryError> {
    let Some(raw) = get_object(value, "parameters")? else {
        return Ok(BTreeMap::new());
    };

    let mut parameters = BTreeMap::new();
    for (name, raw_param) in raw {
        let mut param: Parameter = serde_json::from_value(raw_param.clone()).map_err(|e| {
            DiscoveryError::validation(format!("invalid parameter \"{}\": {}", name, e))
        })?;
        param.name = name.clone();
        parameters.insert(name.clone(), param);
    }
    Ok(parameters)
}

/// Descriptor of one method or service parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Parameter {
    #[serde(skip_deserializing)]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    /// Where the value goes: `path` or `query`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub required: bool,
    pub repeated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn tree() -> ResourceMap {
        let raw = json!({
            "projects": {
                "resources": {
                    "locations": {
                        "resources": {
                            "instances": {
                                "methods": {
                                    "get": {
                                        "id": "svc.projects.locations.instances.get",
                                        "path": "v1/{+name}",
                                        "httpMethod": "GET",
                                        "parameterOrder": ["name"],
                                        "parameters": {
                                            "name": {
                                                "type": "string",
                                                "location": "path",
                                                "required": true,
                                                "pattern": "^projects/[^/]+$"
                                            }
                                        },
                                        "response": { "$ref": "Instance" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "operations": {}
        });
        build_resource_map(raw.as_object().unwrap(), DiscoveryVersion::V1_0).unwrap()
    }

    #[test]
    fn resolve_single_segment() {
        let resources = tree();
        assert_eq!(resolve_resource(&resources, "operations").unwrap().name(), "operations");
    }

    #[test]
    fn resolve_nested_path() {
        let resources = tree();
        let instances = resolve_resource(&resources, "projects.locations.instances").unwrap();
        assert_eq!(instances.name(), "instances");
        assert!(instances.methods().contains_key("get"));
    }

    #[test]
    fn nested_resolution_composes() {
        let resources = tree();
        let direct = resolve_resource(&resources, "projects.locations.instances").unwrap();
        let projects = resolve_resource(&resources, "projects").unwrap();
        let stepwise = resolve_resource(projects.resources(), "locations.instances").unwrap();
        assert_eq!(direct, stepwise);
    }

    #[test]
    fn unknown_segments() {
        let resources = tree();
        let err = resolve_resource(&resources, "folders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = resolve_resource(&resources, "projects.zones").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { name, .. } if name == "zones"));
    }

    #[test]
    fn empty_segments() {
        let resources = tree();
        for path in ["", ".projects", "projects.", "projects..locations"] {
            let err = resolve_resource(&resources, path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "path {:?}", path);
        }
    }

    #[test]
    fn method_fields() {
        let resources = tree();
        let instances = resolve_resource(&resources, "projects.locations.instances").unwrap();
        let get = instances.method("get").unwrap();

        assert_eq!(get.http_method, "GET");
        assert_eq!(get.path, "v1/{+name}");
        assert_eq!(get.response.as_deref(), Some("Instance"));
        assert_eq!(get.request, None);
        assert_eq!(get.parameter_order, vec!["name"]);

        let name = &get.parameters["name"];
        assert_eq!(name.name, "name");
        assert!(name.required);
        assert_eq!(get.path_parameters().count(), 1);

        assert_eq!(instances.method("delete").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn legacy_method_path_key() {
        let raw = json!({
            "activities": {
                "methods": {
                    "list": { "restPath": "people/{userId}/activities", "rpcMethod": "x" }
                }
            }
        });
        let resources =
            build_resource_map(raw.as_object().unwrap(), DiscoveryVersion::V0_3).unwrap();
        let list = resources["activities"].method("list").unwrap();
        assert_eq!(list.path, "people/{userId}/activities");
        assert_eq!(list.http_method, "GET");

        let err = build_resource_map(raw.as_object().unwrap(), DiscoveryVersion::V1_0).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingField { field } if field == "list.path"));
    }

    #[test]
    fn malformed_resource() {
        let raw = json!({ "files": [] });
        let err = build_resource_map(raw.as_object().unwrap(), DiscoveryVersion::V1_0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
