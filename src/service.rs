//! The service model - root aggregate of a discovery document.

use std::collections::BTreeMap;
use std::io::Read;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::envelope::{read_body, Codec, EnvelopeFormat, JsonCodec, ResponseBody};
use crate::error::DiscoveryError;
use crate::resolver::{resolve_schemas, Schema, SchemaSet};
use crate::resource::{
    build_parameters, build_resource_map, resolve_resource, Method, Parameter, Resource,
    ResourceMap,
};
use crate::types::{DiscoveryVersion, ServiceParams, LEGACY_DATA_WRAPPER};
use crate::value::{get_object, get_required_string, get_string, get_string_list};

/// One API at one version, built from its discovery document.
///
/// Metadata is read eagerly at construction. The resource tree and the schema
/// set are built on first access and cached; both caches are safe to race on
/// from several threads and are built at most once.
#[derive(Debug)]
pub struct Service {
    discovery: DiscoveryVersion,
    name: String,
    version: String,
    document: Value,

    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    documentation_link: Option<String>,
    protocol: Option<String>,
    rpc_url: Option<String>,
    labels: Vec<String>,
    features: Vec<String>,
    parameters: BTreeMap<String, Parameter>,

    server_url: String,
    base_path: String,
    base_uri: Url,

    envelope: EnvelopeFormat,
    codec: Box<dyn Codec>,

    resources: OnceCell<ResourceMap>,
    schemas: OnceCell<SchemaSet>,
}

impl Service {
    /// Build a service model.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `version` or `name` is empty, the
    /// document is not a JSON object, the server URL is empty, no base path
    /// is available, or an optional metadata field has the wrong type.
    pub fn new(
        discovery: DiscoveryVersion,
        version: &str,
        name: &str,
        document: Value,
        params: ServiceParams,
    ) -> Result<Self, DiscoveryError> {
        if version.is_empty() {
            return Err(DiscoveryError::validation("service version is required"));
        }
        if name.is_empty() {
            return Err(DiscoveryError::validation("service name is required"));
        }
        if !document.is_object() {
            return Err(DiscoveryError::validation(
                "discovery document must be a JSON object",
            ));
        }
        if params.server_url.is_empty() {
            return Err(DiscoveryError::validation("server URL is required"));
        }

        let base_path = match params.base_path {
            Some(base_path) => base_path,
            None => {
                let key = discovery.base_path_key();
                get_string(&document, key)?.ok_or_else(|| {
                    DiscoveryError::validation(format!(
                        "no base path given and document has no \"{}\"",
                        key
                    ))
                })?
            }
        };
        let base_uri = join_base_uri(&params.server_url, &base_path)?;

        let features = get_string_list(&document, "features")?;
        let envelope =
            EnvelopeFormat::from_legacy_flag(features.iter().any(|f| f == LEGACY_DATA_WRAPPER));

        debug!(
            service = name,
            version,
            discovery = %discovery,
            base_uri = %base_uri,
            "created service"
        );

        Ok(Self {
            id: get_string(&document, "id")?,
            title: get_string(&document, "title")?,
            description: get_string(&document, "description")?,
            documentation_link: get_string(&document, "documentationLink")?,
            protocol: get_string(&document, "protocol")?,
            rpc_url: get_string(&document, "rpcUrl")?,
            labels: get_string_list(&document, "labels")?,
            parameters: build_parameters(&document)?,
            features,
            discovery,
            name: name.to_string(),
            version: version.to_string(),
            server_url: params.server_url,
            base_path,
            base_uri,
            envelope,
            codec: Box::new(JsonCodec),
            resources: OnceCell::new(),
            schemas: OnceCell::new(),
            document,
        })
    }

    /// Build a service model reading generation, name and version from the
    /// document's own `discoveryVersion`, `name` and `version` fields.
    pub fn from_document(document: Value, params: ServiceParams) -> Result<Self, DiscoveryError> {
        let discovery: DiscoveryVersion =
            get_required_string(&document, "discoveryVersion")?.parse()?;
        let name = get_required_string(&document, "name")?;
        let version = get_required_string(&document, "version")?;
        Self::new(discovery, &version, &name, document, params)
    }

    /// Replace the body serialization strategy.
    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn discovery_version(&self) -> DiscoveryVersion {
        self.discovery
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The raw discovery document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn documentation_link(&self) -> Option<&str> {
        self.documentation_link.as_deref()
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Parameters common to every method of the service.
    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Server URL and base path joined with exactly one slash.
    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    pub fn envelope_format(&self) -> EnvelopeFormat {
        self.envelope
    }

    /// Exact membership test against the document's `features` list.
    pub fn has_feature(&self, flag: &str) -> bool {
        self.features.iter().any(|f| f == flag)
    }

    /// Top-level resources, built on first access.
    ///
    /// A document without `resources` yields an empty map.
    pub fn resources(&self) -> Result<&ResourceMap, DiscoveryError> {
        self.resources.get_or_try_init(|| {
            let resources = match get_object(&self.document, "resources")? {
                Some(raw) => build_resource_map(raw, self.discovery)?,
                None => ResourceMap::new(),
            };
            debug!(service = %self.name, count = resources.len(), "built resource tree");
            Ok(resources)
        })
    }

    /// Named schemas, resolved on first access.
    ///
    /// A document without `schemas` yields an empty set.
    pub fn schemas(&self) -> Result<&SchemaSet, DiscoveryError> {
        self.schemas
            .get_or_try_init(|| match get_object(&self.document, "schemas")? {
                Some(raw) => resolve_schemas(raw),
                None => Ok(SchemaSet::default()),
            })
    }

    /// Look up a schema by name.
    pub fn resolve_schema(&self, name: &str) -> Result<&Schema, DiscoveryError> {
        self.schemas()?
            .get(name)
            .ok_or_else(|| DiscoveryError::not_found("schema", name))
    }

    /// Resolve a dot-separated resource path, e.g. `"projects.instances"`.
    pub fn resolve_resource(&self, path: &str) -> Result<&Resource, DiscoveryError> {
        resolve_resource(self.resources()?, path)
    }

    /// Locate a method by resource path and method name.
    pub fn resolve_method(&self, path: &str, method: &str) -> Result<&Method, DiscoveryError> {
        self.resolve_resource(path)?.method(method)
    }

    /// Serialize a request body in the service's envelope format.
    pub fn serialize_request<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<String, DiscoveryError> {
        self.envelope.encode_request(self.codec.as_ref(), payload)
    }

    /// Read a response stream to the end and decode it in the service's
    /// envelope format.
    pub fn deserialize_response<T: ResponseBody, R: Read>(
        &self,
        reader: R,
    ) -> Result<T, DiscoveryError> {
        let text = read_body(reader)?;
        self.envelope.decode_response(self.codec.as_ref(), &text)
    }
}

/// Join a server URL and a base path with exactly one slash between them.
pub fn join_base_uri(server_url: &str, base_path: &str) -> Result<Url, DiscoveryError> {
    let joined = format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        base_path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|source| DiscoveryError::InvalidBaseUri {
        uri: joined,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn params() -> ServiceParams {
        ServiceParams::new("https://api.example.com")
    }

    #[test]
    fn join_base_uri_slashes() {
        let uri = join_base_uri("https://api.example.com/", "/v1/").unwrap();
        assert_eq!(uri.as_str(), "https://api.example.com/v1/");

        let uri = join_base_uri("https://api.example.com", "v1/").unwrap();
        assert_eq!(uri.as_str(), "https://api.example.com/v1/");

        let uri = join_base_uri("https://api.example.com//", "//tasks/v1/").unwrap();
        assert_eq!(uri.as_str(), "https://api.example.com/tasks/v1/");
    }

    #[test]
    fn join_base_uri_rejects_garbage() {
        let err = join_base_uri("not a url", "v1/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn required_inputs() {
        let doc = json!({ "basePath": "/v1/" });
        let cases = [
            Service::new(DiscoveryVersion::V1_0, "", "tasks", doc.clone(), params()),
            Service::new(DiscoveryVersion::V1_0, "v1", "", doc.clone(), params()),
            Service::new(DiscoveryVersion::V1_0, "v1", "tasks", Value::Null, params()),
            Service::new(
                DiscoveryVersion::V1_0,
                "v1",
                "tasks",
                doc,
                ServiceParams::new(""),
            ),
        ];
        for case in cases {
            assert_eq!(case.unwrap_err().kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn metadata_defaults() {
        let service = Service::new(
            DiscoveryVersion::V1_0,
            "v1",
            "tasks",
            json!({ "basePath": "/tasks/v1/" }),
            params(),
        )
        .unwrap();

        assert_eq!(service.title(), None);
        assert_eq!(service.id(), None);
        assert!(service.labels().is_empty());
        assert!(service.features().is_empty());
        assert!(service.parameters().is_empty());
        assert_eq!(service.envelope_format(), EnvelopeFormat::Direct);
    }

    #[test]
    fn metadata_wrong_type() {
        let err = Service::new(
            DiscoveryVersion::V1_0,
            "v1",
            "tasks",
            json!({ "basePath": "/v1/", "labels": "labs" }),
            params(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn explicit_base_path_wins() {
        let service = Service::new(
            DiscoveryVersion::V1_0,
            "v1",
            "tasks",
            json!({ "basePath": "/ignored/" }),
            params().base_path("v2/"),
        )
        .unwrap();
        assert_eq!(service.base_uri().as_str(), "https://api.example.com/v2/");
        assert_eq!(service.base_path(), "v2/");
    }

    #[test]
    fn from_document_reads_identity() {
        let service = Service::from_document(
            json!({
                "discoveryVersion": "v0.3",
                "name": "buzz",
                "version": "v1",
                "restBasePath": "/buzz/v1/"
            }),
            params(),
        )
        .unwrap();

        assert_eq!(service.discovery_version(), DiscoveryVersion::V0_3);
        assert_eq!(service.name(), "buzz");
        assert_eq!(service.version(), "v1");
        assert_eq!(service.base_uri().as_str(), "https://api.example.com/buzz/v1/");
    }

    #[test]
    fn from_document_unknown_generation() {
        let err = Service::from_document(
            json!({ "discoveryVersion": "v9", "name": "x", "version": "v1" }),
            params(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    #[tracing_test::traced_test]
    fn resource_tree_is_built_once() {
        let service = Service::new(
            DiscoveryVersion::V1_0,
            "v1",
            "tasks",
            json!({
                "basePath": "/tasks/v1/",
                "resources": {
                    "tasklists": { "methods": { "list": { "path": "users/@me/lists" } } }
                }
            }),
            params(),
        )
        .unwrap();

        let first = service.resources().unwrap();
        let second = service.resources().unwrap();
        assert!(std::ptr::eq(first, second));

        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("built resource tree"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("resource tree built {} times", n)),
            }
        });
    }

    #[test]
    fn service_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Service>();
    }
}
