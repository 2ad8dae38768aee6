//! Discovery Model
//!
//! Typed, lazily built models of HTTP API discovery documents.
//!
//! A discovery document describes an API's resources, methods and data
//! schemas. This library turns one into a [`Service`] that a generic client
//! uses to locate methods, build base URIs and decode responses, without any
//! per-API code. Both document generations (`v0.3` and `v1.0`) are supported.
//!
//! # Example
//!
//! ```
//! use discovery_model::{Service, ServiceParams};
//! use serde_json::{json, Value};
//!
//! let document = json!({
//!     "discoveryVersion": "v1",
//!     "name": "tasks",
//!     "version": "v1",
//!     "basePath": "/tasks/v1/",
//!     "resources": {
//!         "tasklists": {
//!             "resources": {
//!                 "tasks": {
//!                     "methods": {
//!                         "get": {
//!                             "httpMethod": "GET",
//!                             "path": "lists/{tasklist}/tasks/{task}",
//!                             "response": { "$ref": "Task" }
//!                         }
//!                     }
//!                 }
//!             }
//!         }
//!     },
//!     "schemas": {
//!         "Task": {
//!             "type": "object",
//!             "properties": { "title": { "type": "string" } }
//!         }
//!     }
//! });
//!
//! let service = Service::from_document(document, ServiceParams::new("https://api.example.com/"))
//!     .unwrap();
//! assert_eq!(service.base_uri().as_str(), "https://api.example.com/tasks/v1/");
//!
//! let method = service.resolve_method("tasklists.tasks", "get").unwrap();
//! assert_eq!(method.path, "lists/{tasklist}/tasks/{task}");
//! assert!(service.resolve_schema("Task").is_ok());
//!
//! let task: Value = service
//!     .deserialize_response(&br#"{"title": "Write docs"}"#[..])
//!     .unwrap();
//! assert_eq!(task["title"], "Write docs");
//! ```
//!
//! # Response Envelopes
//!
//! | Document feature | Response shape | Server error signalled by |
//! |------------------|----------------|---------------------------|
//! | `dataWrapper` | `{"data": <payload>}` | non-null `error` member |
//! | (none) | `<payload>` | [`ResponseBody::error`] |

mod envelope;
mod error;
mod loader;
mod resolver;
mod resource;
mod service;
mod types;
mod validator;
mod value;

pub use envelope::{read_body, Codec, EnvelopeFormat, JsonCodec, ResponseBody};
pub use error::{DiscoveryError, ErrorKind, SchemaError, ValidateError};
pub use loader::{is_url, load_document, load_document_auto, load_document_str};
pub use resolver::{
    resolve_schemas, ObjectShape, Schema, SchemaNode, SchemaRef, SchemaSet, SchemaType,
};
pub use resource::{
    build_resource_map, resolve_resource, Method, Parameter, Resource, ResourceMap,
};
pub use service::{join_base_uri, Service};
pub use types::{DiscoveryVersion, ServiceParams, DEFAULT_HTTP_METHOD, LEGACY_DATA_WRAPPER};
pub use validator::{to_json_schema, validate_against_schema, validate_request};
pub use value::{get_object, get_required_string, get_string, get_string_list, json_type_name};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
