//! Request and response envelopes.
//!
//! Servers answer in one of two shapes:
//!
//! ```json
//! { "data": { "kind": "tasks#task", "title": "..." }, "error": null }
//! ```
//!
//! for services announcing the `dataWrapper` feature, or the payload itself
//! for everything else. [`EnvelopeFormat`] hides the difference behind one
//! decode/encode contract. Which format applies is a property of the
//! service, never of an individual payload.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::DiscoveryError;

/// Pluggable text serialization used for request and response bodies.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Parse body text into a value tree.
    fn decode(&self, text: &str) -> Result<Value, DiscoveryError>;

    /// Render a value tree as body text.
    fn encode(&self, value: &Value) -> Result<String, DiscoveryError>;
}

/// Compact JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, text: &str) -> Result<Value, DiscoveryError> {
        serde_json::from_str(text).map_err(|source| DiscoveryError::InvalidJson { source })
    }

    fn encode(&self, value: &Value) -> Result<String, DiscoveryError> {
        serde_json::to_string(value).map_err(|source| DiscoveryError::InvalidJson { source })
    }
}

/// A type responses can be decoded into.
///
/// Types whose payload carries its own `error` field override [`error`] to
/// opt into server error detection for direct (non-wrapped) responses. The
/// default reports no error.
///
/// [`error`]: ResponseBody::error
pub trait ResponseBody: DeserializeOwned {
    /// The server-reported error carried by this payload, if any.
    fn error(&self) -> Option<&Value> {
        None
    }
}

/// Untyped responses expose a non-null top-level `error` member.
impl ResponseBody for Value {
    fn error(&self) -> Option<&Value> {
        self.get("error").filter(|e| !e.is_null())
    }
}

/// Wire shape of an outgoing legacy envelope.
#[derive(Debug, Serialize)]
struct LegacyEnvelope<T> {
    data: T,
}

/// Envelope format in use by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeFormat {
    /// Payload wrapped under `data`, failures reported under `error`.
    Legacy,
    /// Payload sent as-is.
    Direct,
}

impl EnvelopeFormat {
    /// Pick the format from the service's legacy feature flag.
    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            EnvelopeFormat::Legacy
        } else {
            EnvelopeFormat::Direct
        }
    }

    /// Serialize a request body in this format.
    pub fn encode_request<P: Serialize + ?Sized>(
        self,
        codec: &dyn Codec,
        payload: &P,
    ) -> Result<String, DiscoveryError> {
        let value = serde_json::to_value(payload)
            .map_err(|source| DiscoveryError::UnexpectedShape { source })?;

        let body = match self {
            EnvelopeFormat::Legacy => serde_json::to_value(LegacyEnvelope { data: value })
                .map_err(|source| DiscoveryError::UnexpectedShape { source })?,
            EnvelopeFormat::Direct => value,
        };

        codec.encode(&body)
    }

    /// Decode a response body in this format.
    ///
    /// # Errors
    ///
    /// - `InvalidJson` when the text is not JSON, `UnexpectedShape` when it
    ///   does not fit `T`
    /// - `Server` when the server populated its error field
    /// - `MissingData` when a legacy body is not an object, or has neither
    ///   error nor data
    pub fn decode_response<T: ResponseBody>(
        self,
        codec: &dyn Codec,
        text: &str,
    ) -> Result<T, DiscoveryError> {
        let value = codec.decode(text)?;

        match self {
            EnvelopeFormat::Legacy => {
                // Only an object is an envelope; arrays and scalars carry no fields
                let Value::Object(mut envelope) = value else {
                    return Err(DiscoveryError::MissingData);
                };

                if let Some(error) = envelope.remove("error").filter(|e| !e.is_null()) {
                    return Err(DiscoveryError::Server { error });
                }
                let data = envelope
                    .remove("data")
                    .filter(|d| !d.is_null())
                    .ok_or(DiscoveryError::MissingData)?;
                serde_json::from_value(data)
                    .map_err(|source| DiscoveryError::UnexpectedShape { source })
            }
            EnvelopeFormat::Direct => {
                let body: T = serde_json::from_value(value)
                    .map_err(|source| DiscoveryError::UnexpectedShape { source })?;
                if let Some(error) = body.error() {
                    return Err(DiscoveryError::Server {
                        error: error.clone(),
                    });
                }
                Ok(body)
            }
        }
    }
}

/// Read a whole response stream as UTF-8 text.
pub fn read_body<R: Read>(mut reader: R) -> Result<String, DiscoveryError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| DiscoveryError::StreamRead { source })?;
    String::from_utf8(bytes).map_err(|source| DiscoveryError::InvalidUtf8 { source })
}
