//! Core types shared across the discovery model.

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Feature flag announcing the legacy `{"data": ..., "error": ...}` envelope.
pub const LEGACY_DATA_WRAPPER: &str = "dataWrapper";

/// HTTP verb assumed for methods that do not declare one.
pub const DEFAULT_HTTP_METHOD: &str = "GET";

/// Discovery document generation.
///
/// The two generations differ in where the base path lives and in the
/// per-method field naming the request path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryVersion {
    #[serde(rename = "v0.3")]
    V0_3,
    #[serde(rename = "v1.0")]
    V1_0,
}

impl DiscoveryVersion {
    /// Parse the `discoveryVersion` value of a document.
    ///
    /// Returns `None` for unknown generations (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "v0.3" => Some(DiscoveryVersion::V0_3),
            "v1" | "v1.0" => Some(DiscoveryVersion::V1_0),
            _ => None,
        }
    }

    /// Document field holding the base request path.
    pub fn base_path_key(&self) -> &'static str {
        match self {
            DiscoveryVersion::V0_3 => "restBasePath",
            DiscoveryVersion::V1_0 => "basePath",
        }
    }

    /// Method field holding the request path template.
    pub fn method_path_key(&self) -> &'static str {
        match self {
            DiscoveryVersion::V0_3 => "restPath",
            DiscoveryVersion::V1_0 => "path",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryVersion::V0_3 => "v0.3",
            DiscoveryVersion::V1_0 => "v1.0",
        }
    }
}

impl std::fmt::Display for DiscoveryVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiscoveryVersion {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            DiscoveryError::validation(format!(
                "unknown discovery version \"{}\": expected v0.3 or v1.0",
                s
            ))
        })
    }
}

/// Externally supplied construction parameters for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceParams {
    /// Server URL the base path is joined onto (e.g. `https://api.example.com`).
    pub server_url: String,
    /// Base path overriding the document's own base path field.
    pub base_path: Option<String>,
}

impl ServiceParams {
    /// Create params without a base path override.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            base_path: None,
        }
    }

    /// Override the base path instead of reading it from the document.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }
}
