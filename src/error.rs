//! Error types for discovery document modelling and request validation.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Broad classification of a [`DiscoveryError`].
///
/// Callers that only care about the outcome class (retry, surface, fix the
/// document) match on this instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required construction input missing or structurally wrong.
    Validation,
    /// Unknown resource, method or schema name.
    NotFound,
    /// Malformed JSON text, or a payload that does not fit the target type.
    Parse,
    /// The server populated its own error field.
    Server,
    /// The schema set is inconsistent.
    SchemaResolution,
    /// A legacy envelope without its mandatory `data` field.
    Protocol,
    /// Reading a document or response stream failed.
    Io,
}

/// Errors raised while building or using a discovery model.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    // Validation errors
    #[error("invalid discovery input: {message}")]
    Validation { message: String },

    #[error("missing required field \"{field}\"")]
    MissingField { field: String },

    #[error("field \"{field}\" must be {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid resource path \"{path}\": empty segment")]
    EmptyPathSegment { path: String },

    #[error("invalid base URI \"{uri}\": {source}")]
    InvalidBaseUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    // Lookup errors
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    // Parse errors
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("payload does not match the expected shape: {source}")]
    UnexpectedShape {
        #[source]
        source: serde_json::Error,
    },

    #[error("response body is not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[source]
        source: std::string::FromUtf8Error,
    },

    // Server-reported errors
    #[error("server returned an error: {error}")]
    Server { error: Value },

    // Schema errors
    #[error("schema \"{schema}\" references unknown schema \"{reference}\"")]
    UnknownSchemaReference { schema: String, reference: String },

    #[error("schema \"{schema}\" is inconsistent at {path}: {message}")]
    SchemaResolution {
        schema: String,
        path: String,
        message: String,
    },

    // Protocol errors
    #[error("legacy response envelope has no data field")]
    MissingData,

    // IO errors
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read response body: {source}")]
    StreamRead {
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DiscoveryError {
    /// Shorthand for a free-form [`DiscoveryError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        DiscoveryError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`DiscoveryError::NotFound`].
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        DiscoveryError::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscoveryError::Validation { .. }
            | DiscoveryError::MissingField { .. }
            | DiscoveryError::WrongType { .. }
            | DiscoveryError::EmptyPathSegment { .. }
            | DiscoveryError::InvalidBaseUri { .. } => ErrorKind::Validation,
            DiscoveryError::NotFound { .. } => ErrorKind::NotFound,
            DiscoveryError::InvalidJson { .. }
            | DiscoveryError::UnexpectedShape { .. }
            | DiscoveryError::InvalidUtf8 { .. } => ErrorKind::Parse,
            DiscoveryError::Server { .. } => ErrorKind::Server,
            DiscoveryError::UnknownSchemaReference { .. }
            | DiscoveryError::SchemaResolution { .. } => ErrorKind::SchemaResolution,
            DiscoveryError::MissingData => ErrorKind::Protocol,
            DiscoveryError::FileNotFound { .. }
            | DiscoveryError::ReadError { .. }
            | DiscoveryError::StreamRead { .. } => ErrorKind::Io,
            #[cfg(feature = "remote")]
            DiscoveryError::NetworkError { .. } => ErrorKind::Io,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Io => 3,
            ErrorKind::Server => 1,
            _ => 2,
        }
    }
}

/// Errors during request payload validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Discovery(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}
