//! Discovery document loading from various sources.
//!
//! Handles loading documents from files, strings, and HTTP URLs.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::DiscoveryError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a discovery document from a file path.
///
/// # Errors
///
/// Returns `DiscoveryError::FileNotFound` if the file doesn't exist,
/// or `DiscoveryError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, DiscoveryError> {
    if !path.exists() {
        return Err(DiscoveryError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), "loading discovery document");
    let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a discovery document from a JSON string.
///
/// # Errors
///
/// Returns `DiscoveryError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, DiscoveryError> {
    serde_json::from_str(content).map_err(|source| DiscoveryError::InvalidJson { source })
}

/// Load a discovery document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `DiscoveryError::NetworkError` if the request fails or the server
/// answers with an error status, or `DiscoveryError::InvalidJson` if the body
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, DiscoveryError> {
    let network = |source| DiscoveryError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    debug!(%url, "fetching discovery document");
    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;
    let body = response.text().map_err(network)?;

    load_document_str(&body)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a discovery document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_document_auto(source: &str) -> Result<Value, DiscoveryError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(DiscoveryError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_document_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "drive", "version": "v2"}}"#).unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["name"], "drive");
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/drive.json"));
        assert!(matches!(result, Err(DiscoveryError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(DiscoveryError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_str_invalid() {
        let result = load_document_str("{\"name\": ");
        assert!(matches!(result, Err(DiscoveryError::InvalidJson { .. })));
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://www.googleapis.com/discovery/v1/apis/drive/v2/rest"));
        assert!(is_url("http://localhost:8080/discovery.json"));
        assert!(!is_url("/path/to/drive.json"));
        assert!(!is_url("./drive.json"));
        assert!(!is_url("drive.json"));
    }

    #[test]
    fn load_document_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "tasks"}}"#).unwrap();

        let doc = load_document_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(doc["name"], "tasks");
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_document_url_valid() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/discovery/v1/apis/tasks/v1/rest")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"name": "tasks", "version": "v1"}"#)
                .create();

            let url = format!("{}/discovery/v1/apis/tasks/v1/rest", server.url());
            let doc = load_document_url(&url).unwrap();

            mock.assert();
            assert_eq!(doc["version"], "v1");
        }

        #[test]
        fn load_document_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing").with_status(404).create();

            let url = format!("{}/missing", server.url());
            let result = load_document_url(&url);
            assert!(matches!(result, Err(DiscoveryError::NetworkError { .. })));
        }

        #[test]
        fn load_document_url_invalid_body() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/broken")
                .with_status(200)
                .with_body("<html>")
                .create();

            let url = format!("{}/broken", server.url());
            let result = load_document_auto(&url);
            assert!(matches!(result, Err(DiscoveryError::InvalidJson { .. })));
        }
    }
}
