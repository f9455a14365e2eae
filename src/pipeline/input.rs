//! Input resolution: load a document from a local path or an HTTP(S) URL.
//!
//! The loaded markup is kept in memory; documents are small next to the
//! images they reference. The label is what fatal errors report as the
//! document identity.

use crate::error::EnrichError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Markup loaded from a file or URL.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File path or URL the markup came from.
    pub label: String,
    pub markup: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document named by `input`.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, EnrichError> {
    let markup = if is_url(input) {
        download_document(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    Ok(LoadedDocument {
        label: input.to_string(),
        markup,
    })
}

async fn read_local(path_str: &str) -> Result<String, EnrichError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(EnrichError::PermissionDenied { path })
        }
        Err(_) => Err(EnrichError::FileNotFound { path }),
    }
}

async fn download_document(url: &str, timeout_secs: u64) -> Result<String, EnrichError> {
    info!("Downloading document from: {}", url);

    let client = http_client(timeout_secs).map_err(|e| EnrichError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            EnrichError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EnrichError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(EnrichError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    response.text().await.map_err(|e| EnrichError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// HTTP client with the given overall timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/page.html"));
        assert!(is_url("http://example.com/"));
        assert!(!is_url("/tmp/page.html"));
        assert!(!is_url("page.html"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<body><p>hi</p></body>").unwrap();

        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.markup, "<body><p>hi</p></body>");
        assert_eq!(doc.label, path.to_str().unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = resolve_input("/definitely/not/here.html", 5).await.unwrap_err();
        assert!(matches!(err, EnrichError::FileNotFound { .. }));
    }
}
