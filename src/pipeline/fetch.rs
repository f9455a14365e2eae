//! Media fetch: download placeholder sources into a local directory.
//!
//! Pages usually reference images by relative path. Before enrichment the
//! sources are downloaded next to each other under their media names, which
//! is exactly where [`crate::pipeline::describe::resolve_images`] looks.
//! Files already present are not downloaded again, so each file is written
//! to a temporary sibling and renamed into place once complete.

use crate::error::{EnrichError, ResolutionError};
use crate::media::{in_document_order, MediaTable};
use crate::pipeline::input::{http_client, is_url};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a download batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub downloaded: usize,
    /// Already present in the destination directory.
    pub skipped: usize,
    pub failures: Vec<ResolutionError>,
}

/// Absolute URL for a media source.
///
/// Absolute sources are returned unchanged; relative ones are joined onto
/// `base_url`. Returns `None` if neither yields a valid URL.
pub fn source_url(source: &str, base_url: Option<&Url>) -> Option<Url> {
    if is_url(source) {
        return Url::parse(source).ok();
    }
    base_url.and_then(|base| base.join(source).ok())
}

/// Download every placeholder in `table` into `dst_dir/name`.
///
/// # Errors
/// Only creating `dst_dir` or building the HTTP client is fatal; each failed
/// item lands in [`FetchReport::failures`].
pub async fn download_media(
    table: &MediaTable,
    dst_dir: &Path,
    base_url: Option<&Url>,
    timeout_secs: u64,
) -> Result<FetchReport, EnrichError> {
    tokio::fs::create_dir_all(dst_dir)
        .await
        .map_err(|e| EnrichError::OutputWriteFailed {
            path: dst_dir.to_path_buf(),
            source: e,
        })?;
    let client = http_client(timeout_secs).map_err(|e| EnrichError::Internal(e.to_string()))?;

    let mut report = FetchReport::default();
    for placeholder in in_document_order(table) {
        let name = &placeholder.name;
        let dst = dst_dir.join(name);
        if tokio::fs::try_exists(&dst).await.unwrap_or(false) {
            debug!("{} already present, skipping download", dst.display());
            report.skipped += 1;
            continue;
        }

        let Some(url) = source_url(&placeholder.source, base_url) else {
            report.failures.push(ResolutionError::DownloadFailed {
                name: name.clone(),
                detail: format!("cannot build URL from source '{}'", placeholder.source),
            });
            continue;
        };

        match fetch_to(&client, &url, &dst).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", url, bytes);
                report.downloaded += 1;
            }
            Err(detail) => {
                warn!("Failed to download {}: {}", url, detail);
                report.failures.push(ResolutionError::DownloadFailed {
                    name: name.clone(),
                    detail,
                });
            }
        }
    }
    Ok(report)
}

async fn fetch_to(client: &reqwest::Client, url: &Url, dst: &Path) -> Result<usize, String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    store(dst, &bytes).map_err(|e| format!("write {}: {e}", dst.display()))?;
    Ok(bytes.len())
}

/// Write `bytes` to `dst` via a temporary file in the same directory.
fn store(dst: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaPlaceholder};

    #[test]
    fn absolute_source_kept() {
        let url = source_url("https://cdn.example.com/a/cat.png", None).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a/cat.png");
    }

    #[test]
    fn relative_source_joined_to_base() {
        let base = Url::parse("https://example.com/articles/page.html").unwrap();
        let url = source_url("i/cat.png", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "https://example.com/articles/i/cat.png");
    }

    #[test]
    fn relative_source_without_base() {
        assert!(source_url("i/cat.png", None).is_none());
    }

    #[test]
    fn store_leaves_only_the_finished_file() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("cat.png");
        store(&dst, b"\x89PNG").unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"\x89PNG");
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cat.png")]);
    }

    #[test]
    fn store_into_missing_directory_fails_without_target() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("absent/cat.png");
        assert!(store(&dst, b"x").is_err());
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn existing_files_skipped_and_unroutable_sources_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("have.png"), b"x").unwrap();

        let mut table = MediaTable::new();
        for (pos, src) in [(1, "img/have.png"), (2, "img/need.png")] {
            let p = MediaPlaceholder::new(MediaKind::Image, src, None, pos);
            table.insert(p.name.clone(), p);
        }

        let report = download_media(&table, dir.path(), None, 5).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name(), "need.png");
    }
}
