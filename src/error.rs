//! Error types for the enrich-html library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EnrichError`] — **Fatal**: the enrichment cannot proceed at all
//!   (markup without a `<body>`, unreadable input, provider not configured).
//!   Returned as `Err(EnrichError)` from the top-level `enrich*` functions.
//!
//! * [`ResolutionError`] — **Non-fatal**: a single media item could not be
//!   resolved (file missing, VLM call failed or timed out) but every other
//!   item is fine. Collected in [`crate::output::EnrichmentOutput::failures`]
//!   and visible afterwards as `description == None` on the placeholder.
//!
//! [`CapabilityError`] is what an external collaborator (image describer,
//! transcriber) returns; the pipeline wraps it into a [`ResolutionError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the enrich-html library.
#[derive(Debug, Error)]
pub enum EnrichError {
    // ── Markup errors ─────────────────────────────────────────────────────
    /// The markup has no root content container.
    #[error("Cannot scan document '{document}': {reason}")]
    Parse { document: String, reason: String },

    /// Substitution produced empty text from non-empty scanned text.
    #[error("Enrichment of '{document}' erased all content ({scanned_len} bytes scanned, 0 produced)")]
    Integrity { document: String, scanned_len: usize },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single media item.
///
/// The batch continues; the affected placeholder keeps `description == None`
/// and its token stays verbatim in the enriched text.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ResolutionError {
    /// No file named after the media was found in the media directory.
    #[error("{name}: file not found at '{path}'")]
    SourceMissing { name: String, path: PathBuf },

    /// The describer or transcriber returned an error.
    #[error("{name}: capability call failed: {detail}")]
    DescribeFailed { name: String, detail: String },

    /// The capability call did not answer within the per-item timeout.
    #[error("{name}: capability call timed out after {secs}s")]
    Timeout { name: String, secs: u64 },

    /// Fetching the media source into the media directory failed.
    #[error("{name}: download failed: {detail}")]
    DownloadFailed { name: String, detail: String },
}

impl ResolutionError {
    /// Media name the failure belongs to.
    pub fn name(&self) -> &str {
        match self {
            ResolutionError::SourceMissing { name, .. }
            | ResolutionError::DescribeFailed { name, .. }
            | ResolutionError::Timeout { name, .. }
            | ResolutionError::DownloadFailed { name, .. } => name,
        }
    }
}

/// Error returned by an external capability (VLM, speech-to-text backend).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
