//! Enrichment entry points.
//!
//! All of them run the same three steps over one document:
//!
//! 1. [`scan`](crate::pipeline::scan) the markup into text + media tables
//! 2. [`resolve_images`] through an [`ImageDescriber`]
//! 3. [`substitute`] descriptions for tokens
//!
//! They differ only in where the document comes from, where the result goes
//! and how the describer is obtained.

use crate::config::{EnrichConfig, DEFAULT_VISION_MODEL};
use crate::error::EnrichError;
use crate::output::{EnrichmentOutput, EnrichmentStats};
use crate::pipeline::describe::{resolve_images, ImageDescriber, VisionDescriber};
use crate::pipeline::input;
use crate::pipeline::scan::{scan_labeled, ScannedDocument, INLINE_DOCUMENT};
use crate::pipeline::substitute::{count_tokens, substitute};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Enrich an HTML document, describing images found in `image_directory`.
///
/// The VLM provider is resolved from `config` (see [`resolve_provider`]),
/// and only when the document contains at least one image.
///
/// # Errors
/// - [`EnrichError::Parse`] — the markup has no `<body>`, or no text or media in it
/// - [`EnrichError::ProviderNotConfigured`] — images present, no provider
/// - [`EnrichError::Integrity`] — substitution left only whitespace
///
/// Per-image failures are not errors; see [`EnrichmentOutput::failures`].
///
/// # Example
/// ```rust,no_run
/// use enrich_html::{enrich, EnrichConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let html = std::fs::read_to_string("article.html")?;
/// let output = enrich(&html, "images/", &EnrichConfig::default()).await?;
/// println!("{}", output.text);
/// # Ok(())
/// # }
/// ```
pub async fn enrich(
    document: &str,
    image_directory: impl AsRef<Path>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    run(INLINE_DOCUMENT, document, image_directory.as_ref(), None, config).await
}

/// Like [`enrich`], with an explicit describer instead of a configured provider.
pub async fn enrich_with(
    document: &str,
    image_directory: impl AsRef<Path>,
    describer: &dyn ImageDescriber,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    run(INLINE_DOCUMENT, document, image_directory.as_ref(), Some(describer), config).await
}

/// Enrich a document given as a local path or HTTP(S) URL.
pub async fn enrich_input(
    input_str: impl AsRef<str>,
    image_directory: impl AsRef<Path>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    run(&doc.label, &doc.markup, image_directory.as_ref(), None, config).await
}

/// Enrich markup that was already loaded, naming it `label` in any error.
///
/// Same provider rule as [`enrich`]: a provider is only resolved when the
/// document contains images.
pub async fn enrich_labeled(
    label: &str,
    document: &str,
    image_directory: impl AsRef<Path>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    run(label, document, image_directory.as_ref(), None, config).await
}

/// Enrich a document and write the text to `output_path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a half-written file behind.
pub async fn enrich_to_file(
    input_str: impl AsRef<str>,
    image_directory: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    let output = enrich_input(input_str, image_directory, config).await?;
    write_output(output_path.as_ref(), &output.text)?;
    Ok(output)
}

/// Synchronous wrapper around [`enrich`].
///
/// Creates a temporary tokio runtime internally.
pub fn enrich_sync(
    document: &str,
    image_directory: impl AsRef<Path>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EnrichError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(enrich(document, image_directory, config))
}

/// Load and scan a document without describing anything.
///
/// Does not require an LLM provider or API key.
pub async fn scan_only(input_str: impl AsRef<str>, config: &EnrichConfig) -> Result<ScannedDocument, EnrichError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    scan_labeled(&doc.label, &doc.markup)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    label: &str,
    document: &str,
    image_directory: &Path,
    describer: Option<&dyn ImageDescriber>,
    config: &EnrichConfig,
) -> Result<EnrichmentOutput, EnrichError> {
    let total_start = Instant::now();
    info!("Starting enrichment: {}", label);

    // ── Step 1: Scan ─────────────────────────────────────────────────────
    let scan_start = Instant::now();
    let (text, mut images, audio) = scan_labeled(label, document)?.into_parts();
    let scan_duration_ms = scan_start.elapsed().as_millis() as u64;
    if text.trim().is_empty() {
        return Err(EnrichError::Parse {
            document: label.to_string(),
            reason: "document has no text or media content".into(),
        });
    }
    debug!(
        "{}: {} images, {} audio placeholders",
        label,
        images.len(),
        audio.len()
    );

    // ── Step 2: Resolve images ───────────────────────────────────────────
    let mut failures = Vec::new();
    let mut resolve_duration_ms = 0;
    if !images.is_empty() {
        let owned;
        let describer: &dyn ImageDescriber = match describer {
            Some(d) => d,
            None => {
                owned = VisionDescriber::new(resolve_provider(config)?, config);
                &owned
            }
        };
        let report = resolve_images(&mut images, image_directory, describer, config).await;
        resolve_duration_ms = report.duration_ms;
        failures = report.failures;
    }

    // ── Step 3: Substitute ───────────────────────────────────────────────
    let enriched = substitute(&text, &images);
    if enriched.trim().is_empty() {
        return Err(EnrichError::Integrity {
            document: label.to_string(),
            scanned_len: text.len(),
        });
    }

    let resolved_images = images.values().filter(|p| p.is_resolved()).count();
    let stats = EnrichmentStats {
        total_images: images.len(),
        resolved_images,
        failed_images: images.len() - resolved_images,
        audio_items: audio.len(),
        remaining_tokens: count_tokens(&enriched),
        scan_duration_ms,
        resolve_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Enrichment complete: {}/{} images described, {}ms total",
        stats.resolved_images, stats.total_images, stats.total_duration_ms
    );

    Ok(EnrichmentOutput {
        text: enriched,
        images,
        audio,
        failures,
        stats,
    })
}

/// Write `contents` to `path` through a temporary sibling file.
///
/// Parent directories are created as needed. The target is either left
/// untouched or fully replaced.
pub fn write_output(path: &Path, contents: &str) -> Result<(), EnrichError> {
    let write_err = |source: std::io::Error| EnrichError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    info!("Saved enriched text to {}", path.display());
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, EnrichError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        EnrichError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — API key read
///    from the provider's usual environment variable.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &EnrichConfig) -> Result<Arc<dyn LLMProvider>, EnrichError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| EnrichError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn document_without_images_needs_no_provider() {
        let dir = tempfile::tempdir().unwrap();
        let out = enrich("<body><p>Just text</p></body>", dir.path(), &EnrichConfig::default())
            .await
            .unwrap();
        assert_eq!(out.text, "Just text");
        assert_eq!(out.stats.total_images, 0);
        assert!(out.is_complete());
    }

    #[tokio::test]
    async fn parse_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let err = enrich("<p>no body</p>", dir.path(), &EnrichConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Parse { ref document, .. } if document == INLINE_DOCUMENT));
    }

    #[test]
    fn write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/enriched.txt");
        write_output(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn write_output_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enriched.txt");
        std::fs::write(&path, "old and longer").unwrap();
        write_output(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn labeled_text_only_document_needs_no_provider() {
        let dir = tempfile::tempdir().unwrap();
        let config = EnrichConfig::builder()
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        let out = enrich_labeled("page.html", "<body><p>x</p><audio src=\"a.mp3\"></audio></body>", dir.path(), &config)
            .await
            .unwrap();
        assert_eq!(out.stats.total_images, 0);
        assert_eq!(out.stats.audio_items, 1);
    }

    #[tokio::test]
    async fn labeled_errors_carry_label() {
        let dir = tempfile::tempdir().unwrap();
        let err = enrich_labeled("page.html", "<p>no body</p>", dir.path(), &EnrichConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Parse { ref document, .. } if document == "page.html"));
    }

    #[tokio::test]
    async fn script_only_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for doc in [
            "<body><script>var x = 1;</script></body>",
            "<body><style>p { color: red }</style>  </body>",
            "<body></body>",
        ] {
            let err = enrich(doc, dir.path(), &EnrichConfig::default()).await.unwrap_err();
            assert!(matches!(err, EnrichError::Parse { .. }), "{doc}: got {err:?}");
        }
    }

    #[test]
    fn sync_wrapper_runs() {
        let dir = tempfile::tempdir().unwrap();
        let out = enrich_sync("<body>a<br>b</body>", dir.path(), &EnrichConfig::default()).unwrap();
        assert_eq!(out.text, "a\nb");
    }
}
