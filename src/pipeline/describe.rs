//! Image resolution: describe each image placeholder through a VLM.
//!
//! The describer is a capability behind the [`ImageDescriber`] trait so the
//! pipeline never depends on a concrete provider. [`VisionDescriber`] is the
//! production implementation over an `edgequake_llm` provider.
//!
//! ## Failure policy
//!
//! Every image is independent. A missing file, a capability error or a
//! timeout leaves that placeholder's `description` as `None` and is recorded
//! as a [`ResolutionError`]; the rest of the batch carries on. Exactly one
//! attempt is made per image.

use crate::config::EnrichConfig;
use crate::error::{CapabilityError, ResolutionError};
use crate::media::{MediaPlaceholder, MediaTable};
use crate::pipeline::encode;
use crate::prompts::DEFAULT_VISION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Produces a textual description of an image file.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe the image at `image_path` following `instruction`.
    async fn describe(&self, image_path: &Path, instruction: &str) -> Result<String, CapabilityError>;
}

/// [`ImageDescriber`] backed by a vision-capable LLM provider.
pub struct VisionDescriber {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl VisionDescriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &EnrichConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl ImageDescriber for VisionDescriber {
    /// Request layout: the instruction as system message, then a user
    /// message carrying the image with empty text.
    async fn describe(&self, image_path: &Path, instruction: &str) -> Result<String, CapabilityError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| CapabilityError::new(format!("read {}: {e}", image_path.display())))?;
        let image = encode::encode_image(image_path, &bytes);

        let messages = vec![
            ChatMessage::system(instruction),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| CapabilityError::new(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            image_path.display(),
            response.prompt_tokens,
            response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the enrichment config.
fn build_options(config: &EnrichConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Outcome of one resolution batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Placeholders that received a description.
    pub resolved: usize,
    /// One entry per placeholder left unresolved.
    pub failures: Vec<ResolutionError>,
    pub duration_ms: u64,
}

/// Describe every image in `images`, filling `description` in place.
///
/// The expected file for each placeholder is `image_directory/name`.
/// Up to `config.concurrency` describer calls run at once, each bounded by
/// `config.api_timeout_secs`.
pub async fn resolve_images(
    images: &mut MediaTable,
    image_directory: &Path,
    describer: &dyn ImageDescriber,
    config: &EnrichConfig,
) -> ResolutionReport {
    let start = Instant::now();
    let instruction = config
        .vision_prompt
        .as_deref()
        .unwrap_or(DEFAULT_VISION_PROMPT);
    let total = images.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_enrichment_start(total);
    }

    let outcomes: Vec<(String, Result<String, ResolutionError>)> =
        stream::iter(images.values().map(|placeholder| {
            let path = image_directory.join(&placeholder.name);
            describe_one(placeholder, path, describer, instruction, config)
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut report = ResolutionReport::default();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(description) => {
                if let Some(placeholder) = images.get_mut(&name) {
                    placeholder.description = Some(description);
                    report.resolved += 1;
                }
            }
            Err(e) => report.failures.push(e),
        }
    }
    report.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_enrichment_complete(total, report.resolved);
    }

    if report.resolved == 0 && total > 0 {
        warn!("No image descriptions were generated for {} images", total);
    } else {
        info!(
            "Resolved {}/{} images in {}ms",
            report.resolved, total, report.duration_ms
        );
    }
    report
}

/// Resolve a single placeholder. Never propagates; errors become values.
async fn describe_one(
    placeholder: &MediaPlaceholder,
    path: PathBuf,
    describer: &dyn ImageDescriber,
    instruction: &str,
    config: &EnrichConfig,
) -> (String, Result<String, ResolutionError>) {
    let name = placeholder.name.clone();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_image_start(&name);
    }

    let outcome = resolve_path(&name, &path, describer, instruction, config.api_timeout_secs)
        .await
        .map(|raw| {
            config
                .description_template
                .render(&name, placeholder.caption.as_deref(), &raw)
        });

    if let Some(cb) = cb {
        match &outcome {
            Ok(description) => cb.on_image_complete(&name, description.len()),
            Err(e) => cb.on_image_error(&name, &e.to_string()),
        }
    }
    (name, outcome)
}

/// Existence check, then one timed capability call.
pub(crate) async fn resolve_path<F>(
    name: &str,
    path: &Path,
    describer: &F,
    instruction: &str,
    timeout_secs: u64,
) -> Result<String, ResolutionError>
where
    F: ImageDescriber + ?Sized,
{
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!("Image file not found: {}", path.display());
        return Err(ResolutionError::SourceMissing {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    match timeout(Duration::from_secs(timeout_secs), describer.describe(path, instruction)).await {
        Ok(Ok(raw)) => {
            info!("Generated description for image: {}", name);
            Ok(raw)
        }
        Ok(Err(e)) => {
            warn!("Failed to describe image {}: {}", name, e);
            Err(ResolutionError::DescribeFailed {
                name: name.to_string(),
                detail: e.to_string(),
            })
        }
        Err(_) => {
            warn!("Describing image {} timed out after {}s", name, timeout_secs);
            Err(ResolutionError::Timeout {
                name: name.to_string(),
                secs: timeout_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    struct EchoDescriber;

    #[async_trait]
    impl ImageDescriber for EchoDescriber {
        async fn describe(&self, image_path: &Path, _instruction: &str) -> Result<String, CapabilityError> {
            Ok(format!("described {}", image_path.file_name().unwrap().to_string_lossy()))
        }
    }

    struct FailingDescriber;

    #[async_trait]
    impl ImageDescriber for FailingDescriber {
        async fn describe(&self, _image_path: &Path, _instruction: &str) -> Result<String, CapabilityError> {
            Err(CapabilityError::new("quota exceeded"))
        }
    }

    fn table(names: &[&str]) -> MediaTable {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let p = MediaPlaceholder::new(MediaKind::Image, format!("pics/{n}"), None, i + 1);
                (p.name.clone(), p)
            })
            .collect()
    }

    #[test]
    fn build_options_defaults() {
        let config = EnrichConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(1.0));
        assert_eq!(opts.max_tokens, Some(2000));
    }

    #[tokio::test]
    async fn missing_files_are_per_item_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.png"), b"png").unwrap();
        let mut images = table(&["present.png", "absent.png"]);

        let report = resolve_images(&mut images, dir.path(), &EchoDescriber, &EnrichConfig::default()).await;

        assert_eq!(report.resolved, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            ResolutionError::SourceMissing { name, .. } if name == "absent.png"
        ));
        assert!(images["absent.png"].description.is_none());
        let desc = images["present.png"].description.as_deref().unwrap();
        assert!(desc.contains("described present.png"), "got: {desc}");
        assert!(desc.starts_with("Nazwa zdjęcia: present.png"), "got: {desc}");
    }

    #[tokio::test]
    async fn capability_error_leaves_description_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        let mut images = table(&["a.png"]);

        let report = resolve_images(&mut images, dir.path(), &FailingDescriber, &EnrichConfig::default()).await;

        assert_eq!(report.resolved, 0);
        assert!(matches!(
            &report.failures[0],
            ResolutionError::DescribeFailed { detail, .. } if detail.contains("quota")
        ));
        assert!(images["a.png"].description.is_none());
    }

    #[tokio::test]
    async fn empty_table_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = MediaTable::new();
        let report = resolve_images(&mut images, dir.path(), &EchoDescriber, &EnrichConfig::default()).await;
        assert_eq!(report.resolved, 0);
        assert!(report.failures.is_empty());
    }
}
