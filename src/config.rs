//! Configuration types for HTML enrichment.
//!
//! All enrichment behaviour is controlled through [`EnrichConfig`], built via
//! its [`EnrichConfigBuilder`]. One struct for every knob keeps configs easy
//! to share across tasks and to log.

use crate::error::EnrichError;
use crate::progress::ProgressCallback;
use crate::prompts::DescriptionTemplate;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when a provider is named without a model.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Configuration for an enrichment run.
///
/// # Example
/// ```rust
/// use enrich_html::EnrichConfig;
///
/// let config = EnrichConfig::builder()
///     .concurrency(4)
///     .api_timeout_secs(30)
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct EnrichConfig {
    /// Number of concurrent describer calls. Default: 10.
    pub concurrency: usize,

    /// Per-image describer timeout in seconds. Default: 60.
    ///
    /// An image that is not described in time is left unresolved, exactly
    /// like a capability error.
    pub api_timeout_secs: u64,

    /// Timeout for downloading URL documents and media, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// LLM model identifier, e.g. "gpt-4o". If None, uses [`DEFAULT_VISION_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the describer. Default: 1.0.
    pub temperature: f32,

    /// Maximum tokens per image description. Default: 2000.
    pub max_tokens: usize,

    /// Custom vision instruction. If None, uses the built-in default.
    pub vision_prompt: Option<String>,

    /// How a VLM answer is turned into replacement text.
    pub description_template: DescriptionTemplate,

    /// Receives per-image events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 1.0,
            max_tokens: 2000,
            vision_prompt: None,
            description_template: DescriptionTemplate::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("concurrency", &self.concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("vision_prompt", &self.vision_prompt.as_ref().map(|p| p.len()))
            .field("description_template", &self.description_template)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn EnrichProgressCallback>"),
            )
            .finish()
    }
}

impl EnrichConfig {
    /// Create a new builder for `EnrichConfig`.
    pub fn builder() -> EnrichConfigBuilder {
        EnrichConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EnrichConfig`].
pub struct EnrichConfigBuilder {
    config: EnrichConfig,
}

impl fmt::Debug for EnrichConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl EnrichConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn vision_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.vision_prompt = Some(prompt.into());
        self
    }

    pub fn description_template(mut self, template: DescriptionTemplate) -> Self {
        self.config.description_template = template;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EnrichConfig, EnrichError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(EnrichError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(EnrichError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !c.description_template.template.contains("{description}") {
            return Err(EnrichError::InvalidConfig(
                "description template must contain {description}".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EnrichConfig::default();
        assert_eq!(c.concurrency, 10);
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.max_tokens, 2000);
        assert!(c.provider.is_none());
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let c = EnrichConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = EnrichConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, EnrichError::InvalidConfig(_)));
    }

    #[test]
    fn template_without_description_rejected() {
        let err = EnrichConfig::builder()
            .description_template(DescriptionTemplate::new("{name} only"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{description}"));
    }

    #[test]
    fn debug_hides_provider() {
        let c = EnrichConfig::builder().model("gpt-4o").build().unwrap();
        let s = format!("{c:?}");
        assert!(s.contains("gpt-4o"));
        assert!(s.contains("provider: None"));
    }
}
