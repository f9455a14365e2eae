//! Speech-to-text capability for audio placeholders.
//!
//! [`crate::enrich::enrich`] leaves audio tokens in the text. Callers that
//! want transcripts instead run [`resolve_audio`] on the audio table and pass
//! both tables to [`crate::pipeline::substitute::substitute_tables`].
//!
//! Backends implement [`Transcriber`] and are picked when constructed.
//! [`TranscriberCache`] keeps one backend per model name; it is an ordinary
//! value owned by whoever wires the application together, not global state.

use crate::config::EnrichConfig;
use crate::error::{CapabilityError, ResolutionError};
use crate::media::MediaTable;
use crate::pipeline::describe::ResolutionReport;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Turns an audio file into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio_path`; `language` is an ISO-639-1 hint such as "pl".
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<String, CapabilityError>;
}

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Response body of an OpenAI-compatible `/audio/transcriptions` call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// [`Transcriber`] calling an OpenAI-compatible transcription endpoint.
pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperApiTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CapabilityError::new(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env(model: &str, timeout_secs: u64) -> Result<Self, CapabilityError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CapabilityError::new("OPENAI_API_KEY is not set"))?;
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| OPENAI_API_BASE.to_string());
        Self::new(base_url, api_key, model, timeout_secs)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<String, CapabilityError> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| CapabilityError::new(format!("read {}: {e}", audio_path.display())))?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CapabilityError::new(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::new(format!("HTTP {status}: {body}")));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::new(format!("invalid transcription response: {e}")))?;
        Ok(body.text)
    }
}

type TranscriberFactory = Box<dyn Fn(&str) -> Result<Arc<dyn Transcriber>, CapabilityError> + Send + Sync>;

/// One transcriber per model name, created on first use.
pub struct TranscriberCache {
    factory: TranscriberFactory,
    entries: Mutex<HashMap<String, Arc<dyn Transcriber>>>,
}

impl TranscriberCache {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn Transcriber>, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache creating [`WhisperApiTranscriber`]s from the environment.
    pub fn whisper_api(timeout_secs: u64) -> Self {
        Self::new(move |model| {
            WhisperApiTranscriber::from_env(model, timeout_secs).map(|t| Arc::new(t) as Arc<dyn Transcriber>)
        })
    }

    /// Transcriber for `model`, creating it on the first request.
    pub fn get(&self, model: &str) -> Result<Arc<dyn Transcriber>, CapabilityError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(model) {
            return Ok(Arc::clone(existing));
        }
        let created = (self.factory)(model)?;
        entries.insert(model.to_string(), Arc::clone(&created));
        Ok(created)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transcribe every audio placeholder found in `audio_directory`.
///
/// Same per-item policy as image resolution: missing file, backend error or
/// timeout leave `description` as `None` and add a failure to the report.
pub async fn resolve_audio(
    audio: &mut MediaTable,
    audio_directory: &Path,
    transcriber: &dyn Transcriber,
    language: Option<&str>,
    config: &EnrichConfig,
) -> ResolutionReport {
    let start = Instant::now();
    let timeout_secs = config.api_timeout_secs;

    let outcomes: Vec<(String, Result<String, ResolutionError>)> = stream::iter(audio.keys().map(|name| {
        let path = audio_directory.join(name);
        let name = name.clone();
        async move {
            let outcome = transcribe_one(&name, &path, transcriber, language, timeout_secs).await;
            (name, outcome)
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    let mut report = ResolutionReport::default();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(transcript) => {
                if let Some(placeholder) = audio.get_mut(&name) {
                    placeholder.description = Some(transcript);
                    report.resolved += 1;
                }
            }
            Err(e) => report.failures.push(e),
        }
    }
    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Transcribed {}/{} audio files in {}ms",
        report.resolved,
        audio.len(),
        report.duration_ms
    );
    report
}

async fn transcribe_one(
    name: &str,
    path: &Path,
    transcriber: &dyn Transcriber,
    language: Option<&str>,
    timeout_secs: u64,
) -> Result<String, ResolutionError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!("Audio file not found: {}", path.display());
        return Err(ResolutionError::SourceMissing {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    match tokio::time::timeout(Duration::from_secs(timeout_secs), transcriber.transcribe(path, language)).await {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(ResolutionError::DescribeFailed {
            name: name.to_string(),
            detail: e.to_string(),
        }),
        Err(_) => Err(ResolutionError::Timeout {
            name: name.to_string(),
            secs: timeout_secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaPlaceholder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _path: &Path, language: Option<&str>) -> Result<String, CapabilityError> {
            Ok(format!("{} [{}]\n", self.0, language.unwrap_or("auto")))
        }
    }

    #[test]
    fn cache_creates_one_transcriber_per_model() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let cache = TranscriberCache::new(move |_model| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedTranscriber("x")) as Arc<dyn Transcriber>)
        });

        let a = cache.get("large").unwrap();
        let b = cache.get("large").unwrap();
        let _c = cache.get("base").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_factory_error_not_cached() {
        let cache = TranscriberCache::new(|model| Err(CapabilityError::new(format!("no backend for {model}"))));
        let err = cache.get("tiny").err().unwrap();
        assert!(err.to_string().contains("tiny"));
        assert!(cache.is_empty());
    }

    #[test]
    fn resolve_audio_fills_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("talk.mp3"), b"id3").unwrap();
        let mut audio = MediaTable::new();
        for (pos, src) in [(1, "a/talk.mp3"), (2, "a/gone.mp3")] {
            let p = MediaPlaceholder::new(MediaKind::Audio, src, None, pos);
            audio.insert(p.name.clone(), p);
        }

        let report = tokio_test::block_on(resolve_audio(
            &mut audio,
            dir.path(),
            &FixedTranscriber("hello"),
            Some("pl"),
            &EnrichConfig::default(),
        ));

        assert_eq!(report.resolved, 1);
        assert_eq!(audio["talk.mp3"].description.as_deref(), Some("hello [pl]"));
        assert!(audio["gone.mp3"].description.is_none());
        assert_eq!(report.failures[0].name(), "gone.mp3");
    }
}
