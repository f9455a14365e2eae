//! # enrich-html
//!
//! Turn an HTML article into plain text in which every embedded image has
//! been replaced by a description written by a Vision Language Model (VLM).
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 1. Scan        walk <body>; figures/audio → __MEDIA_{id}__ tokens
//!  ├─ 2. Fetch       (optional) download image sources into a directory
//!  ├─ 3. Describe    concurrent, timed VLM call per image file
//!  ├─ 4. Substitute  swap resolved tokens for descriptions
//!  └─ 5. Output      enriched text + placeholder tables + stats
//! ```
//!
//! Images that cannot be described (missing file, provider error, timeout)
//! keep their token in the text. Audio tokens are never substituted by
//! [`enrich`]; see [`transcribe`] for opt-in transcripts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enrich_html::{enrich, EnrichConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let html = std::fs::read_to_string("article.html")?;
//!     let output = enrich(&html, "images/", &EnrichConfig::default()).await?;
//!     println!("{}", output.text);
//!     eprintln!("{}/{} images described",
//!         output.stats.resolved_images,
//!         output.stats.total_images);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `enrich-html` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod enrich;
pub mod error;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EnrichConfig, EnrichConfigBuilder};
pub use enrich::{
    enrich, enrich_input, enrich_labeled, enrich_sync, enrich_to_file, enrich_with, scan_only,
    write_output,
};
pub use error::{CapabilityError, EnrichError, ResolutionError};
pub use media::{MediaKind, MediaPlaceholder, MediaTable};
pub use output::{EnrichmentOutput, EnrichmentStats};
pub use pipeline::describe::{resolve_images, ImageDescriber, ResolutionReport, VisionDescriber};
pub use pipeline::fetch::download_media;
pub use pipeline::scan::{scan, ScannedDocument};
pub use pipeline::substitute::{substitute, substitute_tables};
pub use progress::{EnrichProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::DescriptionTemplate;
pub use transcribe::{resolve_audio, Transcriber, TranscriberCache, WhisperApiTranscriber};
