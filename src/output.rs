//! Result types returned by the enrichment entry points.

use crate::error::ResolutionError;
use crate::media::MediaTable;
use serde::{Deserialize, Serialize};

/// Everything an enrichment run produced.
///
/// The tables are returned so callers can persist placeholder metadata;
/// an unresolved image has `description == None` and a matching entry in
/// `failures`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentOutput {
    /// Enriched text. Audio and unresolved image tokens are still present.
    pub text: String,
    pub images: MediaTable,
    pub audio: MediaTable,
    pub failures: Vec<ResolutionError>,
    pub stats: EnrichmentStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub total_images: usize,
    pub resolved_images: usize,
    pub failed_images: usize,
    pub audio_items: usize,
    /// Tokens still present in the enriched text.
    pub remaining_tokens: usize,
    pub scan_duration_ms: u64,
    pub resolve_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl EnrichmentOutput {
    /// True when every image received a description.
    pub fn is_complete(&self) -> bool {
        self.stats.failed_images == 0
    }
}
