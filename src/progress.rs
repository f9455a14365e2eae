//! Progress-callback trait for per-image enrichment events.
//!
//! Inject an [`Arc<dyn EnrichProgressCallback>`] via
//! [`crate::config::EnrichConfigBuilder::progress_callback`] to receive
//! events as the enricher resolves each image.
//!
//! # Example
//!
//! ```rust
//! use enrich_html::{EnrichConfig, EnrichProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl EnrichProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, name: &str, description_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name} described ({description_len} bytes)");
//!     }
//! }
//!
//! let config = EnrichConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the enricher as it resolves each image.
///
/// Images are resolved concurrently, so `on_image_*` may be called from
/// several tasks at once. All methods default to no-ops.
pub trait EnrichProgressCallback: Send + Sync {
    /// Called once before any image is resolved.
    fn on_enrichment_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before the describer is invoked for an image.
    fn on_image_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when an image received a description.
    fn on_image_complete(&self, name: &str, description_len: usize) {
        let _ = (name, description_len);
    }

    /// Called when an image stays unresolved (missing file, failure, timeout).
    fn on_image_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every image has been attempted.
    fn on_enrichment_complete(&self, total_images: usize, resolved: usize) {
        let _ = (total_images, resolved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EnrichProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EnrichConfig`].
pub type ProgressCallback = Arc<dyn EnrichProgressCallback>;
