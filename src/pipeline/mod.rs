//! Pipeline stages for HTML enrichment.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ scan ──▶ (fetch) ──▶ describe ──▶ substitute
//! (path/URL) (html)   (media)     (VLM)        (tokens)
//! ```
//!
//! 1. [`input`]      — load markup from a local file or URL
//! 2. [`scan`]       — walk `<body>`, emit text and `__MEDIA_{id}__` tokens
//! 3. [`fetch`]      — optionally download image sources next to each other
//! 4. [`describe`]   — one timed VLM call per image; the only stage with
//!    per-item failures ([`encode`] prepares the image payload)
//! 5. [`substitute`] — literal token replacement

pub mod describe;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod scan;
pub mod substitute;
