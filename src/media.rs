//! Media placeholder records produced by the scanner.
//!
//! A [`MediaPlaceholder`] stands in for one `<figure>` image or `<audio>`
//! element. The scanner emits its [`token`](MediaPlaceholder::token) into the
//! linearised text; the enricher later fills in `description` and swaps the
//! token for it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opening marker of a placeholder token.
pub const TOKEN_PREFIX: &str = "__MEDIA_";
/// Closing marker of a placeholder token.
pub const TOKEN_SUFFIX: &str = "__";

/// Lookup table of placeholders keyed by media file name.
///
/// Inserting a second placeholder with the same name replaces the first.
pub type MediaTable = HashMap<String, MediaPlaceholder>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// One media reference extracted from markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPlaceholder {
    pub kind: MediaKind,
    /// Last path segment of `source`; the key in its kind's table.
    pub name: String,
    /// Source attribute exactly as found in the markup.
    pub source: String,
    /// `<figcaption>` text for captioned figures.
    pub caption: Option<String>,
    /// 1-based document order, shared by images and audio.
    pub position: usize,
    pub id: Uuid,
    /// Filled in by the enricher; `None` means unresolved.
    pub description: Option<String>,
}

impl MediaPlaceholder {
    /// Create a placeholder with a fresh random id and no description.
    pub fn new(
        kind: MediaKind,
        source: impl Into<String>,
        caption: Option<String>,
        position: usize,
    ) -> Self {
        let source = source.into();
        Self {
            kind,
            name: media_name(&source).to_string(),
            source,
            caption,
            position,
            id: Uuid::new_v4(),
            description: None,
        }
    }

    /// The `__MEDIA_{id}__` token standing in for this media in the text.
    pub fn token(&self) -> String {
        format!("{TOKEN_PREFIX}{}{TOKEN_SUFFIX}", self.id)
    }

    pub fn is_resolved(&self) -> bool {
        self.description.is_some()
    }
}

/// Derive a media name from a source: everything after the last `/`.
pub fn media_name(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}

/// Placeholders of a table sorted by document position.
pub fn in_document_order(table: &MediaTable) -> Vec<&MediaPlaceholder> {
    let mut items: Vec<&MediaPlaceholder> = table.values().collect();
    items.sort_by_key(|p| p.position);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_last_segment() {
        assert_eq!(media_name("pics/cat.png"), "cat.png");
        assert_eq!(media_name("https://example.com/a/b/rafal.mp3"), "rafal.mp3");
        assert_eq!(media_name("plain.jpg"), "plain.jpg");
        assert_eq!(media_name("dir/"), "");
    }

    #[test]
    fn token_wraps_id() {
        let p = MediaPlaceholder::new(MediaKind::Image, "pics/cat.png", None, 1);
        assert_eq!(p.token(), format!("__MEDIA_{}__", p.id));
        assert_eq!(p.name, "cat.png");
        assert!(!p.is_resolved());
    }

    #[test]
    fn fresh_ids_differ() {
        let a = MediaPlaceholder::new(MediaKind::Audio, "a.mp3", None, 1);
        let b = MediaPlaceholder::new(MediaKind::Audio, "a.mp3", None, 2);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn kind_serialises_lowercase() {
        let json = serde_json::to_string(&MediaKind::Image).unwrap();
        assert_eq!(json, "\"image\"");
    }

    #[test]
    fn document_order_sorts_by_position() {
        let mut table = MediaTable::new();
        for (pos, src) in [(3, "c.png"), (1, "a.png"), (2, "b.png")] {
            let p = MediaPlaceholder::new(MediaKind::Image, src, None, pos);
            table.insert(p.name.clone(), p);
        }
        let names: Vec<&str> = in_document_order(&table)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }
}
