//! Markup scanning: HTML → linearised text with media placeholders.
//!
//! The document is parsed with `scraper` (html5ever) and every descendant of
//! `<body>` is visited once, depth-first in document order. Figures and audio
//! elements become `__MEDIA_{id}__` tokens and are recorded in per-kind
//! [`MediaTable`]s; text nodes are trimmed and emitted one per line.
//!
//! html5ever always synthesises a `<body>`, so whether the document actually
//! has a content root is decided on the raw markup before parsing, with
//! comments and `<script>`/`<style>` contents blanked out first.

use crate::error::EnrichError;
use crate::media::{MediaKind, MediaPlaceholder, MediaTable};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label used for documents that did not come from a file or URL.
pub const INLINE_DOCUMENT: &str = "<inline>";

static RE_BODY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body[\s/>]").unwrap());

/// Comments and raw-text elements; an unterminated one runs to the end.
static RE_NON_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<!--.*?(?:-->|\z)|<script\b.*?(?:</script\s*>|\z)|<style\b.*?(?:</style\s*>|\z)",
    )
    .unwrap()
});

static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static SEL_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static SEL_FIGCAPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("figcaption").unwrap());
static SEL_SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("source").unwrap());

/// Text whose parent is one of these is never emitted.
const SUPPRESSED_PARENTS: [&str; 3] = ["figcaption", "script", "style"];

/// Result of scanning one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannedDocument {
    /// Emitted fragments joined with `\n`.
    pub text: String,
    pub images: MediaTable,
    pub audio: MediaTable,
}

impl ScannedDocument {
    pub fn into_parts(self) -> (String, MediaTable, MediaTable) {
        (self.text, self.images, self.audio)
    }

    /// Number of placeholders created, counting overwritten duplicates once.
    pub fn media_count(&self) -> usize {
        self.images.len() + self.audio.len()
    }
}

/// Scan inline markup. See [`scan_labeled`].
pub fn scan(document: &str) -> Result<ScannedDocument, EnrichError> {
    scan_labeled(INLINE_DOCUMENT, document)
}

/// Scan markup, naming it `label` in any error.
///
/// # Errors
/// [`EnrichError::Parse`] when the markup has no `<body>` element.
pub fn scan_labeled(label: &str, document: &str) -> Result<ScannedDocument, EnrichError> {
    if !has_body_tag(document) {
        return Err(EnrichError::Parse {
            document: label.to_string(),
            reason: "no <body> element found".into(),
        });
    }

    let html = Html::parse_document(document);
    let body = html
        .select(&SEL_BODY)
        .next()
        .ok_or_else(|| EnrichError::Parse {
            document: label.to_string(),
            reason: "parsed tree has no <body> element".into(),
        })?;

    let mut scanner = Scanner::default();
    // descendants() yields the body itself first
    for node in body.descendants().skip(1) {
        let fragment = match node.value() {
            Node::Element(el) => match (el.name(), ElementRef::wrap(node)) {
                ("figure", Some(figure)) => scanner.figure(figure),
                ("audio", Some(audio)) => scanner.audio(audio),
                _ => None,
            },
            Node::Text(text) => {
                let parent = node.parent().and_then(|p| p.value().as_element().map(|e| e.name()));
                scanner.text(parent, text)
            }
            _ => None,
        };
        if let Some(fragment) = fragment {
            scanner.fragments.push(fragment);
        }
    }

    debug!(
        "Scanned '{}': {} fragments, {} images, {} audio",
        label,
        scanner.fragments.len(),
        scanner.images.len(),
        scanner.audio.len()
    );

    Ok(ScannedDocument {
        text: scanner.fragments.join("\n"),
        images: scanner.images,
        audio: scanner.audio,
    })
}

/// True when the markup carries a real `<body` start tag.
fn has_body_tag(document: &str) -> bool {
    RE_BODY_TAG.is_match(&RE_NON_MARKUP.replace_all(document, " "))
}

/// Per-invocation scan state.
#[derive(Default)]
struct Scanner {
    fragments: Vec<String>,
    images: MediaTable,
    audio: MediaTable,
    position: usize,
}

impl Scanner {
    fn text(&self, parent: Option<&str>, text: &str) -> Option<String> {
        if parent.is_some_and(|name| SUPPRESSED_PARENTS.contains(&name)) {
            return None;
        }
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn figure(&mut self, figure: ElementRef<'_>) -> Option<String> {
        let img = figure.select(&SEL_IMG).next()?;
        let src = img.value().attr("src").filter(|s| !s.is_empty())?;
        let caption = figure
            .select(&SEL_FIGCAPTION)
            .next()
            .map(|c| c.text().collect::<String>().trim().to_string());

        let placeholder = self.placeholder(MediaKind::Image, src, caption);
        let token = placeholder.token();
        self.images.insert(placeholder.name.clone(), placeholder);
        Some(token)
    }

    fn audio(&mut self, audio: ElementRef<'_>) -> Option<String> {
        let src = audio
            .value()
            .attr("src")
            .filter(|s| !s.is_empty())
            .or_else(|| {
                audio
                    .select(&SEL_SOURCE)
                    .next()
                    .and_then(|s| s.value().attr("src"))
                    .filter(|s| !s.is_empty())
            })?;

        let placeholder = self.placeholder(MediaKind::Audio, src, None);
        let token = placeholder.token();
        self.audio.insert(placeholder.name.clone(), placeholder);
        Some(token)
    }

    fn placeholder(&mut self, kind: MediaKind, src: &str, caption: Option<String>) -> MediaPlaceholder {
        self.position += 1;
        MediaPlaceholder::new(kind, src, caption, self.position)
    }
}
