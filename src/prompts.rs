//! Prompts and label templates for image enrichment.
//!
//! The vision instruction is sent as the system message of every describer
//! call; [`DescriptionTemplate`] turns the raw VLM answer into the text that
//! replaces a placeholder. Callers override either through
//! [`crate::config::EnrichConfig`].

use serde::{Deserialize, Serialize};

/// Default instruction sent with every image.
pub const DEFAULT_VISION_PROMPT: &str = r#"You are looking at an image taken from a web article. Describe it so that a reader who cannot see the image understands what it shows.

Rules:
1. Describe the main subject first, then relevant details (objects, people, setting, text visible in the image).
2. Transcribe any legible text exactly as written.
3. Do not guess at things you cannot see. Say so when the image is unclear.
4. Answer in plain text. No Markdown, no headings, no lists.
5. Do not add commentary about the task itself."#;

/// Default label template. Placeholders: `{name}`, `{caption}`, `{description}`.
pub const DEFAULT_DESCRIPTION_TEMPLATE: &str =
    "Nazwa zdjęcia: {name}, podpis: {caption}, dokładny opis: {description}";

/// Text rendered for `{caption}` when the figure has no caption.
pub const DEFAULT_MISSING_CAPTION: &str = "brak";

/// Label template combining media name, caption and VLM output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionTemplate {
    pub template: String,
    pub missing_caption: String,
}

impl Default for DescriptionTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_DESCRIPTION_TEMPLATE.to_string(),
            missing_caption: DEFAULT_MISSING_CAPTION.to_string(),
        }
    }
}

impl DescriptionTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    pub fn with_missing_caption(mut self, text: impl Into<String>) -> Self {
        self.missing_caption = text.into();
        self
    }

    /// Fill the template.
    ///
    /// `{description}` is substituted last so braces inside the VLM answer
    /// are never interpreted as placeholders.
    pub fn render(&self, name: &str, caption: Option<&str>, description: &str) -> String {
        let caption = caption.unwrap_or(&self.missing_caption);
        let mut parts = self.template.splitn(2, "{description}");
        let head = parts.next().unwrap_or_default();
        let tail = parts.next();

        let fill = |s: &str| s.replace("{name}", name).replace("{caption}", caption);
        match tail {
            Some(tail) => format!("{}{}{}", fill(head), description, fill(tail)),
            None => fill(head),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_matches_label_format() {
        let t = DescriptionTemplate::default();
        assert_eq!(
            t.render("cat.png", Some("A cat"), "a small orange cat"),
            "Nazwa zdjęcia: cat.png, podpis: A cat, dokładny opis: a small orange cat"
        );
    }

    #[test]
    fn missing_caption_rendered() {
        let t = DescriptionTemplate::default();
        let s = t.render("dog.jpg", None, "a dog");
        assert!(s.contains("podpis: brak,"), "got: {s}");
    }

    #[test]
    fn custom_template() {
        let t = DescriptionTemplate::new("[{name}] {description} ({caption})").with_missing_caption("-");
        assert_eq!(t.render("x.png", None, "text"), "[x.png] text (-)");
    }

    #[test]
    fn braces_in_description_untouched() {
        let t = DescriptionTemplate::new("{name}: {description}");
        assert_eq!(t.render("a.png", None, "shows {caption} literally"), "a.png: shows {caption} literally");
    }

    #[test]
    fn vision_prompt_asks_for_plain_text() {
        assert!(DEFAULT_VISION_PROMPT.contains("plain text"));
    }
}
