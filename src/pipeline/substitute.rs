//! Placeholder substitution: swap `__MEDIA_{id}__` tokens for descriptions.
//!
//! Matching is literal. The text is walked once from left to right. A
//! `__MEDIA_` opener only starts a token when it is followed by a hyphenated
//! UUID and the closing `__`; any other opener (article text such as
//! `__MEDIA_ROOT`) is copied through and the scan resumes right after it.
//! Replacement text is never rescanned, so a description that happens to
//! contain a token cannot trigger a second substitution.

use crate::media::{MediaTable, TOKEN_PREFIX, TOKEN_SUFFIX};
use std::collections::HashMap;
use uuid::fmt::Hyphenated;
use uuid::Uuid;

/// Replace every resolved image token in `text` with its description.
///
/// Tokens whose placeholder has no description, or whose id is unknown, are
/// left verbatim.
pub fn substitute(text: &str, images: &MediaTable) -> String {
    substitute_tables(text, &[images])
}

/// Substitute tokens from several tables at once.
pub fn substitute_tables(text: &str, tables: &[&MediaTable]) -> String {
    let replacements: HashMap<Uuid, &str> = tables
        .iter()
        .flat_map(|table| table.values())
        .filter_map(|p| p.description.as_deref().map(|d| (p.id, d)))
        .collect();

    if replacements.is_empty() {
        return text.to_string();
    }
    replace_tokens(text, &replacements)
}

/// Count the placeholder tokens still present in `text`.
pub fn count_tokens(text: &str) -> usize {
    let mut count = 0;
    let mut rest = text;
    while let Some((start, len, _)) = next_token(rest) {
        count += 1;
        rest = &rest[start + len..];
    }
    count
}

/// Next well-formed token in `text` as (byte offset, byte length, id).
fn next_token(text: &str) -> Option<(usize, usize, Uuid)> {
    let mut from = 0;
    while let Some(found) = text[from..].find(TOKEN_PREFIX) {
        let start = from + found;
        let id_start = start + TOKEN_PREFIX.len();
        let id_end = id_start + Hyphenated::LENGTH;
        let id = text
            .get(id_start..id_end)
            .filter(|_| text[id_end..].starts_with(TOKEN_SUFFIX))
            .and_then(|candidate| Uuid::parse_str(candidate).ok());
        if let Some(id) = id {
            return Some((start, id_end + TOKEN_SUFFIX.len() - start, id));
        }
        from = id_start;
    }
    None
}

fn replace_tokens(text: &str, replacements: &HashMap<Uuid, &str>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((start, len, id)) = next_token(rest) {
        out.push_str(&rest[..start]);
        match replacements.get(&id) {
            Some(description) => out.push_str(description),
            None => out.push_str(&rest[start..start + len]),
        }
        rest = &rest[start + len..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaPlaceholder};

    fn table_with(items: Vec<MediaPlaceholder>) -> MediaTable {
        items.into_iter().map(|p| (p.name.clone(), p)).collect()
    }

    fn resolved(src: &str, pos: usize, description: &str) -> MediaPlaceholder {
        let mut p = MediaPlaceholder::new(MediaKind::Image, src, None, pos);
        p.description = Some(description.to_string());
        p
    }

    #[test]
    fn no_tokens_returns_input() {
        let text = "plain text\nwith lines";
        assert_eq!(substitute(text, &MediaTable::new()), text);
    }

    #[test]
    fn replaces_resolved_token() {
        let cat = resolved("cat.png", 1, "a cat");
        let text = format!("Intro\n{}\nEnd", cat.token());
        let table = table_with(vec![cat]);
        assert_eq!(substitute(&text, &table), "Intro\na cat\nEnd");
    }

    #[test]
    fn unresolved_token_left_verbatim() {
        let dog = MediaPlaceholder::new(MediaKind::Image, "dog.png", None, 1);
        let text = format!("before {} after", dog.token());
        let table = table_with(vec![dog]);
        assert_eq!(substitute(&text, &table), text);
    }

    #[test]
    fn unknown_id_left_verbatim() {
        let cat = resolved("cat.png", 1, "a cat");
        let text = format!("{} and __MEDIA_not-a-known-id__", cat.token());
        let table = table_with(vec![cat]);
        assert_eq!(substitute(&text, &table), "a cat and __MEDIA_not-a-known-id__");
    }

    #[test]
    fn mixed_resolved_and_unresolved() {
        let a = resolved("a.png", 1, "first");
        let b = MediaPlaceholder::new(MediaKind::Image, "b.png", None, 2);
        let c = resolved("c.png", 3, "third");
        let text = format!("{}\n{}\n{}", a.token(), b.token(), c.token());
        let b_token = b.token();
        let table = table_with(vec![a, b, c]);
        assert_eq!(substitute(&text, &table), format!("first\n{b_token}\nthird"));
    }

    #[test]
    fn substitution_is_idempotent() {
        let cat = resolved("cat.png", 1, "a cat");
        let text = format!("x {} y", cat.token());
        let table = table_with(vec![cat]);
        let once = substitute(&text, &table);
        assert_eq!(substitute(&once, &table), once);
    }

    #[test]
    fn description_containing_token_is_not_rescanned() {
        let inner = resolved("inner.png", 2, "INNER");
        let outer = resolved("outer.png", 1, &format!("see {}", inner.token()));
        let text = outer.token();
        let expected = format!("see {}", inner.token());
        let table = table_with(vec![outer, inner]);
        assert_eq!(substitute(&text, &table), expected);
    }

    #[test]
    fn unterminated_opener_copied() {
        let cat = resolved("cat.png", 1, "a cat");
        let text = format!("{} then __MEDIA_oops", cat.token());
        let table = table_with(vec![cat]);
        assert_eq!(substitute(&text, &table), "a cat then __MEDIA_oops");
    }

    #[test]
    fn stray_opener_does_not_swallow_following_token() {
        let cat = resolved("cat.png", 1, "A CAT");
        let text = format!("Django uses __MEDIA_ROOT for uploads\n{}", cat.token());
        let table = table_with(vec![cat]);
        assert_eq!(
            substitute(&text, &table),
            "Django uses __MEDIA_ROOT for uploads\nA CAT"
        );
        assert_eq!(count_tokens(&text), 1);
    }

    #[test]
    fn adjacent_openers_resolved() {
        let cat = resolved("cat.png", 1, "A CAT");
        let text = format!("__MEDIA_{}", cat.token());
        let table = table_with(vec![cat]);
        assert_eq!(substitute(&text, &table), "__MEDIA_A CAT");
    }

    #[test]
    fn non_hyphenated_id_is_not_a_token() {
        let cat = resolved("cat.png", 1, "A CAT");
        let text = format!("__MEDIA_{}__", cat.id.simple());
        let table = table_with(vec![cat]);
        assert_eq!(substitute(&text, &table), text);
        assert_eq!(count_tokens(&text), 0);
    }

    #[test]
    fn audio_table_only_used_when_passed() {
        let image = resolved("cat.png", 1, "a cat");
        let mut clip = MediaPlaceholder::new(MediaKind::Audio, "talk.mp3", None, 2);
        clip.description = Some("hello there".into());
        let text = format!("{}\n{}", image.token(), clip.token());
        let clip_token = clip.token();
        let images = table_with(vec![image]);
        let audio = table_with(vec![clip]);

        assert_eq!(substitute(&text, &images), format!("a cat\n{clip_token}"));
        assert_eq!(substitute_tables(&text, &[&images, &audio]), "a cat\nhello there");
    }

    #[test]
    fn counts_tokens() {
        let a = MediaPlaceholder::new(MediaKind::Image, "a.png", None, 1);
        let b = MediaPlaceholder::new(MediaKind::Audio, "b.mp3", None, 2);
        assert_eq!(count_tokens(&format!("{} x {}", a.token(), b.token())), 2);
        assert_eq!(count_tokens("nothing here"), 0);
    }
}
