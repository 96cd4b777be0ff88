// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-body helpers: inline-image detection, `@mention` extraction, and
//! reply-preview truncation. All pure functions evaluated at render time.

use std::sync::OnceLock;

use regex::Regex;

/// Extensions rendered as an inline image instead of plain text.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// How a message body should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Text,
    /// The body is a single URL to an image; render it inline.
    Image,
}

/// Classify a body by extension match on a lone http(s) URL.
pub fn classify(body: &str) -> BodyKind {
    let trimmed = body.trim();
    if trimmed.contains(char::is_whitespace) {
        return BodyKind::Text;
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return BodyKind::Text;
    }
    // Ignore any query string when matching the extension.
    let path = trimmed.split('?').next().unwrap_or(trimmed);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        BodyKind::Image
    } else {
        BodyKind::Text
    }
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("mention pattern is valid"))
}

/// Extract `@mention` tokens (usernames without the `@`).
pub fn mentions(body: &str) -> Vec<String> {
    mention_regex()
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

/// Truncate a body for a quoted reply preview, char-boundary safe.
pub fn truncate_preview(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated: String = body.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_is_classified_as_image() {
        assert_eq!(classify("https://cdn.example.com/pic.png"), BodyKind::Image);
        assert_eq!(classify("http://x.io/a/b/photo.JPEG"), BodyKind::Image);
        assert_eq!(
            classify("https://cdn.example.com/pic.webp?w=640"),
            BodyKind::Image
        );
    }

    #[test]
    fn plain_text_is_classified_as_text() {
        assert_eq!(classify("hello world"), BodyKind::Text);
        assert_eq!(classify("https://example.com/page.html"), BodyKind::Text);
        // A URL embedded in a sentence stays text.
        assert_eq!(
            classify("look at https://cdn.example.com/pic.png !"),
            BodyKind::Text
        );
        assert_eq!(classify("pic.png"), BodyKind::Text);
    }

    #[test]
    fn mentions_are_extracted_in_order() {
        let found = mentions("hey @alice, did @bob_99 see this? mail me at a@b");
        assert_eq!(found, vec!["alice", "bob_99", "b"]);
    }

    #[test]
    fn mentions_empty_when_none() {
        assert!(mentions("no one here").is_empty());
    }

    #[test]
    fn preview_truncation_appends_ellipsis() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_preview("abcdefghijk", 10), "abcdefghij...");
    }

    #[test]
    fn preview_truncation_is_char_safe() {
        let body = "héllo wörld, ça va très bien aujourd'hui";
        let preview = truncate_preview(body, 5);
        assert_eq!(preview, "héllo...");
    }
}
