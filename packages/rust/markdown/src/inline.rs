//! Inline Markdown → annotated text spans.
//!
//! Handles a single level of `**bold**`, `__bold__`, `*italic*`, `` `code` ``,
//! `~~strike~~` and `[text](https://…)` links. Nested markup is kept as literal
//! text inside the outer span.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// A run of text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
    /// Absolute `http(s)` link target.
    pub link: Option<String>,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"`(?P<code>[^`]+)`",
        r"|\*\*(?P<bold>.+?)\*\*",
        r"|__(?P<bold2>.+?)__",
        r"|~~(?P<strike>.+?)~~",
        r"|\*(?P<italic>[^*\s](?:[^*]*[^*\s])?)\*",
        r"|\[(?P<label>[^\]]+)\]\((?P<href>[^)\s]+)\)",
    ))
    .expect("inline regex")
});

/// Split `text` into formatted spans. Plain text yields a single span.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in INLINE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span::plain(&text[last..whole.start()]));
        }
        last = whole.end();

        let span = if let Some(m) = caps.name("code") {
            Span {
                code: true,
                ..Span::plain(m.as_str())
            }
        } else if let Some(m) = caps.name("bold").or_else(|| caps.name("bold2")) {
            Span {
                bold: true,
                ..Span::plain(m.as_str())
            }
        } else if let Some(m) = caps.name("strike") {
            Span {
                strikethrough: true,
                ..Span::plain(m.as_str())
            }
        } else if let Some(m) = caps.name("italic") {
            Span {
                italic: true,
                ..Span::plain(m.as_str())
            }
        } else if let (Some(label), Some(href)) = (caps.name("label"), caps.name("href")) {
            Span {
                link: web_link(href.as_str()),
                ..Span::plain(label.as_str())
            }
        } else {
            Span::plain(whole.as_str())
        };
        spans.push(span);
    }

    if last < text.len() || spans.is_empty() {
        spans.push(Span::plain(&text[last..]));
    }
    spans
}

/// Only absolute http(s) URLs are accepted as link targets.
fn web_link(href: &str) -> Option<String> {
    Url::parse(href)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_span() {
        assert_eq!(parse_inline("just text"), vec![Span::plain("just text")]);
        assert_eq!(parse_inline(""), vec![Span::plain("")]);
    }

    #[test]
    fn mixed_formatting() {
        let spans = parse_inline("use **bold** and `code` then *it*");
        let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["use ", "bold", " and ", "code", " then ", "it"]);
        assert!(spans[1].bold);
        assert!(spans[3].code);
        assert!(spans[5].italic);
    }

    #[test]
    fn links_keep_label_and_validate_target() {
        let spans = parse_inline("see [docs](https://example.com/a) or [local](./file.md)");
        assert_eq!(spans[1].text, "docs");
        assert_eq!(spans[1].link.as_deref(), Some("https://example.com/a"));
        assert_eq!(spans[3].text, "local");
        assert_eq!(spans[3].link, None);
    }

    #[test]
    fn arithmetic_stars_are_not_italic() {
        let spans = parse_inline("2 * 3 * 4");
        assert_eq!(spans, vec![Span::plain("2 * 3 * 4")]);
    }

    #[test]
    fn strikethrough() {
        let spans = parse_inline("~~old~~ new");
        assert!(spans[0].strikethrough);
        assert_eq!(spans[1].text, " new");
    }
}
