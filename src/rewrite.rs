//! Resource reference rewriting for raw note bodies.
//!
//! Note bodies refer to attachments with `:/<id>` tokens. Before the body is
//! rendered, each token is replaced by the public URL of this service's
//! resource endpoint. Three surface forms are handled by independent passes:
//!
//! - Markdown images: `![alt](:/<id>)`
//! - Inline HTML images: `<img src=":/<id>">` (either quote style)
//! - Bare parenthesized references: `(:/<id>)`
//!
//! Code blocks (fenced or indented) and inline code spans are copied through
//! untouched.

use crate::config::ProxyConfig;
use crate::render::markdown;

use pulldown_cmark::{Event, Parser, Tag};
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]\n]*)\]\(:/([0-9A-Fa-f-]+)(\s+"[^"\n]*")?\)"#)
        .expect("markdown image regex should compile")
});

static HTML_IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\ssrc\s*=\s*)(?:"(:/[0-9a-f-]+)"|'(:/[0-9a-f-]+)')"#)
        .expect("img src regex should compile")
});

static BARE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(:/([0-9A-Fa-f-]+)\)").expect("bare reference regex should compile")
});

/// Rewrites `:/<id>` references to resource endpoint URLs.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    /// Everything in the resolved URL before the resource id.
    url_root: String,
}

impl LinkRewriter {
    pub fn new(url_root: impl Into<String>) -> Self {
        Self {
            url_root: url_root.into(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.resource_url(""))
    }

    pub fn resolve(&self, resource_id: &str) -> String {
        format!("{}{resource_id}", self.url_root)
    }

    /// Rewrite every reference outside code.
    pub fn rewrite(&self, body: &str) -> String {
        let mut out = String::with_capacity(body.len());
        for (range, is_code) in segments(body) {
            let text = &body[range];
            if is_code {
                out.push_str(text);
            } else {
                out.push_str(&self.rewrite_prose(text));
            }
        }
        out
    }

    fn rewrite_prose(&self, text: &str) -> String {
        let text = MARKDOWN_IMAGE.replace_all(text, |caps: &Captures<'_>| {
            format!(
                "![{}]({}{})",
                &caps[1],
                self.resolve(&caps[2]),
                caps.get(3).map_or("", |m| m.as_str())
            )
        });
        let text = HTML_IMG_SRC.replace_all(&text, |caps: &Captures<'_>| {
            let (quote, reference) = match caps.get(2) {
                Some(m) => ('"', m.as_str()),
                None => ('\'', caps.get(3).map_or("", |m| m.as_str())),
            };
            let id = reference.trim_start_matches(":/");
            format!("{}{quote}{}{quote}", &caps[1], self.resolve(id))
        })
        .into_owned();
        BARE_REFERENCE
            .replace_all(&text, |caps: &Captures<'_>| {
                format!("({})", self.resolve(&caps[1]))
            })
            .into_owned()
    }
}

/// Split a body into `(range, is_code)` segments covering it exactly.
///
/// Code is located with the same Markdown parser and options used for
/// rendering, so fenced blocks, indented blocks and inline spans are
/// recognized exactly as they will be rendered.
fn segments(body: &str) -> Vec<(Range<usize>, bool)> {
    let mut out = Vec::new();
    let mut prose_start = 0;

    for (event, range) in Parser::new_ext(body, markdown::options()).into_offset_iter() {
        let is_code = matches!(event, Event::Start(Tag::CodeBlock(_)) | Event::Code(_));
        if !is_code || range.start < prose_start {
            continue;
        }
        out.push((prose_start..range.start, false));
        out.push((range.clone(), true));
        prose_start = range.end;
    }

    out.push((prose_start..body.len(), false));
    out.retain(|(range, _)| !range.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> LinkRewriter {
        LinkRewriter::new("/proxy/v1/r/")
    }

    #[test]
    fn markdown_image_keeps_alt_text() {
        assert_eq!(
            rewriter().rewrite("![pic](:/abc123)"),
            "![pic](/proxy/v1/r/abc123)"
        );
    }

    #[test]
    fn markdown_image_keeps_title() {
        assert_eq!(
            rewriter().rewrite(r#"![a b](:/0f-9e "Shot")"#),
            r#"![a b](/proxy/v1/r/0f-9e "Shot")"#
        );
    }

    #[test]
    fn html_img_double_and_single_quotes() {
        let body = r#"<img width="10" src=":/abc" alt="x"> <IMG SRC=':/DEF'>"#;
        assert_eq!(
            rewriter().rewrite(body),
            r#"<img width="10" src="/proxy/v1/r/abc" alt="x"> <IMG SRC='/proxy/v1/r/DEF'>"#
        );
    }

    #[test]
    fn html_img_ignores_data_src() {
        let body = r#"<img data-src=":/abc" src="x.png">"#;
        assert_eq!(rewriter().rewrite(body), body);
    }

    #[test]
    fn bare_reference_is_rewritten() {
        assert_eq!(
            rewriter().rewrite("see [file](:/deadbeef) here"),
            "see [file](/proxy/v1/r/deadbeef) here"
        );
    }

    #[test]
    fn surrounding_text_is_preserved() {
        let body = "# Title\r\n\nBefore ![x](:/a1) middle (:/b2) after.\n\n- item\n";
        assert_eq!(
            rewriter().rewrite(body),
            "# Title\r\n\nBefore ![x](/proxy/v1/r/a1) middle (/proxy/v1/r/b2) after.\n\n- item\n"
        );
    }

    #[test]
    fn rewriting_is_idempotent() {
        let bodies = [
            "![pic](:/abc123)",
            r#"<img src=":/abc123">"#,
            "(:/abc123)",
            "mixed ![a](:/1) <img src='2'> (:/3) `(:/4)`",
        ];
        let rewriter = LinkRewriter::new("https://example.com/proxy/v1/r/");
        for body in bodies {
            let once = rewriter.rewrite(body);
            assert_eq!(rewriter.rewrite(&once), once, "body: {body}");
        }
    }

    #[test]
    fn non_hex_identifiers_are_left_alone() {
        let body = "(:/not-an-id!) ![x](:/zzz)";
        assert_eq!(rewriter().rewrite(body), body);
    }

    #[test]
    fn fenced_code_is_untouched() {
        let body = "![a](:/aa)\n```md\n![b](:/bb)\n```\n![c](:/cc)\n";
        assert_eq!(
            rewriter().rewrite(body),
            "![a](/proxy/v1/r/aa)\n```md\n![b](:/bb)\n```\n![c](/proxy/v1/r/cc)\n"
        );
    }

    #[test]
    fn tilde_fence_and_unclosed_fence() {
        let body = "~~~\n(:/aa)\n~~~\n(:/bb)\n````\n(:/cc)\n```\n(:/dd)";
        assert_eq!(
            rewriter().rewrite(body),
            "~~~\n(:/aa)\n~~~\n(/proxy/v1/r/bb)\n````\n(:/cc)\n```\n(:/dd)"
        );
    }

    #[test]
    fn indented_code_is_untouched() {
        let body = "Intro (:/aa)\n\n    ![x](:/bb)\n    <img src=\":/cc\">\n\nAfter ![y](:/dd)\n";
        assert_eq!(
            rewriter().rewrite(body),
            "Intro (/proxy/v1/r/aa)\n\n    ![x](:/bb)\n    <img src=\":/cc\">\n\nAfter ![y](/proxy/v1/r/dd)\n"
        );
    }

    #[test]
    fn indented_paragraph_continuation_is_prose() {
        // Four spaces cannot start a code block inside a paragraph.
        let body = "Line one\n    ![x](:/aa)\n";
        assert_eq!(
            rewriter().rewrite(body),
            "Line one\n    ![x](/proxy/v1/r/aa)\n"
        );
    }

    #[test]
    fn inline_code_is_untouched() {
        let body = "use `![x](:/aa)` or ``(:/bb)`` but (:/cc)";
        assert_eq!(
            rewriter().rewrite(body),
            "use `![x](:/aa)` or ``(:/bb)`` but (/proxy/v1/r/cc)"
        );
    }

    #[test]
    fn unmatched_backtick_is_prose() {
        assert_eq!(
            rewriter().rewrite("a ` b (:/aa)"),
            "a ` b (/proxy/v1/r/aa)"
        );
    }

    #[test]
    fn from_config_uses_prefix() {
        let config = ProxyConfig {
            url_prefix: "/proxy".to_string(),
            ..ProxyConfig::default()
        };
        assert_eq!(
            LinkRewriter::from_config(&config).resolve("abc123"),
            "/proxy/v1/r/abc123"
        );
    }
}
