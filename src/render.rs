//! Note body to HTML document pipeline.
//!
//! rewrite references -> Markdown -> sanitize -> unwrap lone images ->
//! link bare URLs -> document shell

pub mod document;
pub mod linkify;
pub mod markdown;
pub mod sanitize;

pub use document::DocumentShell;
pub use sanitize::{DisallowedMarkup, SanitizationPolicy, Sanitizer};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::rewrite::LinkRewriter;
use crate::upstream::Note;

use regex::Regex;
use std::sync::LazyLock;

static LONE_IMAGE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<p>\s*(<img\b[^>]*>)\s*</p>").expect("lone image regex should compile")
});

/// Renders notes into standalone HTML documents.
#[derive(Debug)]
pub struct NoteRenderer {
    rewriter: LinkRewriter,
    sanitizer: Sanitizer,
    shell: DocumentShell,
}

impl NoteRenderer {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let mode = if config.strip_disallowed {
            DisallowedMarkup::Strip
        } else {
            DisallowedMarkup::Escape
        };
        Ok(Self {
            rewriter: LinkRewriter::from_config(config),
            sanitizer: Sanitizer::new(SanitizationPolicy::with_mode(mode)),
            shell: DocumentShell::new()?,
        })
    }

    /// Sanitized HTML fragment for a raw note body.
    pub fn render_body(&self, body: &str) -> String {
        let rewritten = self.rewriter.rewrite(body);
        let html = markdown::to_html(&rewritten);
        let clean = self.sanitizer.clean(&html);
        let unwrapped = LONE_IMAGE_PARAGRAPH.replace_all(&clean, "$1");
        linkify::linkify_html(&unwrapped)
    }

    pub fn render_note(&self, note: &Note) -> Result<String> {
        let body = self.render_body(&note.body);
        self.shell.wrap(&note.title, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn renderer(vars: &[(&str, &str)]) -> NoteRenderer {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = ProxyConfig::from_map(vars).expect("config");
        NoteRenderer::new(&config).expect("renderer")
    }

    fn note(title: &str, body: &str) -> Note {
        Note {
            id: "n1".to_string(),
            parent_id: "f1".to_string(),
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn lone_image_is_not_wrapped_in_paragraph() {
        let renderer = renderer(&[("NOTES_URL_PREFIX", "/proxy")]);
        let body = renderer.render_body("![pic](:/abc123)");
        assert!(
            body.contains(r#"<img src="/proxy/v1/r/abc123" alt="pic">"#),
            "{body}"
        );
        assert!(!body.contains("<p>"), "{body}");
    }

    #[test]
    fn image_within_text_keeps_paragraph() {
        let renderer = renderer(&[]);
        let body = renderer.render_body("look ![pic](:/abc123) here");
        assert!(body.starts_with("<p>look "), "{body}");
        assert!(body.contains(r#"<img src="/v1/r/abc123" alt="pic">"#), "{body}");
    }

    #[test]
    fn public_base_url_is_used_for_resources() {
        let renderer = renderer(&[
            ("PUBLIC_BASE_URL", "https://notes.example.com/"),
            ("NOTES_URL_PREFIX", "proxy"),
        ]);
        let body = renderer.render_body("<img src=\":/abc\">");
        assert!(
            body.contains(r#"src="https://notes.example.com/proxy/v1/r/abc""#),
            "{body}"
        );
    }

    #[test]
    fn scripts_never_survive() {
        for strip in ["", "true"] {
            let renderer = renderer(&[("SANITIZE_STRIP", strip)]);
            let body = renderer.render_body(
                "# Hi\n\n<script>alert(1)</script>\n\n<img src=x onerror=alert(1)>\n\n[x](javascript:alert(1))",
            );
            assert!(!body.to_lowercase().contains("<script"), "{body}");
            assert!(!body.contains("onerror="), "{body}");
            assert!(!body.contains("href=\"javascript:"), "{body}");
        }
    }

    #[test]
    fn bare_urls_in_raw_html_are_linked() {
        let renderer = renderer(&[]);
        let body = renderer.render_body("<div>visit https://example.com</div>");
        assert!(
            body.contains(r#"<a href="https://example.com" rel="nofollow">https://example.com</a>"#),
            "{body}"
        );
    }

    #[test]
    fn full_document_has_escaped_title() {
        let renderer = renderer(&[]);
        let html = renderer
            .render_note(&note("Tom & Jerry", "Hello *world*"))
            .expect("render");
        assert!(html.contains("<title>Tom &amp; Jerry</title>"), "{html}");
        assert!(html.contains("<p>Hello <em>world</em></p>"), "{html}");
    }

    #[test]
    fn code_is_rendered_verbatim() {
        let renderer = renderer(&[]);
        let body = renderer.render_body("```\n![pic](:/abc123) <b>x</b>\n```");
        assert!(body.contains("![pic](:/abc123) &lt;b&gt;x&lt;/b&gt;"), "{body}");
    }
}
