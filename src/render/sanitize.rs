//! HTML allowlist sanitizing.
//!
//! The allowlist itself is enforced by ammonia. In escape mode, tags outside
//! the allowlist are first turned into visible text so readers see what the
//! note contained instead of losing it.

use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<([!?/]?)([A-Za-z][A-Za-z0-9-]*)[^>]*>")
        .expect("markup regex should compile")
});

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "br", "code", "em", "i", "li", "ol", "p", "pre",
    "strong", "ul", "h1", "h2", "h3", "h4", "h5", "h6", "img", "table", "thead", "tbody", "tfoot",
    "tr", "th", "td", "hr", "del", "s", "sup", "sub", "span", "div",
];

const ANCHOR_ATTRIBUTES: &[&str] = &["href", "title", "rel"];
const IMAGE_ATTRIBUTES: &[&str] = &["src", "alt", "title", "width", "height"];
const GENERIC_ATTRIBUTES: &[&str] = &["class", "id"];
const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "data"];

/// Elements removed together with their content when stripping.
const DROPPED_WITH_CONTENT: &[&str] = &["script", "style"];

/// What happens to markup outside the allowlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisallowedMarkup {
    /// Disallowed tags are shown as literal text.
    #[default]
    Escape,
    /// Disallowed tags are removed.
    Strip,
}

/// Allowlist of tags, attributes and URL schemes for rendered notes.
#[derive(Debug, Clone)]
pub struct SanitizationPolicy {
    pub tags: HashSet<&'static str>,
    pub tag_attributes: HashMap<&'static str, HashSet<&'static str>>,
    pub generic_attributes: HashSet<&'static str>,
    pub url_schemes: HashSet<&'static str>,
    pub mode: DisallowedMarkup,
}

impl Default for SanitizationPolicy {
    fn default() -> Self {
        Self {
            tags: ALLOWED_TAGS.iter().copied().collect(),
            tag_attributes: HashMap::from([
                ("a", ANCHOR_ATTRIBUTES.iter().copied().collect()),
                ("img", IMAGE_ATTRIBUTES.iter().copied().collect()),
            ]),
            generic_attributes: GENERIC_ATTRIBUTES.iter().copied().collect(),
            url_schemes: URL_SCHEMES.iter().copied().collect(),
            mode: DisallowedMarkup::default(),
        }
    }
}

impl SanitizationPolicy {
    pub fn with_mode(mode: DisallowedMarkup) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Cleans HTML fragments against a fixed policy.
pub struct Sanitizer {
    policy: SanitizationPolicy,
    cleaner: ammonia::Builder<'static>,
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Sanitizer {
    pub fn new(policy: SanitizationPolicy) -> Self {
        let mut cleaner = ammonia::Builder::empty();
        cleaner
            .tags(policy.tags.clone())
            .tag_attributes(policy.tag_attributes.clone())
            .generic_attributes(policy.generic_attributes.clone())
            .url_schemes(policy.url_schemes.clone())
            .url_relative(ammonia::UrlRelative::PassThrough)
            .link_rel(None)
            .clean_content_tags(
                DROPPED_WITH_CONTENT
                    .iter()
                    .copied()
                    .filter(|tag| !policy.tags.contains(tag))
                    .collect(),
            )
            .strip_comments(true);
        Self { policy, cleaner }
    }

    pub fn clean(&self, html: &str) -> String {
        match self.policy.mode {
            DisallowedMarkup::Strip => self.cleaner.clean(html).to_string(),
            DisallowedMarkup::Escape => self.cleaner.clean(&self.escape_disallowed(html)).to_string(),
        }
    }

    fn escape_disallowed(&self, html: &str) -> String {
        MARKUP
            .replace_all(html, |caps: &Captures<'_>| {
                let whole = &caps[0];
                let allowed = match (caps.get(1), caps.get(2)) {
                    // Comments are left for the cleaner to remove.
                    (None, None) => true,
                    (Some(prefix), Some(name)) => {
                        matches!(prefix.as_str(), "" | "/")
                            && self
                                .policy
                                .tags
                                .contains(name.as_str().to_ascii_lowercase().as_str())
                    }
                    _ => false,
                };
                if allowed {
                    whole.to_string()
                } else {
                    whole.replace('<', "&lt;").replace('>', "&gt;")
                }
            })
            .into_owned()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(SanitizationPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
    static EVENT_ATTRIBUTE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\son[a-z]+\s*=").expect("event attribute regex"));

    const HOSTILE: &[&str] = &[
        "<script>alert(1)</script>",
        "<SCRIPT src=//evil.example></SCRIPT>",
        "<img src=x onerror=alert(1)>",
        r#"<a href="javascript:alert(1)" onclick="x()">click</a>"#,
        r#"<div onmouseover="x()">hover</div>"#,
        "<svg><script>alert(1)</script></svg>",
        "<iframe src=\"javascript:alert(1)\"></iframe>",
        "<scr<script>ipt>alert(1)</script>",
        "<style>body{display:none}</style>",
        r#"<a href=" JaVaScRiPt:alert(1)">x</a>"#,
        "<!-- <script>alert(1)</script> -->",
    ];

    fn assert_safe(output: &str) {
        assert!(!output.to_ascii_lowercase().contains("<script"), "{output}");
        for tag in TAG.find_iter(output) {
            let tag = tag.as_str();
            assert!(!EVENT_ATTRIBUTE.is_match(tag), "event attribute in {tag}");
            assert!(
                !tag.to_ascii_lowercase().contains("javascript:"),
                "javascript url in {tag}"
            );
        }
    }

    #[test]
    fn hostile_input_is_neutralized_in_both_modes() {
        for mode in [DisallowedMarkup::Escape, DisallowedMarkup::Strip] {
            let sanitizer = Sanitizer::new(SanitizationPolicy::with_mode(mode));
            for input in HOSTILE {
                assert_safe(&sanitizer.clean(input));
            }
        }
    }

    #[test]
    fn escape_mode_shows_disallowed_tags_as_text() {
        let sanitizer = Sanitizer::default();
        assert_eq!(
            sanitizer.clean("<p>a <script>alert(1)</script> b</p>"),
            "<p>a &lt;script&gt;alert(1)&lt;/script&gt; b</p>"
        );
    }

    #[test]
    fn strip_mode_removes_disallowed_tags() {
        let sanitizer = Sanitizer::new(SanitizationPolicy::with_mode(DisallowedMarkup::Strip));
        assert_eq!(
            sanitizer.clean("<p>a <script>alert(1)</script><u>b</u></p>"),
            "<p>a b</p>"
        );
    }

    #[test]
    fn allowed_markup_survives() {
        let sanitizer = Sanitizer::default();
        let html = r#"<h2 id="top">T</h2><p class="x"><a href="https://a.com" title="t">l</a> <img src="/r/abc" alt="pic" width="10"></p>"#;
        assert_eq!(sanitizer.clean(html), html);
    }

    #[test]
    fn disallowed_attributes_are_dropped() {
        let sanitizer = Sanitizer::default();
        assert_eq!(
            sanitizer.clean(r#"<p style="color:red" onclick="x()">t</p>"#),
            "<p>t</p>"
        );
    }

    #[test]
    fn data_urls_are_allowed_on_images() {
        let sanitizer = Sanitizer::default();
        let html = r#"<img src="data:image/png;base64,AAAA">"#;
        assert_eq!(sanitizer.clean(html), html);
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(Sanitizer::default().clean("<p>a<!-- hidden -->b</p>"), "<p>ab</p>");
    }
}
