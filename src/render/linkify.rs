//! Bare URL detection and linking.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).expect("URL regex should compile"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex should compile"));

/// Elements whose text is never linked.
const SKIP_ELEMENTS: &[&str] = &["a", "pre", "code"];

/// Byte ranges of URLs in text, without trailing sentence punctuation.
pub fn url_spans(text: &str) -> Vec<Range<usize>> {
    URL_REGEX
        .find_iter(text)
        .filter_map(|m| {
            let end = m.start() + url_len(m.as_str());
            let url = &text[m.start()..end];
            // A scheme alone is not a link.
            url.split_once("://")
                .is_some_and(|(_, rest)| !rest.is_empty())
                .then_some(m.start()..end)
        })
        .collect()
}

/// Length of the URL at the start of `raw`. Entities for markup characters
/// end it; trailing punctuation and unbalanced closing parentheses are
/// dropped.
fn url_len(raw: &str) -> usize {
    let mut end = ["&lt;", "&gt;", "&quot;"]
        .iter()
        .filter_map(|entity| raw.find(entity))
        .min()
        .unwrap_or(raw.len());
    while let Some(last) = raw[..end].chars().last() {
        let unbalanced_paren = last == ')'
            && raw[..end].matches(')').count() > raw[..end].matches('(').count();
        if matches!(last, '.' | ',' | ';' | ':' | '!' | '?') || unbalanced_paren {
            end -= last.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Wrap bare URLs in text nodes of an HTML fragment with anchors.
///
/// Text inside `a`, `pre` and `code` elements is left alone. The fragment is
/// expected to be serializer output, so text is already entity-escaped.
pub fn linkify_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut skip_depth = 0usize;
    let mut last = 0;

    for tag in TAG_REGEX.find_iter(html) {
        push_text(&mut out, &html[last..tag.start()], skip_depth == 0);
        out.push_str(tag.as_str());
        last = tag.end();

        if let Some((name, closing)) = tag_name(tag.as_str()) {
            if SKIP_ELEMENTS.contains(&name.as_str()) {
                if closing {
                    skip_depth = skip_depth.saturating_sub(1);
                } else {
                    skip_depth += 1;
                }
            }
        }
    }
    push_text(&mut out, &html[last..], skip_depth == 0);
    out
}

fn tag_name(tag: &str) -> Option<(String, bool)> {
    let inner = tag.strip_prefix('<')?;
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (!name.is_empty()).then_some((name, closing))
}

fn push_text(out: &mut String, text: &str, link: bool) {
    if !link {
        out.push_str(text);
        return;
    }
    let mut last = 0;
    for span in url_spans(text) {
        let url = &text[span.clone()];
        out.push_str(&text[last..span.start]);
        out.push_str(&format!(r#"<a href="{url}" rel="nofollow">{url}</a>"#));
        last = span.end;
    }
    out.push_str(&text[last..]);
}
