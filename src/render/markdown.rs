//! CommonMark to HTML.

use super::linkify;

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};

/// Parser options shared by rendering and reference rewriting.
pub(crate) fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_SMART_PUNCTUATION
}

/// Render Markdown to an unsanitized HTML fragment.
///
/// Raw HTML passes through, soft breaks become `<br />` and bare URLs outside
/// links, images and code become links.
pub fn to_html(markdown: &str) -> String {
    let parser = TextMergeStream::new(Parser::new_ext(markdown, options()));
    let events = Autolink::default().apply(parser.map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    }));

    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

/// Tracks where autolinking is not allowed.
#[derive(Default)]
struct Autolink {
    links: usize,
    images: usize,
    code_blocks: usize,
    raw_anchors: usize,
}

impl Autolink {
    fn apply<'a>(mut self, events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::new();
        for event in events {
            match &event {
                Event::Start(Tag::Link { .. }) => self.links += 1,
                Event::End(TagEnd::Link) => self.links = self.links.saturating_sub(1),
                Event::Start(Tag::Image { .. }) => self.images += 1,
                Event::End(TagEnd::Image) => self.images = self.images.saturating_sub(1),
                Event::Start(Tag::CodeBlock(_)) => self.code_blocks += 1,
                Event::End(TagEnd::CodeBlock) => {
                    self.code_blocks = self.code_blocks.saturating_sub(1)
                }
                Event::InlineHtml(raw) => self.track_raw_anchor(raw),
                Event::Text(text) if self.linkable() => {
                    split_links(text, &mut out);
                    continue;
                }
                _ => {}
            }
            out.push(event);
        }
        out
    }

    fn linkable(&self) -> bool {
        self.links == 0 && self.images == 0 && self.code_blocks == 0 && self.raw_anchors == 0
    }

    fn track_raw_anchor(&mut self, raw: &str) {
        let lower = raw.trim_start().to_ascii_lowercase();
        if lower.starts_with("</a") {
            self.raw_anchors = self.raw_anchors.saturating_sub(1);
        } else if lower.starts_with("<a ") || lower.starts_with("<a>") {
            self.raw_anchors += 1;
        }
    }
}

fn split_links<'a>(text: &CowStr<'a>, out: &mut Vec<Event<'a>>) {
    let spans = linkify::url_spans(text);
    if spans.is_empty() {
        out.push(Event::Text(text.clone()));
        return;
    }

    let mut last = 0;
    for span in spans {
        if span.start > last {
            out.push(Event::Text(text[last..span.start].to_string().into()));
        }
        let url: CowStr<'a> = text[span.clone()].to_string().into();
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: url.clone(),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(url));
        out.push(Event::End(TagEnd::Link));
        last = span.end;
    }
    if last < text.len() {
        out.push(Event::Text(text[last..].to_string().into()));
    }
}
