use std::collections::HashMap;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Tag, TagEnd};

use super::diagram::is_mermaid;
use super::{heading_entries, parser};

/// Render markdown to HTML.
///
/// Headings get the same `id` anchors as the table of contents, and fenced
/// `mermaid` blocks become `<pre class="mermaid">` containers for a client
/// side diagram renderer.
pub fn render_html(markdown: &str) -> String {
    let anchors: HashMap<usize, String> =
        heading_entries(markdown).into_iter().map(|(offset, entry)| (offset, entry.id)).collect();

    let mut events = Vec::new();
    let mut diagram: Option<String> = None;

    for (event, range) in parser(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, id: _, classes, attrs }) => {
                let id = anchors.get(&range.start).map(|anchor| CowStr::from(anchor.clone()));
                events.push(Event::Start(Tag::Heading { level, id, classes, attrs }));
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if is_mermaid(&info) => {
                diagram = Some(String::new());
            }
            Event::Text(text) if diagram.is_some() => {
                if let Some(source) = diagram.as_mut() {
                    source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) if diagram.is_some() => {
                if let Some(source) = diagram.take() {
                    events.push(Event::Html(CowStr::Borrowed("<pre class=\"mermaid\">")));
                    events.push(Event::Text(CowStr::from(source)));
                    events.push(Event::Html(CowStr::Borrowed("</pre>\n")));
                }
            }
            other => events.push(other),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}
