// Requirements documents: unwrapping, table of contents, rendering and
// embedded diagram recovery.

use std::collections::HashSet;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use crate::types::{DocumentUpdate, RequirementsDocument};

pub mod diagram;
pub mod render;
pub mod slug;

pub use diagram::{
    diagram_blocks, splice_lines, DiagramBlock, DiagramError, DiagramRenderer, DiagramState, DiagramView,
};
pub use render::render_html;
pub use slug::{slugify, SlugRegistry};

pub(crate) fn parser(markdown: &str) -> Parser<'_> {
    Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH)
}

// ── Unwrapping ───────────────────────────────────────────────────────

/// Strip a "heading + fenced markdown block" wrapper from a document.
///
/// Generators sometimes return the real document inside a single
/// ```` ```markdown ```` fence, optionally preceded by one heading and blank
/// lines. When the fence runs to the end of the document, its inner content
/// is returned; anything else comes back unchanged.
pub fn unwrap_markdown(document: &str) -> &str {
    unwrap_inner(document).unwrap_or(document)
}

fn unwrap_inner(document: &str) -> Option<&str> {
    let mut offset = 0;
    let mut seen_heading = false;
    let mut opening: Option<(char, usize)> = None;

    for line in document.split_inclusive('\n') {
        let trimmed = line.trim();
        offset += line.len();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') && !seen_heading {
            seen_heading = true;
            continue;
        }
        let (fence, len, info) = fence_parts(trimmed)?;
        let info = info.to_ascii_lowercase();
        if info != "markdown" && info != "md" {
            return None;
        }
        opening = Some((fence, len));
        break;
    }

    let (fence, open_len) = opening?;
    let body = &document[offset..];
    let body_trimmed = body.trim_end();
    let last_line_start = body_trimmed.rfind('\n').map(|index| index + 1).unwrap_or(0);
    let (close_fence, close_len, close_info) = fence_parts(body_trimmed[last_line_start..].trim())?;
    if close_fence != fence || close_len < open_len || !close_info.is_empty() {
        return None;
    }
    Some(&body[..last_line_start])
}

fn fence_parts(line: &str) -> Option<(char, usize, &str)> {
    let fence = line.chars().next().filter(|ch| *ch == '`' || *ch == '~')?;
    let len = line.chars().take_while(|ch| *ch == fence).count();
    if len < 3 {
        return None;
    }
    Some((fence, len, line[len..].trim()))
}

// ── Table of contents ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub id: String,
    pub title: String,
    pub level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOfContents {
    pub entries: Vec<TocEntry>,
}

impl TableOfContents {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top of the tree: level-1 entries, or the shallowest level when the
    /// document has no H1.
    pub fn roots(&self) -> Vec<usize> {
        let Some(min_level) = self.entries.iter().map(|entry| entry.level).min() else {
            return Vec::new();
        };
        let root_level = if min_level <= 1 { 1 } else { min_level };
        (0..self.entries.len()).filter(|index| self.entries[*index].level == root_level).collect()
    }

    /// Direct children of the entry at `index`: following entries one level
    /// deeper, up to the next entry at the same or a shallower level.
    pub fn children(&self, index: usize) -> Vec<usize> {
        let Some(parent) = self.entries.get(index) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for (offset, entry) in self.entries[index + 1..].iter().enumerate() {
            if entry.level <= parent.level {
                break;
            }
            if entry.level == parent.level + 1 {
                children.push(index + 1 + offset);
            }
        }
        children
    }

    /// Ids expanded when the document is first shown.
    pub fn default_expanded(&self) -> HashSet<String> {
        self.entries.iter().filter(|entry| entry.level == 1).map(|entry| entry.id.clone()).collect()
    }
}

/// ATX headings with their byte offsets, in document order.
pub(crate) fn heading_entries(markdown: &str) -> Vec<(usize, TocEntry)> {
    let mut registry = SlugRegistry::new();
    let mut entries = Vec::new();
    let mut current: Option<(usize, u8, String)> = None;

    for (event, range) in parser(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = is_atx_heading(markdown, range.start)
                    .then(|| (range.start, level_to_u8(level), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, title)) = current.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((start, level, title)) = current.take() {
                    let title = title.trim().to_string();
                    if !title.is_empty() {
                        let id = registry.unique(&title);
                        entries.push((start, TocEntry { id, title, level }));
                    }
                }
            }
            _ => {}
        }
    }

    entries
}

pub fn table_of_contents(markdown: &str) -> TableOfContents {
    TableOfContents { entries: heading_entries(markdown).into_iter().map(|(_, entry)| entry).collect() }
}

fn is_atx_heading(markdown: &str, offset: usize) -> bool {
    let line_start = markdown[..offset].rfind('\n').map(|index| index + 1).unwrap_or(0);
    markdown[line_start..].chars().find(|ch| !ch.is_whitespace()) == Some('#')
}

fn level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// ── Download name ────────────────────────────────────────────────────

/// File name for saving a document: `<slug>_requirements.md`.
///
/// The slug comes from the first H1 (the part after `:` when there is
/// one), then the project id, then `project`.
pub fn download_file_name(markdown: &str, project_id: &str) -> String {
    let title = markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| {
            let title = title.trim();
            let title = title.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or(title);
            title.chars().filter(|ch| !matches!(ch, '*' | '_' | '~' | '`')).collect::<String>()
        })
        .unwrap_or_default();

    let base = [slugify(&title), slugify(project_id)]
        .into_iter()
        .find(|slug| !slug.is_empty())
        .unwrap_or_else(|| "project".to_string());
    format!("{base}_requirements.md")
}

// ── View state ───────────────────────────────────────────────────────

/// A loaded requirements document and its navigation state.
#[derive(Debug, Clone)]
pub struct RequirementsView {
    document: RequirementsDocument,
    markdown: String,
    toc: TableOfContents,
    expanded: HashSet<String>,
}

impl RequirementsView {
    pub fn new(document: RequirementsDocument) -> Self {
        let markdown = unwrap_markdown(&document.content).to_string();
        let toc = table_of_contents(&markdown);
        let expanded = toc.default_expanded();
        Self { document, markdown, toc, expanded }
    }

    pub fn document(&self) -> &RequirementsDocument {
        &self.document
    }

    /// The unwrapped markdown.
    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
            return true;
        }
        false
    }

    pub fn render_html(&self) -> String {
        render_html(&self.markdown)
    }

    pub fn diagrams(&self) -> Vec<DiagramBlock> {
        diagram_blocks(&self.markdown)
    }

    pub fn download_file_name(&self, project_id: &str) -> String {
        download_file_name(&self.markdown, project_id)
    }

    /// Splice a repaired diagram back into the document.
    ///
    /// Returns the body for re-syncing the whole document with the backend.
    pub fn apply_diagram(&mut self, view: &DiagramView) -> Result<DocumentUpdate, DiagramError> {
        let block = view.block();
        self.markdown = splice_lines(&self.markdown, block.start_line, block.end_line, view.raw_source())?;
        self.document.content = self.markdown.clone();
        self.toc = table_of_contents(&self.markdown);
        self.expanded.retain(|id| self.toc.entries.iter().any(|entry| &entry.id == id));
        Ok(DocumentUpdate { content: self.markdown.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = "# Generated Requirements\n\n```markdown\n# Payroll: Business Requirements\n\n## Scope\n\n```mermaid\ngraph TD\n  A-->B\n```\n\n## Scope\n```\n\n";

    fn document(content: &str) -> RequirementsDocument {
        RequirementsDocument {
            id: Some("d1".into()),
            project_id: Some("7".into()),
            content: content.into(),
            created_at: None,
        }
    }

    #[test]
    fn unwraps_heading_and_markdown_fence() {
        let inner = unwrap_markdown(WRAPPED);
        assert!(inner.starts_with("# Payroll: Business Requirements\n"));
        assert!(inner.ends_with("## Scope\n"));
        assert!(inner.contains("```mermaid"));
    }

    #[test]
    fn leaves_ordinary_documents_alone() {
        let plain = "# Title\n\nBody\n\n```md\nnot a wrapper\n```\n\nMore text\n";
        assert_eq!(unwrap_markdown(plain), plain);
        assert_eq!(unwrap_markdown("```python\nprint()\n```\n"), "```python\nprint()\n```\n");
        assert_eq!(unwrap_markdown(""), "");
    }

    #[test]
    fn bare_fence_without_heading_unwraps() {
        assert_eq!(unwrap_markdown("```md\n# Inner\n```"), "# Inner\n");
    }

    #[test]
    fn wrapper_heading_is_absent_from_toc() {
        let view = RequirementsView::new(document(WRAPPED));
        let titles: Vec<&str> = view.toc().entries.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Payroll: Business Requirements", "Scope", "Scope"]);
        let ids: Vec<&str> = view.toc().entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["payroll-business-requirements", "scope", "scope-2"]);
    }

    #[test]
    fn toc_skips_code_fences_and_setext_headings() {
        let toc = table_of_contents("# Real\n\n```\n# Not a heading\n```\n\nTitle\n=====\n\n## Next\n#\n");
        let titles: Vec<&str> = toc.entries.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Real", "Next"]);
    }

    #[test]
    fn children_are_one_level_deeper_until_a_sibling() {
        let toc = table_of_contents("# A\n## A1\n### A1a\n## A2\n# B\n## B1\n");
        assert_eq!(toc.roots(), vec![0, 4]);
        assert_eq!(toc.children(0), vec![1, 3]);
        assert_eq!(toc.children(1), vec![2]);
        assert_eq!(toc.children(4), vec![5]);
        assert!(toc.children(2).is_empty());
        assert!(toc.children(42).is_empty());
    }

    #[test]
    fn roots_fall_back_to_shallowest_level() {
        let toc = table_of_contents("## One\n### Deep\n## Two\n");
        assert_eq!(toc.roots(), vec![0, 2]);
        assert!(toc.default_expanded().is_empty());
    }

    #[test]
    fn level_one_sections_start_expanded() {
        let mut view = RequirementsView::new(document("# A\n## A1\n# B\n"));
        assert!(view.is_expanded("a"));
        assert!(view.is_expanded("b"));
        assert!(!view.is_expanded("a1"));
        assert!(!view.toggle("a"));
        assert!(!view.is_expanded("a"));
        assert!(view.toggle("a1"));
    }

    #[test]
    fn download_name_uses_first_h1() {
        assert_eq!(
            download_file_name("intro\n# Project: **Payroll** Modernization\n# Other\n", "7"),
            "payroll-modernization_requirements.md"
        );
        assert_eq!(download_file_name("## No H1\n", "Proj 7"), "proj-7_requirements.md");
        assert_eq!(download_file_name("", ""), "project_requirements.md");
    }

    struct AcceptAll;

    impl DiagramRenderer for AcceptAll {
        fn render(&self, source: &str) -> Result<String, DiagramError> {
            Ok(source.to_string())
        }
    }

    #[test]
    fn applying_a_diagram_patch_resyncs_the_document() {
        let mut view = RequirementsView::new(document(WRAPPED));
        let block = view.diagrams().remove(0);
        let mut diagram = DiagramView::new(block, &AcceptAll);
        diagram.manual_edit("graph TD\n  A --- B", &AcceptAll);
        let update = view.apply_diagram(&diagram).unwrap();
        assert!(update.content.contains("  A --- B\n```"));
        assert!(!update.content.contains("A-->B"));
        assert_eq!(view.document().content, update.content);
        assert_eq!(view.toc().entries.len(), 3);
    }
}
