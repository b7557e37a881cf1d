// Embedded diagram blocks and the per-block render/repair state machine.
//
// A failing diagram never affects the rest of the document: each block owns
// its state, and only an explicit splice writes a change back.

use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::parser;
use crate::types::MermaidFixRequest;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("diagram failed to render: {0}")]
    Render(String),

    #[error("line range {start}..={end} is outside the document ({len} lines)")]
    LineRange { start: usize, end: usize, len: usize },

    #[error("diagram is not in a failed state")]
    NotFailed,

    #[error("no auto-fix is in progress")]
    NotFixing,
}

/// Renders diagram source into displayable output.
pub trait DiagramRenderer {
    fn render(&self, source: &str) -> Result<String, DiagramError>;
}

/// A fenced `mermaid` block; lines are 1-based and cover the inner source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramBlock {
    pub index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub source: String,
}

pub(crate) fn is_mermaid(info: &str) -> bool {
    info.split_whitespace().next().is_some_and(|lang| lang.eq_ignore_ascii_case("mermaid"))
}

pub fn diagram_blocks(markdown: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (event, range) in parser(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if is_mermaid(&info) => {
                let fence_line = line_number_for_offset(markdown, range.start);
                current = Some((fence_line + 1, String::new()));
            }
            Event::Text(text) => {
                if let Some((_, source)) = current.as_mut() {
                    source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((start_line, source)) = current.take() {
                    let line_count = source.lines().count();
                    blocks.push(DiagramBlock {
                        index: blocks.len(),
                        start_line,
                        end_line: start_line + line_count - 1,
                        source,
                    });
                }
            }
            _ => {}
        }
    }

    blocks
}

fn line_number_for_offset(markdown: &str, offset: usize) -> usize {
    markdown[..offset].bytes().filter(|byte| *byte == b'\n').count() + 1
}

/// Replace lines `start_line..=end_line` (1-based) of `document`.
///
/// `end_line == start_line - 1` inserts before `start_line`. The document's
/// trailing newline, if any, is kept.
pub fn splice_lines(
    document: &str,
    start_line: usize,
    end_line: usize,
    replacement: &str,
) -> Result<String, DiagramError> {
    let trailing_newline = document.ends_with('\n');
    let body = document.strip_suffix('\n').unwrap_or(document);
    let mut lines: Vec<&str> = if body.is_empty() && !trailing_newline { Vec::new() } else { body.split('\n').collect() };

    if start_line == 0 || end_line + 1 < start_line || end_line > lines.len() {
        return Err(DiagramError::LineRange { start: start_line, end: end_line, len: lines.len() });
    }

    let replacement = replacement.strip_suffix('\n').unwrap_or(replacement);
    let new_lines: Vec<&str> = if replacement.is_empty() { Vec::new() } else { replacement.split('\n').collect() };
    lines.splice(start_line - 1..end_line, new_lines);

    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramState {
    Rendered { output: String },
    Failed { error: String },
    Fixing { error: String },
}

/// One diagram's render state and working source.
#[derive(Debug, Clone)]
pub struct DiagramView {
    block: DiagramBlock,
    source: String,
    state: DiagramState,
}

impl DiagramView {
    pub fn new(block: DiagramBlock, renderer: &dyn DiagramRenderer) -> Self {
        let source = block.source.clone();
        let state = render_state(renderer, &source);
        Self { block, source, state }
    }

    pub fn block(&self) -> &DiagramBlock {
        &self.block
    }

    pub fn state(&self) -> &DiagramState {
        &self.state
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, DiagramState::Failed { .. })
    }

    /// Whether the working source differs from the document's.
    pub fn is_modified(&self) -> bool {
        self.source != self.block.source
    }

    /// Source to copy out, as currently edited.
    pub fn raw_source(&self) -> &str {
        &self.source
    }

    /// Render the current source again, unchanged.
    pub fn retry(&mut self, renderer: &dyn DiagramRenderer) -> &DiagramState {
        self.state = render_state(renderer, &self.source);
        &self.state
    }

    pub fn manual_edit(&mut self, source: impl Into<String>, renderer: &dyn DiagramRenderer) -> &DiagramState {
        self.source = source.into();
        self.retry(renderer)
    }

    /// Ask for a repair of the failing source.
    pub fn begin_auto_fix(&mut self) -> Result<MermaidFixRequest, DiagramError> {
        let DiagramState::Failed { error } = &self.state else {
            return Err(DiagramError::NotFailed);
        };
        let request = MermaidFixRequest { mermaid_code: self.source.clone(), error_message: error.clone() };
        self.state = DiagramState::Fixing { error: error.clone() };
        Ok(request)
    }

    pub fn apply_fix(&mut self, fixed: &str, renderer: &dyn DiagramRenderer) -> Result<&DiagramState, DiagramError> {
        if !matches!(self.state, DiagramState::Fixing { .. }) {
            return Err(DiagramError::NotFixing);
        }
        Ok(self.manual_edit(fixed, renderer))
    }

    /// Give up on an auto-fix; the block stays failed with both messages.
    pub fn fail_fix(&mut self, message: &str) -> Result<(), DiagramError> {
        let DiagramState::Fixing { error } = &self.state else {
            return Err(DiagramError::NotFixing);
        };
        self.state = DiagramState::Failed { error: format!("{error} (auto-fix failed: {message})") };
        Ok(())
    }

    /// Write the working source back into `document` at the block's lines.
    pub fn splice_into(&self, document: &str) -> Result<String, DiagramError> {
        splice_lines(document, self.block.start_line, self.block.end_line, &self.source)
    }
}

fn render_state(renderer: &dyn DiagramRenderer, source: &str) -> DiagramState {
    match renderer.render(source) {
        Ok(output) => DiagramState::Rendered { output },
        Err(DiagramError::Render(error)) => DiagramState::Failed { error },
        Err(other) => DiagramState::Failed { error: other.to_string() },
    }
}
