// `m204 requirements`: generate, read, export and repair the requirements
// document.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use m204_common::requirements::{DiagramError, DiagramState, DiagramView, RequirementsView, TableOfContents};
use m204_common::types::{DocumentUpdate, MermaidFixRequest, RequirementsDocument};

use super::{block_on, plural, Context};
use crate::client::ApiClient;
use crate::preflight::MermaidPreflight;

#[derive(Debug, Args)]
pub struct RequirementsArgs {
    #[command(subcommand)]
    command: RequirementsCommand,
}

#[derive(Debug, Subcommand)]
enum RequirementsCommand {
    /// Print the latest document as markdown
    Show { project_id: String },
    /// Generate a new document from the analyzed sources
    Generate { project_id: String },
    /// Print the heading outline
    Toc {
        project_id: String,
        /// Toggle a heading open or closed (repeatable)
        #[arg(long = "toggle", value_name = "HEADING_ID")]
        toggles: Vec<String>,
        /// Expand every heading
        #[arg(long)]
        all: bool,
    },
    /// Save the document as markdown
    Download {
        project_id: String,
        /// Defaults to `<title>_requirements.md` in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Render the document to HTML
    ExportHtml {
        project_id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check every embedded diagram
    Diagrams { project_id: String },
    /// Ask the backend to repair failing diagrams and save the result
    FixDiagrams { project_id: String },
    /// Replace one diagram's source by hand and save the result
    SetDiagram {
        project_id: String,
        /// Diagram index as listed by `m204 requirements diagrams`
        index: usize,
        /// File holding the new diagram source
        file: PathBuf,
    },
}

// ── Output shapes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TocNode {
    pub id: String,
    pub title: String,
    pub level: u8,
    pub expanded: bool,
    pub children: Vec<TocNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagramReport {
    pub index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub status: &'static str,
    pub detail: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairOutcome {
    pub fixed: Vec<usize>,
    pub still_failing: Vec<DiagramReport>,
    pub saved: bool,
    #[serde(skip)]
    pub update: Option<DocumentUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Saved {
    pub path: PathBuf,
    pub bytes: usize,
}

// ── Commands ───────────────────────────────────────────────────────

pub fn run(args: RequirementsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        RequirementsCommand::Show { project_id } => {
            let view = latest(ctx, &project_id)?;
            ctx.print(view.document(), |_| view.markdown().to_string())
        }
        RequirementsCommand::Generate { project_id } => {
            let client = ctx.client()?;
            let document = block_on(client.generate_requirements(&project_id))??;
            info!(project_id, document_id = ?document.id, "generated requirements");
            let view = RequirementsView::new(document);
            ctx.print(view.document(), |_| {
                format!(
                    "Generated requirements: {}, {}",
                    plural(view.toc().entries.len(), "heading"),
                    plural(view.diagrams().len(), "diagram")
                )
            })
        }
        RequirementsCommand::Toc { project_id, toggles, all } => {
            let mut view = latest(ctx, &project_id)?;
            for id in &toggles {
                if !view.toc().entries.iter().any(|entry| &entry.id == id) {
                    bail!("no heading with id `{id}`");
                }
                view.toggle(id);
            }
            let tree = toc_tree(view.toc(), |id| all || view.is_expanded(id));
            ctx.print(&tree, |tree| format_toc(tree))
        }
        RequirementsCommand::Download { project_id, output } => {
            let view = latest(ctx, &project_id)?;
            let path = output.unwrap_or_else(|| PathBuf::from(view.download_file_name(&project_id)));
            let saved = save(&path, view.markdown())?;
            ctx.print(&saved, format_saved)
        }
        RequirementsCommand::ExportHtml { project_id, output } => {
            let view = latest(ctx, &project_id)?;
            let html = view.render_html();
            match output {
                Some(path) => ctx.print(&save(&path, &html)?, format_saved),
                None => ctx.print(&serde_json::json!({ "html": &html }), |_| html.clone()),
            }
        }
        RequirementsCommand::Diagrams { project_id } => {
            let view = latest(ctx, &project_id)?;
            let reports: Vec<DiagramReport> = checked_diagrams(&view).iter().map(report).collect();
            ctx.print(&reports, |reports| format_diagrams(reports))
        }
        RequirementsCommand::FixDiagrams { project_id } => run_fix(ctx, &project_id),
        RequirementsCommand::SetDiagram { project_id, index, file } => run_set(ctx, &project_id, index, file),
    }
}

fn latest(ctx: &Context, project_id: &str) -> Result<RequirementsView> {
    let client = ctx.client()?;
    match block_on(client.latest_requirements(project_id))?? {
        Some(document) => Ok(RequirementsView::new(document)),
        None => bail!("project {project_id} has no requirements document yet; create one with: m204 requirements generate {project_id}"),
    }
}

fn document_id(document: &RequirementsDocument) -> Result<String> {
    document.id.clone().context("the requirements document has no id, so it cannot be saved")
}

fn save(path: &Path, content: &str) -> Result<Saved> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Saved { path: path.to_path_buf(), bytes: content.len() })
}

fn run_fix(ctx: &Context, project_id: &str) -> Result<()> {
    let mut view = latest(ctx, project_id)?;
    let doc_id = document_id(view.document())?;
    let client = ctx.client()?;
    let client = &client;
    let outcome = block_on(async {
        let mut outcome = repair(&mut view, move |request| fix_remotely(client, request)).await?;
        if let Some(update) = &outcome.update {
            client.update_requirements(project_id, &doc_id, update).await?;
            outcome.saved = true;
        }
        anyhow::Ok(outcome)
    })??;
    ctx.print(&outcome, format_repair)
}

async fn fix_remotely(client: &ApiClient, request: MermaidFixRequest) -> Result<String> {
    Ok(client.fix_mermaid(&request).await?.fixed_code)
}

fn run_set(ctx: &Context, project_id: &str, index: usize, file: PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let mut view = latest(ctx, project_id)?;
    let doc_id = document_id(view.document())?;
    let block = view
        .diagrams()
        .into_iter()
        .find(|block| block.index == index)
        .with_context(|| format!("no diagram {index}; the document has {}", plural(view.diagrams().len(), "diagram")))?;

    let mut diagram = DiagramView::new(block, &MermaidPreflight);
    if let DiagramState::Failed { error } = diagram.manual_edit(source, &MermaidPreflight) {
        bail!(DiagramError::Render(error.clone()));
    }
    let update = view.apply_diagram(&diagram)?;
    let client = ctx.client()?;
    block_on(client.update_requirements(project_id, &doc_id, &update))??;
    ctx.print(&report(&diagram), |report| format!("Saved diagram {}: {}", report.index, report.detail))
}

// ── Diagram repair ─────────────────────────────────────────────────

fn checked_diagrams(view: &RequirementsView) -> Vec<DiagramView> {
    view.diagrams().into_iter().map(|block| DiagramView::new(block, &MermaidPreflight)).collect()
}

/// Send each failing diagram to `fix`, last block first so earlier line
/// ranges stay valid while fixed blocks are spliced in.
async fn repair<F, Fut>(view: &mut RequirementsView, mut fix: F) -> Result<RepairOutcome>
where
    F: FnMut(MermaidFixRequest) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut outcome = RepairOutcome::default();
    let mut diagrams = checked_diagrams(view);
    diagrams.retain(DiagramView::is_failed);

    for mut diagram in diagrams.into_iter().rev() {
        let request = diagram.begin_auto_fix()?;
        match fix(request).await {
            Ok(fixed) => {
                diagram.apply_fix(&fixed, &MermaidPreflight)?;
            }
            Err(error) => {
                warn!(index = diagram.block().index, error = %format!("{error:#}"), "diagram auto-fix failed");
                diagram.fail_fix(&format!("{error:#}"))?;
            }
        }
        if diagram.is_failed() {
            outcome.still_failing.push(report(&diagram));
        } else {
            outcome.update = Some(view.apply_diagram(&diagram)?);
            outcome.fixed.push(diagram.block().index);
        }
    }

    outcome.fixed.reverse();
    outcome.still_failing.reverse();
    Ok(outcome)
}

fn report(diagram: &DiagramView) -> DiagramReport {
    let block = diagram.block();
    let (status, detail) = match diagram.state() {
        DiagramState::Rendered { output } => ("rendered", output.clone()),
        DiagramState::Failed { error } => ("failed", error.clone()),
        DiagramState::Fixing { error } => ("fixing", error.clone()),
    };
    DiagramReport {
        index: block.index,
        start_line: block.start_line,
        end_line: block.end_line,
        status,
        detail,
        source: diagram.raw_source().to_string(),
    }
}

// ── Outline ────────────────────────────────────────────────────────

fn toc_tree(toc: &TableOfContents, expanded: impl Fn(&str) -> bool + Copy) -> Vec<TocNode> {
    toc.roots().into_iter().map(|index| toc_node(toc, index, expanded)).collect()
}

fn toc_node(toc: &TableOfContents, index: usize, expanded: impl Fn(&str) -> bool + Copy) -> TocNode {
    let entry = &toc.entries[index];
    let is_open = expanded(&entry.id);
    let children = if is_open {
        toc.children(index).into_iter().map(|child| toc_node(toc, child, expanded)).collect()
    } else {
        Vec::new()
    };
    TocNode { id: entry.id.clone(), title: entry.title.clone(), level: entry.level, expanded: is_open, children }
}

// ── Human output ───────────────────────────────────────────────────

fn format_toc(tree: &[TocNode]) -> String {
    fn walk(node: &TocNode, depth: usize, lines: &mut Vec<String>) {
        let marker = if node.expanded { "▾" } else { "▸" };
        lines.push(format!("{}{marker} {}  #{}", "  ".repeat(depth), node.title, node.id));
        for child in &node.children {
            walk(child, depth + 1, lines);
        }
    }
    if tree.is_empty() {
        return "The document has no headings.".into();
    }
    let mut lines = Vec::new();
    for node in tree {
        walk(node, 0, &mut lines);
    }
    lines.join("\n")
}

fn format_diagrams(reports: &[DiagramReport]) -> String {
    if reports.is_empty() {
        return "The document has no diagrams.".into();
    }
    let failing = reports.iter().filter(|report| report.status == "failed").count();
    let mut lines = vec![format!("{}, {failing} failing", plural(reports.len(), "diagram"))];
    for report in reports {
        lines.push(format!(
            "  [{}] lines {}-{}: {} {}",
            report.index, report.start_line, report.end_line, report.status, report.detail
        ));
    }
    if failing > 0 {
        lines.push("Repair with: m204 requirements fix-diagrams <PROJECT>".into());
    }
    lines.join("\n")
}

fn format_repair(outcome: &RepairOutcome) -> String {
    if outcome.fixed.is_empty() && outcome.still_failing.is_empty() {
        return "No failing diagrams.".into();
    }
    let mut lines = Vec::new();
    if !outcome.fixed.is_empty() {
        let indexes: Vec<String> = outcome.fixed.iter().map(ToString::to_string).collect();
        let saved = if outcome.saved { ", document saved" } else { "" };
        lines.push(format!("Fixed {}: {}{saved}", plural(outcome.fixed.len(), "diagram"), indexes.join(", ")));
    }
    for report in &outcome.still_failing {
        lines.push(format!("  [{}] still failing: {}", report.index, report.detail));
    }
    lines.join("\n")
}

fn format_saved(saved: &Saved) -> String {
    format!("Wrote {} bytes to {}", saved.bytes, saved.path.display())
}
