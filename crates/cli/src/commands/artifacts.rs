// `m204 artifacts`: generate, browse, download and zip COBOL, JCL and
// unit-test artifacts, with a local cache in front of generation.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use m204_common::artifacts::{cache_key, flatten, zip_file_name, Artifact, ArtifactKind, ArtifactsView, CacheEntry};
use m204_common::nav::display_name;

use super::{block_on, cell, plural, Context};
use crate::archive::{file_name_component, write_zip_file};
use crate::cache::ArtifactCache;
use crate::client::ApiClient;

#[derive(Debug, Args)]
pub struct ArtifactsArgs {
    #[command(subcommand)]
    command: ArtifactsCommand,
}

#[derive(Debug, Subcommand)]
enum ArtifactsCommand {
    /// List artifacts one tab and page at a time
    List {
        project_id: String,
        /// cobol, jcl or unit-test; defaults to the first tab with artifacts
        #[arg(long, conflicts_with = "all")]
        tab: Option<ArtifactKind>,
        /// List every kind together
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Print one artifact
    Show {
        project_id: String,
        /// Artifact id or file name
        artifact: String,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Save one artifact with its exact content
    Download {
        project_id: String,
        artifact: String,
        /// Defaults to the artifact's file name in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Save every artifact into one zip archive
    Zip {
        project_id: String,
        /// Defaults to `<project>_artifacts.zip` in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Drop cached artifacts for one project, or for every project
    ClearCache { project_id: Option<String> },
}

#[derive(Debug, Clone, Copy, Args)]
struct FetchArgs {
    /// Regenerate even when a cached copy exists
    #[arg(long)]
    refresh: bool,
}

/// Artifacts for one project and where they came from.
#[derive(Debug, Clone)]
struct Loaded {
    project_name: Option<String>,
    artifacts: Vec<Artifact>,
    cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub size: String,
    pub source: String,
    pub description: String,
}

impl From<&Artifact> for ArtifactSummary {
    fn from(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id.clone(),
            name: artifact.name.clone(),
            kind: artifact.kind,
            size: artifact.size.clone(),
            source: artifact.source.clone(),
            description: artifact.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPage {
    pub project: String,
    pub cached_at: Option<DateTime<Utc>>,
    pub tabs: Vec<ArtifactKind>,
    pub tab: Option<ArtifactKind>,
    pub page: usize,
    pub total_pages: usize,
    pub in_tab: usize,
    pub total: usize,
    pub artifacts: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Written {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: usize,
}

pub fn run(args: ArtifactsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ArtifactsCommand::List { project_id, tab, all, page, fetch } => {
            let loaded = load(ctx, &project_id, fetch.refresh)?;
            let selection = if all { Selection::All } else { Selection::Tab(tab) };
            let page = build_page(&project_id, loaded, selection, page)?;
            ctx.print(&page, format_page)
        }
        ArtifactsCommand::Show { project_id, artifact, fetch } => {
            let loaded = load(ctx, &project_id, fetch.refresh)?;
            let found = find(&loaded.artifacts, &artifact)?;
            ctx.print(found, |artifact| artifact.content.clone())
        }
        ArtifactsCommand::Download { project_id, artifact, output, fetch } => {
            let loaded = load(ctx, &project_id, fetch.refresh)?;
            let found = find(&loaded.artifacts, &artifact)?;
            let path = match output {
                Some(path) => path,
                None => file_name_component(&found.name)
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("artifact name `{}` is not a file name; pass --output", found.name))?,
            };
            std::fs::write(&path, found.content.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            let written = Written { path, files: 1, bytes: found.content.len() };
            ctx.print(&written, format_written)
        }
        ArtifactsCommand::Zip { project_id, output, fetch } => {
            let loaded = load(ctx, &project_id, fetch.refresh)?;
            if loaded.artifacts.is_empty() {
                bail!("project {project_id} has no artifacts to archive");
            }
            let path = output
                .unwrap_or_else(|| PathBuf::from(zip_file_name(loaded.project_name.as_deref(), &project_id)));
            write_zip_file(&path, &loaded.artifacts).context("failed to create the artifacts zip")?;
            let bytes = loaded.artifacts.iter().map(|artifact| artifact.content.len()).sum();
            info!(path = %path.display(), files = loaded.artifacts.len(), "wrote artifacts zip");
            let written = Written { path, files: loaded.artifacts.len(), bytes };
            ctx.print(&written, format_written)
        }
        ArtifactsCommand::ClearCache { project_id } => run_clear(ctx, project_id),
    }
}

// ── Loading ────────────────────────────────────────────────────────

/// Cached artifacts when present, otherwise a fresh generation that is then
/// cached. `refresh` skips the cache read but still writes.
fn load(ctx: &Context, project_id: &str, refresh: bool) -> Result<Loaded> {
    let client = ctx.client()?;
    let cache = ctx.cache();
    block_on(load_with(&client, &cache, project_id, refresh))?
}

async fn project_name(client: &ApiClient, project_id: &str) -> Option<String> {
    match client.get_project(project_id).await {
        Ok(project) => Some(project.name).filter(|name| !name.trim().is_empty()),
        Err(error) => {
            warn!(project_id, error = %format!("{error:#}"), "project lookup failed; naming cache by id");
            None
        }
    }
}

async fn load_with(client: &ApiClient, cache: &ArtifactCache, project_id: &str, refresh: bool) -> Result<Loaded> {
    let project_name = project_name(client, project_id).await;
    let key = cache_key(project_name.as_deref(), project_id);

    if !refresh {
        if let Some(entry) = cache.load(&key) {
            return Ok(Loaded { project_name, artifacts: entry.artifacts, cached_at: Some(entry.timestamp) });
        }
    }

    let artifacts = flatten(client.generate_artifacts(project_id).await?);
    debug!(project_id, artifacts = artifacts.len(), "generated artifacts");
    if !artifacts.is_empty() {
        cache.store(&key, &CacheEntry::new(artifacts.clone(), Utc::now()));
    }
    Ok(Loaded { project_name, artifacts, cached_at: None })
}

fn run_clear(ctx: &Context, project_id: Option<String>) -> Result<()> {
    let cache = ctx.cache();
    let removed = match &project_id {
        Some(project_id) => {
            let client = ctx.client()?;
            let name = block_on(project_name(&client, project_id))?;
            usize::from(cache.remove(&cache_key(name.as_deref(), project_id))?)
        }
        None => cache.clear()?,
    };
    let cleared = serde_json::json!({ "project_id": &project_id, "removed": removed });
    ctx.print(&cleared, |_| match &project_id {
        Some(project_id) if removed == 0 => format!("No cached artifacts for project {project_id}"),
        Some(project_id) => format!("Cleared cached artifacts for project {project_id}"),
        None => format!("Cleared {}", plural(removed, "cache entry")),
    })
}

// ── Views ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    All,
    Tab(Option<ArtifactKind>),
}

fn build_page(project_id: &str, loaded: Loaded, selection: Selection, page: usize) -> Result<ArtifactPage> {
    let total = loaded.artifacts.len();
    let mut view = ArtifactsView::new(loaded.artifacts);
    match selection {
        Selection::All => {
            view.select_tab(None);
        }
        Selection::Tab(Some(kind)) => {
            if !view.select_tab(Some(kind)) {
                let available: Vec<String> = view.tabs().iter().map(ToString::to_string).collect();
                bail!("no {kind} artifacts; available tabs: {}", if available.is_empty() { "none".into() } else { available.join(", ") });
            }
        }
        Selection::Tab(None) => {}
    }
    if !view.go_to_page(page) {
        bail!("page {page} is out of range (1-{})", view.total_pages());
    }

    let project = match loaded.project_name.as_deref() {
        Some(name) => name.to_string(),
        None => display_name(project_id, None),
    };
    Ok(ArtifactPage {
        project,
        cached_at: loaded.cached_at,
        tabs: view.tabs().to_vec(),
        tab: view.active_tab(),
        page: view.pager().current_page(),
        total_pages: view.total_pages(),
        in_tab: view.in_tab().len(),
        total,
        artifacts: view.current_page().into_iter().map(ArtifactSummary::from).collect(),
    })
}

fn find<'a>(artifacts: &'a [Artifact], key: &str) -> Result<&'a Artifact> {
    artifacts
        .iter()
        .find(|artifact| artifact.id == key)
        .or_else(|| artifacts.iter().find(|artifact| artifact.name == key))
        .with_context(|| format!("no artifact `{key}`; list them with: m204 artifacts list <PROJECT> --all"))
}

fn format_page(page: &ArtifactPage) -> String {
    if page.total == 0 {
        return format!("No artifacts for {}. Analyze the project's files first.", page.project);
    }
    let tab = page.tab.map(|kind| kind.label()).unwrap_or("All");
    let origin = match page.cached_at {
        Some(at) => format!("cached {}", at.format("%Y-%m-%d %H:%M")),
        None => "freshly generated".into(),
    };
    let mut lines = vec![format!(
        "{}: {} ({origin})",
        page.project,
        plural(page.total, "artifact")
    )];
    let tabs: Vec<String> = page
        .tabs
        .iter()
        .map(|kind| if Some(*kind) == page.tab { format!("[{kind}]") } else { kind.to_string() })
        .collect();
    if !tabs.is_empty() {
        lines.push(format!("Tabs: {}", tabs.join("  ")));
    }
    lines.push(format!("{tab}: {} of {}, page {} of {}", page.artifacts.len(), page.in_tab, page.page, page.total_pages));
    for artifact in &page.artifacts {
        lines.push(format!(
            "  {} {} {} {}",
            cell(&artifact.name, 28),
            cell(artifact.kind.label(), 10),
            cell(&artifact.size, 10),
            artifact.source
        ));
    }
    lines.join("\n")
}

fn format_written(written: &Written) -> String {
    format!("Wrote {} ({} bytes) to {}", plural(written.files, "file"), written.bytes, written.path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use m204_common::artifacts::GeneratedSource;
    use serde_json::json;

    fn generated() -> Vec<Artifact> {
        let sources: Vec<GeneratedSource> = serde_json::from_value(json!([
            {
                "input_source_original_filename": "PAYROLL.M204",
                "generated_files": [
                    { "file_name": "PAYROLL.cbl", "artifact_type": "cobol", "content": "       IDENTIFICATION DIVISION.\n" },
                    { "file_name": "PAYROLL.jcl", "artifact_type": "jcl_compile", "content": "//PAYROLL JOB\n" },
                    { "file_name": "PAYROLL_test.cbl", "artifact_type": "unit_test", "content": "" }
                ]
            },
            {
                "input_source_original_filename": "INVOICE.M204",
                "generated_files": [
                    { "file_name": "INVOICE.cbl", "artifact_type": "cobol", "content": "       PROGRAM-ID. INVOICE.\n" }
                ]
            }
        ]))
        .unwrap();
        flatten(sources)
    }

    fn loaded(artifacts: Vec<Artifact>) -> Loaded {
        Loaded { project_name: Some("Payroll".into()), artifacts, cached_at: None }
    }

    #[test]
    fn default_tab_is_the_first_with_artifacts() {
        let page = build_page("7", loaded(generated()), Selection::Tab(None), 1).unwrap();
        assert_eq!(page.tab, Some(ArtifactKind::Cobol));
        assert_eq!(page.tabs, vec![ArtifactKind::Cobol, ArtifactKind::Jcl, ArtifactKind::UnitTest]);
        assert_eq!(page.in_tab, 2);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn selects_tabs_or_everything() {
        let page = build_page("7", loaded(generated()), Selection::Tab(Some(ArtifactKind::Jcl)), 1).unwrap();
        assert_eq!(page.artifacts[0].name, "PAYROLL.jcl");

        let page = build_page("7", loaded(generated()), Selection::All, 1).unwrap();
        assert_eq!(page.tab, None);
        assert_eq!(page.artifacts.len(), 4);
    }

    #[test]
    fn missing_tab_and_page_are_errors() {
        let cobol_only: Vec<_> = generated().into_iter().filter(|a| a.kind == ArtifactKind::Cobol).collect();
        let err = build_page("7", loaded(cobol_only), Selection::Tab(Some(ArtifactKind::Jcl)), 1).unwrap_err();
        assert_eq!(err.to_string(), "no JCL artifacts; available tabs: COBOL");
        assert!(build_page("7", loaded(generated()), Selection::All, 2).is_err());
    }

    #[test]
    fn finds_by_id_or_name() {
        let artifacts = generated();
        assert_eq!(find(&artifacts, "INVOICE.M204_INVOICE.cbl").unwrap().name, "INVOICE.cbl");
        assert_eq!(find(&artifacts, "PAYROLL.jcl").unwrap().source, "PAYROLL.M204");
        assert!(find(&artifacts, "nope").is_err());
    }

    #[test]
    fn human_page() {
        let page = build_page("7", loaded(generated()), Selection::Tab(None), 1).unwrap();
        let output = format_page(&page);
        assert!(output.starts_with("Payroll: 4 artifact(s) (freshly generated)"));
        assert!(output.contains("Tabs: [COBOL]  JCL  Unit Tests"));
        assert!(output.contains("COBOL: 2 of 2, page 1 of 1"));

        let unnamed = Loaded { project_name: None, artifacts: Vec::new(), cached_at: None };
        let empty = build_page("9", unnamed, Selection::Tab(None), 1).unwrap();
        assert_eq!(format_page(&empty), "No artifacts for Project ID: 9. Analyze the project's files first.");
    }
}
