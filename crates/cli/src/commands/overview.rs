// `m204 overview`: one-screen summary of a project.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::warn;

use m204_common::artifacts::cache_key;
use m204_common::inventory::InventoryTab;
use m204_common::nav::{display_name, Section};
use m204_common::requirements::RequirementsView;
use m204_common::source_files::{format_file_size, SourceFilesView, SOURCE_FILES_PER_PAGE};
use m204_common::types::{Project, ProjectStatus};

use super::{block_on, cell, plural, Context};
use crate::client::ApiClient;

#[derive(Debug, Args)]
pub struct OverviewArgs {
    project_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub project_id: String,
    pub display_name: String,
    pub status: Option<ProjectStatus>,
    pub description: String,
    pub files: FileSummary,
    /// Item count per inventory tab; `None` when the tab could not be loaded.
    pub inventory: BTreeMap<&'static str, Option<usize>>,
    pub requirements: Option<RequirementsSummary>,
    pub cached_artifacts: Option<usize>,
    pub sections: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub count: usize,
    pub total_size: u64,
    pub by_status: BTreeMap<&'static str, usize>,
    pub all_analyzed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementsSummary {
    pub document_id: Option<String>,
    pub headings: usize,
    pub diagrams: usize,
}

pub fn run(args: OverviewArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let overview = block_on(collect(&client, &args.project_id, ctx))??;
    ctx.print(&overview, format_human)
}

async fn collect(client: &ApiClient, project_id: &str, ctx: &Context) -> Result<Overview> {
    // The header falls back to the id, so a failed lookup is not fatal.
    let project = match client.get_project(project_id).await {
        Ok(project) => Some(project),
        Err(error) => {
            warn!(project_id, error = %format!("{error:#}"), "project lookup failed");
            None
        }
    };

    let files = SourceFilesView::new(client.list_source_files(project_id).await?, SOURCE_FILES_PER_PAGE);

    let mut inventory = BTreeMap::new();
    for tab in InventoryTab::ALL {
        let count = match client.list_inventory(project_id, tab).await {
            Ok(items) => Some(items.len()),
            Err(error) => {
                warn!(tab = %tab, error = %format!("{error:#}"), "inventory tab unavailable");
                None
            }
        };
        inventory.insert(tab.as_str(), count);
    }

    let requirements = client.latest_requirements(project_id).await?.map(|document| {
        let view = RequirementsView::new(document);
        RequirementsSummary {
            document_id: view.document().id.clone(),
            headings: view.toc().entries.len(),
            diagrams: view.diagrams().len(),
        }
    });

    let cached_artifacts = ctx
        .cache()
        .load(&cache_key(project.as_ref().map(|project| project.name.as_str()), project_id))
        .map(|entry| entry.artifacts.len());

    Ok(summarize(project_id, project.as_ref(), &files, inventory, requirements, cached_artifacts))
}

fn summarize(
    project_id: &str,
    project: Option<&Project>,
    files: &SourceFilesView,
    inventory: BTreeMap<&'static str, Option<usize>>,
    requirements: Option<RequirementsSummary>,
    cached_artifacts: Option<usize>,
) -> Overview {
    Overview {
        project_id: project_id.to_string(),
        display_name: display_name(project_id, project),
        status: project.and_then(|project| project.status),
        description: project.map(|project| project.description.clone()).unwrap_or_default(),
        files: FileSummary {
            count: files.files().len(),
            total_size: files.total_size(),
            by_status: files.status_counts(),
            all_analyzed: files.all_settled(),
        },
        inventory,
        requirements,
        cached_artifacts,
        sections: Section::ALL.into_iter().map(|section| (section.label(), section.route(project_id))).collect(),
    }
}

fn format_human(overview: &Overview) -> String {
    let mut lines = vec![overview.display_name.clone()];
    if let Some(status) = overview.status {
        lines.push(format!("  status: {status}"));
    }
    if !overview.description.is_empty() {
        lines.push(format!("  {}", overview.description));
    }

    let files = &overview.files;
    lines.push(String::new());
    lines.push(format!("Source files: {} ({})", plural(files.count, "file"), format_file_size(files.total_size)));
    for (status, count) in &files.by_status {
        lines.push(format!("  {} {count}", cell(status, 10)));
    }

    lines.push(String::new());
    lines.push("Inventory:".into());
    for tab in InventoryTab::ALL {
        let count = match overview.inventory.get(tab.as_str()).copied().flatten() {
            Some(count) => count.to_string(),
            None => "unavailable".into(),
        };
        lines.push(format!("  {} {count}", cell(tab.label(), 18)));
    }

    lines.push(String::new());
    lines.push(match &overview.requirements {
        Some(summary) => format!(
            "Requirements: {}, {}",
            plural(summary.headings, "heading"),
            plural(summary.diagrams, "diagram")
        ),
        None => "Requirements: not generated yet".into(),
    });
    lines.push(match overview.cached_artifacts {
        Some(count) => format!("Artifacts: {} cached", plural(count, "file")),
        None => "Artifacts: none cached".into(),
    });
    lines.join("\n")
}
