// `m204 projects`: list, show, create and delete projects.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use m204_common::dashboard::{validate_new_project, Dashboard, ProjectSort};
use m204_common::nav::{display_name, Section};
use m204_common::types::Project;

use super::{block_on, cell, confirm, plural, Context};

#[derive(Debug, Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    command: ProjectsCommand,
}

#[derive(Debug, Subcommand)]
enum ProjectsCommand {
    /// List projects one page at a time
    List(ListArgs),
    /// Show one project
    Show {
        project_id: String,
    },
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
    },
    /// Delete a project
    Delete {
        project_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Case-insensitive match on name or description
    #[arg(long, default_value = "")]
    search: String,
    /// newest, oldest, name-asc or name-desc
    #[arg(long, default_value = "newest")]
    sort: ProjectSort,
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPage {
    pub page: usize,
    pub total_pages: usize,
    pub matching: usize,
    pub search: String,
    pub sort: ProjectSort,
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub display_name: String,
    pub project: Project,
    pub sections: Vec<SectionLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionLink {
    pub section: String,
    pub route: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub deleted: String,
}

pub fn run(args: ProjectsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ProjectsCommand::List(list) => run_list(list, ctx),
        ProjectsCommand::Show { project_id } => {
            let client = ctx.client()?;
            let project = block_on(client.get_project(&project_id))??;
            ctx.print(&detail(project), format_detail)
        }
        ProjectsCommand::Create { name, description } => {
            let new_project = validate_new_project(&name, &description)?;
            let client = ctx.client()?;
            let project = block_on(client.create_project(&new_project))??;
            tracing::info!(project_id = %project.id, "created project");
            ctx.print(&detail(project), format_detail)
        }
        ProjectsCommand::Delete { project_id, yes } => {
            confirm(&format!("Delete project {project_id}?"), yes)?;
            let client = ctx.client()?;
            block_on(client.delete_project(&project_id))??;
            ctx.print(&Deleted { deleted: project_id }, |d| format!("Deleted project {}", d.deleted))
        }
    }
}

fn run_list(args: ListArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let projects = block_on(client.list_projects(ctx.config.project_fetch_limit))??;
    let page = build_page(projects, ctx.config.projects_per_page, args)?;
    ctx.print(&page, format_page)
}

fn build_page(projects: Vec<Project>, per_page: usize, args: ListArgs) -> Result<ProjectPage> {
    let mut dashboard = Dashboard::new(projects, per_page);
    dashboard.set_search(args.search);
    dashboard.set_sort(args.sort);
    if !dashboard.go_to_page(args.page) {
        bail!("page {} is out of range (1-{})", args.page, dashboard.total_pages());
    }
    Ok(ProjectPage {
        page: dashboard.pager().current_page(),
        total_pages: dashboard.total_pages(),
        matching: dashboard.visible().len(),
        search: dashboard.search().to_string(),
        sort: dashboard.sort(),
        projects: dashboard.current_page().into_iter().cloned().collect(),
    })
}

fn detail(project: Project) -> ProjectDetail {
    let sections = Section::ALL
        .into_iter()
        .map(|section| SectionLink { section: section.label().to_string(), route: section.route(&project.id) })
        .collect();
    ProjectDetail { display_name: display_name(&project.id, Some(&project)), project, sections }
}

fn date(value: Option<DateTime<Utc>>) -> String {
    value.map(|at| at.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".into())
}

fn format_page(page: &ProjectPage) -> String {
    if page.projects.is_empty() {
        return if page.search.trim().is_empty() {
            "No projects yet. Create one with: m204 projects create --name <NAME> --description <TEXT>".into()
        } else {
            format!("No projects match \"{}\".", page.search.trim())
        };
    }

    let mut lines = vec![format!(
        "{}, page {} of {} ({})",
        plural(page.matching, "project"),
        page.page,
        page.total_pages,
        page.sort
    )];
    for project in &page.projects {
        let status = project.status.map(|status| status.to_string()).unwrap_or_else(|| "-".into());
        lines.push(format!(
            "  {} {} {} {}",
            cell(&project.id, 8),
            cell(&project.name, 28),
            cell(&status, 22),
            date(project.last_activity())
        ));
        if !project.description.is_empty() {
            lines.push(format!("           {}", cell(&project.description, 60).trim_end()));
        }
    }
    lines.join("\n")
}

fn format_detail(detail: &ProjectDetail) -> String {
    let project = &detail.project;
    let mut lines = vec![
        detail.display_name.clone(),
        format!("  id:          {}", project.id),
        format!("  status:      {}", project.status.map(|s| s.to_string()).unwrap_or_else(|| "-".into())),
        format!("  created:     {}", date(project.created_at)),
        format!("  updated:     {}", date(project.updated_at)),
    ];
    if !project.description.is_empty() {
        lines.push(format!("  description: {}", project.description));
    }
    lines.push("  sections:".into());
    for link in &detail.sections {
        lines.push(format!("    {} {}", cell(&link.section, 14), link.route));
    }
    lines.join("\n")
}
