// `m204 files`: source file upload, listing and analysis.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use m204_common::source_files::{
    format_file_size, validate_uploads, PendingUpload, PollOutcome, SourceFilesView, UploadEntry, UploadState,
    UploadTracker, SOURCE_FILES_PER_PAGE,
};
use m204_common::types::SourceFile;

use super::{block_on, cell, confirm, plural, Context};
use crate::client::ApiClient;
use crate::poll::wait_for_analysis;

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    command: FilesCommand,
}

#[derive(Debug, Subcommand)]
enum FilesCommand {
    /// List a project's source files
    List {
        project_id: String,
        /// Match on file name or source type
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Upload files, each tagged with a source type
    Upload {
        project_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// m204, parmlib, jcl or other; once for all files or once per file
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
    },
    /// Print a source file's content
    Show {
        file_id: String,
        /// Write the content here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a source file
    Delete {
        file_id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Start analysis and wait for every file to finish
    Analyze {
        project_id: String,
        /// Return right after the analysis request is accepted
        #[arg(long)]
        no_wait: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FilePage {
    pub page: usize,
    pub total_pages: usize,
    pub matching: usize,
    pub total_size: u64,
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub uploads: Vec<UploadEntry>,
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
    pub bytes: usize,
}

pub fn run(args: FilesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        FilesCommand::List { project_id, search, page } => {
            let client = ctx.client()?;
            let files = block_on(client.list_source_files(&project_id))??;
            let page = build_page(files, &search, page)?;
            ctx.print(&page, format_page)
        }
        FilesCommand::Upload { project_id, files, types } => run_upload(ctx, &project_id, &files, &types),
        FilesCommand::Show { file_id, output } => run_show(ctx, file_id, output),
        FilesCommand::Delete { file_id, yes } => {
            confirm(&format!("Delete source file {file_id}?"), yes)?;
            let client = ctx.client()?;
            block_on(client.delete_source_file(&file_id))??;
            ctx.print(&serde_json::json!({ "deleted": &file_id }), |_| format!("Deleted source file {file_id}"))
        }
        FilesCommand::Analyze { project_id, no_wait } => run_analyze(ctx, &project_id, no_wait),
    }
}

fn build_page(files: Vec<SourceFile>, search: &str, page: usize) -> Result<FilePage> {
    let mut view = SourceFilesView::new(files, SOURCE_FILES_PER_PAGE);
    view.set_search(search);
    let matching = view.visible().len();
    if !view.go_to_page(page) {
        bail!("page {page} is out of range (1-{})", view.pager().total_pages(matching));
    }
    Ok(FilePage {
        page: view.pager().current_page(),
        total_pages: view.pager().total_pages(matching),
        matching,
        total_size: view.total_size(),
        files: view.current_page().into_iter().cloned().collect(),
    })
}

// ── Upload ─────────────────────────────────────────────────────────

/// Pair each path with its `--type` value. One value applies to every file.
fn tag_files<'a>(files: &'a [PathBuf], types: &'a [String]) -> Result<Vec<(String, Option<&'a str>)>> {
    if types.len() > 1 && types.len() != files.len() {
        bail!("got {} --type values for {}; pass one for all files or one per file", types.len(), plural(files.len(), "file"));
    }
    Ok(files
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let tag = match types.len() {
                0 => None,
                1 => Some(types[0].as_str()),
                _ => Some(types[index].as_str()),
            };
            (file_name(path), tag)
        })
        .collect())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

fn run_upload(ctx: &Context, project_id: &str, files: &[PathBuf], types: &[String]) -> Result<()> {
    let tagged = tag_files(files, types)?;
    let pending = validate_uploads(tagged.iter().map(|(name, tag)| (name.as_str(), *tag)))?;

    // Read everything up front so a missing file stops the batch before any upload.
    let mut payloads = Vec::with_capacity(files.len());
    for (path, upload) in files.iter().zip(pending) {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        payloads.push((upload, bytes));
    }

    let client = ctx.client()?;
    let report = block_on(upload_all(&client, project_id, payloads))??;
    let failed = report.uploads.iter().filter(|entry| is_failure(entry)).count();
    ctx.print(&report, format_upload)?;
    if failed > 0 {
        bail!("{failed} of {} failed to upload", plural(report.uploads.len(), "file"));
    }
    Ok(())
}

fn is_failure(entry: &UploadEntry) -> bool {
    matches!(entry.state, UploadState::Failed { .. })
}

async fn upload_all(client: &ApiClient, project_id: &str, payloads: Vec<(PendingUpload, Vec<u8>)>) -> Result<UploadReport> {
    let mut tracker = UploadTracker::default();
    for (upload, bytes) in payloads {
        let total = bytes.len() as u64;
        let temp_id = tracker.start(upload.file_name.clone(), upload.source_type);
        match client.upload_source_file(project_id, &upload.file_name, bytes, upload.source_type).await {
            Ok(_) => {
                tracker.progress(temp_id, total, total);
                tracker.succeed(temp_id, Instant::now());
                info!(file = %upload.file_name, size = total, "uploaded source file");
            }
            Err(error) => {
                debug!(file = %upload.file_name, error = %format!("{error:#}"), "upload failed");
                tracker.fail(temp_id, format!("{error:#}"), Instant::now());
            }
        }
    }
    let files = client.list_source_files(project_id).await?;
    Ok(UploadReport { uploads: tracker.entries().to_vec(), files })
}

// ── Show ───────────────────────────────────────────────────────────

fn run_show(ctx: &Context, file_id: String, output: Option<PathBuf>) -> Result<()> {
    let client = ctx.client()?;
    let content = block_on(client.source_file_content(&file_id))??;
    let bytes = content.len();
    match output {
        Some(path) => {
            std::fs::write(&path, &content).with_context(|| format!("failed to write {}", path.display()))?;
            let written = FileContent { file_id, content: None, written_to: Some(path), bytes };
            ctx.print(&written, |written| {
                let path = written.written_to.as_ref().map(|path| path.display().to_string()).unwrap_or_default();
                format!("Wrote {} bytes to {path}", written.bytes)
            })
        }
        None => ctx.print(&FileContent { file_id, content: Some(content), written_to: None, bytes }, |shown| {
            shown.content.clone().unwrap_or_default()
        }),
    }
}

// ── Analyze ────────────────────────────────────────────────────────

fn run_analyze(ctx: &Context, project_id: &str, no_wait: bool) -> Result<()> {
    let client = ctx.client()?;
    if no_wait {
        let accepted = block_on(client.analyze_ordered(project_id))??;
        return ctx.print(&accepted, |_| format!("Analysis started for project {project_id}"));
    }

    let outcome = block_on(analyze_and_wait(&client, project_id, ctx))??;
    if !outcome.is_settled() {
        ctx.warn(
            "ANALYSIS_PENDING",
            &format!(
                "analysis still running after {}; check again with: m204 files list {project_id}",
                plural(outcome.attempts() as usize, "poll")
            ),
        );
    }
    ctx.print(&outcome, format_outcome)
}

async fn analyze_and_wait(client: &ApiClient, project_id: &str, ctx: &Context) -> Result<PollOutcome> {
    let file_count = client.list_source_files(project_id).await?.len();
    client.analyze_ordered(project_id).await?;
    info!(project_id, file_count, "analysis requested");
    wait_for_analysis(&ctx.config.poll, file_count, move || client.list_source_files(project_id)).await
}

// ── Human output ───────────────────────────────────────────────────

fn file_row(file: &SourceFile) -> String {
    let uploaded = file.uploaded_at.map(|at| at.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".into());
    format!(
        "  {} {} {} {} {} {uploaded}",
        cell(&file.id, 8),
        cell(&file.original_filename, 32),
        cell(file.source_type.as_str(), 8),
        cell(&format_file_size(file.size), 9),
        cell(file.analysis_status.as_str(), 10),
    )
}

fn format_page(page: &FilePage) -> String {
    if page.files.is_empty() {
        return if page.matching == 0 && page.total_size == 0 {
            "No source files yet. Upload with: m204 files upload <PROJECT> <FILES>... --type <TYPE>".into()
        } else {
            "No source files match the search.".into()
        };
    }
    let mut lines = vec![format!(
        "{} ({}), page {} of {}",
        plural(page.matching, "file"),
        format_file_size(page.total_size),
        page.page,
        page.total_pages
    )];
    lines.extend(page.files.iter().map(file_row));
    lines.join("\n")
}

fn format_upload(report: &UploadReport) -> String {
    let mut lines = Vec::new();
    for entry in &report.uploads {
        let outcome = match &entry.state {
            UploadState::Succeeded => "uploaded".to_string(),
            UploadState::Failed { error } => format!("failed: {error}"),
            UploadState::InProgress { percent } => format!("{percent}%"),
        };
        lines.push(format!("  {} {} {outcome}", cell(&entry.file_name, 32), cell(entry.source_type.as_str(), 8)));
    }
    lines.push(format!("Project now has {}", plural(report.files.len(), "source file")));
    lines.join("\n")
}

fn format_outcome(outcome: &PollOutcome) -> String {
    let files = outcome.files();
    let done = files.iter().filter(|file| file.analysis_status.is_terminal()).count();
    let mut lines = vec![if outcome.is_settled() {
        format!("Analysis finished for {} after {}", plural(files.len(), "file"), plural(outcome.attempts() as usize, "poll"))
    } else {
        format!("Analysis incomplete: {done} of {} done", plural(files.len(), "file"))
    }];
    lines.extend(files.iter().map(file_row));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use m204_common::source_files::ValidationError;
    use m204_common::types::{AnalysisStatus, SourceType};

    fn file(id: &str, name: &str, status: AnalysisStatus) -> SourceFile {
        SourceFile {
            id: id.into(),
            original_filename: name.into(),
            source_type: SourceType::M204,
            size: 2048,
            analysis_status: status,
            uploaded_at: None,
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn one_type_applies_to_every_file() {
        let files = paths(&["src/PAYROLL.M204", "src/INVOICE.M204"]);
        let types = vec!["m204".to_string()];
        let tagged = tag_files(&files, &types).unwrap();
        assert_eq!(tagged, vec![("PAYROLL.M204".to_string(), Some("m204")), ("INVOICE.M204".to_string(), Some("m204"))]);
    }

    #[test]
    fn types_pair_with_files_in_order() {
        let files = paths(&["A.JCL", "B.M204"]);
        let types = vec!["jcl".to_string(), "m204".to_string()];
        let tagged = tag_files(&files, &types).unwrap();
        assert_eq!(tagged[0].1, Some("jcl"));
        assert_eq!(tagged[1].1, Some("m204"));
        assert!(tag_files(&paths(&["A", "B", "C"]), &types).is_err());
    }

    #[test]
    fn untagged_files_fail_validation() {
        let files = paths(&["A.M204"]);
        let tagged = tag_files(&files, &[]).unwrap();
        let err = validate_uploads(tagged.iter().map(|(name, tag)| (name.as_str(), *tag))).unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceType("A.M204".into()));
    }

    #[test]
    fn pages_and_searches_files() {
        let files: Vec<_> = (0..12).map(|i| file(&i.to_string(), &format!("FILE{i:02}.M204"), AnalysisStatus::Pending)).collect();
        let page = build_page(files.clone(), "", 2).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.total_size, 12 * 2048);

        let page = build_page(files.clone(), "file03", 1).unwrap();
        assert_eq!(page.matching, 1);
        assert!(build_page(files, "", 3).is_err());
    }

    #[test]
    fn human_listing() {
        let page = build_page(vec![file("1", "PAYROLL.M204", AnalysisStatus::Analyzed)], "", 1).unwrap();
        let output = format_page(&page);
        assert!(output.starts_with("1 file(s) (2 KB), page 1 of 1"));
        assert!(output.contains("PAYROLL.M204"));
        assert!(output.contains("analyzed"));

        let empty = build_page(Vec::new(), "", 1).unwrap();
        assert!(format_page(&empty).contains("m204 files upload"));
    }

    #[test]
    fn upload_report_shows_failures() {
        let mut tracker = UploadTracker::default();
        let ok = tracker.start("A.M204", SourceType::M204);
        let bad = tracker.start("B.JCL", SourceType::Jcl);
        tracker.succeed(ok, Instant::now());
        tracker.fail(bad, "disk full (status 500)", Instant::now());
        let report = UploadReport { uploads: tracker.entries().to_vec(), files: Vec::new() };
        let output = format_upload(&report);
        assert!(output.contains("uploaded"));
        assert!(output.contains("failed: disk full (status 500)"));
        assert_eq!(report.uploads.iter().filter(|entry| is_failure(entry)).count(), 1);
    }

    #[test]
    fn exhausted_outcome_reports_progress() {
        let outcome = PollOutcome::Exhausted {
            files: vec![file("1", "A.M204", AnalysisStatus::Analyzed), file("2", "B.M204", AnalysisStatus::Analyzing)],
            attempts: 24,
        };
        assert!(format_outcome(&outcome).starts_with("Analysis incomplete: 1 of 2 file(s) done"));
    }
}
