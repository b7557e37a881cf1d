// Source files of a project: upload validation, list state, analysis
// progress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listing::{matches_search, Pager};
use crate::types::{AnalysisStatus, SourceFile, SourceType};

pub mod poll;
pub mod upload;

pub use poll::{is_settled, PollOutcome, PollPolicy, StatusRegression, StatusWatch};
pub use upload::{UploadEntry, UploadState, UploadTracker};

pub const SOURCE_FILES_PER_PAGE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no files selected for upload")]
    NoFiles,

    #[error("`{0}` has no source type; choose one of m204, parmlib, jcl or other")]
    MissingSourceType(String),

    #[error("`{file}` has an unknown source type `{value}`")]
    UnknownSourceType { file: String, value: String },
}

/// A file queued for upload with its declared category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub file_name: String,
    pub source_type: SourceType,
}

/// Check that every file carries a valid source-type tag.
///
/// Nothing is sent unless all files pass.
pub fn validate_uploads<'a, I>(files: I) -> Result<Vec<PendingUpload>, ValidationError>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut pending = Vec::new();
    for (file_name, tag) in files {
        let tag = tag.map(str::trim).filter(|tag| !tag.is_empty());
        let Some(tag) = tag else {
            return Err(ValidationError::MissingSourceType(file_name.to_string()));
        };
        let source_type = tag.parse::<SourceType>().map_err(|_| ValidationError::UnknownSourceType {
            file: file_name.to_string(),
            value: tag.to_string(),
        })?;
        pending.push(PendingUpload { file_name: file_name.to_string(), source_type });
    }
    if pending.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    Ok(pending)
}

/// Human-readable byte count: `0 B`, `512 B`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    while exponent + 1 < UNITS.len() && bytes >= 1024u64.pow(exponent as u32 + 1) {
        exponent += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[exponent])
    } else {
        format!("{rounded:.1} {}", UNITS[exponent])
    }
}

/// The project's file list as last fetched, with search and paging.
#[derive(Debug, Clone)]
pub struct SourceFilesView {
    files: Vec<SourceFile>,
    search: String,
    pager: Pager,
}

impl SourceFilesView {
    pub fn new(files: Vec<SourceFile>, page_size: usize) -> Self {
        Self { files, search: String::new(), pager: Pager::new(page_size) }
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn set_files(&mut self, files: Vec<SourceFile>) {
        self.files = files;
        let len = self.visible().len();
        self.pager.clamp(len);
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.pager.reset();
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        let len = self.visible().len();
        self.pager.go_to(page, len)
    }

    /// Files whose name or source type matches the search.
    pub fn visible(&self) -> Vec<&SourceFile> {
        self.files
            .iter()
            .filter(|file| matches_search(&self.search, &[&file.original_filename, file.source_type.as_str()]))
            .collect()
    }

    pub fn current_page(&self) -> Vec<&SourceFile> {
        let visible = self.visible();
        let range = self.pager.range(visible.len());
        visible[range].to_vec()
    }

    pub fn remove(&mut self, id: &str) -> Option<SourceFile> {
        let index = self.files.iter().position(|file| file.id == id)?;
        let removed = self.files.remove(index);
        let len = self.visible().len();
        self.pager.clamp(len);
        Some(removed)
    }

    /// True when there are files and every one has finished analysis.
    pub fn all_settled(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|file| file.analysis_status.is_terminal())
    }

    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.files {
            *counts.entry(file.analysis_status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    pub fn count_with_status(&self, status: AnalysisStatus) -> usize {
        self.files.iter().filter(|file| file.analysis_status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn uploads_need_a_source_type() {
        let err = validate_uploads([("TEST.M204", Some("m204")), ("JOB.JCL", None)]).unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceType("JOB.JCL".into()));
        let err = validate_uploads([("JOB.JCL", Some("  "))]).unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceType("JOB.JCL".into()));
        let err = validate_uploads([("X", Some("cobol"))]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSourceType { .. }));
        assert_eq!(validate_uploads(Vec::<(&str, Option<&str>)>::new()), Err(ValidationError::NoFiles));
    }

    #[test]
    fn valid_uploads_keep_order() {
        let pending = validate_uploads([("TEST.M204", Some("M204")), ("PARM.TXT", Some("parmlib"))]).unwrap();
        assert_eq!(pending[0].source_type, SourceType::M204);
        assert_eq!(pending[1].file_name, "PARM.TXT");
    }

    #[test]
    fn file_sizes_use_binary_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn settled_only_when_every_file_is_terminal() {
        let mut view = SourceFilesView::new(Vec::new(), 10);
        assert!(!view.all_settled());
        view.set_files(vec![
            file("1", "A.M204", AnalysisStatus::Analyzed),
            file("2", "B.M204", AnalysisStatus::Analyzing),
        ]);
        assert!(!view.all_settled());
        view.set_files(vec![
            file("1", "A.M204", AnalysisStatus::Analyzed),
            file("2", "B.M204", AnalysisStatus::Error),
        ]);
        assert!(view.all_settled());
        assert_eq!(view.status_counts().get("error"), Some(&1));
    }

    #[test]
    fn search_and_delete() {
        let mut view = SourceFilesView::new(
            vec![
                file("1", "CUSTOMER.M204", AnalysisStatus::Uploaded),
                file("2", "ORDERS.M204", AnalysisStatus::Uploaded),
            ],
            1,
        );
        assert!(view.go_to_page(2));
        view.set_search("cust");
        assert_eq!(view.pager().current_page(), 1);
        assert_eq!(view.visible().len(), 1);
        assert_eq!(view.remove("1").unwrap().original_filename, "CUSTOMER.M204");
        assert!(view.visible().is_empty());
        assert_eq!(view.total_size(), 2048);
    }
}
