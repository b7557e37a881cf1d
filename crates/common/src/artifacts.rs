// Generated artifacts: flattening the backend response, kind tabs, paging
// and cache naming.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listing::Pager;

pub const ARTIFACTS_PER_PAGE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "COBOL")]
    Cobol,
    #[serde(rename = "JCL")]
    Jcl,
    UnitTest,
    #[serde(rename = "Default")]
    Other,
}

impl ArtifactKind {
    /// Kinds that get a tab, in display order.
    pub const TABS: [ArtifactKind; 3] = [Self::Cobol, Self::Jcl, Self::UnitTest];

    /// Map the backend's free-form `artifact_type`.
    pub fn from_backend(raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return Self::Other };
        let lower = raw.to_lowercase();
        if lower == "cobol" {
            Self::Cobol
        } else if lower.starts_with("jcl") {
            Self::Jcl
        } else if lower == "unit_test" || lower == "unittest" {
            Self::UnitTest
        } else {
            Self::Other
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cobol => "COBOL",
            Self::Jcl => "JCL",
            Self::UnitTest => "Unit Tests",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        match wanted.as_str() {
            "cobol" => Ok(Self::Cobol),
            "jcl" => Ok(Self::Jcl),
            "unit-test" | "unittest" | "unit-tests" | "tests" => Ok(Self::UnitTest),
            "other" | "default" => Ok(Self::Other),
            _ => Err(format!("unknown artifact kind `{s}` (expected cobol, jcl, unit-test or other)")),
        }
    }
}

// ── Backend response ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedFile {
    pub file_name: String,
    pub artifact_type: Option<String>,
    pub content: Option<String>,
}

/// Artifacts generated from one input source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedSource {
    pub input_source_original_filename: String,
    pub generated_files: Vec<GeneratedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub content: String,
    pub size: String,
    pub description: String,
    pub source: String,
}

impl Artifact {
    pub fn matches(&self, term: &str) -> bool {
        crate::listing::matches_search(term, &[&self.name, &self.source])
    }
}

/// Size label used in listings, e.g. `"1.50 KB"`.
pub fn size_label(content: &str) -> String {
    if content.is_empty() {
        return "0 KB".to_string();
    }
    format!("{:.2} KB", content.len() as f64 / 1024.0)
}

/// Flatten the per-source response into one artifact list, in order.
pub fn flatten(sources: Vec<GeneratedSource>) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for source in sources {
        for file in source.generated_files {
            let kind = ArtifactKind::from_backend(file.artifact_type.as_deref());
            let content = file.content.unwrap_or_default();
            artifacts.push(Artifact {
                id: format!("{}_{}", source.input_source_original_filename, file.file_name),
                size: size_label(&content),
                description: format!(
                    "Generated {} file for {}.",
                    kind.label(),
                    source.input_source_original_filename
                ),
                name: file.file_name,
                kind,
                content,
                source: source.input_source_original_filename.clone(),
            });
        }
    }
    artifacts
}

/// Tabs for the kinds present, in the fixed tab order.
pub fn available_tabs(artifacts: &[Artifact]) -> Vec<ArtifactKind> {
    ArtifactKind::TABS
        .into_iter()
        .filter(|kind| artifacts.iter().any(|artifact| artifact.kind == *kind))
        .collect()
}

// ── Naming ───────────────────────────────────────────────────────────

fn underscore_whitespace(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            out.push(ch);
        }
    }
    out
}

/// Cache entry name for a project's artifacts.
///
/// Path separators are replaced so the key is always a single file name.
pub fn cache_key(project_name: Option<&str>, project_id: &str) -> String {
    let name_part = match project_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => underscore_whitespace(name),
        None => format!("ProjectID_{project_id}"),
    };
    format!("artifacts_{name_part}_{project_id}").replace(['/', '\\'], "_")
}

/// File name for the zip of all artifacts.
pub fn zip_file_name(project_name: Option<&str>, project_id: &str) -> String {
    let base = match project_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => underscore_whitespace(name),
        None => format!("project_{project_id}"),
    };
    format!("{}_artifacts.zip", base.replace(['/', '\\'], "_"))
}

/// What the artifact cache stores per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub artifacts: Vec<Artifact>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("cache entry has no artifacts")]
    Empty,
}

impl CacheEntry {
    pub fn new(artifacts: Vec<Artifact>, timestamp: DateTime<Utc>) -> Self {
        Self { artifacts, timestamp }
    }

    /// Decode a stored entry. An entry without artifacts counts as a miss.
    pub fn decode(raw: &[u8]) -> Result<Self, CacheError> {
        let entry: Self = serde_json::from_slice(raw)?;
        if entry.artifacts.is_empty() {
            return Err(CacheError::Empty);
        }
        Ok(entry)
    }
}

// ── View state ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ArtifactsView {
    artifacts: Vec<Artifact>,
    tabs: Vec<ArtifactKind>,
    active: Option<ArtifactKind>,
    pager: Pager,
}

impl ArtifactsView {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        let tabs = available_tabs(&artifacts);
        let active = tabs.first().copied();
        Self { artifacts, tabs, active, pager: Pager::new(ARTIFACTS_PER_PAGE) }
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn tabs(&self) -> &[ArtifactKind] {
        &self.tabs
    }

    pub fn active_tab(&self) -> Option<ArtifactKind> {
        self.active
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Switch tabs; `None` shows every artifact. Unknown tabs are refused.
    pub fn select_tab(&mut self, kind: Option<ArtifactKind>) -> bool {
        if let Some(kind) = kind {
            if !self.tabs.contains(&kind) {
                return false;
            }
        }
        self.active = kind;
        self.pager.reset();
        true
    }

    pub fn in_tab(&self) -> Vec<&Artifact> {
        self.artifacts.iter().filter(|artifact| self.active.map_or(true, |kind| artifact.kind == kind)).collect()
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        let len = self.in_tab().len();
        self.pager.go_to(page, len)
    }

    pub fn total_pages(&self) -> usize {
        self.pager.total_pages(self.in_tab().len())
    }

    pub fn current_page(&self) -> Vec<&Artifact> {
        let in_tab = self.in_tab();
        let range = self.pager.range(in_tab.len());
        in_tab[range].to_vec()
    }

    /// Find by id, else by file name.
    pub fn find(&self, key: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.id == key)
            .or_else(|| self.artifacts.iter().find(|artifact| artifact.name == key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> Vec<GeneratedSource> {
        serde_json::from_value(json!([
            {
                "input_source_original_filename": "CUSTOMER.M204",
                "generated_files": [
                    { "file_name": "CUSTOMER.cbl", "artifact_type": "cobol", "content": "IDENTIFICATION DIVISION.\n" },
                    { "file_name": "CUSTOMER.jcl", "artifact_type": "JCL_RUN", "content": "//JOB\n" },
                    { "file_name": "notes.txt", "artifact_type": null, "content": null }
                ]
            },
            {
                "input_source_original_filename": "ORDERS.M204",
                "generated_files": [
                    { "file_name": "ORDERS.cbl", "artifact_type": "COBOL", "content": "x" }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn kinds_map_from_backend_types() {
        assert_eq!(ArtifactKind::from_backend(Some("cobol")), ArtifactKind::Cobol);
        assert_eq!(ArtifactKind::from_backend(Some("jcl_proc")), ArtifactKind::Jcl);
        assert_eq!(ArtifactKind::from_backend(Some("UNIT_TEST")), ArtifactKind::UnitTest);
        assert_eq!(ArtifactKind::from_backend(Some("unittest")), ArtifactKind::UnitTest);
        assert_eq!(ArtifactKind::from_backend(Some("copybook")), ArtifactKind::Other);
        assert_eq!(ArtifactKind::from_backend(None), ArtifactKind::Other);
    }

    #[test]
    fn flatten_keeps_order_and_builds_ids() {
        let artifacts = flatten(response());
        assert_eq!(artifacts.len(), 4);
        assert_eq!(artifacts[0].id, "CUSTOMER.M204_CUSTOMER.cbl");
        assert_eq!(artifacts[0].description, "Generated COBOL file for CUSTOMER.M204.");
        assert_eq!(artifacts[2].kind, ArtifactKind::Other);
        assert_eq!(artifacts[2].size, "0 KB");
        assert_eq!(artifacts[3].source, "ORDERS.M204");
    }

    #[test]
    fn size_label_has_two_decimals() {
        assert_eq!(size_label(&"a".repeat(1536)), "1.50 KB");
        assert_eq!(size_label("x"), "0.00 KB");
    }

    #[test]
    fn tabs_follow_fixed_order() {
        let artifacts = flatten(response());
        assert_eq!(available_tabs(&artifacts), vec![ArtifactKind::Cobol, ArtifactKind::Jcl]);
        assert!(available_tabs(&[]).is_empty());
    }

    #[test]
    fn cache_key_and_zip_name() {
        assert_eq!(cache_key(Some("Payroll  Migration"), "7"), "artifacts_Payroll_Migration_7");
        assert_eq!(cache_key(None, "7"), "artifacts_ProjectID_7_7");
        assert_eq!(cache_key(Some("a/b"), "7"), "artifacts_a_b_7");
        assert_eq!(zip_file_name(Some("Payroll Migration"), "7"), "Payroll_Migration_artifacts.zip");
        assert_eq!(zip_file_name(Some(" "), "7"), "project_7_artifacts.zip");
    }

    #[test]
    fn view_pages_within_active_tab() {
        let mut artifacts = Vec::new();
        for index in 0..15 {
            artifacts.push(Artifact {
                id: format!("src_{index}.cbl"),
                name: format!("{index}.cbl"),
                kind: ArtifactKind::Cobol,
                content: String::new(),
                size: "0 KB".into(),
                description: String::new(),
                source: "src".into(),
            });
        }
        artifacts.extend(flatten(response()).into_iter().filter(|a| a.kind == ArtifactKind::Jcl));

        let mut view = ArtifactsView::new(artifacts);
        assert_eq!(view.active_tab(), Some(ArtifactKind::Cobol));
        assert_eq!(view.total_pages(), 2);
        assert!(view.go_to_page(2));
        assert_eq!(view.current_page().len(), 3);

        assert!(view.select_tab(Some(ArtifactKind::Jcl)));
        assert_eq!(view.pager().current_page(), 1);
        assert_eq!(view.current_page().len(), 1);
        assert!(!view.select_tab(Some(ArtifactKind::UnitTest)));
        assert!(view.select_tab(None));
        assert_eq!(view.in_tab().len(), 16);
        assert_eq!(view.find("CUSTOMER.jcl").unwrap().kind, ArtifactKind::Jcl);
    }

    #[test]
    fn kinds_parse_from_cli_words() {
        assert_eq!("unit_test".parse::<ArtifactKind>().unwrap(), ArtifactKind::UnitTest);
        assert_eq!("COBOL".parse::<ArtifactKind>().unwrap(), ArtifactKind::Cobol);
        assert!("binary".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn cache_entries_decode_or_report_why_not() {
        let entry = CacheEntry::new(flatten(response()), Utc::now());
        let raw = serde_json::to_vec(&entry).unwrap();
        assert_eq!(CacheEntry::decode(&raw).unwrap(), entry);

        assert!(matches!(CacheEntry::decode(b"{not json"), Err(CacheError::Corrupt(_))));
        let empty = serde_json::to_vec(&CacheEntry::new(Vec::new(), Utc::now())).unwrap();
        assert!(matches!(CacheEntry::decode(&empty), Err(CacheError::Empty)));
    }
}
