// Core domain types mirrored from the migration backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A migration project as listed on the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(alias = "project_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "project_name", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Most recent known timestamp, used for date sorting.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// Body of `POST /projects/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProject {
    pub project_name: String,
    pub description: String,
}

/// Pipeline stage reported by the backend for a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    #[serde(rename = "Analysis Pending")]
    AnalysisPending,
    #[serde(rename = "Analysis In Progress")]
    AnalysisInProgress,
    #[serde(rename = "Analysis Complete")]
    AnalysisComplete,
    #[serde(rename = "Mapping Pending")]
    MappingPending,
    #[serde(rename = "Mapping In Progress")]
    MappingInProgress,
    #[serde(rename = "Mapping Complete")]
    MappingComplete,
    #[serde(rename = "Generation Pending")]
    GenerationPending,
    #[serde(rename = "Generation In Progress")]
    GenerationInProgress,
    #[serde(rename = "Generation Complete")]
    GenerationComplete,
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AnalysisPending => "Analysis Pending",
            Self::AnalysisInProgress => "Analysis In Progress",
            Self::AnalysisComplete => "Analysis Complete",
            Self::MappingPending => "Mapping Pending",
            Self::MappingInProgress => "Mapping In Progress",
            Self::MappingComplete => "Mapping Complete",
            Self::GenerationPending => "Generation Pending",
            Self::GenerationInProgress => "Generation In Progress",
            Self::GenerationComplete => "Generation Complete",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Declared category of an uploaded source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    M204,
    Parmlib,
    Jcl,
    Other,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [Self::M204, Self::Parmlib, Self::Jcl, Self::Other];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M204 => "m204",
            Self::Parmlib => "parmlib",
            Self::Jcl => "jcl",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == lower)
            .ok_or_else(|| format!("unknown source type `{s}` (expected m204, parmlib, jcl or other)"))
    }
}

/// Backend-reported analysis state of a source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Uploaded,
    Analyzing,
    Analyzed,
    Completed,
    Error,
}

impl AnalysisStatus {
    /// Whether analysis has finished, successfully or not.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Analyzed | Self::Completed | Self::Error)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file uploaded into a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFile {
    #[serde(alias = "file_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(alias = "file_name", alias = "filename")]
    pub original_filename: String,
    #[serde(alias = "file_type")]
    pub source_type: SourceType,
    #[serde(default, alias = "file_size")]
    pub size: u64,
    #[serde(alias = "status")]
    pub analysis_status: AnalysisStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A generated requirements document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementsDocument {
    #[serde(default, alias = "document_id", deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub project_id: Option<String>,
    #[serde(alias = "markdown_content", alias = "document_content")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /requirements/projects/:id/documents/:docId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub content: String,
}

/// Body of `POST /analysis/fix-mermaid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MermaidFixRequest {
    pub mermaid_code: String,
    pub error_message: String,
}

/// Response of `POST /analysis/fix-mermaid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MermaidFixResponse {
    #[serde(alias = "corrected_code", alias = "mermaid_code")]
    pub fixed_code: String,
}

/// Accepts a JSON string or number and keeps it as a string.
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Int(value) => value.to_string(),
        RawId::Uint(value) => value.to_string(),
    })
}

/// Like [`id_string`] for optional, nullable ids.
pub fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

/// Reads an explicit `null` as the type's default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// RFC 3339 or naive ISO-8601 (read as UTC). Unparseable values become `None`.
pub fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
