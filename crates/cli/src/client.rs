// HTTP client for the migration backend.
//
// Every call returns `anyhow::Result`. Non-2xx responses carry an `ApiError`
// in the error chain so `ExitCode::from_error` can classify them.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use m204_common::artifacts::GeneratedSource;
use m204_common::endpoints;
use m204_common::inventory::{InventoryItem, InventoryTab, SaveRequest};
use m204_common::types::{
    DocumentUpdate, MermaidFixRequest, MermaidFixResponse, NewProject, Project, RequirementsDocument,
    SourceFile, SourceType,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ConsoleConfig;

// ── Errors ─────────────────────────────────────────────────────────

/// A non-success HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn from_body(status: u16, body: &str) -> Self {
        Self { status, detail: extract_detail(body) }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{detail} (status {})", self.status),
            None => write!(f, "request failed with status {}", self.status),
        }
    }
}

impl std::error::Error for ApiError {}

/// Pull a human message out of an error body.
///
/// Understands `{"detail": "..."}`, FastAPI validation lists
/// (`{"detail": [{"loc": [...], "msg": "..."}]}`) and `{"message": "..."}`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let detail = match value.get("detail") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<String> = items.iter().map(validation_message).collect();
            Some(messages.join("; "))
        }
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    detail
        .or_else(|| value.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|text| !text.trim().is_empty())
}

fn validation_message(item: &Value) -> String {
    let msg = item.get("msg").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| item.to_string());
    let loc: Vec<String> = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|part| match part {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    if loc.is_empty() {
        msg
    } else {
        format!("{}: {msg}", loc.join("."))
    }
}

// ── Response shapes ────────────────────────────────────────────────

/// Strip a `{ "data": ... }` envelope when present.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            other => {
                if let Some(data) = other {
                    map.insert("data".to_string(), data);
                }
                Value::Object(map)
            }
        },
        other => other,
    }
}

/// A list response: a bare array, or the first array inside an object.
pub fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn decode_list<T: DeserializeOwned>(value: Value, what: &str) -> Result<Vec<T>> {
    into_list(value)
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).with_context(|| format!("{what}: entry {index} has an unexpected shape"))
        })
        .collect()
}

// ── Client ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        Self::new(base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an endpoint path, keeping any path prefix of the base.
    pub fn url(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).with_context(|| format!("invalid request URL `{joined}`"))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(path)?))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.with_context(|| format!("{what} failed"))?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "backend response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow::Error::new(ApiError::from_body(status.as_u16(), &body)).context(format!("{what} failed")))
    }

    async fn value(&self, builder: RequestBuilder, what: &str) -> Result<Value> {
        let response = self.send(builder, what).await?;
        let text = response.text().await.with_context(|| format!("{what}: failed to read response"))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value =
            serde_json::from_str(&text).with_context(|| format!("{what}: response is not valid JSON"))?;
        Ok(unwrap_envelope(value))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let value = self.value(builder, what).await?;
        serde_json::from_value(value).with_context(|| format!("{what}: unexpected response shape"))
    }

    // ── Projects ───────────────────────────────────────────────────

    pub async fn list_projects(&self, limit: usize) -> Result<Vec<Project>> {
        let builder = self.request(Method::GET, endpoints::PROJECTS_LIST)?.query(&[("limit", limit)]);
        let value = self.value(builder, "listing projects").await?;
        decode_list(value, "listing projects")
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        let builder = self.request(Method::GET, &endpoints::project(project_id))?;
        self.json(builder, &format!("loading project {project_id}")).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let builder = self.request(Method::POST, endpoints::PROJECT_CREATE)?.json(project);
        self.json(builder, "creating project").await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &endpoints::project(project_id))?;
        self.send(builder, &format!("deleting project {project_id}")).await?;
        Ok(())
    }

    // ── Source files ───────────────────────────────────────────────

    pub async fn list_source_files(&self, project_id: &str) -> Result<Vec<SourceFile>> {
        let builder = self.request(Method::GET, &endpoints::source_files(project_id))?;
        let value = self.value(builder, "listing source files").await?;
        decode_list(value, "listing source files")
    }

    /// Upload one file with its source-type tag.
    pub async fn upload_source_file(
        &self,
        project_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        source_type: SourceType,
    ) -> Result<Value> {
        let form = multipart::Form::new()
            .part("files", multipart::Part::bytes(bytes).file_name(file_name.to_string()))
            .text("source_types", source_type.as_str().to_string());
        let builder = self.request(Method::POST, &endpoints::upload_source_files(project_id))?.multipart(form);
        self.value(builder, &format!("uploading {file_name}")).await
    }

    pub async fn delete_source_file(&self, file_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &endpoints::source_file(file_id))?;
        self.send(builder, &format!("deleting source file {file_id}")).await?;
        Ok(())
    }

    /// File text; the backend answers with JSON `{content}` or plain text.
    pub async fn source_file_content(&self, file_id: &str) -> Result<String> {
        let what = format!("loading content of source file {file_id}");
        let builder = self.request(Method::GET, &endpoints::source_file_content(file_id))?;
        let response = self.send(builder, &what).await?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        let text = response.text().await.with_context(|| format!("{what}: failed to read response"))?;
        if !is_json {
            return Ok(text);
        }
        let value: Value = serde_json::from_str(&text).with_context(|| format!("{what}: response is not valid JSON"))?;
        Ok(match unwrap_envelope(value) {
            Value::String(content) => content,
            Value::Object(map) => match map.get("content") {
                Some(Value::String(content)) => content.clone(),
                _ => Value::Object(map).to_string(),
            },
            other => other.to_string(),
        })
    }

    pub async fn analyze_ordered(&self, project_id: &str) -> Result<Value> {
        let builder = self.request(Method::POST, &endpoints::analyze_ordered(project_id))?;
        self.value(builder, "starting analysis").await
    }

    /// Upload a PARMLIB member for one DB file and analyze it.
    pub async fn upload_parmlib(
        &self,
        project_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        db_file_name: &str,
    ) -> Result<Value> {
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name.to_string()))
            .text("m204_db_file_name", db_file_name.to_string());
        let builder = self.request(Method::POST, &endpoints::parmlib_upload(project_id))?.multipart(form);
        self.value(builder, &format!("uploading PARMLIB for {db_file_name}")).await
    }

    // ── Inventory ──────────────────────────────────────────────────

    /// Records that do not decode are skipped with a warning.
    pub async fn list_inventory(&self, project_id: &str, tab: InventoryTab) -> Result<Vec<InventoryItem>> {
        let what = format!("loading {}", tab.label());
        let builder = self.request(Method::GET, &tab.list_path(project_id))?;
        let value = self.value(builder, &what).await?;
        let mut items = Vec::new();
        for (index, record) in into_list(value).into_iter().enumerate() {
            match InventoryItem::from_value(tab, record) {
                Ok(item) => items.push(item),
                Err(error) => warn!(tab = %tab, index, error = %error, "skipping malformed inventory record"),
            }
        }
        Ok(items)
    }

    /// PUT the editable fields; returns the server's copy when it sends one.
    pub async fn save_inventory_item(&self, project_id: &str, save: &SaveRequest) -> Result<Option<InventoryItem>> {
        let builder = self.request(Method::PUT, &save.path(project_id))?.json(&save.payload);
        let value = self.value(builder, &format!("saving {} item {}", save.tab, save.item_id)).await?;
        if !value.is_object() {
            return Ok(None);
        }
        match InventoryItem::from_value(save.tab, value) {
            Ok(item) => Ok(Some(item)),
            Err(error) => {
                warn!(tab = %save.tab, item = %save.item_id, error = %error, "ignoring undecodable saved inventory record");
                Ok(None)
            }
        }
    }

    // ── Requirements ───────────────────────────────────────────────

    pub async fn generate_requirements(&self, project_id: &str) -> Result<RequirementsDocument> {
        let builder = self.request(Method::POST, &endpoints::requirements_generate(project_id))?;
        self.json(builder, "generating requirements").await
    }

    /// Latest document, or `None` when the project has none yet.
    pub async fn latest_requirements(&self, project_id: &str) -> Result<Option<RequirementsDocument>> {
        let builder = self.request(Method::GET, &endpoints::requirements_latest(project_id))?;
        match self.json(builder, "loading requirements").await {
            Ok(document) => Ok(Some(document)),
            Err(error) if error.chain().any(|cause| cause.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found)) => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub async fn update_requirements(&self, project_id: &str, document_id: &str, update: &DocumentUpdate) -> Result<()> {
        let builder = self.request(Method::PUT, &endpoints::requirements_update(project_id, document_id))?.json(update);
        self.send(builder, "saving requirements").await?;
        Ok(())
    }

    pub async fn fix_mermaid(&self, request: &MermaidFixRequest) -> Result<MermaidFixResponse> {
        let builder = self.request(Method::POST, endpoints::FIX_MERMAID)?.json(request);
        self.json(builder, "requesting diagram fix").await
    }

    // ── Artifacts ──────────────────────────────────────────────────

    pub async fn generate_artifacts(&self, project_id: &str) -> Result<Vec<GeneratedSource>> {
        let builder = self.request(Method::POST, &endpoints::artifacts_generate(project_id))?;
        let value = self.value(builder, "generating artifacts").await?;
        decode_list(value, "generating artifacts")
    }
}
