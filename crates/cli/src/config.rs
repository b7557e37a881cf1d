// Console configuration.
//
// File: `~/.m204/config.toml`, then `M204_*` environment overrides, then
// command-line flags (applied by `main`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use m204_common::dashboard::PROJECTS_PER_PAGE;
use m204_common::source_files::PollPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PROJECT_FETCH_LIMIT: usize = 100;
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Root directory for console state: `~/.m204/`.
pub fn console_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".m204"))
}

/// Path to the config file: `~/.m204/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    console_dir().map(|dir| dir.join("config.toml"))
}

fn default_cache_dir() -> PathBuf {
    console_dir().map(|dir| dir.join("cache")).unwrap_or_else(|| PathBuf::from(".m204-cache"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the migration backend.
    pub backend_url: String,
    /// Where generated artifacts are cached between runs.
    pub cache_dir: PathBuf,
    /// `tracing` filter directive; `RUST_LOG` wins when set.
    pub log_filter: Option<String>,
    /// Per-request timeout. Unset keeps the HTTP client's default.
    pub request_timeout_secs: Option<u64>,
    /// `limit` sent when listing projects.
    pub project_fetch_limit: usize,
    pub projects_per_page: usize,
    /// Analysis status polling.
    pub poll: PollPolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            cache_dir: default_cache_dir(),
            log_filter: None,
            request_timeout_secs: None,
            project_fetch_limit: DEFAULT_PROJECT_FETCH_LIMIT,
            projects_per_page: PROJECTS_PER_PAGE,
            poll: PollPolicy::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load the config file and apply environment overrides. A missing or
    /// unreadable file yields defaults.
    pub fn load() -> Self {
        let base = config_path().and_then(|path| Self::load_from(&path).ok()).unwrap_or_default();
        base.with_env_fn(|key| std::env::var(key))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Apply `M204_*` overrides through an injectable lookup.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `M204_BACKEND_URL` | `backend_url` |
    /// | `M204_CACHE_DIR` | `cache_dir` |
    /// | `M204_LOG_FILTER` | `log_filter` |
    /// | `M204_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` (ignored unless a number) |
    pub fn with_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(url) = env("M204_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Ok(dir) = env("M204_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = env("M204_LOG_FILTER") {
            self.log_filter = Some(filter);
        }
        if let Some(secs) = env("M204_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.trim().parse().ok()) {
            self.request_timeout_secs = Some(secs);
        }
        self
    }

    /// Filter for the subscriber when `RUST_LOG` is not set.
    pub fn effective_log_filter(&self, verbose: bool) -> String {
        if verbose {
            return "debug".to_string();
        }
        self.log_filter.clone().unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }

    /// Parsed backend URL. Only http(s) is accepted.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.backend_url.trim())
            .map_err(|error| ConfigError::InvalidUrl(format!("{}: {error}", self.backend_url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidUrl(format!(
                "{}: unsupported scheme `{other}`",
                self.backend_url
            ))),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    InvalidUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::InvalidUrl(detail) => write!(f, "invalid backend URL {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}
