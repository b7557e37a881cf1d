// CLI subcommand dispatch.

use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::cache::ArtifactCache;
use crate::client::ApiClient;
use crate::config::ConsoleConfig;
use crate::output::{self, OutputFormat};

pub mod artifacts;
pub mod files;
pub mod inventory;
pub mod overview;
pub mod projects;
pub mod requirements;

#[derive(Subcommand)]
pub enum Command {
    /// List, inspect, create and delete migration projects
    Projects(projects::ProjectsArgs),
    /// Summarize one project
    Overview(overview::OverviewArgs),
    /// Upload, inspect and analyze source files
    Files(files::FilesArgs),
    /// Browse and edit extracted M204 metadata
    Inventory(inventory::InventoryArgs),
    /// Generate, read and repair the requirements document
    Requirements(requirements::RequirementsArgs),
    /// Generate and download COBOL, JCL and unit-test artifacts
    Artifacts(artifacts::ArtifactsArgs),
}

pub fn run(cmd: Command, ctx: &Context) -> Result<()> {
    match cmd {
        Command::Projects(args) => projects::run(args, ctx),
        Command::Overview(args) => overview::run(args, ctx),
        Command::Files(args) => files::run(args, ctx),
        Command::Inventory(args) => inventory::run(args, ctx),
        Command::Requirements(args) => requirements::run(args, ctx),
        Command::Artifacts(args) => artifacts::run(args, ctx),
    }
}

/// What every command needs: resolved configuration and output format.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ConsoleConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config: ConsoleConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::from_config(&self.config)
    }

    pub fn cache(&self) -> ArtifactCache {
        ArtifactCache::new(&self.config.cache_dir)
    }

    pub fn print<T, F>(&self, value: &T, human_fn: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        output::print_output(self.format, value, human_fn)?;
        Ok(())
    }

    pub fn warn(&self, code: &str, message: &str) {
        output::print_warning(self.format, code, message);
    }
}

/// Run a future on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Ask before a destructive action. Without a terminal, `--yes` is required.
pub(crate) fn confirm(prompt: &str, assume_yes: bool) -> Result<()> {
    if assume_yes {
        return Ok(());
    }
    if !io::stdin().is_terminal() {
        bail!("{prompt}: refusing without --yes when stdin is not a terminal");
    }
    let mut err = io::stderr().lock();
    write!(err, "{prompt} [y/N] ")?;
    err.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if is_yes(&answer) {
        Ok(())
    } else {
        bail!("cancelled")
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// `12 item(s)` style counts used in human output.
pub(crate) fn plural(count: usize, noun: &str) -> String {
    format!("{count} {noun}(s)")
}

/// Fixed-width cell for human tables; long text is cut with `…`.
pub(crate) fn cell(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return format!("{text:<width$}");
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{cut}…")
}
