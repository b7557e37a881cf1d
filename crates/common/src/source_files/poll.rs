// Bounded polling for analysis results.
//
// After an analyze request the client waits an initial delay scaled by the
// number of files, then re-fetches on a fixed interval until every file is
// terminal or the attempt budget runs out.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisStatus, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub initial_delay_ms: u64,
    pub per_file_delay_ms: u64,
    pub max_initial_delay_ms: u64,
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            per_file_delay_ms: 500,
            max_initial_delay_ms: 30_000,
            interval_ms: 5_000,
            max_attempts: 24,
        }
    }
}

impl PollPolicy {
    pub fn initial_delay(&self, file_count: usize) -> Duration {
        let scaled = self
            .initial_delay_ms
            .saturating_add(self.per_file_delay_ms.saturating_mul(file_count as u64));
        Duration::from_millis(scaled.min(self.max_initial_delay_ms))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Wait before fetch number `attempt` (0-based).
    pub fn delay_before(&self, attempt: u32, file_count: usize) -> Duration {
        if attempt == 0 {
            self.initial_delay(file_count)
        } else {
            self.interval()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// True when every file has finished analysis.
pub fn is_settled(files: &[SourceFile]) -> bool {
    files.iter().all(|file| file.analysis_status.is_terminal())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Settled { files: Vec<SourceFile>, attempts: u32 },
    Exhausted { files: Vec<SourceFile>, attempts: u32 },
}

impl PollOutcome {
    pub fn files(&self) -> &[SourceFile] {
        match self {
            Self::Settled { files, .. } | Self::Exhausted { files, .. } => files,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Settled { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

/// A file that reported a terminal status and later a non-terminal one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRegression {
    pub file_id: String,
    pub file_name: String,
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
}

/// Remembers the last status per file across polls.
#[derive(Debug, Default)]
pub struct StatusWatch {
    last: HashMap<String, AnalysisStatus>,
}

impl StatusWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetch and report files that went backwards.
    pub fn observe(&mut self, files: &[SourceFile]) -> Vec<StatusRegression> {
        let mut regressions = Vec::new();
        for file in files {
            let previous = self.last.insert(file.id.clone(), file.analysis_status);
            if let Some(from) = previous {
                if from.is_terminal() && !file.analysis_status.is_terminal() {
                    regressions.push(StatusRegression {
                        file_id: file.id.clone(),
                        file_name: file.original_filename.clone(),
                        from,
                        to: file.analysis_status,
                    });
                }
            }
        }
        regressions
    }
}
