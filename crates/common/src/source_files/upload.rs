// Per-file upload progress, keyed by a client-side temporary id.
//
// Finished entries linger for `retain_for` so their outcome can still be
// shown, then `prune` drops them. Time is always passed in by the caller.

use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::types::SourceType;

pub const DEFAULT_RETAIN_FOR: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    InProgress { percent: u8 },
    Succeeded,
    Failed { error: String },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadEntry {
    pub temp_id: Uuid,
    pub file_name: String,
    pub source_type: SourceType,
    #[serde(flatten)]
    pub state: UploadState,
    #[serde(skip)]
    finished_at: Option<Instant>,
}

#[derive(Debug)]
pub struct UploadTracker {
    entries: Vec<UploadEntry>,
    retain_for: Duration,
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETAIN_FOR)
    }
}

impl UploadTracker {
    pub fn new(retain_for: Duration) -> Self {
        Self { entries: Vec::new(), retain_for }
    }

    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn get(&self, temp_id: Uuid) -> Option<&UploadEntry> {
        self.entries.iter().find(|entry| entry.temp_id == temp_id)
    }

    /// Register a file about to be sent.
    pub fn start(&mut self, file_name: impl Into<String>, source_type: SourceType) -> Uuid {
        let temp_id = Uuid::new_v4();
        self.entries.push(UploadEntry {
            temp_id,
            file_name: file_name.into(),
            source_type,
            state: UploadState::InProgress { percent: 0 },
            finished_at: None,
        });
        temp_id
    }

    /// Record transferred bytes. Ignored once the entry is terminal.
    pub fn progress(&mut self, temp_id: Uuid, sent: u64, total: u64) {
        let Some(entry) = self.entry_mut(temp_id) else { return };
        if entry.state.is_terminal() {
            return;
        }
        let percent = if total == 0 { 100 } else { (sent.min(total) * 100 / total) as u8 };
        entry.state = UploadState::InProgress { percent };
    }

    pub fn succeed(&mut self, temp_id: Uuid, now: Instant) {
        self.finish(temp_id, UploadState::Succeeded, now);
    }

    pub fn fail(&mut self, temp_id: Uuid, error: impl Into<String>, now: Instant) {
        self.finish(temp_id, UploadState::Failed { error: error.into() }, now);
    }

    /// Drop terminal entries older than the retention window. Returns how
    /// many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let retain_for = self.retain_for;
        self.entries.retain(|entry| match entry.finished_at {
            Some(finished) => now.saturating_duration_since(finished) < retain_for,
            None => true,
        });
        before - self.entries.len()
    }

    pub fn in_flight(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.state.is_terminal()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadEntry> {
        self.entries.iter().filter(|entry| matches!(entry.state, UploadState::Failed { .. }))
    }

    fn finish(&mut self, temp_id: Uuid, state: UploadState, now: Instant) {
        if let Some(entry) = self.entry_mut(temp_id) {
            entry.state = state;
            entry.finished_at = Some(now);
        }
    }

    fn entry_mut(&mut self, temp_id: Uuid) -> Option<&mut UploadEntry> {
        self.entries.iter_mut().find(|entry| entry.temp_id == temp_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_progress_independently() {
        let mut tracker = UploadTracker::default();
        let a = tracker.start("A.M204", SourceType::M204);
        let b = tracker.start("B.JCL", SourceType::Jcl);
        assert_ne!(a, b);

        tracker.progress(a, 50, 200);
        assert_eq!(tracker.get(a).unwrap().state, UploadState::InProgress { percent: 25 });
        assert_eq!(tracker.get(b).unwrap().state, UploadState::InProgress { percent: 0 });
        assert_eq!(tracker.in_flight(), 2);
    }

    #[test]
    fn terminal_entries_ignore_late_progress() {
        let mut tracker = UploadTracker::default();
        let id = tracker.start("A.M204", SourceType::M204);
        tracker.fail(id, "413 Payload Too Large", Instant::now());
        tracker.progress(id, 10, 10);
        assert!(matches!(tracker.get(id).unwrap().state, UploadState::Failed { .. }));
        assert_eq!(tracker.failures().count(), 1);
    }

    #[test]
    fn finished_entries_are_pruned_after_retention() {
        let start = Instant::now();
        let mut tracker = UploadTracker::new(Duration::from_secs(3));
        let done = tracker.start("A.M204", SourceType::M204);
        let running = tracker.start("B.M204", SourceType::M204);
        tracker.succeed(done, start);

        assert_eq!(tracker.prune(start + Duration::from_secs(2)), 0);
        assert_eq!(tracker.prune(start + Duration::from_secs(3)), 1);
        assert!(tracker.get(done).is_none());
        assert!(tracker.get(running).is_some());
    }

    #[test]
    fn zero_byte_files_report_complete() {
        let mut tracker = UploadTracker::default();
        let id = tracker.start("EMPTY.TXT", SourceType::Other);
        tracker.progress(id, 0, 0);
        assert_eq!(tracker.get(id).unwrap().state, UploadState::InProgress { percent: 100 });
    }
}
