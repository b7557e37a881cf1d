// On-disk cache of generated artifacts, one JSON file per project.
//
// Reads never fail: a missing entry is a miss, a corrupt one is removed and
// treated as a miss. Writes that fail are logged and otherwise ignored.

use std::io;
use std::path::{Path, PathBuf};

use m204_common::artifacts::CacheEntry;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(key, "artifact cache miss");
                return None;
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to read artifact cache");
                return None;
            }
        };
        match CacheEntry::decode(&raw) {
            Ok(entry) => {
                debug!(key, artifacts = entry.artifacts.len(), "artifact cache hit");
                Some(entry)
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "discarding unusable artifact cache entry");
                if let Err(remove_error) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %remove_error, "failed to remove artifact cache entry");
                }
                None
            }
        }
    }

    /// Returns whether the entry was written.
    pub fn store(&self, key: &str, entry: &CacheEntry) -> bool {
        match self.try_store(key, entry) {
            Ok(()) => true,
            Err(error) => {
                warn!(key, error = %error, "failed to write artifact cache");
                false
            }
        }
    }

    fn try_store(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_vec(entry).map_err(io::Error::other)?;
        std::fs::write(self.path(key), raw)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> io::Result<bool> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Remove every artifact entry under the cache directory.
    pub fn clear(&self) -> io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_artifact_entry = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("artifacts_") && name.ends_with(".json"));
            if is_artifact_entry {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
