//! Snapshot capture and persistence
//!
//! Each capture writes one JSON file named `<name>_<timestamp>.json` under
//! the store directory. Files are immutable once written; a re-capture
//! under the same name gets a new timestamp key.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use safehold_core::errors::{Result, SafeholdError};
use safehold_core::World;

use super::WorldSnapshot;

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir` (created lazily on first capture)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory snapshots are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the current world state under `name`
    ///
    /// Returns the path of the written snapshot file. An empty name falls
    /// back to `snapshot`.
    ///
    /// # Errors
    ///
    /// - `Io`: directory creation or file write failed
    /// - `Serialization`: snapshot could not be encoded
    pub fn capture(&self, world: &World, name: &str) -> Result<PathBuf> {
        let now = chrono::Utc::now();
        let snapshot = WorldSnapshot::from_world(world, name, now.to_rfc3339());

        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            SafeholdError::Serialization {
                message: format!("Failed to serialize snapshot: {}", e),
            }
        })?;

        std::fs::create_dir_all(&self.dir).map_err(|e| SafeholdError::Io {
            message: format!(
                "Failed to create snapshot dir {}: {}",
                self.dir.display(),
                e
            ),
        })?;

        let safe_name = if name.is_empty() { "snapshot" } else { name };
        let file_key = format!("{}_{}.json", safe_name, now.format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(file_key);

        std::fs::write(&path, &json).map_err(|e| SafeholdError::Io {
            message: format!("Failed to write snapshot {}: {}", path.display(), e),
        })?;

        let digest = content_digest(json.as_bytes());
        debug!(
            path = %path.display(),
            entity_count = snapshot.entity_count,
            digest = %digest,
            "Snapshot captured"
        );

        Ok(path)
    }

    /// Best-effort capture used by the rollback phase: failures are logged
    /// and swallowed, returning `None`
    pub fn capture_best_effort(&self, world: &World, name: &str) -> Option<PathBuf> {
        match self.capture(world, name) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(name = %name, error = %e, "Pre-execution snapshot failed (non-blocking)");
                None
            }
        }
    }

    /// Load a snapshot file
    ///
    /// # Errors
    ///
    /// - `SnapshotNotFound`: file missing or unreadable
    /// - `Serialization`: file is not a valid snapshot record
    pub fn load(path: &Path) -> Result<WorldSnapshot> {
        let bytes = std::fs::read(path).map_err(|_| SafeholdError::SnapshotNotFound {
            path: path.display().to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| SafeholdError::Serialization {
            message: format!("Invalid snapshot file {}: {}", path.display(), e),
        })
    }
}

/// SHA-256 content digest, hex-encoded (64 characters)
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
