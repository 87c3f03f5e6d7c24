//! Snapshot diffing
//!
//! Computes the entity delta between two snapshots and renders it as a
//! short human-readable summary. Only labels are compared, not full
//! transforms - a documented simplification: a moved entity does not show
//! up in the diff, only created or destroyed ones do.

use std::path::Path;

use safehold_core::errors::Result;

use super::capture::SnapshotStore;
use super::WorldSnapshot;

/// Structured label delta between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Labels present in B but not in A, sorted
    pub added: Vec<String>,
    /// Labels present in A but not in B, sorted
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    /// Compute the diff of two snapshot records
    pub fn between(a: &WorldSnapshot, b: &WorldSnapshot) -> Self {
        let labels_a = a.label_set();
        let labels_b = b.label_set();

        let added = labels_b.difference(&labels_a).cloned().collect();
        let removed = labels_a.difference(&labels_b).cloned().collect();
        Self { added, removed }
    }

    /// True if the label sets are identical
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Render a short human-readable summary
    ///
    /// Intended for logs and CLI output; informational only.
    pub fn render_summary(&self) -> String {
        if self.is_identical() {
            return "Snapshots identical.".to_string();
        }

        let mut out = String::new();
        if !self.added.is_empty() {
            out.push_str(&format!(
                "+ Added ({}): {}\n",
                self.added.len(),
                self.added.join(", ")
            ));
        }
        if !self.removed.is_empty() {
            out.push_str(&format!(
                "- Removed ({}): {}\n",
                self.removed.len(),
                self.removed.join(", ")
            ));
        }
        out.trim_end().to_string()
    }
}

/// Diff two snapshot files by path
///
/// # Errors
///
/// Propagates `SnapshotNotFound` / `Serialization` from loading either file.
pub fn diff_snapshots(path_a: &Path, path_b: &Path) -> Result<SnapshotDiff> {
    let a = SnapshotStore::load(path_a)?;
    let b = SnapshotStore::load(path_b)?;
    Ok(SnapshotDiff::between(&a, &b))
}
