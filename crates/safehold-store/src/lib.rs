//! Safehold store - snapshot persistence layer
//!
//! Serializes world state into versioned, timestamped snapshot files and
//! diffs two snapshots into a structured delta with a human-readable
//! summary. One file per capture, immutable once written.

pub mod snapshot;

pub use snapshot::capture::SnapshotStore;
pub use snapshot::diff::{diff_snapshots, SnapshotDiff};
pub use snapshot::{EntityRecord, WorldSnapshot};
