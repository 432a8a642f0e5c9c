//! Local file-based snapshots of partition state.
//!
//! Snapshots are stored as JSON files at
//! `<snapshot_dir>/partition-<partition_id>/snapshot.json`.
//! Writes are atomic via a temp-rename pattern to prevent corruption
//! from crashes mid-write.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::state::ProcessingState;

/// A point-in-time copy of a partition's state and log position.
///
/// `position` is the log position of the last record folded into `state`,
/// or `None` if no record was applied yet. Replay resumes with the record
/// after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: ProcessingState,
    pub position: Option<u64>,
}

/// Compute the filesystem path for a partition's snapshot file.
///
/// # Returns
///
/// `<snapshot_dir>/partition-<partition_id>/snapshot.json`
pub fn snapshot_path(snapshot_dir: &Path, partition_id: u32) -> PathBuf {
    snapshot_dir
        .join(format!("partition-{partition_id}"))
        .join("snapshot.json")
}

/// Save a partition snapshot atomically to disk.
///
/// Writes to a temporary file (`snapshot.json.tmp`) in the same directory,
/// then renames it to `snapshot.json`. Readers never see a partially
/// written file.
///
/// # Arguments
///
/// * `snapshot_dir` - Root directory for partition snapshots.
/// * `partition_id` - The partition the snapshot belongs to.
/// * `snapshot` - The snapshot to persist.
///
/// # Errors
///
/// Returns `io::Error` if directory creation, serialization, file writing,
/// or renaming fails.
pub fn save_snapshot(snapshot_dir: &Path, partition_id: u32, snapshot: &Snapshot) -> io::Result<()> {
    let dir = snapshot_dir.join(format!("partition-{partition_id}"));
    std::fs::create_dir_all(&dir)?;

    let path = dir.join("snapshot.json");
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, &path)?;
    tracing::debug!(
        partition_id,
        position = ?snapshot.position,
        bytes = json.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Load a partition snapshot from disk.
///
/// # Returns
///
/// - `Ok(Some(snapshot))` if the file exists and deserializes successfully.
/// - `Ok(None)` if the file does not exist or cannot be deserialized. A
///   corrupt snapshot is logged with `tracing::warn!` and the partition
///   rebuilds from the log instead.
///
/// # Errors
///
/// Returns `io::Error` only for unexpected I/O failures (e.g. permission denied).
pub fn load_snapshot(snapshot_dir: &Path, partition_id: u32) -> io::Result<Option<Snapshot>> {
    let path = snapshot_path(snapshot_dir, partition_id);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<Snapshot>(&bytes) {
        Ok(snap) => Ok(Some(snap)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to deserialize snapshot; treating as cache miss"
            );
            Ok(None)
        }
    }
}
