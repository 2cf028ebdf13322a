//! # Snapshot Persistence
//!
//! A [`Bucket`] is pure serializable state, so persistence is a JSON
//! envelope on disk. Writes go through a temp-file-then-rename dance so a
//! crash mid-write leaves either the old snapshot or the new one, never a
//! truncated hybrid. Loads check the schema version before handing state
//! back.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::bucket::Bucket;
use crate::config::SNAPSHOT_SCHEMA_VERSION;

/// Errors raised while saving or loading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid snapshot.
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The snapshot was written by an incompatible engine version.
    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    SchemaMismatch {
        /// Version found in the file.
        found: u32,
        /// Version this engine writes.
        expected: u32,
    },
}

/// The on-disk shape: versioned, timestamped, bucket inside.
#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    bucket: Bucket,
}

/// Serializes `bucket` to `path` atomically.
///
/// The snapshot is written to `<path>.tmp`, fsynced, then renamed over the
/// target. Pretty-printed JSON: snapshots get diffed and read by humans
/// during incident reviews.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] or [`SnapshotError::Serde`] as applicable;
/// the target file is untouched on error.
pub fn save_snapshot(bucket: &Bucket, path: &Path) -> Result<(), SnapshotError> {
    let envelope = SnapshotEnvelope {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        saved_at: Utc::now(),
        bucket: bucket.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// Loads a bucket from a snapshot written by [`save_snapshot`].
///
/// # Errors
///
/// Returns [`SnapshotError::SchemaMismatch`] for snapshots from an
/// incompatible engine version, [`SnapshotError::Io`]/[`SnapshotError::Serde`]
/// for unreadable or malformed files.
pub fn load_snapshot(path: &Path) -> Result<Bucket, SnapshotError> {
    let json = fs::read_to_string(path)?;
    let envelope: SnapshotEnvelope = serde_json::from_str(&json)?;

    if envelope.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            found: envelope.schema_version,
            expected: SNAPSHOT_SCHEMA_VERSION,
        });
    }

    info!(path = %path.display(), "snapshot loaded");
    Ok(envelope.bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USD_UNIT;
    use crate::oracle::StaticOracle;

    fn sample_bucket() -> Bucket {
        let mut oracle = StaticOracle::new(10);
        oracle.list_token("ETH", 2_000 * USD_UNIT, 18);
        let mut bucket = Bucket::active("owner");
        bucket
            .deposit("alice", "ETH", 3 * 10u128.pow(18), &oracle)
            .unwrap();
        bucket
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bucket.json");
        let bucket = sample_bucket();

        save_snapshot(&bucket, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.owner(), bucket.owner());
        assert_eq!(
            loaded.ledger().balance_of("alice"),
            bucket.ledger().balance_of("alice")
        );
        assert_eq!(
            loaded.holdings().amount_of("ETH"),
            bucket.holdings().amount_of("ETH")
        );
    }

    #[test]
    fn save_replaces_existing_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bucket.json");
        let bucket = sample_bucket();

        save_snapshot(&bucket, &path).unwrap();
        save_snapshot(&bucket, &path).unwrap();
        assert!(load_snapshot(&path).is_ok());
        // No leftover temp file after a clean save.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_snapshot(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(SnapshotError::Io(_))));
    }

    #[test]
    fn load_garbage_is_serde_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("garbage.json");
        fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            load_snapshot(&path),
            Err(SnapshotError::Serde(_))
        ));
    }

    #[test]
    fn wrong_schema_version_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bucket.json");
        save_snapshot(&sample_bucket(), &path).unwrap();

        // Bump the version field in place.
        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(SnapshotError::SchemaMismatch {
                found: 99,
                expected: SNAPSHOT_SCHEMA_VERSION
            })
        ));
    }
}
