// backuprunner/src/backup/record.rs
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::{BackupError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";
pub const RAW_DUMP_SUFFIX: &str = ".sql";
pub const ARTIFACT_SUFFIX: &str = ".sql.gz";
pub const METADATA_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Success,
    Failed,
}

/// One row per executed backup attempt, persisted as a JSON sidecar next to
/// the artifact it describes. Immutable once written; destroyed only by the
/// retention-pruning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Local>,
    pub artifact_path: PathBuf,
    pub size_bytes: u64,
    pub duration_seconds: f64,
    pub status: BackupStatus,
    pub retention_days: i64,
}

/// File name for the raw (uncompressed) dump of a cycle started at
/// `timestamp`. Second granularity; the at-most-one-concurrent guarantee
/// keeps two cycles from landing in the same second.
pub fn raw_dump_file_name(prefix: &str, timestamp: &DateTime<Local>) -> String {
    format!(
        "{}-{}{}",
        prefix,
        timestamp.format(TIMESTAMP_FORMAT),
        RAW_DUMP_SUFFIX
    )
}

/// The compressed artifact path for a raw dump path.
pub fn artifact_path_for(raw_dump_path: &Path) -> PathBuf {
    let mut os = raw_dump_path.as_os_str().to_os_string();
    os.push(".gz");
    PathBuf::from(os)
}

/// The metadata sidecar path paired with an artifact, derived by stripping
/// the artifact extension. None if the path does not follow the artifact
/// naming convention.
pub fn metadata_path_for(artifact_path: &Path) -> Option<PathBuf> {
    let name = artifact_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(ARTIFACT_SUFFIX)?;
    Some(artifact_path.with_file_name(format!("{}{}", stem, METADATA_SUFFIX)))
}

pub fn write_record(record: &BackupRecord, path: &Path) -> Result<()> {
    let write_failed = |reason: String| BackupError::MetadataWriteFailed {
        path: path.to_path_buf(),
        reason,
    };
    let json = serde_json::to_string_pretty(record).map_err(|e| write_failed(e.to_string()))?;
    fs::write(path, json).map_err(|e| write_failed(e.to_string()))?;
    Ok(())
}

#[allow(dead_code)]
pub fn read_record(path: &Path) -> Result<BackupRecord> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
