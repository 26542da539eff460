// backuprunner/src/backup/retention.rs
use chrono::{DateTime, Duration, Local, NaiveDateTime};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::record::{self, TIMESTAMP_FORMAT};
use crate::errors::{BackupError, Result};

#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
    pub failures: Vec<BackupError>,
}

/// Deletes artifact/sidecar pairs strictly older than the retention window.
///
/// Only files matching `<prefix>-<timestamp>.sql.gz` at the top level of
/// `output_dir` are considered; anything else is left alone. Age is measured
/// against the timestamp encoded in the file name, so an artifact exactly
/// `retention_days` old is kept. One undeletable file does not abort pruning
/// of the rest.
pub fn prune_expired(
    output_dir: &Path,
    prefix: &str,
    retention_days: i64,
    now: DateTime<Local>,
) -> Result<PruneOutcome> {
    let mut outcome = PruneOutcome::default();
    if !output_dir.is_dir() {
        return Ok(outcome);
    }

    let pattern = Regex::new(&format!(
        r"^{}-(\d{{4}}-\d{{2}}-\d{{2}}-\d{{6}})\.sql\.gz$",
        regex::escape(prefix)
    ))
    .map_err(|e| BackupError::Config(format!("invalid artifact prefix for pruning: {}", e)))?;

    let window = Duration::days(retention_days);

    for entry in WalkDir::new(output_dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("⚠ Skipping unreadable entry while pruning: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(captures) = pattern.captures(name) else {
            continue;
        };

        let Some(timestamp) = parse_artifact_timestamp(&captures[1]) else {
            eprintln!("⚠ Unparsable timestamp in artifact name {}, leaving it alone", name);
            continue;
        };

        if now.signed_duration_since(timestamp) <= window {
            outcome.kept += 1;
            continue;
        }

        let artifact_path = entry.path().to_path_buf();
        match fs::remove_file(&artifact_path) {
            Ok(_) => {
                println!("🗑 Pruned expired artifact {}", artifact_path.display());
                remove_sidecar(&artifact_path, &mut outcome);
                outcome.removed.push(artifact_path);
            }
            Err(e) => {
                eprintln!("⚠ Could not prune {}: {}", artifact_path.display(), e);
                outcome.failures.push(BackupError::PruneFailed {
                    path: artifact_path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

fn remove_sidecar(artifact_path: &Path, outcome: &mut PruneOutcome) {
    let Some(metadata_path) = record::metadata_path_for(artifact_path) else {
        return;
    };
    if !metadata_path.is_file() {
        return;
    }
    if let Err(e) = fs::remove_file(&metadata_path) {
        eprintln!("⚠ Could not prune metadata {}: {}", metadata_path.display(), e);
        outcome.failures.push(BackupError::PruneFailed {
            path: metadata_path,
            reason: e.to_string(),
        });
    }
}

fn parse_artifact_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()?;
    naive.and_local_timezone(Local).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    /// Writes an artifact plus its sidecar, named for a cycle aged `days` days
    /// (and `extra_seconds` seconds) before `now`.
    fn seed_pair(dir: &Path, prefix: &str, now: DateTime<Local>, days: i64, extra_seconds: i64) {
        let timestamp = now - Duration::days(days) - Duration::seconds(extra_seconds);
        let artifact =
            record::artifact_path_for(&dir.join(record::raw_dump_file_name(prefix, &timestamp)));
        fs::write(&artifact, b"compressed dump bytes").unwrap();
        let sidecar = record::metadata_path_for(&artifact).unwrap();
        fs::write(&sidecar, b"{}").unwrap();
    }

    fn dir_names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_prune_keeps_boundary_and_removes_strictly_older() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let now = fixed_now();
        for days in [6, 7, 8, 10] {
            seed_pair(dir.path(), "pg-backup", now, days, 0);
        }

        let outcome = prune_expired(dir.path(), "pg-backup", 7, now)?;

        assert_eq!(outcome.removed.len(), 2);
        assert_eq!(outcome.kept, 2);
        assert!(outcome.failures.is_empty());

        let remaining = dir_names(dir.path());
        assert_eq!(remaining.len(), 4); // two surviving pairs
        for days in [6, 7] {
            let timestamp = now - Duration::days(days);
            let name = format!(
                "pg-backup-{}.sql.gz",
                timestamp.format(TIMESTAMP_FORMAT)
            );
            assert!(remaining.contains(&name), "{} should survive", name);
        }
        Ok(())
    }

    #[test]
    fn test_prune_removes_one_second_past_the_boundary() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let now = fixed_now();
        seed_pair(dir.path(), "pg-backup", now, 7, 1);

        let outcome = prune_expired(dir.path(), "pg-backup", 7, now)?;
        assert_eq!(outcome.removed.len(), 1);
        assert!(dir_names(dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_prune_removes_sidecar_with_artifact() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let now = fixed_now();
        seed_pair(dir.path(), "pg-backup", now, 10, 0);

        prune_expired(dir.path(), "pg-backup", 7, now)?;
        assert!(dir_names(dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_prune_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let now = fixed_now();
        for days in [3, 9] {
            seed_pair(dir.path(), "pg-backup", now, days, 0);
        }

        let first = prune_expired(dir.path(), "pg-backup", 7, now)?;
        let after_first = dir_names(dir.path());
        let second = prune_expired(dir.path(), "pg-backup", 7, now)?;

        assert_eq!(first.removed.len(), 1);
        assert_eq!(second.removed.len(), 0);
        assert_eq!(dir_names(dir.path()), after_first);
        Ok(())
    }

    #[test]
    fn test_prune_ignores_foreign_files_and_other_prefixes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let now = fixed_now();
        let old = now - Duration::days(30);

        fs::write(dir.path().join("notes.txt"), b"keep me")?;
        fs::write(
            dir.path().join(format!(
                "other-prefix-{}.sql.gz",
                old.format(TIMESTAMP_FORMAT)
            )),
            b"someone else's backup",
        )?;
        fs::write(
            dir.path()
                .join(format!("pg-backup-{}.sql", old.format(TIMESTAMP_FORMAT))),
            b"raw dump, not an artifact",
        )?;

        let outcome = prune_expired(dir.path(), "pg-backup", 7, now)?;
        assert!(outcome.removed.is_empty());
        assert_eq!(dir_names(dir.path()).len(), 3);
        Ok(())
    }

    #[test]
    fn test_prune_missing_directory_is_a_no_op() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("never-created");
        let outcome = prune_expired(&missing, "pg-backup", 7, fixed_now())?;
        assert!(outcome.removed.is_empty());
        assert!(outcome.failures.is_empty());
        Ok(())
    }
}
