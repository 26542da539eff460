// backuprunner/src/backup/executor.rs
use chrono::Local;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use uuid::Uuid;

use super::compress;
use super::dump::{DumpProducer, PgDumpProducer};
use super::record::{self, BackupRecord, BackupStatus};
use super::retention::{self, PruneOutcome};
use crate::config::BackupConfig;
use crate::credentials::{self, CredentialProvider};
use crate::errors::{BackupError, Result};
use crate::probe::{ConnectivityProbe, PgProbe};

/// Runs one backup cycle at a time: fetch credentials, verify connectivity,
/// produce a full dump, compress it, write metadata, prune expired artifacts.
///
/// The external trigger still owns cross-process exclusion, but the executor
/// carries its own in-process guard: a `run_cycle` issued while another is in
/// flight fails fast with `CycleInProgress` and is skipped, not queued.
pub struct BackupExecutor {
    config: BackupConfig,
    credentials: Box<dyn CredentialProvider>,
    probe: Box<dyn ConnectivityProbe>,
    dump: Box<dyn DumpProducer>,
    running: AtomicBool,
}

impl BackupExecutor {
    pub fn new(config: BackupConfig) -> Self {
        let credentials = Box::new(credentials::provider_from_config(&config.credential));
        Self::with_components(
            config,
            credentials,
            Box::new(PgProbe::default()),
            Box::new(PgDumpProducer),
        )
    }

    pub fn with_components(
        config: BackupConfig,
        credentials: Box<dyn CredentialProvider>,
        probe: Box<dyn ConnectivityProbe>,
        dump: Box<dyn DumpProducer>,
    ) -> Self {
        BackupExecutor {
            config,
            credentials,
            probe,
            dump,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one complete backup cycle and returns its record.
    pub fn run_cycle(&self) -> Result<BackupRecord> {
        let _guard = CycleGuard::acquire(&self.running)?;
        self.execute_cycle()
    }

    /// Runs the retention pruning pass alone. Idempotent.
    pub fn run_prune(&self) -> Result<PruneOutcome> {
        let _guard = CycleGuard::acquire(&self.running)?;
        retention::prune_expired(
            &self.config.output_dir,
            &self.config.artifact_prefix,
            self.config.retention_days,
            Local::now(),
        )
    }

    fn execute_cycle(&self) -> Result<BackupRecord> {
        let config = &self.config;
        println!(
            "🚀 Starting backup cycle for {}:{}/{}",
            config.target.host, config.target.port, config.target.database
        );
        fs::create_dir_all(&config.output_dir)?;

        let secret = self
            .credentials
            .fetch()?
            .ok_or_else(|| BackupError::CredentialUnavailable(self.credentials.describe()))?;

        self.probe.probe(&config.target, &secret)?;
        println!(
            "✅ Target {}:{} is reachable",
            config.target.host, config.target.port
        );

        let started_at = Local::now();
        let cycle_id = Uuid::new_v4();
        let raw_path = config
            .output_dir
            .join(record::raw_dump_file_name(&config.artifact_prefix, &started_at));
        let artifact_path = record::artifact_path_for(&raw_path);

        // Cleans up dump/compress intermediates on any fatal exit, including
        // an unwound or cancelled cycle. Disarmed once the artifact is final.
        let mut partials = PartialCleanup::new(vec![raw_path.clone(), artifact_path.clone()]);

        println!(
            "📦 Dumping {} to {}",
            config.target.database,
            raw_path.display()
        );
        let dump_started = Instant::now();
        self.dump.produce(&config.target, &secret, &raw_path)?;
        let duration_seconds = dump_started.elapsed().as_secs_f64();

        let raw_size = fs::metadata(&raw_path).map(|m| m.len()).unwrap_or(0);
        if raw_size == 0 {
            return Err(BackupError::DumpFailed(format!(
                "dump producer wrote a zero-byte file at {}",
                raw_path.display()
            )));
        }

        println!("🗜 Compressing {}", raw_path.display());
        let size_bytes = compress::gzip_file(&raw_path, &artifact_path)?;
        partials.disarm();
        if let Err(e) = fs::remove_file(&raw_path) {
            eprintln!("⚠ Could not remove raw dump {}: {}", raw_path.display(), e);
        }
        println!(
            "✅ Artifact written to {} ({} bytes)",
            artifact_path.display(),
            size_bytes
        );

        let backup_record = BackupRecord {
            cycle_id,
            timestamp: started_at,
            artifact_path: artifact_path.clone(),
            size_bytes,
            duration_seconds,
            status: BackupStatus::Success,
            retention_days: config.retention_days,
        };

        match record::metadata_path_for(&artifact_path) {
            Some(metadata_path) => {
                if let Err(e) = record::write_record(&backup_record, &metadata_path) {
                    eprintln!("⚠ {} (the artifact is usable without its sidecar)", e);
                }
            }
            None => eprintln!(
                "⚠ Could not derive metadata path for {}",
                artifact_path.display()
            ),
        }

        match retention::prune_expired(
            &config.output_dir,
            &config.artifact_prefix,
            config.retention_days,
            Local::now(),
        ) {
            Ok(outcome) => {
                if !outcome.removed.is_empty() {
                    println!("🗑 Pruned {} expired artifact(s)", outcome.removed.len());
                }
            }
            Err(e) => eprintln!("⚠ Retention pruning failed: {}", e),
        }

        Ok(backup_record)
    }
}

struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(BackupError::CycleInProgress);
        }
        Ok(CycleGuard { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct PartialCleanup {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl PartialCleanup {
    fn new(paths: Vec<PathBuf>) -> Self {
        PartialCleanup { paths, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialCleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in &self.paths {
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(path) {
                Ok(_) => println!("🧹 Removed partial file {}", path.display()),
                Err(e) => eprintln!(
                    "⚠ Could not remove partial file {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}
