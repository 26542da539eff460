pub(crate) mod compress;
pub(crate) mod dump;
mod executor;
pub(crate) mod record;
pub(crate) mod retention;

pub use executor::BackupExecutor;

use anyhow::{Context, Result};

use crate::config::{AppConfig, OperationConfig};

/// Public entry point for one backup cycle.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<()> {
    let backup_config = match &app_config.operation {
        Some(OperationConfig::Backup(cfg)) => cfg.clone(),
        _ => anyhow::bail!("Backup operation selected but no backup configuration found."),
    };

    let executor = BackupExecutor::new(backup_config);
    let backup_record = executor.run_cycle().context("Backup cycle failed")?;
    println!(
        "📄 Cycle {}: {} ({} bytes, dump took {:.1}s, retained for {} days)",
        backup_record.cycle_id,
        backup_record.artifact_path.display(),
        backup_record.size_bytes,
        backup_record.duration_seconds,
        backup_record.retention_days
    );
    Ok(())
}

/// Public entry point for a standalone retention-pruning pass.
pub async fn run_prune_flow(app_config: &AppConfig) -> Result<()> {
    let backup_config = match &app_config.operation {
        Some(OperationConfig::Prune(cfg)) => cfg.clone(),
        _ => anyhow::bail!("Prune operation selected but no prune configuration found."),
    };

    let executor = BackupExecutor::new(backup_config);
    let outcome = executor.run_prune().context("Pruning failed")?;
    println!(
        "🗑 Pruned {} expired artifact(s), kept {}",
        outcome.removed.len(),
        outcome.kept
    );
    if !outcome.failures.is_empty() {
        println!(
            "⚠ {} file(s) could not be pruned, see warnings above.",
            outcome.failures.len()
        );
    }
    Ok(())
}
