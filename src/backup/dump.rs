// backuprunner/src/backup/dump.rs
use std::path::{Path, PathBuf};
use std::process::Command;

use which::which;

use crate::config::TargetConfig;
use crate::credentials::Secret;
use crate::errors::{BackupError, Result};

// Helper function to find pg_dump executable
fn find_pg_dump_executable() -> Result<PathBuf> {
    which("pg_dump").map_err(|_| {
        BackupError::Config(
            "pg_dump executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH."
                .to_string(),
        )
    })
}

/// External process that streams a full data dump of the target to a given
/// output path. Non-zero exit indicates failure.
pub trait DumpProducer: Send + Sync {
    fn produce(&self, target: &TargetConfig, secret: &Secret, out_path: &Path) -> Result<()>;
}

/// Dumps the target database with pg_dump.
pub struct PgDumpProducer;

impl DumpProducer for PgDumpProducer {
    fn produce(&self, target: &TargetConfig, secret: &Secret, out_path: &Path) -> Result<()> {
        let pg_dump_path = find_pg_dump_executable()?;
        println!("Found pg_dump executable at: {}", pg_dump_path.display());

        let mut cmd = build_pg_dump_command(&pg_dump_path, target, out_path);
        // Credential travels via the process environment, never argv.
        cmd.env("PGPASSWORD", secret.expose());

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(BackupError::DumpFailed(format!(
                "pg_dump for database {} failed with status: {}\nStderr: {}",
                target.database,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

fn build_pg_dump_command(pg_dump_path: &Path, target: &TargetConfig, out_path: &Path) -> Command {
    let mut cmd = Command::new(pg_dump_path);
    cmd.arg("--no-password")
        .arg("--format")
        .arg("plain")
        .arg("-h")
        .arg(&target.host)
        .arg("-p")
        .arg(target.port.to_string())
        .arg("-U")
        .arg(&target.user)
        .arg("-d")
        .arg(&target.database)
        .arg("-f")
        .arg(out_path);
    cmd
}
