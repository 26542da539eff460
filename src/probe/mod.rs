// backuprunner/src/probe/mod.rs
use std::time::Duration;

use postgres::{Config as PgConfig, NoTls};

use crate::config::TargetConfig;
use crate::credentials::Secret;
use crate::errors::{BackupError, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trivial read-only probe against the dump target, so a cycle fails fast
/// before paying the cost of a full dump attempt.
pub trait ConnectivityProbe: Send + Sync {
    fn probe(&self, target: &TargetConfig, secret: &Secret) -> Result<()>;
}

/// Connects to the target and runs `SELECT 1`.
pub struct PgProbe {
    connect_timeout: Duration,
}

impl PgProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        PgProbe { connect_timeout }
    }
}

impl Default for PgProbe {
    fn default() -> Self {
        PgProbe::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl ConnectivityProbe for PgProbe {
    fn probe(&self, target: &TargetConfig, secret: &Secret) -> Result<()> {
        let unreachable = |e: postgres::Error| BackupError::TargetUnreachable {
            host: target.host.clone(),
            port: target.port,
            reason: e.to_string(),
        };

        let mut client = PgConfig::new()
            .host(&target.host)
            .port(target.port)
            .user(&target.user)
            .password(secret.expose())
            .dbname(&target.database)
            .connect_timeout(self.connect_timeout)
            .connect(NoTls)
            .map_err(unreachable)?;

        client.simple_query("SELECT 1").map_err(unreachable)?;
        Ok(())
    }
}
