// backuprunner/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_OUTPUT_DIR: &str = "./backups";
const DEFAULT_ARTIFACT_PREFIX: &str = "pg-backup";
const DEFAULT_RETENTION_DAYS: i64 = 7;
const DEFAULT_TARGET_HOST: &str = "localhost";
const DEFAULT_TARGET_PORT: u16 = 5432;
const DEFAULT_TARGET_USER: &str = "postgres";
const DEFAULT_TARGET_DATABASE: &str = "postgres";
const DEFAULT_SECRET_KEY: &str = "password";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonCredentialConfig {
    pub secret_name: Option<String>,
    pub secret_namespace: Option<String>,
    pub secret_key: Option<String>,
    pub credential_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub target_database_url: Option<String>,
    pub target_host: Option<String>,
    pub target_port: Option<u16>,
    pub target_user: Option<String>,
    pub target_database: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub artifact_prefix: Option<String>,
    pub retention_days: Option<i64>,
    pub credential: Option<JsonCredentialConfig>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
}

/// Reference to a secret held by the external secret store.
#[derive(Debug, Clone)]
pub struct SecretRef {
    pub name: String,
    pub namespace: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub secret: Option<SecretRef>,
    pub credential_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub target: TargetConfig,
    pub output_dir: PathBuf,
    pub artifact_prefix: String,
    pub retention_days: i64,
    pub credential: CredentialConfig,
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Backup(BackupConfig),
    Prune(BackupConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub raw_json_config: RawJsonConfig,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Ok(AppConfig {
            operation: None, // To be filled by main after parsing CLI args
            raw_json_config,
        })
    }
}

pub fn load_backup_config_from_json(raw_config: &RawJsonConfig) -> Result<BackupConfig> {
    let target = resolve_target(raw_config)?;

    let output_dir = resolve_output_dir(
        raw_config.output_dir.clone(),
        env::var("LOCAL_BACKUP_DIR").ok(),
    );

    let artifact_prefix = raw_config
        .artifact_prefix
        .clone()
        .unwrap_or_else(|| DEFAULT_ARTIFACT_PREFIX.to_string());
    if artifact_prefix.trim().is_empty()
        || artifact_prefix
            .contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
    {
        return Err(anyhow::anyhow!(
            "Invalid artifact_prefix {:?} in config.json: only alphanumeric characters, '-' and '_' are allowed.",
            artifact_prefix
        ));
    }

    let retention_days = raw_config.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
    if retention_days < 1 {
        return Err(anyhow::anyhow!(
            "retention_days must be at least 1, got {}",
            retention_days
        ));
    }

    let credential = resolve_credential(raw_config)?;

    Ok(BackupConfig {
        target,
        output_dir,
        artifact_prefix,
        retention_days,
        credential,
    })
}

fn resolve_output_dir(from_config: Option<PathBuf>, from_env: Option<String>) -> PathBuf {
    from_config
        .or(from_env.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

/// Resolves the target connection parameters.
///
/// A full `target_database_url` may be supplied and is decomposed into its
/// components; explicit `target_*` fields take precedence over URL parts, and
/// anything still missing falls back to the defaults. A password embedded in
/// the URL is ignored: credentials only ever come from the credential source.
fn resolve_target(raw_config: &RawJsonConfig) -> Result<TargetConfig> {
    let mut host = None;
    let mut port = None;
    let mut user = None;
    let mut database = None;

    if let Some(url_str) = &raw_config.target_database_url {
        let parsed = Url::parse(url_str)
            .with_context(|| format!("Invalid target_database_url in config.json: {}", url_str))?;
        if parsed.password().is_some() {
            println!(
                "⚠ Password embedded in target_database_url is ignored; configure a credential source instead."
            );
        }
        host = parsed.host_str().map(|h| h.to_string());
        port = parsed.port();
        if !parsed.username().is_empty() {
            user = Some(parsed.username().to_string());
        }
        let db = parsed.path().trim_start_matches('/');
        if !db.is_empty() {
            database = Some(db.to_string());
        }
    }

    Ok(TargetConfig {
        host: raw_config
            .target_host
            .clone()
            .or(host)
            .unwrap_or_else(|| DEFAULT_TARGET_HOST.to_string()),
        port: raw_config
            .target_port
            .or(port)
            .unwrap_or(DEFAULT_TARGET_PORT),
        user: raw_config
            .target_user
            .clone()
            .or(user)
            .unwrap_or_else(|| DEFAULT_TARGET_USER.to_string()),
        database: raw_config
            .target_database
            .clone()
            .or(database)
            .unwrap_or_else(|| DEFAULT_TARGET_DATABASE.to_string()),
    })
}

fn resolve_credential(raw_config: &RawJsonConfig) -> Result<CredentialConfig> {
    let json_credential = raw_config
        .credential
        .as_ref()
        .context("credential must be set in config.json (secret_name and/or credential_file)")?;

    let secret = json_credential
        .secret_name
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .map(|name| SecretRef {
            name: name.clone(),
            namespace: json_credential
                .secret_namespace
                .clone()
                .filter(|s| !s.trim().is_empty()),
            key: json_credential
                .secret_key
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
        });

    let credential_file = json_credential
        .credential_file
        .clone()
        .filter(|p| !p.to_string_lossy().trim().is_empty());

    if secret.is_none() && credential_file.is_none() {
        return Err(anyhow::anyhow!(
            "credential in config.json must provide secret_name, credential_file, or both."
        ));
    }

    Ok(CredentialConfig {
        secret,
        credential_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> RawJsonConfig {
        serde_json::from_value(value).expect("test config should deserialize")
    }

    #[test]
    fn test_defaults_applied() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "credential": { "credential_file": "/var/run/secrets/db-password" }
        }));
        let config = load_backup_config_from_json(&raw)?;

        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.user, "postgres");
        assert_eq!(config.target.database, "postgres");
        assert_eq!(config.artifact_prefix, "pg-backup");
        assert_eq!(config.retention_days, 7);
        Ok(())
    }

    #[test]
    fn test_target_url_decomposition() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "target_database_url": "postgres://backup_user@db.internal:5433/appdb",
            "credential": { "secret_name": "db-credentials" }
        }));
        let config = load_backup_config_from_json(&raw)?;

        assert_eq!(config.target.host, "db.internal");
        assert_eq!(config.target.port, 5433);
        assert_eq!(config.target.user, "backup_user");
        assert_eq!(config.target.database, "appdb");
        Ok(())
    }

    #[test]
    fn test_explicit_fields_override_url() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "target_database_url": "postgres://backup_user@db.internal:5433/appdb",
            "target_host": "replica.internal",
            "target_database": "appdb_replica",
            "credential": { "secret_name": "db-credentials" }
        }));
        let config = load_backup_config_from_json(&raw)?;

        assert_eq!(config.target.host, "replica.internal");
        assert_eq!(config.target.port, 5433);
        assert_eq!(config.target.database, "appdb_replica");
        Ok(())
    }

    #[test]
    fn test_retention_days_must_be_positive() {
        let raw = raw_from(json!({
            "retention_days": 0,
            "credential": { "secret_name": "db-credentials" }
        }));
        assert!(load_backup_config_from_json(&raw).is_err());
    }

    #[test]
    fn test_credential_source_required() {
        let raw = raw_from(json!({}));
        assert!(load_backup_config_from_json(&raw).is_err());

        let raw = raw_from(json!({ "credential": {} }));
        assert!(load_backup_config_from_json(&raw).is_err());

        let raw = raw_from(json!({ "credential": { "secret_name": "  " } }));
        assert!(load_backup_config_from_json(&raw).is_err());
    }

    #[test]
    fn test_secret_key_defaults_to_password() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "credential": { "secret_name": "db-credentials", "secret_namespace": "data" }
        }));
        let config = load_backup_config_from_json(&raw)?;

        let secret = config.credential.secret.expect("secret ref expected");
        assert_eq!(secret.name, "db-credentials");
        assert_eq!(secret.namespace.as_deref(), Some("data"));
        assert_eq!(secret.key, "password");
        Ok(())
    }

    #[test]
    fn test_invalid_artifact_prefix_rejected() {
        let raw = raw_from(json!({
            "artifact_prefix": "nightly dump!",
            "credential": { "secret_name": "db-credentials" }
        }));
        assert!(load_backup_config_from_json(&raw).is_err());
    }

    #[test]
    fn test_output_dir_resolution_order() {
        assert_eq!(
            resolve_output_dir(Some(PathBuf::from("/srv/backups")), Some("/env".into())),
            PathBuf::from("/srv/backups")
        );
        assert_eq!(
            resolve_output_dir(None, Some("/env/backups".into())),
            PathBuf::from("/env/backups")
        );
        assert_eq!(resolve_output_dir(None, None), PathBuf::from("./backups"));
    }
}
