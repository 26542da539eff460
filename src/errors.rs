use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Target {host}:{port} unreachable: {reason}")]
    TargetUnreachable {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Dump failed: {0}")]
    DumpFailed(String),

    #[error("Compression failed for {}: {}", .path.display(), .reason)]
    CompressionFailed { path: PathBuf, reason: String },

    #[error("Metadata write failed for {}: {}", .path.display(), .reason)]
    MetadataWriteFailed { path: PathBuf, reason: String },

    #[error("Could not prune {}: {}", .path.display(), .reason)]
    PruneFailed { path: PathBuf, reason: String },

    #[error("A backup cycle is already in progress")]
    CycleInProgress,

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
