// backuprunner/src/credentials/mod.rs
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use which::which;

use crate::config::{CredentialConfig, SecretRef};
use crate::errors::Result;

/// Dump credential held in memory for the duration of one cycle.
///
/// `Debug` is redacted and `Display` is deliberately not implemented so the
/// value cannot end up in a log line or error message by accident.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A lookup keyed by a logical secret name. Consulted once per cycle; values
/// are never cached across cycles so a rotated credential is picked up on the
/// next run.
pub trait CredentialProvider: Send + Sync {
    /// Human-readable source description for logs and errors.
    fn describe(&self) -> String;

    /// Returns the credential, or None if this source has nothing.
    fn fetch(&self) -> Result<Option<Secret>>;
}

/// Reads the credential from a pre-mounted file (e.g. a projected secret
/// volume). A missing or empty file is "not found", not an error.
pub struct MountedFileProvider {
    path: PathBuf,
}

impl MountedFileProvider {
    pub fn new(path: PathBuf) -> Self {
        MountedFileProvider { path }
    }
}

impl CredentialProvider for MountedFileProvider {
    fn describe(&self) -> String {
        format!("credential file {}", self.path.display())
    }

    fn fetch(&self) -> Result<Option<Secret>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Secret::new(trimmed)))
    }
}

/// Looks the credential up in the cluster secret store via the kubectl CLI.
///
/// Uses a go-template with `base64decode` so the decoded value arrives on
/// stdout directly. A missing secret or key yields None; the executor decides
/// whether that is fatal.
pub struct KubectlSecretProvider {
    secret: SecretRef,
}

impl KubectlSecretProvider {
    pub fn new(secret: SecretRef) -> Self {
        KubectlSecretProvider { secret }
    }

    fn lookup_template(&self) -> String {
        format!("{{{{index .data \"{}\" | base64decode}}}}", self.secret.key)
    }
}

impl CredentialProvider for KubectlSecretProvider {
    fn describe(&self) -> String {
        match &self.secret.namespace {
            Some(ns) => format!("secret {}/{} (key {})", ns, self.secret.name, self.secret.key),
            None => format!("secret {} (key {})", self.secret.name, self.secret.key),
        }
    }

    fn fetch(&self) -> Result<Option<Secret>> {
        let kubectl = match which("kubectl") {
            Ok(path) => path,
            Err(_) => {
                eprintln!("⚠ kubectl not found in PATH, skipping secret store lookup.");
                return Ok(None);
            }
        };

        let mut cmd = Command::new(kubectl);
        cmd.arg("get").arg("secret").arg(&self.secret.name);
        if let Some(ns) = &self.secret.namespace {
            cmd.arg("-n").arg(ns);
        }
        cmd.arg("-o")
            .arg(format!("go-template={}", self.lookup_template()));

        let output = cmd.output()?;
        if !output.status.success() {
            // kubectl stderr does not contain secret material, only the lookup failure.
            eprintln!(
                "⚠ Secret store lookup for {} failed ({}): {}",
                self.describe(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(Secret::new(value)))
    }
}

/// Consults providers in order; the first non-empty credential wins.
pub struct ChainProvider {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        ChainProvider { providers }
    }
}

impl CredentialProvider for ChainProvider {
    fn describe(&self) -> String {
        self.providers
            .iter()
            .map(|p| p.describe())
            .collect::<Vec<_>>()
            .join(", then ")
    }

    fn fetch(&self) -> Result<Option<Secret>> {
        for provider in &self.providers {
            if let Some(secret) = provider.fetch()? {
                println!("🔑 Credential acquired from {}", provider.describe());
                return Ok(Some(secret));
            }
        }
        Ok(None)
    }
}

/// Builds the provider chain for a credential configuration: the secret store
/// first, the mounted file as fallback.
pub fn provider_from_config(config: &CredentialConfig) -> ChainProvider {
    let mut providers: Vec<Box<dyn CredentialProvider>> = Vec::new();
    if let Some(secret) = &config.secret {
        providers.push(Box::new(KubectlSecretProvider::new(secret.clone())));
    }
    if let Some(path) = &config.credential_file {
        providers.push(Box::new(MountedFileProvider::new(path.clone())));
    }
    ChainProvider::new(providers)
}
