//! Registry credentials from the Docker client configuration.
//!
//! Reads `$DOCKER_CONFIG/config.json` (or `~/.docker/config.json`), the same
//! file `docker login` and `helm registry login` write to.

use std::collections::HashMap;
use std::path::PathBuf;

use base64::Engine;
use secure_import_core::error::{ImportError, Result};
use serde::Deserialize;

/// Per-registry entry under `auths`.
#[derive(Debug, Clone, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Subset of the Docker config file format.
#[derive(Debug, Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

/// Read-only view of the Docker client credential file.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Locate the credential file (`$DOCKER_CONFIG/config.json`, then `~/.docker/config.json`).
    pub fn default_path() -> Result<Self> {
        if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
            return Ok(Self {
                path: PathBuf::from(dir).join("config.json"),
            });
        }
        let home = dirs::home_dir().ok_or_else(|| {
            ImportError::Other("Cannot determine home directory for credential store".to_string())
        })?;
        Ok(Self {
            path: home.join(".docker").join("config.json"),
        })
    }

    /// Create a credential store at a custom path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get credentials for a registry. Returns `(username, password)`.
    pub fn get(&self, registry: &str) -> Result<Option<(String, String)>> {
        let file = self.load()?;
        let wanted = normalize_registry(registry);
        let entry = file
            .auths
            .iter()
            .find(|(key, _)| normalize_registry(key) == wanted)
            .map(|(_, entry)| entry);

        match entry {
            Some(entry) => decode_entry(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Load the credential file from disk. Returns empty if not found.
    fn load(&self) -> Result<DockerConfigFile> {
        if !self.path.exists() {
            return Ok(DockerConfigFile::default());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            ImportError::Other(format!(
                "Failed to read credential store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            ImportError::Other(format!(
                "Failed to parse credential store {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Extract `(username, password)` from an entry, preferring explicit fields.
fn decode_entry(entry: &AuthEntry) -> Result<(String, String)> {
    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        return Ok((username.clone(), password.clone()));
    }

    let encoded = entry.auth.as_deref().unwrap_or_default();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ImportError::Other(format!("Invalid auth entry encoding: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| ImportError::Other(format!("Invalid auth entry encoding: {}", e)))?;

    decoded
        .split_once(':')
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .ok_or_else(|| ImportError::Other("Auth entry is not 'username:password'".to_string()))
}

/// Normalize registry hostnames so `https://index.docker.io/v1/` and
/// `docker.io` resolve to the same entry.
fn normalize_registry(registry: &str) -> String {
    let host = registry
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(registry);
    match host {
        "index.docker.io" | "registry-1.docker.io" => "docker.io".to_string(),
        other => other.to_string(),
    }
}
