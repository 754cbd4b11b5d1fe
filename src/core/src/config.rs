use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ImportError, Result};

/// Environment variable consulted when no destination registry flag is given.
pub const REGISTRY_ENV: &str = "HELM_REGISTRY";

/// Environment variable consulted when no signing key flag is given.
pub const SIGN_KEY_ENV: &str = "HELM_SIGN_KEY";

static CHART_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("chart name pattern is valid"));

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(-[a-zA-Z0-9.-]+)?(\+[a-zA-Z0-9.-]+)?$")
        .expect("version pattern is valid")
});

/// Import run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Chart name
    pub chart: String,

    /// Chart version (semantic version)
    pub version: String,

    /// Chart repository, either an HTTP(S) index or an `oci://` location
    pub repo: String,

    /// Optional values file passed to the renderer
    pub values: Option<PathBuf>,

    /// Destination registry host (e.g. `registry.example.com`, `localhost:5000`)
    pub registry: String,

    /// Signing key reference; signing is skipped when absent
    pub sign_key: Option<String>,

    /// Report output format
    pub report_format: ReportFormat,

    /// Report destination; stdout when absent
    pub report_file: Option<PathBuf>,

    /// Log intended actions without mutating anything
    pub dry_run: bool,
}

impl ImportConfig {
    /// Fill the registry and signing key from the environment when they were not given.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`.
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.registry.is_empty() {
            if let Some(registry) = lookup(REGISTRY_ENV) {
                self.registry = registry;
            }
        }
        if self.sign_key.as_deref().map_or(true, str::is_empty) {
            self.sign_key = lookup(SIGN_KEY_ENV).filter(|key| !key.is_empty());
        }
    }

    /// Validate the configuration. Called once before any work starts.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("chart", &self.chart),
            ("version", &self.version),
            ("repo", &self.repo),
            ("registry", &self.registry),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ImportError::ConfigError(format!(
                "missing required flags: [{}]",
                missing.join(" ")
            )));
        }

        if !CHART_NAME_PATTERN.is_match(&self.chart) {
            return Err(ImportError::ConfigError(format!(
                "invalid chart name '{}': must contain only alphanumeric characters, hyphens, and underscores",
                self.chart
            )));
        }

        if !VERSION_PATTERN.is_match(&self.version) {
            return Err(ImportError::ConfigError(format!(
                "invalid version '{}': must follow semantic versioning format (e.g., 1.2.3, 1.0.0-alpha)",
                self.version
            )));
        }

        if let Some(ref values) = self.values {
            if !values.exists() {
                return Err(ImportError::ConfigError(format!(
                    "values file does not exist: {}",
                    values.display()
                )));
            }
        }

        if !self.registry.starts_with("localhost:") && !self.registry.contains('.') {
            return Err(ImportError::ConfigError(format!(
                "invalid registry format: {}",
                self.registry
            )));
        }

        Ok(())
    }

    /// Resolve the report file against `cwd` so later directory changes cannot move it.
    pub fn resolve_report_file(&mut self, cwd: &Path) {
        if let Some(ref file) = self.report_file {
            if file.is_relative() {
                self.report_file = Some(cwd.join(file));
            }
        }
    }

    /// Whether the chart repository is an OCI registry.
    pub fn is_oci(&self) -> bool {
        self.repo.starts_with("oci://")
    }

    /// File name of the packaged chart archive.
    pub fn chart_file(&self) -> String {
        format!("{}-{}.tgz", self.chart, self.version)
    }

    /// Whether a signing key was configured.
    pub fn sign_enabled(&self) -> bool {
        self.sign_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Destination reference of the chart artifact.
    pub fn chart_reference(&self) -> String {
        format!("{}/charts/{}:{}", self.registry, self.chart, self.version)
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Aligned columns (default)
    #[default]
    Table,
    /// Pretty-printed JSON document
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(ImportError::ConfigError(format!(
                "invalid report format: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> ImportConfig {
        ImportConfig {
            chart: "my-chart".to_string(),
            version: "1.2.3".to_string(),
            repo: "https://charts.example.com".to_string(),
            registry: "my.registry.io".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_required_flags_listed_together() {
        let err = ImportConfig::default().validate().unwrap_err();
        assert!(err
            .to_string()
            .contains("missing required flags: [chart version repo registry]"));
    }

    #[test]
    fn test_missing_registry_only() {
        let config = ImportConfig {
            registry: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing required flags: [registry]"));
    }

    #[test]
    fn test_registry_from_env() {
        let env: HashMap<&str, &str> = [(REGISTRY_ENV, "my.registry.io")].into_iter().collect();
        let mut config = ImportConfig {
            registry: String::new(),
            ..valid_config()
        };
        config.apply_env_fallbacks(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.registry, "my.registry.io");
        assert!(!config.sign_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flag_wins_over_env() {
        let env: HashMap<&str, &str> = [(REGISTRY_ENV, "env.registry.io"), (SIGN_KEY_ENV, "env.key")]
            .into_iter()
            .collect();
        let mut config = ImportConfig {
            sign_key: Some("flag.key".to_string()),
            ..valid_config()
        };
        config.apply_env_fallbacks(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.registry, "my.registry.io");
        assert_eq!(config.sign_key.as_deref(), Some("flag.key"));
        assert!(config.sign_enabled());
    }

    #[test]
    fn test_sign_key_from_env() {
        let mut config = valid_config();
        config.apply_env_fallbacks(|key| (key == SIGN_KEY_ENV).then(|| "cosign.key".to_string()));
        assert_eq!(config.sign_key.as_deref(), Some("cosign.key"));
        assert!(config.sign_enabled());
    }

    #[test]
    fn test_invalid_registry_format() {
        let config = ImportConfig {
            registry: "invalid-registry".to_string(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid registry format: invalid-registry"));
    }

    #[test]
    fn test_localhost_registry_accepted() {
        let config = ImportConfig {
            registry: "localhost:5000".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_chart_name() {
        let config = ImportConfig {
            chart: "my chart!".to_string(),
            ..valid_config()
        };
        assert!(config.validate().unwrap_err().to_string().contains("invalid chart name"));
    }

    #[test]
    fn test_version_formats() {
        for good in ["1.2.3", "v1.2.3", "1.0.0-alpha", "1.2.3-beta.1", "1.2.3+build.5"] {
            let config = ImportConfig {
                version: good.to_string(),
                ..valid_config()
            };
            assert!(config.validate().is_ok(), "{good} should be accepted");
        }
        for bad in ["1.2", "latest", "1.2.3.4"] {
            let config = ImportConfig {
                version: bad.to_string(),
                ..valid_config()
            };
            assert!(config.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_missing_values_file() {
        let config = ImportConfig {
            values: Some(PathBuf::from("/nonexistent/values.yaml")),
            ..valid_config()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("values file does not exist"));
    }

    #[test]
    fn test_existing_values_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = ImportConfig {
            values: Some(file.path().to_path_buf()),
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("table".parse::<ReportFormat>().unwrap(), ReportFormat::Table);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        let err = "xml".parse::<ReportFormat>().unwrap_err();
        assert!(err.to_string().contains("invalid report format: xml"));
    }

    #[test]
    fn test_derived_values() {
        let config = valid_config();
        assert_eq!(config.chart_file(), "my-chart-1.2.3.tgz");
        assert_eq!(config.chart_reference(), "my.registry.io/charts/my-chart:1.2.3");
        assert!(!config.is_oci());

        let oci = ImportConfig {
            repo: "oci://ghcr.io/org/charts".to_string(),
            ..valid_config()
        };
        assert!(oci.is_oci());
    }

    #[test]
    fn test_resolve_report_file() {
        let mut config = ImportConfig {
            report_file: Some(PathBuf::from("report.json")),
            ..valid_config()
        };
        config.resolve_report_file(Path::new("/work"));
        assert_eq!(config.report_file, Some(PathBuf::from("/work/report.json")));

        config.resolve_report_file(Path::new("/elsewhere"));
        assert_eq!(config.report_file, Some(PathBuf::from("/work/report.json")));
    }
}
