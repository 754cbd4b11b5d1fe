//! Vulnerability scanning with trivy.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secure_import_core::error::{ImportError, Result};
use serde::{Deserialize, Deserializer};

use super::command::run_tool;
use super::find_executable;
use crate::oci::ImageReference;

/// Scans an image and reports its vulnerabilities.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Whether the scanner can run on this host.
    fn is_available(&self) -> bool;

    /// Scan `reference`, writing the raw findings to `output_file`.
    async fn scan(&self, reference: &ImageReference, output_file: &Path) -> Result<ScanReport>;
}

/// Structured scanner findings (`Results[].Vulnerabilities[]`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScanReport {
    #[serde(rename = "Results", default, deserialize_with = "null_as_empty")]
    pub results: Vec<ScanResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScanResult {
    #[serde(rename = "Target", default)]
    pub target: String,
    #[serde(rename = "Vulnerabilities", default, deserialize_with = "null_as_empty")]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    pub id: String,
    #[serde(rename = "PkgName", default)]
    pub package: String,
    #[serde(rename = "InstalledVersion", default)]
    pub installed_version: String,
    #[serde(rename = "FixedVersion", default)]
    pub fixed_version: String,
    #[serde(rename = "Severity", default)]
    pub severity: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ScanReport {
    /// Parse scanner JSON output.
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| ImportError::ScanReportError(format!("invalid scan report: {}", e)))
    }

    /// Read and parse a scan report file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ImportError::ScanReportError(format!(
                "failed to read scan report {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&data)
    }

    /// Total number of findings across all results.
    pub fn vulnerability_count(&self) -> usize {
        self.results.iter().map(|r| r.vulnerabilities.len()).sum()
    }

    pub fn has_vulnerabilities(&self) -> bool {
        self.results.iter().any(|r| !r.vulnerabilities.is_empty())
    }
}

/// `trivy image` scanner restricted to fixable OS package findings.
pub struct TrivyScanner {
    binary: Option<PathBuf>,
}

impl TrivyScanner {
    pub const TOOL: &'static str = "trivy";

    /// Probe `PATH` for trivy.
    pub fn detect() -> Self {
        Self {
            binary: find_executable(Self::TOOL),
        }
    }

    fn binary(&self) -> Result<&Path> {
        self.binary.as_deref().ok_or_else(|| ImportError::ToolError {
            tool: Self::TOOL.to_string(),
            message: "not installed".to_string(),
        })
    }
}

#[async_trait]
impl Scanner for TrivyScanner {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    async fn scan(&self, reference: &ImageReference, output_file: &Path) -> Result<ScanReport> {
        let target = reference.to_string();
        let args: [&OsStr; 9] = [
            "image".as_ref(),
            "--vuln-type".as_ref(),
            "os".as_ref(),
            "--ignore-unfixed".as_ref(),
            "-f".as_ref(),
            "json".as_ref(),
            "-o".as_ref(),
            output_file.as_os_str(),
            target.as_ref(),
        ];
        run_tool(Self::TOOL, self.binary()?, args).await?;
        ScanReport::from_file(output_file)
    }
}
