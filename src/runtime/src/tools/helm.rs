//! Chart pull, render and push through the helm CLI.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secure_import_core::config::ImportConfig;
use secure_import_core::error::{ImportError, Result};

use super::command::run_tool;
use super::find_executable;

/// Source and sink of chart archives.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Download the configured chart into `dest_dir`, returning the archive path.
    async fn pull(&self, config: &ImportConfig, dest_dir: &Path) -> Result<PathBuf>;

    /// Render the chart to a multi-document YAML stream.
    async fn render(&self, archive: &Path, values: Option<&Path>) -> Result<String>;

    /// Push the chart archive to `oci://{registry}/charts/`.
    async fn push(&self, archive: &Path, registry: &str) -> Result<()>;
}

/// helm CLI client.
pub struct HelmClient {
    binary: Option<PathBuf>,
}

impl HelmClient {
    pub const TOOL: &'static str = "helm";

    /// Probe `PATH` for helm.
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

/// Arguments for `helm pull`, OCI or classic repository form.
fn pull_args(config: &ImportConfig, dest_dir: &Path) -> Vec<String> {
    let mut args = vec!["pull".to_string()];
    if config.is_oci() {
        args.push(format!("{}/{}", config.repo.trim_end_matches('/'), config.chart));
    } else {
        args.push(config.chart.clone());
        args.push("--repo".to_string());
        args.push(config.repo.clone());
    }
    args.push("--version".to_string());
    args.push(config.version.clone());
    args.push("--destination".to_string());
    args.push(dest_dir.to_string_lossy().into_owned());
    args
}

/// `oci://{registry}/charts/`
pub fn chart_push_target(registry: &str) -> String {
    format!("oci://{}/charts/", registry.trim_end_matches('/'))
}

#[async_trait]
impl ChartSource for HelmClient {
    async fn pull(&self, config: &ImportConfig, dest_dir: &Path) -> Result<PathBuf> {
        run_tool(Self::TOOL, self.binary()?, pull_args(config, dest_dir)).await?;

        let archive = dest_dir.join(config.chart_file());
        if !archive.is_file() {
            return Err(ImportError::ChartError {
                chart: config.chart.clone(),
                message: format!("pulled archive not found at {}", archive.display()),
            });
        }
        Ok(archive)
    }

    async fn render(&self, archive: &Path, values: Option<&Path>) -> Result<String> {
        let mut args: Vec<&OsStr> = vec!["template".as_ref(), archive.as_os_str()];
        if let Some(values) = values {
            args.push("-f".as_ref());
            args.push(values.as_os_str());
        }
        run_tool(Self::TOOL, self.binary()?, args).await
    }

    async fn push(&self, archive: &Path, registry: &str) -> Result<()> {
        let target = chart_push_target(registry);
        let args: [&OsStr; 3] = ["push".as_ref(), archive.as_os_str(), target.as_ref()];
        run_tool(Self::TOOL, self.binary()?, args).await?;
        Ok(())
    }
}
