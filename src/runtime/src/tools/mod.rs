//! External tool capabilities.
//!
//! Scanning, patching and signing are optional: each is checked once on the
//! host and injected into the pipeline as a trait object. A missing tool is
//! a skip branch, never an error.

pub mod command;
pub mod copa;
pub mod cosign;
pub mod helm;
pub mod trivy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secure_import_core::error::{ImportError, Result};

pub use copa::{CopaPatcher, Patcher, PATCHED_TAG};
pub use cosign::{CosignSigner, Signer};
pub use helm::{ChartSource, HelmClient};
pub use trivy::{ScanReport, Scanner, TrivyScanner};

use crate::oci::{ImageReference, LocalImage};

/// The optional tool capabilities available to a run.
#[derive(Clone)]
pub struct ToolSet {
    pub scanner: Arc<dyn Scanner>,
    pub patcher: Arc<dyn Patcher>,
    pub signer: Arc<dyn Signer>,
}

impl ToolSet {
    /// Probe the host `PATH` for trivy, copa (with docker) and cosign.
    pub fn detect() -> Self {
        let tools = Self {
            scanner: Arc::new(TrivyScanner::detect()),
            patcher: Arc::new(CopaPatcher::detect()),
            signer: Arc::new(CosignSigner::detect()),
        };
        tracing::info!(
            scanner = tools.scanner.is_available(),
            patcher = tools.patcher.is_available(),
            signer = tools.signer.is_available(),
            "Detected optional tools"
        );
        tools
    }

    /// A tool set where nothing is available.
    pub fn none() -> Self {
        Self {
            scanner: Arc::new(Unavailable),
            patcher: Arc::new(Unavailable),
            signer: Arc::new(Unavailable),
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("scanner", &self.scanner.is_available())
            .field("patcher", &self.patcher.is_available())
            .field("signer", &self.signer.is_available())
            .finish()
    }
}

/// Stand-in for a tool that is not installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

fn unavailable(capability: &str) -> ImportError {
    ImportError::ToolError {
        tool: capability.to_string(),
        message: "not available".to_string(),
    }
}

#[async_trait]
impl Scanner for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn scan(&self, _reference: &ImageReference, _output_file: &Path) -> Result<ScanReport> {
        Err(unavailable("scanner"))
    }
}

#[async_trait]
impl Patcher for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn patch(
        &self,
        _report_file: &Path,
        _reference: &ImageReference,
        _output_tag: &str,
        _work_dir: &Path,
    ) -> Result<LocalImage> {
        Err(unavailable("patcher"))
    }
}

#[async_trait]
impl Signer for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn sign(&self, _key: &str, _target: &ImageReference) -> Result<()> {
        Err(unavailable("signer"))
    }
}

/// Locate an executable named `name` on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_executable_in(name, std::env::split_paths(&path))
}

fn find_executable_in<I>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
