//! Image patching with copa.
//!
//! copa writes the patched image into the local Docker daemon; it is
//! exported with `docker save` and unpacked into an OCI layout so it can be
//! pushed like any pulled image.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secure_import_core::error::{ImportError, Result};

use super::command::run_tool;
use super::find_executable;
use crate::oci::{ImageReference, LocalImage};

/// Tag given to patched images.
pub const PATCHED_TAG: &str = "patched";

/// Produces a patched local image from scan findings.
#[async_trait]
pub trait Patcher: Send + Sync {
    /// Whether the patcher can run on this host.
    fn is_available(&self) -> bool;

    /// Patch `reference` using the findings in `report_file`.
    ///
    /// The result is tagged `output_tag` and stored under `work_dir`.
    async fn patch(
        &self,
        report_file: &Path,
        reference: &ImageReference,
        output_tag: &str,
        work_dir: &Path,
    ) -> Result<LocalImage>;
}

/// copa + docker backed patcher.
pub struct CopaPatcher {
    copa: Option<PathBuf>,
    docker: Option<PathBuf>,
}

impl CopaPatcher {
    pub const TOOL: &'static str = "copa";

    /// Probe `PATH` for copa and docker. Both are required.
    pub fn detect() -> Self {
        Self {
            copa: find_executable(Self::TOOL),
            docker: find_executable("docker"),
        }
    }

    fn binaries(&self) -> Result<(&Path, &Path)> {
        match (self.copa.as_deref(), self.docker.as_deref()) {
            (Some(copa), Some(docker)) => Ok((copa, docker)),
            (None, _) => Err(not_installed(Self::TOOL)),
            (_, None) => Err(not_installed("docker")),
        }
    }
}

fn not_installed(tool: &str) -> ImportError {
    ImportError::ToolError {
        tool: tool.to_string(),
        message: "not installed".to_string(),
    }
}

/// Name copa gives the patched image: the input repository with `output_tag`.
pub fn patched_reference(reference: &ImageReference, output_tag: &str) -> ImageReference {
    ImageReference {
        tag: Some(output_tag.to_string()),
        digest: None,
        ..reference.source()
    }
}

#[async_trait]
impl Patcher for CopaPatcher {
    fn is_available(&self) -> bool {
        self.copa.is_some() && self.docker.is_some()
    }

    async fn patch(
        &self,
        report_file: &Path,
        reference: &ImageReference,
        output_tag: &str,
        work_dir: &Path,
    ) -> Result<LocalImage> {
        let (copa, docker) = self.binaries()?;
        let source = reference.source().to_string();

        let args: [&OsStr; 7] = [
            "patch".as_ref(),
            "-r".as_ref(),
            report_file.as_os_str(),
            "-i".as_ref(),
            source.as_ref(),
            "-t".as_ref(),
            output_tag.as_ref(),
        ];
        run_tool(Self::TOOL, copa, args).await?;

        let patched = patched_reference(reference, output_tag).to_string();
        let archive = work_dir.join("patched.tar");
        let args: [&OsStr; 4] = [
            "save".as_ref(),
            "-o".as_ref(),
            archive.as_os_str(),
            patched.as_ref(),
        ];
        run_tool("docker", docker, args).await?;

        tracing::debug!(image = %patched, archive = %archive.display(), "Exported patched image");
        LocalImage::from_archive(&archive, &work_dir.join("patched"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patched_reference() {
        let r = ImageReference::parse("my-repo/app:v1").unwrap();
        assert_eq!(
            patched_reference(&r, PATCHED_TAG).to_string(),
            "docker.io/my-repo/app:patched"
        );

        let r = ImageReference::parse("quay.io/org/app@sha256:abc").unwrap();
        assert_eq!(
            patched_reference(&r, "fixed").to_string(),
            "quay.io/org/app:fixed"
        );
    }

    #[tokio::test]
    async fn test_requires_both_binaries() {
        let patcher = CopaPatcher {
            copa: Some(PathBuf::from("/usr/bin/copa")),
            docker: None,
        };
        assert!(!patcher.is_available());

        let tmp = tempfile::TempDir::new().unwrap();
        let reference = ImageReference::parse("nginx:1.25").unwrap();
        let err = patcher
            .patch(&tmp.path().join("scan.json"), &reference, PATCHED_TAG, tmp.path())
            .await
            .unwrap_err();
        match err {
            ImportError::ToolError { tool, .. } => assert_eq!(tool, "docker"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
