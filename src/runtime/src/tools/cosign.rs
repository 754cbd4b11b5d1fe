//! Signing with cosign.

use std::ffi::OsStr;
use std::path::PathBuf;

use async_trait::async_trait;
use secure_import_core::error::{ImportError, Result};

use super::command::run_tool;
use super::find_executable;
use crate::oci::ImageReference;

/// Signs a pushed artifact addressed by digest.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Whether the signer can run on this host.
    fn is_available(&self) -> bool;

    /// Sign `target` (a digest reference) with `key`.
    async fn sign(&self, key: &str, target: &ImageReference) -> Result<()>;
}

/// Key-based cosign signer. Signatures are not uploaded to a transparency log.
pub struct CosignSigner {
    binary: Option<PathBuf>,
}

impl CosignSigner {
    pub const TOOL: &'static str = "cosign";

    /// Probe `PATH` for cosign.
    pub fn detect() -> Self {
        Self {
            binary: find_executable(Self::TOOL),
        }
    }
}

#[async_trait]
impl Signer for CosignSigner {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    async fn sign(&self, key: &str, target: &ImageReference) -> Result<()> {
        let binary = self.binary.as_deref().ok_or_else(|| ImportError::ToolError {
            tool: Self::TOOL.to_string(),
            message: "not installed".to_string(),
        })?;
        if target.digest.is_none() {
            return Err(ImportError::ToolError {
                tool: Self::TOOL.to_string(),
                message: format!("refusing to sign {} without a digest", target),
            });
        }

        let target = target.to_string();
        let args: [&OsStr; 5] = [
            "sign".as_ref(),
            "--tlog-upload=false".as_ref(),
            "--key".as_ref(),
            key.as_ref(),
            target.as_ref(),
        ];
        run_tool(Self::TOOL, binary, args).await?;
        Ok(())
    }
}
