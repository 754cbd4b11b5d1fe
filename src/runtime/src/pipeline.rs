//! Per-image import pipeline.
//!
//! ```text
//! exists? ──yes──► Skipped
//!    │no
//!    ▼
//!  pull ─► scan? ─► patch? ─► push ─► post-push scan? ─► sign? ─► Pushed
//! ```
//!
//! Any stage error ends the run with an error attributed to that stage and
//! image. Optional tools that are unavailable are skipped with a log line.

use std::path::Path;
use std::sync::Arc;

use secure_import_core::error::{ImportError, Result};
use secure_import_core::report::ImportOutcome;

use crate::oci::{ImageReference, LocalImage, Registry};
use crate::tools::{ToolSet, PATCHED_TAG};

/// Pipeline stage names used in error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ExistenceCheck,
    Prepare,
    Pull,
    Scan,
    Patch,
    Push,
    Digest,
    Sign,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::ExistenceCheck => "existence check",
            Stage::Prepare => "prepare",
            Stage::Pull => "pull",
            Stage::Scan => "scan",
            Stage::Patch => "patch",
            Stage::Push => "push",
            Stage::Digest => "digest lookup",
            Stage::Sign => "sign",
        };
        write!(f, "{}", stage)
    }
}

/// Drives one image from discovery to the destination registry.
#[derive(Clone)]
pub struct ImportPipeline {
    registry: Arc<dyn Registry>,
    tools: ToolSet,
    target_registry: String,
    sign_key: Option<String>,
    dry_run: bool,
}

impl ImportPipeline {
    pub fn new(registry: Arc<dyn Registry>, tools: ToolSet, target_registry: impl Into<String>) -> Self {
        Self {
            registry,
            tools,
            target_registry: target_registry.into(),
            sign_key: None,
            dry_run: false,
        }
    }

    /// Key used to sign pushed images. Empty keys disable signing.
    pub fn with_sign_key(mut self, sign_key: Option<String>) -> Self {
        self.sign_key = sign_key.filter(|key| !key.is_empty());
        self
    }

    /// Only check existence; log everything else as hypothetical.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn target_registry(&self) -> &str {
        &self.target_registry
    }

    /// Import one image.
    ///
    /// Temporary artifacts live in a per-run directory removed on every exit path.
    pub async fn run(&self, reference: &ImageReference) -> Result<ImportOutcome> {
        let target = reference.in_registry(&self.target_registry);

        let exists = self
            .registry
            .exists(&target)
            .await
            .map_err(|e| e.at_stage(Stage::ExistenceCheck, reference))?;
        if exists {
            tracing::info!(reference = %reference, target = %target, "Image already exists, skipping");
            return Ok(ImportOutcome::skipped(reference.to_string()));
        }

        if self.dry_run {
            tracing::info!(
                reference = %reference,
                target = %target,
                "Dry run: would pull, scan, patch if vulnerable, push and sign"
            );
            return Ok(ImportOutcome::pushed(reference.to_string()));
        }

        let work_dir = tempfile::Builder::new()
            .prefix("secure-import-")
            .tempdir()
            .map_err(|e| ImportError::from(e).at_stage(Stage::Prepare, reference))?;

        let mut outcome = ImportOutcome::pushed(reference.to_string());

        let source = reference.source();
        tracing::info!(reference = %reference, source = %source, "Pulling image");
        let pulled = self
            .registry
            .pull(&source, &work_dir.path().join("image"))
            .await
            .map_err(|e| e.at_stage(Stage::Pull, reference))?;

        let image = self
            .scan_and_patch(reference, pulled, work_dir.path(), &mut outcome)
            .await?;

        tracing::info!(reference = %reference, target = %target, patched = outcome.patched, "Pushing image");
        self.registry
            .push(&image, &target)
            .await
            .map_err(|e| e.at_stage(Stage::Push, reference))?;

        self.post_push_scan(&target, work_dir.path()).await;

        outcome.signed = self.sign(reference, &target).await?;

        tracing::info!(reference = %reference, status = %outcome.status_text(), "Image imported");
        Ok(outcome)
    }

    /// Scan the source image and patch it when findings exist.
    ///
    /// Returns the image to push: the patched one, or `pulled` unchanged.
    async fn scan_and_patch(
        &self,
        reference: &ImageReference,
        pulled: LocalImage,
        work_dir: &Path,
        outcome: &mut ImportOutcome,
    ) -> Result<LocalImage> {
        let scanner = &self.tools.scanner;
        if !scanner.is_available() {
            tracing::info!(reference = %reference, "Skipping vulnerability scan: scanner not available");
            return Ok(pulled);
        }

        let report_file = work_dir.join("scan.json");
        let report = scanner
            .scan(&reference.source(), &report_file)
            .await
            .map_err(|e| e.at_stage(Stage::Scan, reference))?;
        outcome.scanned = true;
        outcome.vulnerabilities_found = report.vulnerability_count();

        if !report.has_vulnerabilities() {
            tracing::info!(reference = %reference, "No vulnerabilities found");
            return Ok(pulled);
        }

        let patcher = &self.tools.patcher;
        if !patcher.is_available() {
            tracing::info!(
                reference = %reference,
                vulnerabilities = outcome.vulnerabilities_found,
                "Skipping patch: patcher not available"
            );
            return Ok(pulled);
        }

        tracing::info!(
            reference = %reference,
            vulnerabilities = outcome.vulnerabilities_found,
            "Patching image"
        );
        let patched = patcher
            .patch(&report_file, reference, PATCHED_TAG, work_dir)
            .await
            .map_err(|e| e.at_stage(Stage::Patch, reference))?;
        outcome.patched = true;
        Ok(patched)
    }

    /// Informational re-scan of the pushed image. Failures are logged only.
    async fn post_push_scan(&self, target: &ImageReference, work_dir: &Path) {
        let scanner = &self.tools.scanner;
        if !scanner.is_available() {
            return;
        }
        match scanner.scan(target, &work_dir.join("post-push-scan.json")).await {
            Ok(report) => tracing::info!(
                target = %target,
                vulnerabilities = report.vulnerability_count(),
                "Post-push scan finished"
            ),
            Err(e) => tracing::warn!(target = %target, error = %e, "Post-push scan failed"),
        }
    }

    /// Sign the pushed image by digest. Returns whether a signature was made.
    async fn sign(&self, reference: &ImageReference, target: &ImageReference) -> Result<bool> {
        let signer = &self.tools.signer;
        if !signer.is_available() {
            tracing::info!(reference = %reference, "Skipping image signing: signer not available");
            return Ok(false);
        }
        let Some(key) = self.sign_key.as_deref() else {
            tracing::info!(reference = %reference, "Skipping image signing: no signing key provided");
            return Ok(false);
        };

        let digest = self
            .registry
            .digest(target)
            .await
            .map_err(|e| e.at_stage(Stage::Digest, reference))?;
        let signed_ref = target.with_digest(&digest);

        tracing::info!(reference = %reference, target = %signed_ref, "Signing image");
        signer
            .sign(key, &signed_ref)
            .await
            .map_err(|e| e.at_stage(Stage::Sign, reference))?;
        Ok(true)
    }
}
