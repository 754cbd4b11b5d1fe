//! Chart stage: pull, publish and render the chart, then discover its images.
//!
//! Runs sequentially before any image is imported. Every error here is
//! fatal for the run.

use std::path::Path;
use std::sync::Arc;

use secure_import_core::config::ImportConfig;
use secure_import_core::error::{ImportError, Result};
use secure_import_core::report::ChartOutcome;

use crate::discovery::discover_images;
use crate::oci::{ImageReference, Registry};
use crate::tools::{ChartSource, Signer};

/// Result of the chart stage.
#[derive(Debug, Clone)]
pub struct ChartImport {
    pub outcome: ChartOutcome,
    /// Images discovered in the rendered chart, sorted and deduplicated.
    pub images: Vec<ImageReference>,
}

pub struct ChartStage {
    source: Arc<dyn ChartSource>,
    registry: Arc<dyn Registry>,
    signer: Arc<dyn Signer>,
}

fn chart_error(config: &ImportConfig, step: &str, e: ImportError) -> ImportError {
    ImportError::ChartError {
        chart: format!("{}:{}", config.chart, config.version),
        message: format!("{} failed: {}", step, e),
    }
}

/// Destination of the chart. OCI tags cannot carry `+`, helm stores it as `_`.
pub fn chart_destination(config: &ImportConfig) -> Result<ImageReference> {
    ImageReference::parse(&config.chart_reference().replace('+', "_"))
}

impl ChartStage {
    pub fn new(
        source: Arc<dyn ChartSource>,
        registry: Arc<dyn Registry>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            source,
            registry,
            signer,
        }
    }

    /// Run the chart stage with `work_dir` as scratch space for the archive.
    pub async fn run(&self, config: &ImportConfig, work_dir: &Path) -> Result<ChartImport> {
        tracing::info!(
            chart = %config.chart,
            version = %config.version,
            repo = %config.repo,
            "Pulling chart"
        );
        let archive = self
            .source
            .pull(config, work_dir)
            .await
            .map_err(|e| chart_error(config, "chart pull", e))?;

        let destination = chart_destination(config)
            .map_err(|e| chart_error(config, "chart destination", e))?;
        let exists = self
            .registry
            .exists(&destination)
            .await
            .map_err(|e| chart_error(config, "chart existence check", e))?;

        let pushed = if exists {
            tracing::info!(chart = %destination, "Chart already exists, skipping push");
            false
        } else if config.dry_run {
            tracing::info!(chart = %destination, "Dry run: would push and sign chart");
            true
        } else {
            self.push_and_sign(config, &archive, &destination).await?;
            true
        };

        tracing::info!(chart = %config.chart, "Rendering chart");
        let rendered = self
            .source
            .render(&archive, config.values.as_deref())
            .await
            .map_err(|e| chart_error(config, "chart render", e))?;
        let images = discover_images(&rendered).map_err(|e| chart_error(config, "image discovery", e))?;
        tracing::info!(chart = %config.chart, images = images.len(), "Discovered images");

        Ok(ChartImport {
            outcome: ChartOutcome {
                name: destination.to_string(),
                pushed,
            },
            images,
        })
    }

    async fn push_and_sign(
        &self,
        config: &ImportConfig,
        archive: &Path,
        destination: &ImageReference,
    ) -> Result<()> {
        tracing::info!(chart = %destination, "Pushing chart");
        self.source
            .push(archive, &config.registry)
            .await
            .map_err(|e| chart_error(config, "chart push", e))?;

        if !self.signer.is_available() {
            tracing::info!(chart = %destination, "Skipping chart signing: signer not available");
            return Ok(());
        }
        let Some(key) = config.sign_key.as_deref().filter(|_| config.sign_enabled()) else {
            tracing::info!(chart = %destination, "Skipping chart signing: no signing key provided");
            return Ok(());
        };

        let digest = self
            .registry
            .digest(destination)
            .await
            .map_err(|e| chart_error(config, "chart digest lookup", e))?;
        let target = destination.with_digest(&digest);
        tracing::info!(chart = %target, "Signing chart");
        self.signer
            .sign(key, &target)
            .await
            .map_err(|e| chart_error(config, "chart sign", e))
    }
}
