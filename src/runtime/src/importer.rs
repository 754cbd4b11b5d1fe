//! Top-level import run: chart stage, then the image pool, then the report.

use std::sync::Arc;

use secure_import_core::config::ImportConfig;
use secure_import_core::error::{ImportError, Result};
use secure_import_core::report::Report;

use crate::chart::ChartStage;
use crate::oci::{OciRegistry, Registry};
use crate::pipeline::ImportPipeline;
use crate::pool::{ImportPool, MAX_WORKERS};
use crate::tools::{ChartSource, HelmClient, ToolSet};

/// Imports a chart and all of its images into a private registry.
pub struct SecureImporter {
    registry: Arc<dyn Registry>,
    charts: Arc<dyn ChartSource>,
    tools: ToolSet,
    max_workers: usize,
}

impl SecureImporter {
    pub fn new(registry: Arc<dyn Registry>, charts: Arc<dyn ChartSource>, tools: ToolSet) -> Self {
        Self {
            registry,
            charts,
            tools,
            max_workers: MAX_WORKERS,
        }
    }

    /// Real registry client, helm and whichever optional tools are on `PATH`.
    pub fn from_host(config: &ImportConfig) -> Self {
        Self::new(
            Arc::new(OciRegistry::for_target(&config.registry)),
            Arc::new(HelmClient::detect()),
            ToolSet::detect(),
        )
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Run a full import for an already validated `config`.
    ///
    /// Chart-stage errors abort the run. Image failures are recorded in the
    /// returned report.
    pub async fn run(&self, config: &ImportConfig) -> Result<Report> {
        if config.dry_run {
            tracing::info!("Dry run: no chart or image will be pushed, patched or signed");
        }

        let work_dir = tempfile::Builder::new()
            .prefix("secure-import-chart-")
            .tempdir()
            .map_err(|e| ImportError::ChartError {
                chart: config.chart.clone(),
                message: format!("failed to create working directory: {}", e),
            })?;

        let chart = ChartStage::new(
            Arc::clone(&self.charts),
            Arc::clone(&self.registry),
            Arc::clone(&self.tools.signer),
        )
        .run(config, work_dir.path())
        .await?;

        let pipeline = ImportPipeline::new(
            Arc::clone(&self.registry),
            self.tools.clone(),
            config.registry.clone(),
        )
        .with_sign_key(config.sign_key.clone())
        .with_dry_run(config.dry_run);

        let outcomes = ImportPool::new(pipeline)
            .with_max_workers(self.max_workers)
            .run(chart.images)
            .await;

        let report = Report::aggregate(chart.outcome, outcomes, config.dry_run);
        tracing::info!(
            images = report.summary.total_images,
            pushed = report.summary.images_pushed,
            skipped = report.summary.images_skipped,
            failed = report.summary.images_failed,
            vulnerabilities = report.summary.total_vulnerabilities,
            "Import finished"
        );
        Ok(report)
    }
}
