//! `secure-import` import command.

use std::path::PathBuf;

use clap::Args;
use secure_import_core::config::{ImportConfig, ReportFormat};
use secure_import_runtime::SecureImporter;

use crate::output;

#[derive(Args, Debug, Default)]
pub struct ImportArgs {
    /// Chart name (same as --chart)
    #[arg(value_name = "CHART")]
    pub chart_name: Option<String>,

    /// Chart name
    #[arg(long = "chart", value_name = "NAME")]
    pub chart: Option<String>,

    /// Chart version (semantic version, e.g. 1.2.3)
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Chart repository, HTTP(S) index or oci:// location
    #[arg(long, value_name = "URL")]
    pub repo: Option<String>,

    /// Values file passed to the renderer
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// Destination registry (falls back to $HELM_REGISTRY)
    #[arg(long, value_name = "HOST")]
    pub registry: Option<String>,

    /// Signing key (falls back to $HELM_SIGN_KEY)
    #[arg(long, value_name = "KEY")]
    pub sign_key: Option<String>,

    /// Report format (table, json)
    #[arg(long, value_name = "FORMAT", default_value_t = ReportFormat::Table)]
    pub report_format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub report_file: Option<PathBuf>,

    /// Show what would be imported without pushing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    /// Build the run configuration. `--chart` wins over the positional name.
    pub fn into_config(self) -> ImportConfig {
        ImportConfig {
            chart: self.chart.or(self.chart_name).unwrap_or_default(),
            version: self.version.unwrap_or_default(),
            repo: self.repo.unwrap_or_default(),
            values: self.values,
            registry: self.registry.unwrap_or_default(),
            sign_key: self.sign_key,
            report_format: self.report_format,
            report_file: self.report_file,
            dry_run: self.dry_run,
        }
    }
}

pub async fn execute(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = args.into_config();
    config.apply_env_fallbacks(|key| std::env::var(key).ok());
    config.validate()?;
    config.resolve_report_file(&std::env::current_dir()?);

    let report = SecureImporter::from_host(&config).run(&config).await?;

    output::write_report(&report, config.report_format, config.report_file.as_deref())?;
    if let Some(ref file) = config.report_file {
        tracing::info!(path = %file.display(), format = %config.report_format, "Report written");
    }
    Ok(())
}
