//! Import report model and aggregation.
//!
//! Outcomes are produced once per artifact by the chart stage and the
//! worker pool, then folded into a [`Report`] by [`Report::aggregate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final state of one image import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Imported into the target registry (or would be, in a dry run).
    Pushed,
    /// Already present in the target registry; nothing was done.
    Skipped,
    /// A pipeline stage failed; see the outcome's error.
    Failed,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pushed => write!(f, "pushed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of processing a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Image reference as discovered in the chart.
    pub name: String,
    pub status: ImportStatus,
    pub pushed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub scanned: bool,
    #[serde(default)]
    pub vulnerabilities_found: usize,
    #[serde(default)]
    pub patched: bool,
    #[serde(default)]
    pub signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutcome {
    /// Outcome for an image whose destination already exists.
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ImportStatus::Skipped,
            pushed: false,
            scanned: false,
            vulnerabilities_found: 0,
            patched: false,
            signed: false,
            error: None,
        }
    }

    /// Outcome for an image that was pushed. Step flags start false.
    pub fn pushed(name: impl Into<String>) -> Self {
        Self {
            status: ImportStatus::Pushed,
            pushed: true,
            ..Self::skipped(name)
        }
    }

    /// Outcome for an image whose pipeline failed.
    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status: ImportStatus::Failed,
            error: Some(error.to_string()),
            ..Self::skipped(name)
        }
    }

    /// Human-readable status column.
    pub fn status_text(&self) -> String {
        match self.status {
            ImportStatus::Skipped => "Skipped (already exists)".to_string(),
            ImportStatus::Failed => format!(
                "Failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            ImportStatus::Pushed => {
                let mut status = "Pushed".to_string();
                if self.patched {
                    status.push_str(" & Patched");
                }
                if self.signed {
                    status.push_str(" & Signed");
                }
                status
            }
        }
    }
}

/// Outcome of the chart artifact itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOutcome {
    /// Destination reference of the chart.
    pub name: String,
    pub pushed: bool,
}

impl ChartOutcome {
    /// Human-readable status column.
    pub fn status_text(&self) -> &'static str {
        if self.pushed {
            "Pushed"
        } else {
            "Skipped (already exists)"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_images: usize,
    pub images_pushed: usize,
    pub images_skipped: usize,
    pub images_failed: usize,
    pub total_vulnerabilities: usize,
    pub chart_pushed: bool,
}

/// Complete report for one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub chart: ChartOutcome,
    pub images: Vec<ImportOutcome>,
    pub summary: ReportSummary,
}

impl Report {
    /// Fold the chart outcome and image outcomes into a report.
    ///
    /// Images arrive in completion order; they are re-sorted by name so the
    /// rendered report is stable across runs.
    pub fn aggregate(chart: ChartOutcome, mut images: Vec<ImportOutcome>, dry_run: bool) -> Self {
        images.sort_by(|a, b| a.name.cmp(&b.name));

        let mut summary = ReportSummary {
            total_images: images.len(),
            chart_pushed: chart.pushed,
            ..Default::default()
        };
        for image in &images {
            match image.status {
                ImportStatus::Pushed => summary.images_pushed += 1,
                ImportStatus::Skipped => summary.images_skipped += 1,
                ImportStatus::Failed => summary.images_failed += 1,
            }
            summary.total_vulnerabilities += image.vulnerabilities_found;
        }

        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                version: crate::VERSION.to_string(),
                dry_run,
            },
            chart,
            images,
            summary,
        }
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
