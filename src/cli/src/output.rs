//! Report rendering for CLI output.

use std::path::Path;

use comfy_table::{ContentArrangement, Table};
use secure_import_core::config::ReportFormat;
use secure_import_core::error::{ImportError, Result};
use secure_import_core::report::Report;

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = new_block();
    table.set_header(headers);
    table
}

/// Borderless table without a header, for aligned key/value blocks.
fn new_block() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table
}

fn vulnerabilities_cell(count: usize) -> String {
    if count == 0 {
        "-".to_string()
    } else {
        count.to_string()
    }
}

/// Render the report as header, summary and artifact blocks.
pub fn render_table(report: &Report) -> String {
    let mut header = new_block();
    header.add_row(vec![
        "Generated at:".to_string(),
        report
            .metadata
            .generated_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string(),
    ]);
    header.add_row(vec!["Version:".to_string(), report.metadata.version.clone()]);
    if report.metadata.dry_run {
        header.add_row(vec!["Mode:", "DRY RUN"]);
    }

    let summary = &report.summary;
    let mut totals = new_block();
    totals.add_row(vec!["Chart pushed:".to_string(), summary.chart_pushed.to_string()]);
    totals.add_row(vec!["Total images:".to_string(), summary.total_images.to_string()]);
    totals.add_row(vec!["Images pushed:".to_string(), summary.images_pushed.to_string()]);
    totals.add_row(vec!["Images skipped:".to_string(), summary.images_skipped.to_string()]);
    if summary.images_failed > 0 {
        totals.add_row(vec!["Images failed:".to_string(), summary.images_failed.to_string()]);
    }
    if summary.total_vulnerabilities > 0 {
        totals.add_row(vec![
            "Total vulnerabilities found:".to_string(),
            summary.total_vulnerabilities.to_string(),
        ]);
    }

    let mut artifacts = new_table(&["ARTIFACT", "PUSHED", "VULNERABILITIES", "STATUS"]);
    artifacts.add_row(vec![
        report.chart.name.clone(),
        report.chart.pushed.to_string(),
        "-".to_string(),
        report.chart.status_text().to_string(),
    ]);
    for image in &report.images {
        artifacts.add_row(vec![
            image.name.clone(),
            image.pushed.to_string(),
            vulnerabilities_cell(image.vulnerabilities_found),
            image.status_text(),
        ]);
    }

    format!(
        "=== SECURE IMPORT REPORT ===\n{header}\n\n=== SUMMARY ===\n{totals}\n\n=== ARTIFACTS ===\n{artifacts}\n"
    )
}

/// Render the report in `format`.
pub fn render_report(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Table => Ok(render_table(report)),
        ReportFormat::Json => {
            let mut json = report.to_json()?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Write the rendered report to `file`, or stdout when no file is set.
pub fn write_report(report: &Report, format: ReportFormat, file: Option<&Path>) -> Result<()> {
    let rendered = render_report(report, format)?;
    match file {
        Some(path) => std::fs::write(path, rendered).map_err(|e| {
            ImportError::Other(format!(
                "failed to write report file {}: {}",
                path.display(),
                e
            ))
        }),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secure_import_core::report::{ChartOutcome, ImportOutcome};
    use tempfile::TempDir;

    fn sample_report(dry_run: bool) -> Report {
        let mut patched = ImportOutcome::pushed("my-repo/app:v1");
        patched.scanned = true;
        patched.vulnerabilities_found = 12;
        patched.patched = true;
        patched.signed = true;

        Report::aggregate(
            ChartOutcome {
                name: "registry.example.com/charts/demo:1.0.0".to_string(),
                pushed: true,
            },
            vec![
                patched,
                ImportOutcome::skipped("bitnami/redis:7.2"),
                ImportOutcome::failed("my-repo/broken:v1", "pull failed for my-repo/broken:v1: denied"),
            ],
            dry_run,
        )
    }

    fn row<'a>(table: &'a str, artifact: &str) -> &'a str {
        table
            .lines()
            .find(|line| line.trim_start().starts_with(artifact))
            .unwrap_or_else(|| panic!("no row for {artifact}"))
    }

    #[test]
    fn test_table_has_all_blocks() {
        let table = render_table(&sample_report(false));
        assert!(table.starts_with("=== SECURE IMPORT REPORT ==="));
        assert!(table.contains("=== SUMMARY ==="));
        assert!(table.contains("=== ARTIFACTS ==="));
        assert!(table.contains("ARTIFACT"));
        assert!(table.contains("VULNERABILITIES"));
        assert!(!table.contains("DRY RUN"));
    }

    #[test]
    fn test_table_rows_carry_status() {
        let table = render_table(&sample_report(false));

        let app = row(&table, "my-repo/app:v1");
        assert!(app.contains("12"));
        assert!(app.contains("Pushed & Patched & Signed"));

        let redis = row(&table, "bitnami/redis:7.2");
        assert!(redis.contains("false"));
        assert!(redis.contains("Skipped (already exists)"));

        let broken = row(&table, "my-repo/broken:v1");
        assert!(broken.contains("Failed: pull failed"));

        let chart = row(&table, "registry.example.com/charts/demo:1.0.0");
        assert!(chart.contains("true"));
    }

    #[test]
    fn test_table_summary_lines() {
        let table = render_table(&sample_report(true));
        assert!(table.contains("DRY RUN"));
        assert!(row(&table, "Images failed:").contains('1'));
        assert!(row(&table, "Total vulnerabilities found:").contains("12"));
    }

    #[test]
    fn test_json_report_parses() {
        let json = render_report(&sample_report(false), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total_images"], 3);
        assert_eq!(value["images"][0]["name"], "bitnami/redis:7.2");
    }

    #[test]
    fn test_write_report_to_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");

        write_report(&sample_report(false), ReportFormat::Json, Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"chart_pushed\": true"));
    }

    #[test]
    fn test_write_report_to_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("report.txt");

        let err = write_report(&sample_report(false), ReportFormat::Table, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to write report file"));
    }
}
