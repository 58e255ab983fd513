//! Output formatters for run results
//!
//! Provides table, JSON, CSV, and summary output formats.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::models::{ResultStatus, RunResult, RunStatus, RunSummary};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// One table row for a result
    pub fn format_result(&self, result: &RunResult) -> String {
        let status = format!("{} {}", result.status.symbol(), result.status);
        let status = if self.colorize {
            match result.status {
                ResultStatus::Passed => format!("\x1b[32m{status:20}\x1b[0m"),
                ResultStatus::PassedAfterRerun => format!("\x1b[33m{status:20}\x1b[0m"),
                ResultStatus::Rerun => format!("\x1b[36m{status:20}\x1b[0m"),
                ResultStatus::Failed | ResultStatus::FailedAfterRerun => {
                    format!("\x1b[31m{status:20}\x1b[0m")
                }
            }
        } else {
            format!("{status:20}")
        };

        format!(
            "{:40} {} [{:>7}ms]",
            truncate(&result.unit_label(), 40),
            status,
            result.duration_ms
        )
    }

    /// Format a finished run
    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_summary_table(summary)),
            OutputFormat::Json => {
                serde_json::to_string(summary).context("Failed to serialize run summary")
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(summary).context("Failed to serialize run summary")
            }
            OutputFormat::Csv => format_summary_csv(summary),
            OutputFormat::Summary => Ok(self.format_summary_brief(summary)),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let stats = &summary.statistics;
        let mut output = String::new();

        output.push_str("\n╔════════════════════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Session {:40} workers: {:3}          ║\n",
            truncate(&summary.session_id, 40),
            summary.pool_size
        ));
        output.push_str("╠════════════════════════════════════════════════════════════════════════════╣\n");

        for result in summary.terminal_results() {
            output.push_str(&format!("║  {}\n", self.format_result(result)));
        }

        output.push_str("╠════════════════════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Total: {:4} | Passed: {:4} | After rerun: {:4} | Failed: {:4} | Reruns: {:4}\n",
            stats.total,
            stats.passed,
            stats.passed_after_rerun,
            stats.total_failed(),
            stats.rerun_attempts
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:8}ms | Status: {}\n",
            stats.pass_rate(),
            summary.duration_ms,
            self.status_label(summary.status)
        ));
        output.push_str("╚════════════════════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{}: {}/{} passed ({:.1}%), {} after rerun, {} failed in {}ms [{}]",
            summary.session_id,
            summary.statistics.total_passed(),
            summary.statistics.total,
            summary.statistics.pass_rate(),
            summary.statistics.passed_after_rerun,
            summary.statistics.total_failed(),
            summary.duration_ms,
            summary.status
        )
    }

    /// Failed units, one per line; empty when everything passed
    pub fn format_failures(&self, summary: &RunSummary) -> String {
        if summary.is_all_passed() {
            return String::new();
        }

        let mut output = String::from("\nFailures:\n");
        for failure in &summary.failures {
            output.push_str(&format!("  {} {}", failure.status.symbol(), failure.unit_label()));
            if failure.resolved_target != failure.unit_label() {
                output.push_str(&format!(" (rerun as {})", failure.resolved_target));
            }
            output.push('\n');
        }
        output
    }

    fn status_label(&self, status: RunStatus) -> String {
        if !self.colorize {
            return status.to_string();
        }
        match status {
            RunStatus::Ok => format!("\x1b[32m{status}\x1b[0m"),
            RunStatus::ReportProcessingError => format!("\x1b[33m{status}\x1b[0m"),
            RunStatus::Error => format!("\x1b[31m{status}\x1b[0m"),
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// One CSV row per result, breadcrumbs included
fn format_summary_csv(summary: &RunSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "target",
        "selector",
        "resolved_target",
        "status",
        "duration_ms",
        "recorded_at",
    ])?;

    for result in &summary.results {
        writer.write_record([
            result.target.clone(),
            result.selector.map(|s| s.to_string()).unwrap_or_default(),
            result.resolved_target.clone(),
            result.status.to_string(),
            result.duration_ms.to_string(),
            result.recorded_at.to_rfc3339(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Write a run summary to a file
pub fn write_summary_to_file(
    path: impl AsRef<Path>,
    summary: &RunSummary,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
