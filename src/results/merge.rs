//! Merged report writer
//!
//! Combines the per-unit artifacts gathered by the [`ReportCollector`] into
//! one report per configured file name.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::reports::{ContentKind, ReportArtifact, ReportCollector};

/// Writes merged reports into an output directory
pub struct ReportMerger {
    output_dir: PathBuf,
    outputs: Vec<String>,
}

impl ReportMerger {
    /// `outputs` are canonical report file names such as `cucumber.json`
    pub fn new(output_dir: impl Into<PathBuf>, outputs: Vec<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            outputs,
        }
    }

    /// Merge every configured output; returns the written paths
    pub fn merge(&self, collector: &ReportCollector) -> Result<Vec<PathBuf>> {
        if self.outputs.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create directory: {}", self.output_dir.display())
        })?;

        let artifacts = collector.artifacts();
        let mut written = Vec::with_capacity(self.outputs.len());

        for name in &self.outputs {
            let matching: Vec<&ReportArtifact> = artifacts
                .values()
                .flatten()
                .filter(|a| a.path.file_name().and_then(|n| n.to_str()) == Some(name.as_str()))
                .collect();

            let path = self.output_dir.join(name);
            let content = match ContentKind::from_path(Path::new(name)) {
                ContentKind::Json => merge_json(&matching)?,
                ContentKind::NdJson if !collector.messages().is_empty() => {
                    merge_messages(collector)?
                }
                _ => join_verbatim(&matching),
            };

            fs::write(&path, content)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            debug!("Merged {} artifacts into {}", matching.len(), path.display());
            written.push(path);
        }

        info!(
            "{} merged reports written to {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(written)
    }
}

fn merge_json(artifacts: &[&ReportArtifact]) -> Result<String> {
    let mut merged = Vec::new();
    for artifact in artifacts {
        match serde_json::from_str::<Value>(&artifact.content) {
            Ok(Value::Array(items)) => merged.extend(items),
            Ok(value) => merged.push(value),
            Err(e) => warn!(
                "Skipping unparseable report {}: {}",
                artifact.path.display(),
                e
            ),
        }
    }
    serde_json::to_string_pretty(&Value::Array(merged)).context("Failed to serialize merged report")
}

fn merge_messages(collector: &ReportCollector) -> Result<String> {
    let mut lines = Vec::new();
    for message in collector.messages().values().flatten().flatten() {
        lines.push(serde_json::to_string(message).context("Failed to serialize message")?);
    }
    Ok(lines.join("\n"))
}

fn join_verbatim(artifacts: &[&ReportArtifact]) -> String {
    artifacts
        .iter()
        .map(|a| a.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
