//! Combined rerun manifest
//!
//! Units append the lines of the manifest their engine produced; after the
//! run the entries are written out as one sorted file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Append-only collection of rerun manifest entries
#[derive(Default)]
pub struct RerunManifest {
    entries: Mutex<Vec<String>>,
}

impl RerunManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every line of a manifest file's content
    pub fn push_lines(&self, content: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(content.lines().map(str::to_string));
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write the combined manifest; no-op without a path.
    ///
    /// Returns whether a file was written.
    pub fn write_to(&self, path: Option<&Path>) -> Result<bool> {
        let Some(path) = path else {
            return Ok(false);
        };

        let content = render(&self.entries());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, &content)
            .with_context(|| format!("Failed to write rerun manifest: {}", path.display()))?;

        info!("Rerun manifest written to {}", path.display());
        Ok(true)
    }
}

/// One line per entry: drop blanks, sort, keep duplicates, join with newlines
pub fn render(entries: &[String]) -> String {
    let mut entries: Vec<&str> = entries
        .iter()
        .flat_map(|e| e.lines())
        .filter(|e| !e.trim().is_empty())
        .collect();
    entries.sort_unstable();
    entries.join("\n")
}
