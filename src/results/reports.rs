//! Report artifact collection
//!
//! After a unit finishes (reruns included) its declared report files are read
//! and stored by path. JSON reports are pretty-printed, NDJSON message
//! exports are parsed per unit when structured-message processing is on, and
//! everything else is kept verbatim. Read and parse failures never escape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::models::UnitDescriptor;

/// Path fragment of per-attempt scratch storage; never collected
pub const SCRATCH_MARKER: &str = "/session-reports/";

/// How an artifact's content is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Json,
    NdJson,
    Other,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ContentKind::Json,
            Some("ndjson") => ContentKind::NdJson,
            _ => ContentKind::Other,
        }
    }
}

/// One collected report file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub content: String,
    pub kind: ContentKind,
}

/// Thread-safe sink for report artifacts and message exports
pub struct ReportCollector {
    session_id: String,
    process_messages: bool,
    artifacts: Mutex<BTreeMap<PathBuf, Vec<ReportArtifact>>>,
    messages: Mutex<BTreeMap<String, Vec<Vec<Value>>>>,
}

impl ReportCollector {
    pub fn new(session_id: impl Into<String>, process_messages: bool) -> Self {
        Self {
            session_id: session_id.into(),
            process_messages,
            artifacts: Mutex::new(BTreeMap::new()),
            messages: Mutex::new(BTreeMap::new()),
        }
    }

    /// Only files of this session outside scratch storage are collected
    pub fn should_process(&self, path: &Path) -> bool {
        let path = path.to_string_lossy().replace('\\', "/");
        !path.contains(SCRATCH_MARKER) && path.contains(&self.session_id)
    }

    /// Collect every report file declared by `unit`
    pub fn collect(&self, unit: &UnitDescriptor) {
        for path in &unit.report_files {
            self.collect_file(unit, path);
        }
    }

    fn collect_file(&self, unit: &UnitDescriptor, path: &Path) {
        if !self.should_process(path) {
            debug!("Skipping report {} for {}", path.display(), unit);
            return;
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Report {} unreadable, skipped: {}", path.display(), e);
                return;
            }
        };

        let kind = ContentKind::from_path(path);
        match kind {
            ContentKind::NdJson if self.process_messages => {
                let messages = parse_messages(&raw);
                debug!("Parsed {} messages from {}", messages.len(), path.display());
                lock(&self.messages)
                    .entry(unit.target.clone())
                    .or_default()
                    .push(messages);
            }
            ContentKind::Json => self.store(path, pretty_json(&raw), kind),
            _ => self.store(path, raw, kind),
        }
    }

    fn store(&self, path: &Path, content: String, kind: ContentKind) {
        lock(&self.artifacts)
            .entry(path.to_path_buf())
            .or_default()
            .push(ReportArtifact {
                path: path.to_path_buf(),
                content,
                kind,
            });
    }

    /// Snapshot of collected artifacts keyed by path
    pub fn artifacts(&self) -> BTreeMap<PathBuf, Vec<ReportArtifact>> {
        lock(&self.artifacts).clone()
    }

    /// Snapshot of parsed message exports keyed by unit target
    pub fn messages(&self) -> BTreeMap<String, Vec<Vec<Value>>> {
        lock(&self.messages).clone()
    }

    /// An export parsed to nothing while another export produced messages
    pub fn has_export_anomaly(&self) -> bool {
        let (mut empty, mut filled) = (false, false);
        for export in lock(&self.messages).values().flatten() {
            if export.is_empty() {
                empty = true;
            } else {
                filled = true;
            }
        }
        empty && filled
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Re-serialize JSON with stable indentation; invalid input is returned as-is
pub fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse a line-delimited message export, dropping lines that are not JSON
pub fn parse_messages(raw: &str) -> Vec<Value> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping malformed message line: {}", e);
                None
            }
        })
        .collect()
}
