//! Built-in subscribers
//!
//! - [`LogSubscriber`] mirrors lifecycle events into the tracing log.
//! - [`JsonLinesSubscriber`] appends events to a file, one JSON object per
//!   line, for downstream notifiers to pick up.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{EventKind, RunEvent, Subscriber};

/// Logs every event through `tracing`
pub struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn on_event(&self, event: &RunEvent) -> Result<()> {
        match (event.kind, &event.result, &event.statistics) {
            (EventKind::RunSummary, _, Some(stats)) => info!(
                "Run {} summary: {} units, {} passed ({} after rerun), {} failed, {} rerun attempts over {} units",
                event.session_id,
                stats.total,
                stats.total_passed(),
                stats.passed_after_rerun,
                stats.total_failed(),
                stats.rerun_attempts,
                stats.rerun_units()
            ),
            (EventKind::TestFailed, Some(result), _) => warn!("  {}", result),
            (EventKind::TestRerun, Some(result), _) => {
                info!("  Rerunning {}", result.resolved_target)
            }
            (_, Some(result), _) => info!("  {}", result),
            (kind, None, _) => debug!("Run {}: {}", event.session_id, kind),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Appends accepted events as JSON lines to a file
pub struct JsonLinesSubscriber {
    path: PathBuf,
    kinds: Option<HashSet<EventKind>>,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSubscriber {
    /// Open (append) the event log; an empty `kinds` list subscribes to all
    pub fn create(path: impl AsRef<Path>, kinds: &[EventKind]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;

        let kinds = if kinds.is_empty() {
            None
        } else {
            Some(kinds.iter().copied().collect())
        };

        Ok(Self {
            path: path.to_path_buf(),
            kinds,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Subscriber for JsonLinesSubscriber {
    fn on_event(&self, event: &RunEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("event log writer poisoned"))?;

        serde_json::to_writer(&mut *writer, event).context("Failed to serialize event")?;
        writer.write_all(b"\n")?;
        writer
            .flush()
            .with_context(|| format!("Failed to write event log: {}", self.path.display()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }

    fn accepts(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }
}
