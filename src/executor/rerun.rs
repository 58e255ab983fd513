//! Rerun state machine
//!
//! A failed unit moves to NEEDS_RERUN only when reruns are enabled, the unit
//! allows them and its engine left non-blank rerun manifest content behind.
//! Each attempt leaves a RERUN breadcrumb; the first success ends the loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::UnitExecutor;
use crate::models::{ResultStatus, RunResult, UnitDescriptor, RETRY_FLAG};
use crate::results::ResultAggregator;
use crate::utils::Timer;

/// What a rerun re-executes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerunMode {
    /// The whole unit, unchanged
    #[default]
    Unit,
    /// Only the entries listed in the unit's rerun manifest
    Scoped,
}

impl RerunMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unit" | "feature" => Some(RerunMode::Unit),
            "scoped" | "scenario" => Some(RerunMode::Scoped),
            _ => None,
        }
    }
}

impl fmt::Display for RerunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RerunMode::Unit => write!(f, "unit"),
            RerunMode::Scoped => write!(f, "scoped"),
        }
    }
}

/// Run-wide rerun settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RerunPolicy {
    pub enabled: bool,
    pub attempts: u32,
    pub mode: RerunMode,
}

impl RerunPolicy {
    /// Configured attempts, at least one
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RerunPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: 1,
            mode: RerunMode::Unit,
        }
    }
}

/// Read a rerun manifest; missing, unreadable or blank files yield `None`
pub fn read_manifest(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => None,
        Err(e) => {
            debug!("Rerun manifest {} not read: {}", path.display(), e);
            None
        }
    }
}

/// Drives rerun attempts for failed units
pub struct RerunController {
    policy: RerunPolicy,
    executor: UnitExecutor,
    aggregator: Arc<ResultAggregator>,
}

impl RerunController {
    pub fn new(policy: RerunPolicy, executor: UnitExecutor, aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            policy,
            executor,
            aggregator,
        }
    }

    /// Descriptor to rerun after a failure, or `None` when the failure is final
    pub fn plan(&self, unit: &UnitDescriptor, manifest: Option<&str>) -> Option<UnitDescriptor> {
        if !self.policy.enabled || !unit.allow_rerun {
            return None;
        }
        let manifest = manifest.filter(|m| !m.trim().is_empty())?;

        match self.policy.mode {
            RerunMode::Unit => Some(unit.clone()),
            RerunMode::Scoped => Some(unit.rescoped(manifest).unwrap_or_else(|| unit.clone())),
        }
    }

    /// Run `target` until it passes or attempts run out; results are keyed by `original`
    pub fn rerun(&self, original: &UnitDescriptor, target: &UnitDescriptor) -> ResultStatus {
        let resolved = target.primary_target().to_string();
        let args = target.args.clone().with_flag(RETRY_FLAG);
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            self.aggregator
                .record(RunResult::new(original, resolved.as_str(), ResultStatus::Rerun));
            info!("Rerun {}/{} of {}", attempt, attempts, resolved);

            let timer = Timer::start(format!("rerun {resolved}"));
            let passed = self.executor.run(&args);
            let elapsed = timer.stop();

            if passed {
                self.aggregator.record(
                    RunResult::new(original, resolved.as_str(), ResultStatus::PassedAfterRerun)
                        .with_duration(elapsed),
                );
                return ResultStatus::PassedAfterRerun;
            }
        }

        self.aggregator.record(RunResult::new(
            original,
            resolved.as_str(),
            ResultStatus::FailedAfterRerun,
        ));
        ResultStatus::FailedAfterRerun
    }
}
