//! Run result models
//!
//! Defines per-unit results, the run-level status and the statistics derived
//! from a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::UnitDescriptor;

/// Outcome tag of a single result entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Passed,
    Rerun,
    PassedAfterRerun,
    Failed,
    FailedAfterRerun,
}

impl ResultStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ResultStatus::Passed => "✓",
            ResultStatus::Rerun => "↻",
            ResultStatus::PassedAfterRerun => "✓",
            ResultStatus::Failed => "✗",
            ResultStatus::FailedAfterRerun => "✗",
        }
    }

    /// RERUN is a breadcrumb, every other status closes a unit
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultStatus::Rerun)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResultStatus::Failed | ResultStatus::FailedAfterRerun)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Passed => write!(f, "PASSED"),
            ResultStatus::Rerun => write!(f, "RERUN"),
            ResultStatus::PassedAfterRerun => write!(f, "PASSED_AFTER_RERUN"),
            ResultStatus::Failed => write!(f, "FAILED"),
            ResultStatus::FailedAfterRerun => write!(f, "FAILED_AFTER_RERUN"),
        }
    }
}

/// One entry in the run's result collection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub target: String,
    pub selector: Option<u32>,
    /// Target actually executed; differs from `target` after a scoped rerun
    pub resolved_target: String,
    pub status: ResultStatus,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl RunResult {
    pub fn new(unit: &UnitDescriptor, resolved_target: impl Into<String>, status: ResultStatus) -> Self {
        Self {
            target: unit.target.clone(),
            selector: unit.selector,
            resolved_target: resolved_target.into(),
            status,
            duration_ms: 0,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// `target[:selector]`
    pub fn unit_label(&self) -> String {
        match self.selector {
            Some(line) => format!("{}:{}", self.target, line),
            None => self.target.clone(),
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}ms]",
            self.status.symbol(),
            self.unit_label(),
            self.status,
            self.duration_ms
        )?;
        if self.resolved_target != self.unit_label() {
            write!(f, " (ran {})", self.resolved_target)?;
        }
        Ok(())
    }
}

/// Run-level outcome, ordered by severity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Ok,
    ReportProcessingError,
    Error,
}

impl RunStatus {
    /// Raise the status; a lower severity never replaces a higher one
    pub fn escalate(&mut self, other: RunStatus) {
        if other > *self {
            *self = other;
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::Error => 1,
            RunStatus::ReportProcessingError => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Ok => write!(f, "OK"),
            RunStatus::ReportProcessingError => write!(f, "REPORT_PROCESSING_ERROR"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Counts derived from the result collection at run end
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStatistics {
    pub total: usize,
    pub passed: usize,
    pub passed_after_rerun: usize,
    pub failed: usize,
    pub failed_after_rerun: usize,
    pub rerun_attempts: usize,
}

impl TestStatistics {
    pub fn from_results(results: &[RunResult]) -> Self {
        let mut stats = Self::default();

        for result in results {
            match result.status {
                ResultStatus::Passed => stats.passed += 1,
                ResultStatus::PassedAfterRerun => stats.passed_after_rerun += 1,
                ResultStatus::Failed => stats.failed += 1,
                ResultStatus::FailedAfterRerun => stats.failed_after_rerun += 1,
                ResultStatus::Rerun => stats.rerun_attempts += 1,
            }
        }
        stats.total =
            stats.passed + stats.passed_after_rerun + stats.failed + stats.failed_after_rerun;

        stats
    }

    pub fn total_passed(&self) -> usize {
        self.passed + self.passed_after_rerun
    }

    pub fn total_failed(&self) -> usize {
        self.failed + self.failed_after_rerun
    }

    /// Units that went through at least one rerun
    pub fn rerun_units(&self) -> usize {
        self.passed_after_rerun + self.failed_after_rerun
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.total_passed() as f64 / self.total as f64) * 100.0
        }
    }
}

/// Everything the invoking layer gets back from a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pool_size: usize,
    pub status: RunStatus,
    pub statistics: TestStatistics,
    pub results: Vec<RunResult>,
    pub failures: Vec<RunResult>,
}

impl RunSummary {
    /// Terminal results only, in recording order
    pub fn terminal_results(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| r.status.is_terminal())
    }

    pub fn is_all_passed(&self) -> bool {
        self.statistics.total_failed() == 0
    }
}
