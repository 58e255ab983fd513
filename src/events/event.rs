//! Lifecycle event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ResultStatus, RunResult, TestStatistics};

/// Kind of lifecycle notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RunStarted,
    RunFinished,
    RunSummary,
    TestRerun,
    TestPassed,
    TestPassedAfterRerun,
    TestFailed,
}

impl EventKind {
    /// Event published when a result with this status is recorded
    pub fn for_status(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Passed => EventKind::TestPassed,
            ResultStatus::Rerun => EventKind::TestRerun,
            ResultStatus::PassedAfterRerun => EventKind::TestPassedAfterRerun,
            ResultStatus::Failed | ResultStatus::FailedAfterRerun => EventKind::TestFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "RUN_STARTED",
            EventKind::RunFinished => "RUN_FINISHED",
            EventKind::RunSummary => "RUN_SUMMARY",
            EventKind::TestRerun => "TEST_RERUN",
            EventKind::TestPassed => "TEST_PASSED",
            EventKind::TestPassedAfterRerun => "TEST_PASSED_AFTER_RERUN",
            EventKind::TestFailed => "TEST_FAILED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification handed to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunEvent {
    pub kind: EventKind,
    pub session_id: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<TestStatistics>,
}

impl RunEvent {
    /// Run-level event without payload
    pub fn run(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            at: Utc::now(),
            result: None,
            statistics: None,
        }
    }

    /// Per-unit event carrying the recorded result
    pub fn test(session_id: impl Into<String>, result: RunResult) -> Self {
        Self {
            kind: EventKind::for_status(result.status),
            result: Some(result),
            ..Self::run(EventKind::TestPassed, session_id)
        }
    }

    pub fn summary(session_id: impl Into<String>, statistics: TestStatistics) -> Self {
        Self {
            statistics: Some(statistics),
            ..Self::run(EventKind::RunSummary, session_id)
        }
    }
}
