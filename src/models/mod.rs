//! Data models for parallel unit runs
//!
//! This module contains the unit, plan and result structures shared by the
//! scheduler, the aggregators and the output layer.

mod plan;
mod run_result;
mod unit;

pub use plan::RunPlan;
pub use run_result::{ResultStatus, RunResult, RunStatus, RunSummary, TestStatistics};
pub use unit::{EngineArgs, UnitDescriptor, RETRY_FLAG};
