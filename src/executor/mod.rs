//! Unit execution
//!
//! The engine boundary, the rerun state machine, the per-unit pipeline and
//! the bounded scheduler that drives them.

mod engine;
mod rerun;
mod scheduler;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CommandEngine, Engine, UnitExecutor};
pub use rerun::{RerunMode, RerunPolicy};
pub use scheduler::Scheduler;
