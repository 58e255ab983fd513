//! Test engine boundary
//!
//! The engine is an opaque capability: given a unit's argument mapping it runs
//! the tests and reports an exit code. [`CommandEngine`] drives an external
//! program; [`UnitExecutor`] turns every engine fault into a plain failure.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::EngineArgs;
use crate::utils::panic_message;

/// Environment variable carrying the session id into engine processes
pub const SESSION_ENV: &str = "UNITPOOL_SESSION_ID";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` was terminated before exiting")]
    Terminated { program: String },
}

/// Exit status of one engine invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOutcome {
    pub exit_code: i32,
}

impl EngineOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs tests for one argument mapping
pub trait Engine: Send + Sync {
    fn execute(&self, args: &EngineArgs) -> Result<EngineOutcome, EngineError>;
}

/// Engine backed by an external program
#[derive(Clone, Debug)]
pub struct CommandEngine {
    program: String,
    base_args: Vec<String>,
    session_id: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, session_id: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
            session_id: session_id.into(),
        }
    }

    /// Arguments passed to the program: base args, `--name [value]`, then primaries
    pub fn command_line(&self, args: &EngineArgs) -> Vec<String> {
        let mut line = self.base_args.clone();

        for (name, values) in &args.named {
            if values.is_empty() {
                line.push(format!("--{name}"));
            }
            for value in values {
                line.push(format!("--{name}"));
                line.push(value.clone());
            }
        }

        line.extend(args.primary.iter().cloned());
        line
    }
}

impl Engine for CommandEngine {
    fn execute(&self, args: &EngineArgs) -> Result<EngineOutcome, EngineError> {
        let line = self.command_line(args);
        debug!("Executing {} {}", self.program, line.join(" "));

        let status = Command::new(&self.program)
            .args(&line)
            .env(SESSION_ENV, &self.session_id)
            .status()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        status
            .code()
            .map(|exit_code| EngineOutcome { exit_code })
            .ok_or_else(|| EngineError::Terminated {
                program: self.program.clone(),
            })
    }
}

/// Engine wrapper that never lets a fault escape
#[derive(Clone)]
pub struct UnitExecutor {
    engine: Arc<dyn Engine>,
}

impl UnitExecutor {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// True on a zero exit code; errors and panics count as failure
    pub fn run(&self, args: &EngineArgs) -> bool {
        match catch_unwind(AssertUnwindSafe(|| self.engine.execute(args))) {
            Ok(Ok(outcome)) => {
                debug!(
                    "Engine exited with {} for {}",
                    outcome.exit_code,
                    args.primary.join(" ")
                );
                outcome.is_success()
            }
            Ok(Err(e)) => {
                error!("Engine error for {}: {}", args.primary.join(" "), e);
                false
            }
            Err(payload) => {
                error!(
                    "Engine panicked for {}: {}",
                    args.primary.join(" "),
                    panic_message(payload.as_ref())
                );
                false
            }
        }
    }
}
