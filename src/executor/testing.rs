//! In-memory engine for scheduler and rerun tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::engine::{EngineError, EngineOutcome};
use super::Engine;
use crate::models::EngineArgs;

/// Engine answering from per-target scripts of pass/fail outcomes
#[derive(Default)]
pub struct ScriptedEngine {
    fallback: bool,
    shared: Mutex<VecDeque<bool>>,
    targets: Mutex<HashMap<String, VecDeque<bool>>>,
    panics_on: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<EngineArgs>>,
}

impl ScriptedEngine {
    pub fn always(passes: bool) -> Self {
        Self {
            fallback: passes,
            ..Self::default()
        }
    }

    /// Outcomes consumed in call order; failure once exhausted
    pub fn script(outcomes: &[bool]) -> Self {
        Self {
            shared: Mutex::new(outcomes.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Outcomes for calls whose first primary value is `target`
    pub fn with_target(self, target: &str, outcomes: &[bool]) -> Self {
        self.targets
            .lock()
            .unwrap()
            .insert(target.to_string(), outcomes.iter().copied().collect());
        self
    }

    pub fn panics_on(mut self, target: &str) -> Self {
        self.panics_on = Some(target.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<EngineArgs> {
        self.calls.lock().unwrap().clone()
    }
}

impl Engine for ScriptedEngine {
    fn execute(&self, args: &EngineArgs) -> Result<EngineOutcome, EngineError> {
        self.calls.lock().unwrap().push(args.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let target = args.primary_target().unwrap_or_default();
        if self.panics_on.as_deref() == Some(target) {
            panic!("scripted panic for {target}");
        }

        let scripted = match self.targets.lock().unwrap().get_mut(target) {
            Some(outcomes) => outcomes.pop_front(),
            None => self.shared.lock().unwrap().pop_front(),
        };
        let passes = scripted.unwrap_or(self.fallback);

        Ok(EngineOutcome {
            exit_code: if passes { 0 } else { 1 },
        })
    }
}
