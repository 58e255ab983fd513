//! Configuration module
//!
//! Run-wide settings, loaded from a config file, overridden by environment
//! variables and finally by command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;
pub(crate) use file::is_yaml_file;

use anyhow::{bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::events::EventKind;
use crate::executor::{RerunMode, RerunPolicy};

/// Run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum concurrent units
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Caps the pool at the number of allocatable devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_allocation: Option<DeviceAllocation>,

    #[serde(default)]
    pub rerun: RerunConfig,

    /// Generated at startup when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Parse `.ndjson` message exports
    #[serde(default)]
    pub process_messages: bool,

    /// Combined rerun manifest written after the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerun_output: Option<PathBuf>,

    #[serde(default)]
    pub reports: ReportOutputConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

fn default_threads() -> usize {
    4
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            device_allocation: None,
            rerun: RerunConfig::default(),
            session_id: None,
            process_messages: false,
            rerun_output: None,
            reports: ReportOutputConfig::default(),
            engine: EngineConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Threads the run asks for before clamping to the unit count
    pub fn required_threads(&self) -> usize {
        match &self.device_allocation {
            Some(devices) => devices.threads().min(self.threads),
            None => self.threads,
        }
    }

    pub fn rerun_policy(&self) -> RerunPolicy {
        RerunPolicy {
            enabled: self.rerun.enabled,
            attempts: self.rerun.attempts,
            mode: self.rerun.mode,
        }
    }

    /// Fill in a generated session id when none is configured
    pub fn ensure_session_id(&mut self) -> &str {
        self.session_id.get_or_insert_with(generate_session_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 && self.device_allocation.is_none() {
            bail!("threads must be at least 1");
        }

        if let Some(devices) = &self.device_allocation {
            if devices.threads() == 0 {
                bail!("device_allocation must name at least one device");
            }
        }

        if let Some(session) = &self.session_id {
            if session.trim().is_empty() {
                bail!("session_id must not be blank");
            }
        }

        if self.reports.outputs.iter().any(|o| o.trim().is_empty()) {
            bail!("reports.outputs must not contain blank names");
        }

        Ok(())
    }

    /// Checks that only matter when units are actually executed
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;
        if self.engine.program.trim().is_empty() {
            bail!("No engine program configured; set engine.program or pass it after `--`");
        }
        Ok(())
    }
}

/// Devices units are allocated to; one unit per device at a time
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAllocation {
    pub devices: Vec<String>,
}

impl DeviceAllocation {
    /// Number of distinct, non-blank devices
    pub fn threads(&self) -> usize {
        self.devices
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerunConfig {
    /// When false no unit reruns, whatever its own flag says
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub mode: RerunMode,
}

fn default_true() -> bool {
    true
}

fn default_attempts() -> u32 {
    1
}

impl Default for RerunConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: default_attempts(),
            mode: RerunMode::default(),
        }
    }
}

/// Where merged reports go
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Report file names to merge, e.g. `cucumber.json`
    #[serde(default)]
    pub outputs: Vec<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("target/unitpool")
}

impl Default for ReportOutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            outputs: Vec::new(),
        }
    }
}

/// External program that runs a unit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub program: String,

    /// Arguments placed before every unit's own arguments
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// JSON-lines event log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Event kinds written to the log; empty means all
    #[serde(default)]
    pub subscribe: Vec<EventKind>,
}

/// Session id of the form `20261019_101500_0042`
pub fn generate_session_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
