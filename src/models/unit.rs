//! Unit descriptor models
//!
//! Describes one runnable test unit as handed over by the external
//! derivation step, plus the argument mapping passed to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Named argument added to every rerun attempt
pub const RETRY_FLAG: &str = "retry";

/// Argument mapping handed to the engine for one unit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineArgs {
    /// Positional target values (feature path, or rerun entries)
    #[serde(default)]
    pub primary: Vec<String>,

    /// Named options, rendered as `--name value` per value
    #[serde(default)]
    pub named: BTreeMap<String, Vec<String>>,
}

impl EngineArgs {
    /// Add a valueless option
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.named.entry(name.into()).or_default();
        self
    }

    pub fn with_primary(mut self, primary: Vec<String>) -> Self {
        self.primary = primary;
        self
    }

    /// First primary value, the path the engine will resolve
    pub fn primary_target(&self) -> Option<&str> {
        self.primary.first().map(String::as_str)
    }
}

#[cfg(test)]
impl EngineArgs {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            primary: vec![target.into()],
            named: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }
}

/// One runnable test unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Feature path or URI
    pub target: String,

    /// Scenario line; `None` runs the whole file
    #[serde(default)]
    pub selector: Option<u32>,

    #[serde(default)]
    pub args: EngineArgs,

    /// File the engine writes its rerun manifest to
    #[serde(default)]
    pub rerun_file: Option<PathBuf>,

    /// Report files this unit produces
    #[serde(default)]
    pub report_files: Vec<PathBuf>,

    #[serde(default = "default_allow_rerun")]
    pub allow_rerun: bool,
}

fn default_allow_rerun() -> bool {
    true
}

impl UnitDescriptor {
    /// Path the engine resolves for this unit
    pub fn primary_target(&self) -> &str {
        self.args.primary_target().unwrap_or(&self.target)
    }

    /// Derive a narrower descriptor from rerun manifest content.
    ///
    /// Each non-blank line becomes a primary engine argument; the first entry
    /// decides the new target path and selector. Returns `None` when the
    /// manifest holds no entries.
    pub fn rescoped(&self, manifest: &str) -> Option<UnitDescriptor> {
        let entries: Vec<String> = manifest
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let (path, line) = split_rerun_entry(entries.first()?);

        Some(UnitDescriptor {
            target: path.to_string(),
            selector: line,
            args: self.args.clone().with_primary(entries),
            rerun_file: self.rerun_file.clone(),
            report_files: self.report_files.clone(),
            allow_rerun: self.allow_rerun,
        })
    }
}

impl fmt::Display for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selector {
            Some(line) => write!(f, "{}:{}", self.target, line),
            None => write!(f, "{}", self.target),
        }
    }
}

/// Split `path:line[:line...]` into the path and its first line number
fn split_rerun_entry(entry: &str) -> (&str, Option<u32>) {
    let mut path = entry;
    let mut line = None;

    while let Some((head, tail)) = path.rsplit_once(':') {
        match tail.parse::<u32>() {
            Ok(n) if !head.is_empty() => {
                line = Some(n);
                path = head;
            }
            _ => break,
        }
    }

    (path, line)
}

// Builders for descriptors that would otherwise come from a plan file
#[cfg(test)]
impl UnitDescriptor {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            args: EngineArgs::new(target.clone()),
            target,
            selector: None,
            rerun_file: None,
            report_files: Vec::new(),
            allow_rerun: true,
        }
    }

    /// Narrow the unit to a single scenario line
    pub fn with_selector(mut self, line: u32) -> Self {
        self.selector = Some(line);
        self.args.primary = vec![format!("{}:{}", self.target, line)];
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args = self.args.with_option(name, value);
        self
    }

    pub fn with_rerun_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rerun_file = Some(path.into());
        self
    }

    pub fn with_report_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_files.push(path.into());
        self
    }

    pub fn allow_rerun(mut self, allow: bool) -> Self {
        self.allow_rerun = allow;
        self
    }
}
