//! Run plan loading
//!
//! A run plan is the ordered unit list produced by the external derivation
//! step, stored as YAML or JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::UnitDescriptor;
use crate::config::is_yaml_file;

/// Plan validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("Unit #{index} has an empty target")]
    EmptyTarget { index: usize },

    #[error("Unit #{index} ({target}) has an empty primary argument")]
    EmptyPrimary { index: usize, target: String },
}

/// Ordered list of units for one run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub units: Vec<UnitDescriptor>,
}

impl RunPlan {
    #[cfg(test)]
    pub fn new(units: Vec<UnitDescriptor>) -> Self {
        Self { units }
    }

    /// Load, normalize and validate a plan file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run plan: {}", path.display()))?;

        let mut plan: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML run plan: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON run plan: {}", path.display()))?
        };

        plan.normalize();
        plan.validate()
            .with_context(|| format!("Invalid run plan: {}", path.display()))?;

        Ok(plan)
    }

    /// Fill in the primary engine argument for units that omit it
    pub fn normalize(&mut self) {
        for unit in &mut self.units {
            if unit.args.primary.is_empty() {
                let primary = match unit.selector {
                    Some(line) => format!("{}:{}", unit.target, line),
                    None => unit.target.clone(),
                };
                unit.args.primary.push(primary);
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), PlanError> {
        for (index, unit) in self.units.iter().enumerate() {
            if unit.target.trim().is_empty() {
                return Err(PlanError::EmptyTarget { index });
            }
            if unit.args.primary.iter().any(|p| p.trim().is_empty()) {
                return Err(PlanError::EmptyPrimary {
                    index,
                    target: unit.target.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
