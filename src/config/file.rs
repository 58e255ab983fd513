//! Configuration file management
//!
//! Handles finding, loading, and saving configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{EngineConfig, EventsConfig, ReportOutputConfig, RunConfig};
use crate::events::EventKind;
use crate::executor::RerunMode;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./unitpool.yaml",
    "./unitpool.yml",
    "./.unitpool.yaml",
    "~/.config/unitpool/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(flatten)]
    pub run: RunConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            run: RunConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from `path`, or from the first standard location, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(Self::find) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        self.run
            .validate()
            .context("Invalid run configuration")
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut run = RunConfig {
            threads: 4,
            process_messages: true,
            rerun_output: Some(PathBuf::from("target/rerun.txt")),
            reports: ReportOutputConfig {
                output_dir: PathBuf::from("target/unitpool"),
                outputs: vec!["cucumber.json".to_string(), "cucumber.ndjson".to_string()],
            },
            engine: EngineConfig {
                program: "cucumber-runner".to_string(),
                args: vec!["--strict".to_string()],
            },
            events: EventsConfig {
                log_file: Some(PathBuf::from("target/unitpool/events.ndjson")),
                subscribe: vec![EventKind::TestFailed, EventKind::RunSummary],
            },
            ..RunConfig::default()
        };
        run.rerun.attempts = 2;
        run.rerun.mode = RerunMode::Scoped;

        Self {
            version: default_version(),
            run,
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_example_is_valid() {
        let config = ConfigFile::example();
        assert!(config.validate().is_ok());
        assert!(config.run.validate_for_run().is_ok());
    }

    #[test]
    fn test_config_file_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("unitpool.yaml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.run, config.run);
    }

    #[test]
    fn test_config_file_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unitpool.json");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.run.engine.program, "cucumber-runner");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unitpool.yaml");
        std::fs::write(&path, "version: \"9.9\"\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());

        std::fs::write(&path, "threads: 0\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_load_or_default_with_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unitpool.yml");
        std::fs::write(&path, "threads: 2\n").unwrap();

        let config = ConfigFile::load_or_default(Some(path.as_path())).unwrap();
        assert_eq!(config.run.threads, 2);
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
        assert!(is_yaml_file(Path::new("a.yml")));
        assert!(!is_yaml_file(Path::new("a.json")));
    }
}
