//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use super::RunConfig;
use crate::executor::RerunMode;

/// Environment variable prefix
const ENV_PREFIX: &str = "UNITPOOL";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Pool size from UNITPOOL_THREADS
    pub threads: Option<usize>,
    /// Rerun switch from UNITPOOL_RERUN
    pub rerun: Option<bool>,
    /// Attempts from UNITPOOL_RERUN_ATTEMPTS
    pub rerun_attempts: Option<u32>,
    /// Mode from UNITPOOL_RERUN_MODE
    pub rerun_mode: Option<String>,
    /// Session from UNITPOOL_SESSION_ID
    pub session_id: Option<String>,
    /// Rerun manifest output from UNITPOOL_RERUN_OUTPUT
    pub rerun_output: Option<String>,
    /// Config file from UNITPOOL_CONFIG
    pub config_file: Option<String>,
    /// Log level from UNITPOOL_LOG
    pub log: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            threads: get_env_parse("THREADS"),
            rerun: get_env_bool("RERUN"),
            rerun_attempts: get_env_parse("RERUN_ATTEMPTS"),
            rerun_mode: get_env("RERUN_MODE"),
            session_id: get_env("SESSION_ID"),
            rerun_output: get_env("RERUN_OUTPUT"),
            config_file: get_env("CONFIG"),
            log: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.threads.is_some()
            || self.rerun.is_some()
            || self.rerun_attempts.is_some()
            || self.rerun_mode.is_some()
            || self.session_id.is_some()
            || self.rerun_output.is_some()
            || self.config_file.is_some()
            || self.log.is_some()
    }

    /// Override file settings with whatever is set in the environment
    pub fn apply_to(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(enabled) = self.rerun {
            config.rerun.enabled = enabled;
        }
        if let Some(attempts) = self.rerun_attempts {
            config.rerun.attempts = attempts;
        }
        if let Some(mode) = &self.rerun_mode {
            config.rerun.mode = match RerunMode::from_str(mode) {
                Some(mode) => mode,
                None => bail!("{ENV_PREFIX}_RERUN_MODE: unknown rerun mode '{mode}'"),
            };
        }
        if let Some(session) = &self.session_id {
            config.session_id = Some(session.clone());
        }
        if let Some(output) = &self.rerun_output {
            config.rerun_output = Some(PathBuf::from(output));
        }
        Ok(())
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        if !self.has_any() {
            println!("  (no {ENV_PREFIX}_* variables set)");
            return;
        }
        println!("  {}_THREADS:        {:?}", ENV_PREFIX, self.threads);
        println!("  {}_RERUN:          {:?}", ENV_PREFIX, self.rerun);
        println!("  {}_RERUN_ATTEMPTS: {:?}", ENV_PREFIX, self.rerun_attempts);
        println!("  {}_RERUN_MODE:     {:?}", ENV_PREFIX, self.rerun_mode);
        println!("  {}_SESSION_ID:     {:?}", ENV_PREFIX, self.session_id);
        println!("  {}_RERUN_OUTPUT:   {:?}", ENV_PREFIX, self.rerun_output);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:            {:?}", ENV_PREFIX, self.log);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all UNITPOOL environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_THREADS         Maximum concurrent units");
    println!("  {ENV_PREFIX}_RERUN           Enable reruns of failed units (true/false)");
    println!("  {ENV_PREFIX}_RERUN_ATTEMPTS  Rerun attempts per failed unit");
    println!("  {ENV_PREFIX}_RERUN_MODE      Rerun granularity (unit, scoped)");
    println!("  {ENV_PREFIX}_SESSION_ID      Session id shared with the engine");
    println!("  {ENV_PREFIX}_RERUN_OUTPUT    Path of the combined rerun manifest");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_LOG             Log level (error, warn, info, debug, trace)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_THREADS=8");
    println!("  export {ENV_PREFIX}_RERUN_ATTEMPTS=2");
    println!("  unitpool run --plan plan.yaml -- cucumber-runner --strict");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sets variables for the guard's lifetime, restoring previous values on drop
    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let previous = vars
                .iter()
                .map(|(name, value)| {
                    let key = format!("{ENV_PREFIX}_{name}");
                    let old = env::var(&key).ok();
                    env::set_var(&key, value);
                    (key, old)
                })
                .collect();
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.threads.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_load() {
        let _guard = EnvGuard::set(&[
            ("THREADS", "6"),
            ("RERUN", "off"),
            ("RERUN_ATTEMPTS", "3"),
        ]);

        let config = EnvConfig::load();
        assert_eq!(config.threads, Some(6));
        assert_eq!(config.rerun, Some(false));
        assert_eq!(config.rerun_attempts, Some(3));
        assert!(config.has_any());
    }

    #[test]
    fn test_apply_to() {
        let env = EnvConfig {
            threads: Some(2),
            rerun_mode: Some("scoped".to_string()),
            session_id: Some("ci-9".to_string()),
            rerun_output: Some("out/rerun.txt".to_string()),
            ..Default::default()
        };

        let mut config = RunConfig::default();
        env.apply_to(&mut config).unwrap();

        assert_eq!(config.threads, 2);
        assert_eq!(config.rerun.mode, RerunMode::Scoped);
        assert_eq!(config.session_id.as_deref(), Some("ci-9"));
        assert_eq!(config.rerun_output, Some(PathBuf::from("out/rerun.txt")));
        assert!(config.rerun.enabled);
    }

    #[test]
    fn test_apply_rejects_unknown_mode() {
        let env = EnvConfig {
            rerun_mode: Some("sometimes".to_string()),
            ..Default::default()
        };
        assert!(env.apply_to(&mut RunConfig::default()).is_err());
    }
}
