//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel test-unit scheduler with rerun escalation
#[derive(Parser, Debug)]
#[command(name = "unitpool")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run test units in parallel, rerun failures, merge their reports")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a plan of test units
    Run(RunArgs),

    /// Manage configuration files
    Config(ConfigArgs),

    /// Show environment variable overrides
    Env,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run plan file (YAML or JSON)
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent units
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Rerun attempts per failed unit
    #[arg(long)]
    pub rerun_attempts: Option<u32>,

    /// Never rerun failed units
    #[arg(long)]
    pub no_rerun: bool,

    /// Rerun granularity (unit, scoped)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Session id shared with the engine and used to select report files
    #[arg(long)]
    pub session_id: Option<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save the run summary to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the combined rerun manifest here
    #[arg(long)]
    pub rerun_output: Option<PathBuf>,

    /// Engine program and its base arguments
    #[arg(last = true)]
    pub engine: Vec<String>,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "unitpool.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show {
        /// Configuration file (defaults to the standard locations)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check a configuration file
    Validate {
        /// Configuration file to check
        path: PathBuf,
    },
}
