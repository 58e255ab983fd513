//! unitpool - parallel test-unit scheduler
//!
//! Runs a plan of independent test units through an external engine on a
//! bounded worker pool, reruns failures when the engine leaves a rerun
//! manifest behind, and merges the per-unit reports afterwards.
//!
//! ## Features
//!
//! - Bounded parallelism, optionally capped by allocatable devices
//! - Whole-unit or manifest-scoped reruns with a configurable attempt count
//! - Lifecycle events for log and JSON-lines subscribers
//! - Merged JSON, message and text reports plus a combined rerun manifest
//! - Multiple output formats (Table, JSON, CSV)
//!
//! ## Usage
//!
//! ```bash
//! # Run a plan with 8 workers
//! unitpool run --plan plan.yaml --threads 8 -- cucumber-runner --strict
//!
//! # Rerun only the failed scenarios, twice
//! unitpool run --plan plan.yaml --mode scoped --rerun-attempts 2
//!
//! # Create and check a configuration file
//! unitpool config init
//! unitpool config validate unitpool.yaml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod cli;
mod config;
mod events;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{ConfigFile, EnvConfig, RunConfig};
use events::{EventPublisher, JsonLinesSubscriber, LogSubscriber, Subscriber};
use executor::{CommandEngine, RerunMode, Scheduler};
use models::{RunPlan, RunStatus};
use output::{write_summary_to_file, OutputFormat, ResultFormatter};
use results::ReportMerger;
use utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(args.verbose, env.log.as_deref());

    match args.command {
        cli::Command::Run(run_args) => {
            let status = run_plan(run_args, env).await?;
            if status != RunStatus::Ok {
                std::process::exit(status.exit_code());
            }
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
        cli::Command::Env => {
            config::print_env_help();
            println!();
            env.print_summary();
        }
    }

    Ok(())
}

async fn run_plan(args: cli::RunArgs, env: EnvConfig) -> Result<RunStatus> {
    let mut config = resolve_config(&args, &env)?;
    let session_id = config.ensure_session_id().to_string();
    config.validate_for_run()?;

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    let plan = RunPlan::load(&args.plan)?;
    if plan.is_empty() {
        warn!("Plan {} has no units", args.plan.display());
    }
    info!(
        "Loaded {} units from {} (session {})",
        plan.len(),
        args.plan.display(),
        session_id
    );

    let engine = CommandEngine::new(
        config.engine.program.clone(),
        config.engine.args.clone(),
        session_id.as_str(),
    );
    let publisher = build_publisher(&config)?;
    let scheduler = Scheduler::new(&config, Arc::new(engine), publisher);

    let summary = scheduler.run(plan.units).await;

    if let Err(e) = scheduler
        .rerun_manifest()
        .write_to(config.rerun_output.as_deref())
    {
        error!("{:#}", e);
    }

    let merger = ReportMerger::new(
        config.reports.output_dir.clone(),
        config.reports.outputs.clone(),
    );
    if let Err(e) = merger.merge(scheduler.reports()) {
        error!("{:#}", e);
    }

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_summary(&summary)?);
    if format == OutputFormat::Table {
        print!("{}", formatter.format_failures(&summary));
    }

    if let Some(path) = &args.output {
        write_summary_to_file(path, &summary, format)?;
        info!("Run summary saved to {}", path.display());
    }

    Ok(summary.status)
}

/// File config, then environment, then command-line flags
fn resolve_config(args: &cli::RunArgs, env: &EnvConfig) -> Result<RunConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let mut config = ConfigFile::load_or_default(path.as_deref())?.run;

    env.apply_to(&mut config)?;

    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(attempts) = args.rerun_attempts {
        config.rerun.attempts = attempts;
    }
    if args.no_rerun {
        config.rerun.enabled = false;
    }
    if let Some(mode) = &args.mode {
        config.rerun.mode = RerunMode::from_str(mode)
            .ok_or_else(|| anyhow::anyhow!("Unknown rerun mode: {mode}"))?;
    }
    if let Some(session) = &args.session_id {
        config.session_id = Some(session.clone());
    }
    if let Some(output) = &args.rerun_output {
        config.rerun_output = Some(output.clone());
    }
    if let Some((program, rest)) = args.engine.split_first() {
        config.engine.program = program.clone();
        config.engine.args = rest.to_vec();
    }

    Ok(config)
}

fn build_publisher(config: &RunConfig) -> Result<EventPublisher> {
    let mut subscribers: Vec<Arc<dyn Subscriber>> = vec![Arc::new(LogSubscriber)];

    if let Some(path) = &config.events.log_file {
        let subscriber = JsonLinesSubscriber::create(path, &config.events.subscribe)
            .context("Failed to set up event log")?;
        info!("Writing events to {}", subscriber.path().display());
        subscribers.push(Arc::new(subscriber));
    }

    Ok(EventPublisher::new(subscribers))
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { config } => {
            let path = config.or_else(|| env.config_file.as_ref().map(PathBuf::from));
            let mut file = ConfigFile::load_or_default(path.as_deref())?;
            env.apply_to(&mut file.run)?;
            println!("{}", serde_yaml::to_string(&file)?);
        }

        cli::ConfigAction::Validate { path } => match ConfigFile::load(&path) {
            Ok(_) => {
                println!("✓ Configuration file is valid: {}", path.display());
            }
            Err(e) => {
                println!("✗ Configuration file is invalid: {}", path.display());
                println!("  Error: {e:#}");
                return Err(e);
            }
        },
    }

    Ok(())
}
