//! sejmbot entry point.
//!
//! Logging goes to stderr; command results are printed to stdout as JSON.

use anyhow::{Context as _, Result};
use clap::Parser;
use sejmbot_core::AppConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cached;
mod cli;
mod commands;
mod members;
mod orchestrator;
mod scheduler;
mod stats;
mod storage;

use cli::{CacheCommands, Cli, Commands};
use commands::{Context, ScheduleMode};

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    tracing::debug!(output_dir = %config.output_dir.display(), cache_dir = %config.cache_dir().display(), "Configuration loaded");
    let ctx = Context::new(config, cli.no_cache);

    match cli.command {
        Commands::Scrape { term, proceeding, force, no_statements, pdf } => {
            commands::scrape(&ctx, term, proceeding, force, no_statements, pdf).await
        }
        Commands::Members { term, no_photos, no_voting_stats } => {
            commands::members(&ctx, term, no_photos, no_voting_stats).await
        }
        Commands::Clubs { term } => commands::clubs(&ctx, term).await,
        Commands::Schedule { term, once: _, continuous, interval, status, health, cleanup } => {
            let mode = match (continuous, status, health, cleanup) {
                (true, ..) => ScheduleMode::Continuous,
                (_, true, ..) => ScheduleMode::Status,
                (_, _, true, _) => ScheduleMode::Health,
                (_, _, _, Some(days)) => ScheduleMode::Cleanup(days),
                _ => ScheduleMode::Once,
            };
            commands::schedule(&ctx, term, mode, interval).await
        }
        Commands::Cache(CacheCommands::Stats) => commands::cache_stats(&ctx),
        Commands::Cache(CacheCommands::Clean) => commands::cache_clean(&ctx),
        Commands::Cache(CacheCommands::Reset { scope }) => commands::cache_reset(&ctx, &scope),
        Commands::Extract { file, url, json } => commands::extract(&file, url.as_deref(), json),
        Commands::Terms => commands::terms(&ctx).await,
    }
}
