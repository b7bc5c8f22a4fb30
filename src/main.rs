mod catalog;
mod changes;
mod cli;
mod config;
mod engine;
mod error;
mod exclusion;
mod gradle;
mod maven;
mod npm;
mod process;
mod reconciler;
mod repository;
mod scheduler;
mod scm;
mod storage;
mod telemetry;
#[cfg(test)]
mod testing;
mod utils;
mod workflow;
mod worktree;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::Config;
use std::process::exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs, telemetry::level_for(cli.verbose));

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve => workflow::execute_serve(&config).await?,
        Commands::Run => workflow::execute_run(&config).await?,
        Commands::Status => workflow::execute_status(&config).await?,
        Commands::Exclude {
            dependencies,
            pattern,
        } => workflow::execute_exclude(&config, &dependencies.join(" "), pattern).await?,
        Commands::Include {
            dependencies,
            pattern,
        } => workflow::execute_include(&config, &dependencies.join(" "), pattern).await?,
    }
    Ok(())
}
