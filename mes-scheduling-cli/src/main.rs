//! mes-scheduling CLI tool

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ConfigCommand, SimulateCommand};
use mes_scheduling::config::SchedulingConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mes-sched")]
#[command(version)]
#[command(about = "Simulate setup and cleanup orchestration on a production line", long_about = None)]
struct Cli {
    /// Emit scheduler logs (`[logging] filter`, overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Admit the batches of a scenario file and show the resulting schedule
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,
        /// Configuration file instead of the default lookup
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Run the committed jobs after admission
        #[arg(short, long)]
        execute: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Configuration file instead of the default lookup
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let config = match &cli.command {
            Commands::Simulate { config, .. } => load_config(config.as_deref())?,
            Commands::Config { file } => load_config(file.as_deref())?,
        };
        mes_scheduling::observability::init(&config.logging)?;
    }

    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            execute,
            json,
        } => {
            let cmd = SimulateCommand::new(scenario, config, execute, json);
            cmd.execute().await?;
        }
        Commands::Config { file } => {
            ConfigCommand::new(file).execute()?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SchedulingConfig> {
    let config = match path {
        Some(path) => SchedulingConfig::load_from(path)?,
        None => SchedulingConfig::load_for_service("mes-sched")?,
    };
    Ok(config)
}
