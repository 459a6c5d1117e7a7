//! Scenario simulation command

use anyhow::Result;
use console::{style, Emoji};
use mes_scheduling::config::SchedulingConfig;
use mes_scheduling_cli::{simulate, Scenario, SimulationOptions, SimulationReport};
use std::path::PathBuf;

static SUCCESS: Emoji = Emoji("✓", "√");
static WARN: Emoji = Emoji("⚠", "!");
static INFO: Emoji = Emoji("ℹ", "i");

/// Simulate a scenario file
#[derive(Debug)]
pub struct SimulateCommand {
    scenario: PathBuf,
    config: Option<PathBuf>,
    execute: bool,
    json: bool,
}

impl SimulateCommand {
    /// Create a new simulate command
    #[must_use]
    pub const fn new(scenario: PathBuf, config: Option<PathBuf>, execute: bool, json: bool) -> Self {
        Self {
            scenario,
            config,
            execute,
            json,
        }
    }

    /// Execute the simulation
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The scenario or configuration cannot be loaded
    /// - A batch is rejected or execution gets stuck
    pub async fn execute(&self) -> Result<()> {
        let scenario = Scenario::load(&self.scenario)?;
        let config = match &self.config {
            Some(path) => SchedulingConfig::load_from(path)?,
            None => SchedulingConfig::load_for_service("mes-sched")?,
        };

        let options = SimulationOptions {
            execute: self.execute,
        };
        let report = simulate(&scenario, &config.setup, options).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SimulationReport) {
    println!("\n{} Admitted {} batches", SUCCESS, report.batches.len());
    for (index, outcome) in report.batches.iter().enumerate() {
        let line = format!(
            "  batch {index}: {} setups, {} cleanups, {} interrupted",
            outcome.setups.len(),
            outcome.cleanups.len(),
            outcome.interrupted.len()
        );
        if outcome.interrupted.is_empty() {
            println!("{line}");
        } else {
            println!("{}", style(line).yellow());
        }
    }

    println!();
    println!("{}", style("Schedule").bold());
    println!("{}", "─".repeat(72));
    println!("{:<4} {:<36} {:<10} {:<20}", "#", "Job", "Recipe", "State");
    println!("{}", "─".repeat(72));
    for (position, job) in report.schedule.iter().enumerate() {
        let state = if job.retries > 0 {
            format!("{} ({} retries)", job.state, job.retries)
        } else {
            job.state.clone()
        };
        println!(
            "{:<4} {:<36} {:<10} {:<20}",
            position,
            job.name,
            job.recipe.to_string(),
            state
        );
    }
    if report.schedule.is_empty() {
        println!("  {}", style("(No jobs scheduled)").dim());
    }
    println!();

    if report.open_notifications > 0 {
        println!(
            "{} {} setup notifications wait for acknowledgment",
            WARN,
            style(report.open_notifications).yellow().bold()
        );
    }
    println!(
        "{} {} state changes observed, {} reactions rejected",
        INFO, report.metrics.state_changes_observed, report.metrics.reactions_failed
    );
}
