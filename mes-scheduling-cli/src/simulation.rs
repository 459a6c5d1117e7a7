//! Run a scenario against an in-memory line.

use crate::scenario::Scenario;
use acton_reactive::prelude::*;
use anyhow::{bail, Context, Result};
use mes_scheduling::agent::{AdmitJobs, GetMetricsRequest, SchedulingAgent, SchedulingMetrics};
use mes_scheduling::config::SetupSettings;
use mes_scheduling::jobs::{
    ActivityOutcome, DefaultJobFactory, JobFactory, JobId, JobKind, JobRef, JobState,
};
use mes_scheduling::notifications::InMemoryNotifications;
use mes_scheduling::orchestrator::{BatchOutcome, SetupOrchestrator};
use mes_scheduling::planner::SetupTablePlanner;
use mes_scheduling::recipe::RecipeId;
use mes_scheduling::resources::StaticResources;
use mes_scheduling::schedule::{InMemoryJobSchedule, JobSchedule, NewJobBatch};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const RECIPE_POLL: Duration = Duration::from_millis(5);

/// A committed job as reported after the run.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    /// Job id.
    pub id: JobId,
    /// Display name.
    pub name: String,
    /// Recipe id.
    pub recipe: RecipeId,
    /// Final state.
    pub state: String,
    /// Failed setup attempts.
    pub retries: u32,
}

/// Result of a simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Outcome of each batch, in order.
    pub batches: Vec<BatchOutcome>,
    /// Committed schedule.
    pub schedule: Vec<ScheduledJob>,
    /// Notifications still waiting for acknowledgment.
    pub open_notifications: usize,
    /// Counters of the scheduling agent.
    pub metrics: SchedulingMetrics,
}

/// Options of a simulation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationOptions {
    /// Run the committed jobs head to tail after admission.
    pub execute: bool,
}

/// Admit every batch of `scenario` through a scheduling agent and report the
/// resulting schedule.
///
/// # Errors
///
/// Returns an error if the agent cannot be started, a batch anchor is out of
/// range, a batch is rejected, or execution gets stuck.
pub async fn simulate(
    scenario: &Scenario,
    settings: &SetupSettings,
    options: SimulationOptions,
) -> Result<SimulationReport> {
    let settings = scenario.setup.as_ref().unwrap_or(settings);
    let recipes = scenario.recipes();

    let schedule = Arc::new(InMemoryJobSchedule::new());
    let notifications = Arc::new(InMemoryNotifications::new());
    let factory = Arc::new(DefaultJobFactory::new(
        settings,
        schedule.events(),
        Arc::clone(&notifications) as _,
    ));
    let orchestrator = Arc::new(SetupOrchestrator::new(
        Arc::new(SetupTablePlanner::new(scenario.setups.clone())),
        Arc::clone(&factory) as _,
        Arc::clone(&schedule) as _,
        Arc::new(StaticResources::new(scenario.cells.clone())),
        settings,
    ));

    let mut runtime = ActonApp::launch();
    let agent = SchedulingAgent::spawn(&mut runtime, orchestrator).await?;

    let mut batches = Vec::with_capacity(scenario.batches.len());
    for (index, def) in scenario.batches.iter().enumerate() {
        let jobs = def
            .jobs
            .iter()
            .map(|job| {
                recipes
                    .get(&job.recipe)
                    .map(|recipe| factory.create_production_job(Arc::clone(recipe), job.amount))
                    .with_context(|| format!("Batch {index} uses unknown recipe {}", job.recipe))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut batch = NewJobBatch::from_jobs(jobs);
        if let Some(position) = def.after {
            let anchor = schedule
                .jobs()
                .get(position)
                .map(|job| job.id())
                .with_context(|| format!("Batch {index} anchors after missing position {position}"))?;
            batch = batch.anchored_after(anchor);
        }

        let (request, rx) = AdmitJobs::new(batch);
        agent.send(request).await;
        let outcome = rx
            .await
            .context("Scheduling agent stopped")?
            .with_context(|| format!("Batch {index} was rejected"))?;
        debug!(batch = index, ?outcome, "Batch admitted");
        batches.push(outcome);
    }

    if options.execute {
        execute(schedule.as_ref()).await?;
    }

    let (request, rx) = GetMetricsRequest::new();
    agent.send(request).await;
    let metrics = rx.await.context("Scheduling agent stopped")?;
    runtime.shutdown_all().await?;

    Ok(SimulationReport {
        batches,
        schedule: schedule.jobs().iter().map(scheduled_job).collect(),
        open_notifications: notifications.pending_count(),
        metrics,
    })
}

fn scheduled_job(job: &JobRef) -> ScheduledJob {
    ScheduledJob {
        id: job.id(),
        name: job.display_name(),
        recipe: job.recipe_id(),
        state: job.state().to_string(),
        retries: job.retries(),
    }
}

/// Run every pending job in schedule order with succeeding activities.
///
/// Stops at the first setup job that blocks on retries.
async fn execute(schedule: &dyn JobSchedule) -> Result<()> {
    for job in schedule.jobs() {
        if job.state() != JobState::Waiting {
            continue;
        }
        job.start()?;

        if job.is_setup() {
            wait_for_recipe(&job).await?;
        }
        if job.state() == JobState::RetrySetupBlocked {
            debug!(job = %job.id(), "Setup blocked, stopping execution");
            return Ok(());
        }

        let activities = match job.kind() {
            JobKind::Production { amount, .. } => *amount,
            JobKind::Setup { .. } => job
                .setup_recipe()
                .map_or(0, |recipe| recipe.activity_count()),
        };
        for _ in 0..activities {
            if job.state() != JobState::Running {
                break;
            }
            job.activity_started()?;
            job.activity_completed(ActivityOutcome::Succeeded)?;
        }
    }
    Ok(())
}

/// Wait until the orchestrator answered the setup job's recipe request.
async fn wait_for_recipe(job: &JobRef) -> Result<()> {
    let answered = tokio::time::timeout(Duration::from_secs(5), async {
        while job.recipe_required() {
            tokio::time::sleep(RECIPE_POLL).await;
        }
    })
    .await;
    if answered.is_err() {
        bail!("No recipe arrived for {}", job.display_name());
    }
    Ok(())
}
