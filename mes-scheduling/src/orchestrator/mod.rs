//! Setup and cleanup orchestration.
//!
//! For every admitted batch the orchestrator walks the production jobs once,
//! left to right. Before the first job of a run it inserts the setup the
//! planner asks for, after the last job of a run a cleanup (or a temporary
//! catch-all cleanup if the planner has none yet). A planner failure is
//! contained by interrupting and removing the jobs that depend on the answer;
//! it never fails the batch.
//!
//! After commit the orchestrator follows job state changes: setup jobs that
//! request a recipe get a fresh answer from the planner, and a setup that
//! lost its production run is aborted.
//!
//! Every entry point holds one gate, so a batch pass and a state change
//! reaction never interleave.

mod cascade;
mod predicates;

use crate::config::SetupSettings;
use crate::error::{PlanningError, SchedulingResult};
use crate::jobs::{JobClassification, JobFactory, JobId, JobRef, JobStateChanged};
use crate::planner::SetupPlanner;
use crate::recipe::{ProductionRecipe, RecipeId, SetupExecution, SetupRecipe};
use crate::resources::ResourceView;
use crate::schedule::{BatchCursor, JobSchedule, NewJobBatch, ScheduleView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// What one pass over a batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Inserted setup jobs.
    pub setups: Vec<JobId>,
    /// Inserted cleanup jobs.
    pub cleanups: Vec<JobId>,
    /// Jobs interrupted and removed from the batch.
    pub interrupted: Vec<JobId>,
}

impl BatchOutcome {
    /// Whether the pass neither inserted nor removed anything.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.setups.is_empty() && self.cleanups.is_empty() && self.interrupted.is_empty()
    }

    /// Record jobs removed by a cascade. Inserted jobs among them no longer
    /// count as inserted.
    fn record_interrupted(&mut self, jobs: Vec<JobId>) {
        self.setups.retain(|id| !jobs.contains(id));
        self.cleanups.retain(|id| !jobs.contains(id));
        self.interrupted.extend(jobs);
    }
}

/// Inserts setup and cleanup jobs around production runs.
pub struct SetupOrchestrator {
    planner: Arc<dyn SetupPlanner>,
    factory: Arc<dyn JobFactory>,
    schedule: Arc<dyn JobSchedule>,
    resources: Arc<dyn ResourceView>,
    planner_timeout: Duration,
    gate: Mutex<()>,
}

impl std::fmt::Debug for SetupOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupOrchestrator")
            .field("planner_timeout", &self.planner_timeout)
            .finish_non_exhaustive()
    }
}

impl SetupOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        planner: Arc<dyn SetupPlanner>,
        factory: Arc<dyn JobFactory>,
        schedule: Arc<dyn JobSchedule>,
        resources: Arc<dyn ResourceView>,
        settings: &SetupSettings,
    ) -> Self {
        Self {
            planner,
            factory,
            schedule,
            resources,
            planner_timeout: settings.planner_timeout(),
            gate: Mutex::new(()),
        }
    }

    /// Schedule the orchestrator works on.
    #[must_use]
    pub fn schedule(&self) -> &Arc<dyn JobSchedule> {
        &self.schedule
    }

    /// Insert setup and cleanup jobs into `batch` without committing it.
    ///
    /// Every production job is visited once. Planning failures are contained
    /// inside the batch and reported in [`BatchOutcome::interrupted`].
    pub async fn handle(&self, batch: &mut NewJobBatch) -> BatchOutcome {
        let _gate = self.gate.lock().await;
        self.handle_batch(batch).await
    }

    /// Handle `batch` and commit it, as one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule rejects the commit.
    pub async fn admit(&self, mut batch: NewJobBatch) -> SchedulingResult<BatchOutcome> {
        let _gate = self.gate.lock().await;
        let outcome = self.handle_batch(&mut batch).await;
        self.schedule.commit(batch)?;
        info!(
            setups = outcome.setups.len(),
            cleanups = outcome.cleanups.len(),
            interrupted = outcome.interrupted.len(),
            "Admitted job batch"
        );
        Ok(outcome)
    }

    /// React to a job state change reported by the schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if the job moved on before the reaction could be
    /// applied (for example a setup that was aborted meanwhile).
    pub async fn on_job_state_changed(&self, change: &JobStateChanged) -> SchedulingResult<()> {
        let _gate = self.gate.lock().await;
        let job = &change.job;

        if !change.current.classification().is_finished() {
            if job.is_setup() && job.recipe_required() {
                self.refresh_setup(job).await?;
            }
            return Ok(());
        }

        if job.is_production() {
            self.abort_orphaned_setup(job);
        }
        Ok(())
    }

    async fn handle_batch(&self, batch: &mut NewJobBatch) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut cursor = batch.first();

        while let Some(at) = cursor {
            let Some(recipe) = batch
                .get(at)
                .and_then(|job| job.production_recipe().cloned())
            else {
                cursor = batch.next(at);
                continue;
            };

            if self.requires_setup(batch, at) {
                match self.required_setup(SetupExecution::BeforeProduction, &recipe).await {
                    Ok(Some(setup)) => {
                        let job = self.factory.create_setup_job(setup);
                        info!(job = %job.id(), recipe = %recipe.id, "Inserted setup");
                        outcome.setups.push(job.id());
                        batch.insert_before(at, job);
                    }
                    Ok(None) => debug!(recipe = %recipe.id, "No setup required"),
                    Err(err) => {
                        let cascade = cascade::interrupt_jobs_forward(batch, at, recipe.id);
                        log_cascade(recipe.id, SetupExecution::BeforeProduction, &err, &cascade.interrupted);
                        outcome.record_interrupted(cascade.interrupted);
                        cursor = cascade.resume;
                        continue;
                    }
                }
            }

            if self.requires_cleanup(batch, at) {
                match self.required_setup(SetupExecution::AfterProduction, &recipe).await {
                    Ok(cleanup) => {
                        let cleanup = cleanup.unwrap_or_else(|| {
                            debug!(recipe = %recipe.id, "No cleanup known yet, using temporary cleanup");
                            SetupRecipe::temporary_cleanup(Arc::clone(&recipe))
                        });
                        let job = self.factory.create_setup_job(cleanup);
                        info!(job = %job.id(), recipe = %recipe.id, "Inserted cleanup");
                        outcome.cleanups.push(job.id());
                        batch.insert_after(at, job);
                    }
                    Err(err) => {
                        let cascade = cascade::interrupt_jobs_backward(batch, at, recipe.id);
                        log_cascade(recipe.id, SetupExecution::AfterProduction, &err, &cascade.interrupted);
                        outcome.record_interrupted(cascade.interrupted);
                        cursor = cascade.resume;
                        continue;
                    }
                }
            }

            cursor = batch.next(at);
        }

        outcome
    }

    fn requires_setup(&self, batch: &NewJobBatch, at: BatchCursor) -> bool {
        predicates::requires_setup_creation(&ScheduleView::new(self.schedule.as_ref(), batch), at)
    }

    fn requires_cleanup(&self, batch: &NewJobBatch, at: BatchCursor) -> bool {
        predicates::requires_cleanup_creation(&ScheduleView::new(self.schedule.as_ref(), batch), at)
    }

    /// Ask the planner, bounded by the configured timeout.
    async fn required_setup(
        &self,
        execution: SetupExecution,
        target: &Arc<ProductionRecipe>,
    ) -> Result<Option<SetupRecipe>, PlanningError> {
        let request = self
            .planner
            .required_setup(execution, target, Arc::clone(&self.resources));
        tokio::time::timeout(self.planner_timeout, request)
            .await
            .unwrap_or(Err(PlanningError::Timeout(self.planner_timeout)))
    }

    async fn refresh_setup(&self, job: &JobRef) -> SchedulingResult<()> {
        let (Some(execution), Some(target)) = (job.execution(), job.target().cloned()) else {
            return Ok(());
        };

        match self.required_setup(execution, &target).await {
            Ok(recipe) => {
                debug!(job = %job.id(), found = recipe.is_some(), "Updating setup recipe");
                job.update_setup(recipe)
            }
            Err(err) => {
                warn!(job = %job.id(), error = %err, "Setup planning failed for running setup");
                job.escalate_setup_failure(&err.to_string())
            }
        }
    }

    /// A production job finished; abort the setup before it if no further
    /// job of its recipe follows and the setup has not started completing.
    fn abort_orphaned_setup(&self, job: &JobRef) {
        let recipe = job.recipe_id();
        let run_continues = self
            .schedule
            .next(job.id())
            .is_some_and(|next| next.recipe_id() == recipe);
        if run_continues {
            return;
        }

        if let Some(previous) = self.schedule.previous(job.id()) {
            if previous.is_setup_for(SetupExecution::BeforeProduction, recipe)
                && previous.classification() < JobClassification::Completing
            {
                info!(job = %previous.id(), recipe = %recipe, "Aborting setup without production");
                previous.abort();
            }
        }
    }
}

fn log_cascade(recipe: RecipeId, execution: SetupExecution, err: &PlanningError, jobs: &[JobId]) {
    error!(
        %recipe,
        %execution,
        error = %err,
        jobs = ?jobs,
        "Setup determination failed, interrupted dependent jobs"
    );
}
