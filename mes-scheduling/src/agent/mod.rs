//! Scheduling agent using acton-reactive.
//!
//! The agent is the sequential worker in front of the
//! [`SetupOrchestrator`]: batch admissions and state change reactions are
//! queued as messages and processed in receipt order. [`SchedulingAgent::spawn`]
//! also starts a task that forwards the schedule's state changes to the agent.
//!
//! # Example
//!
//! ```rust,no_run
//! use acton_reactive::prelude::*;
//! use mes_scheduling::agent::{AdmitJobs, SchedulingAgent};
//! # use mes_scheduling::orchestrator::SetupOrchestrator;
//! # use mes_scheduling::schedule::NewJobBatch;
//! # use std::sync::Arc;
//!
//! # async fn example(orchestrator: Arc<SetupOrchestrator>, batch: NewJobBatch) -> anyhow::Result<()> {
//! let mut runtime = ActonApp::launch();
//! let handle = SchedulingAgent::spawn(&mut runtime, orchestrator).await?;
//!
//! let (request, rx) = AdmitJobs::new(batch);
//! handle.send(request).await;
//! let outcome = rx.await??;
//! println!("inserted {} setups", outcome.setups.len());
//! # Ok(())
//! # }
//! ```

mod messages;
pub mod request_reply;

pub use messages::{AdmitJobs, GetMetricsRequest, ObserveStateChange, SchedulingMetrics};
pub use request_reply::{create_request_reply, send_response, ResponseChannel};

use crate::error::SchedulingError;
use crate::jobs::{JobEvent, JobEventStream};
use crate::orchestrator::SetupOrchestrator;
use acton_reactive::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

// Type alias for the ManagedAgent builder type
type SchedulingAgentBuilder = ManagedAgent<Idle, SchedulingAgent>;

/// Actor model of the scheduling agent.
#[derive(Clone, Default)]
pub struct SchedulingAgent {
    orchestrator: Option<Arc<SetupOrchestrator>>,
    metrics: Arc<RwLock<SchedulingMetrics>>,
}

impl std::fmt::Debug for SchedulingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulingAgent")
            .field("orchestrator", &self.orchestrator)
            .field("metrics", &*self.metrics.read())
            .finish()
    }
}

impl SchedulingAgent {
    /// Spawn the agent and start forwarding state changes of the
    /// orchestrator's schedule to it.
    ///
    /// If the schedule's event stream was already taken, the agent still
    /// admits batches but does not react to state changes.
    ///
    /// # Errors
    ///
    /// Returns error if agent initialization fails
    pub async fn spawn(
        runtime: &mut AgentRuntime,
        orchestrator: Arc<SetupOrchestrator>,
    ) -> anyhow::Result<AgentHandle> {
        let events = orchestrator.schedule().subscribe();

        let agent_config = AgentConfig::new(Ern::with_root("scheduling_orchestrator")?, None, None)?;
        let mut builder = runtime.new_agent_with_config::<Self>(agent_config).await;
        builder.model = Self {
            orchestrator: Some(orchestrator),
            metrics: Arc::new(RwLock::new(SchedulingMetrics::default())),
        };
        let handle = Self::configure_handlers(builder).await?;

        match events {
            Some(events) => forward_state_changes(events, handle.clone()),
            None => warn!("Schedule events already subscribed, state changes are not observed"),
        }
        Ok(handle)
    }

    async fn configure_handlers(mut builder: SchedulingAgentBuilder) -> anyhow::Result<AgentHandle> {
        builder
            .mutate_on::<AdmitJobs>(|agent, envelope| {
                let msg = envelope.message().clone();
                let orchestrator = agent.model.orchestrator.clone();
                let metrics = Arc::clone(&agent.model.metrics);

                AgentReply::from_async(async move {
                    let result = match orchestrator {
                        Some(orchestrator) => orchestrator.admit(msg.batch).await,
                        None => Err(SchedulingError::AgentUnavailable),
                    };

                    match &result {
                        Ok(outcome) => metrics.write().record_outcome(outcome),
                        Err(e) => {
                            warn!("Failed to admit job batch: {e}");
                            metrics.write().batches_rejected += 1;
                        }
                    }

                    if let Some(tx) = msg.response_tx {
                        if send_response(tx, result).await.is_err() {
                            debug!("Admission caller went away before the outcome arrived");
                        }
                    }
                })
            })
            .mutate_on::<ObserveStateChange>(|agent, envelope| {
                let change = envelope.message().change.clone();
                let orchestrator = agent.model.orchestrator.clone();
                let metrics = Arc::clone(&agent.model.metrics);

                AgentReply::from_async(async move {
                    let Some(orchestrator) = orchestrator else {
                        return;
                    };
                    let result = orchestrator.on_job_state_changed(&change).await;

                    let mut metrics = metrics.write();
                    metrics.state_changes_observed += 1;
                    if let Err(e) = result {
                        warn!(job = %change.job.id(), "State change reaction rejected: {e}");
                        metrics.reactions_failed += 1;
                    }
                })
            })
            .act_on::<GetMetricsRequest>(|agent, envelope| {
                let response_tx = envelope.message().response_tx.clone();
                let metrics = agent.model.metrics.read().clone();

                Box::pin(async move {
                    let _ = send_response(response_tx, metrics).await;
                })
            });

        Ok(builder.start().await)
    }
}

/// Forward every state change on `events` to the agent behind `handle`.
fn forward_state_changes(mut events: JobEventStream, handle: AgentHandle) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let JobEvent::StateChanged(change) = event {
                handle.send(ObserveStateChange { change }).await;
            }
        }
        debug!("Job event stream closed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupSettings;
    use crate::jobs::{DefaultJobFactory, JobFactory, JobState};
    use crate::notifications::DiscardNotifications;
    use crate::planner::MockSetupPlanner;
    use crate::recipe::{ProductionRecipe, RecipeId};
    use crate::resources::StaticResources;
    use crate::schedule::{InMemoryJobSchedule, JobSchedule, NewJobBatch};

    fn orchestrator(
        schedule: &Arc<InMemoryJobSchedule>,
    ) -> (Arc<SetupOrchestrator>, Arc<DefaultJobFactory>) {
        let mut planner = MockSetupPlanner::new();
        planner.expect_required_setup().returning(|_, _, _| Ok(None));
        let settings = SetupSettings::default();
        let factory = Arc::new(DefaultJobFactory::new(
            &settings,
            schedule.events(),
            Arc::new(DiscardNotifications),
        ));
        let orchestrator = SetupOrchestrator::new(
            Arc::new(planner),
            Arc::clone(&factory) as Arc<dyn JobFactory>,
            Arc::clone(schedule) as Arc<dyn JobSchedule>,
            Arc::new(StaticResources::default()),
            &settings,
        );
        (Arc::new(orchestrator), factory)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduling_agent_spawn() {
        let mut runtime = ActonApp::launch();
        let schedule = Arc::new(InMemoryJobSchedule::new());
        let (orchestrator, _) = orchestrator(&schedule);

        let result = SchedulingAgent::spawn(&mut runtime, orchestrator).await;
        assert!(result.is_ok());
        assert!(schedule.subscribe().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_admit_jobs_replies_with_outcome() {
        let mut runtime = ActonApp::launch();
        let schedule = Arc::new(InMemoryJobSchedule::new());
        let (orchestrator, factory) = orchestrator(&schedule);
        let handle = SchedulingAgent::spawn(&mut runtime, orchestrator).await.unwrap();

        let job = factory.create_production_job(ProductionRecipe::new(1, "X"), 2);
        let (request, rx) = AdmitJobs::new(NewJobBatch::from_jobs([job.clone()]));
        handle.send(request).await;

        let outcome = rx.await.expect("Failed to receive outcome").unwrap();
        assert!(outcome.setups.is_empty());
        assert_eq!(outcome.cleanups.len(), 1);
        assert_eq!(job.state(), JobState::Waiting);
        assert_eq!(
            schedule.last().map(|job| job.recipe_id()),
            Some(RecipeId::TEMPORARY)
        );

        let (request, rx) = GetMetricsRequest::new();
        handle.send(request).await;
        let metrics = rx.await.expect("Failed to receive metrics");
        assert_eq!(metrics.batches_admitted, 1);
        assert_eq!(metrics.cleanups_inserted, 1);
    }
}
