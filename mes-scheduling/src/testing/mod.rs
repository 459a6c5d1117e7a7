//! Testing utilities for scheduling code
//!
//! This module provides helpers for tests of code built on this crate:
//! - [`ScriptedPlanner`] - Setup planner with scripted answers and failures
//! - [`TestLine`] - Schedule, factory, notifications and orchestrator wired together
//! - Recipe builders and response helpers
//!
//! # Example
//!
//! ```rust
//! use mes_scheduling::testing::{production_recipe, setup_recipe, ScriptedPlanner, TestLine};
//! use mes_scheduling::recipe::SetupExecution;
//! use mes_scheduling::schedule::NewJobBatch;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gear = production_recipe(1, "Gear");
//! let line = TestLine::new(
//!     ScriptedPlanner::new().with_setup(setup_recipe(&gear, SetupExecution::BeforeProduction, 1)),
//! );
//!
//! let job = line.production(&gear, 5);
//! line.orchestrator.admit(NewJobBatch::from_jobs([job])).await.unwrap();
//!
//! assert_eq!(line.committed_names(), ["setup Gear", "Gear", "cleanup Gear"]);
//! # }
//! ```

mod planner;

pub use planner::ScriptedPlanner;

use crate::config::SetupSettings;
use crate::jobs::{DefaultJobFactory, JobFactory, JobRef};
use crate::notifications::{InMemoryNotifications, NotificationSink};
use crate::orchestrator::SetupOrchestrator;
use crate::recipe::{CellFilter, ProductionRecipe, RecipeId, SetupExecution, SetupRecipe, SetupStep};
use crate::resources::{CellId, CellInfo, StaticResources};
use crate::schedule::{InMemoryJobSchedule, JobSchedule};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Create a shared production recipe.
#[must_use]
pub fn production_recipe(id: u64, name: &str) -> Arc<ProductionRecipe> {
    ProductionRecipe::new(id, name)
}

/// Create a setup recipe for `target` with `steps` steps runnable anywhere.
///
/// Setup ids are `1000 + target`, cleanup ids `2000 + target`.
#[must_use]
pub fn setup_recipe(
    target: &Arc<ProductionRecipe>,
    execution: SetupExecution,
    steps: usize,
) -> SetupRecipe {
    let offset = match execution {
        SetupExecution::BeforeProduction => 1000,
        SetupExecution::AfterProduction => 2000,
    };
    SetupRecipe::new(
        RecipeId::new(offset + target.id.get()),
        format!("{execution} {}", target.name),
        execution,
        Arc::clone(target),
        (1..=steps)
            .map(|step| SetupStep::new(format!("step {step}"), CellFilter::Any))
            .collect(),
    )
}

/// Resources with the named cells, all available.
#[must_use]
pub fn cells(names: &[&str]) -> StaticResources {
    StaticResources::new(
        names
            .iter()
            .map(|name| CellInfo {
                id: CellId::new(*name),
                capabilities: Vec::new(),
                available: true,
            })
            .collect(),
    )
}

/// Await an agent response.
///
/// # Panics
///
/// Panics if no response arrives within five seconds or the agent dropped
/// the channel.
pub async fn await_response<T>(rx: oneshot::Receiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("Timed out waiting for agent response")
        .expect("Agent dropped response channel")
}

/// A production line in a box.
pub struct TestLine {
    /// Committed schedule.
    pub schedule: Arc<InMemoryJobSchedule>,
    /// Planner used by the orchestrator.
    pub planner: Arc<ScriptedPlanner>,
    /// Notifications raised by setup jobs.
    pub notifications: Arc<InMemoryNotifications>,
    /// Factory wired to the schedule's events and the notifications.
    pub factory: Arc<DefaultJobFactory>,
    /// Orchestrator over all of the above.
    pub orchestrator: Arc<SetupOrchestrator>,
}

impl TestLine {
    /// Create a line with default settings.
    #[must_use]
    pub fn new(planner: ScriptedPlanner) -> Self {
        Self::with_settings(planner, &SetupSettings::default())
    }

    /// Create a line with custom settings.
    #[must_use]
    pub fn with_settings(planner: ScriptedPlanner, settings: &SetupSettings) -> Self {
        let schedule = Arc::new(InMemoryJobSchedule::new());
        let planner = Arc::new(planner);
        let notifications = Arc::new(InMemoryNotifications::new());
        let factory = Arc::new(DefaultJobFactory::new(
            settings,
            schedule.events(),
            Arc::clone(&notifications) as Arc<dyn NotificationSink>,
        ));
        let orchestrator = Arc::new(SetupOrchestrator::new(
            Arc::clone(&planner) as _,
            Arc::clone(&factory) as _,
            Arc::clone(&schedule) as _,
            Arc::new(cells(&["cell-1"])),
            settings,
        ));
        Self {
            schedule,
            planner,
            notifications,
            factory,
            orchestrator,
        }
    }

    /// Create a production job on this line.
    #[must_use]
    pub fn production(&self, recipe: &Arc<ProductionRecipe>, amount: u32) -> JobRef {
        self.factory.create_production_job(Arc::clone(recipe), amount)
    }

    /// Display names of the committed jobs in order.
    #[must_use]
    pub fn committed_names(&self) -> Vec<String> {
        self.schedule
            .jobs()
            .iter()
            .map(|job| job.display_name())
            .collect()
    }
}

impl std::fmt::Debug for TestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestLine")
            .field("committed", &self.committed_names())
            .finish_non_exhaustive()
    }
}
