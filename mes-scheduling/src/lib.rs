//! mes-scheduling: setup and cleanup orchestration for manufacturing job schedules
//!
//! Production jobs are admitted to a schedule in batches. Before a batch is
//! committed, the [`SetupOrchestrator`](orchestrator::SetupOrchestrator) walks
//! it and inserts the setup jobs that prepare equipment for a new production
//! recipe and the cleanup jobs that follow the last job of a recipe run. Setup
//! recipes come from a pluggable [`SetupPlanner`](planner::SetupPlanner).
//!
//! Every job runs through the state machine in [`jobs`]. Setup jobs whose
//! recipe fails to run too often block and raise a notification for the
//! operator.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mes_scheduling::prelude::*;
//! use acton_reactive::prelude::ActonApp;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SchedulingConfig::load_for_service("mes-scheduling")?;
//!     mes_scheduling::observability::init(&config.logging)?;
//!
//!     let schedule = Arc::new(InMemoryJobSchedule::new());
//!     let factory = Arc::new(DefaultJobFactory::new(
//!         &config.setup,
//!         schedule.events(),
//!         Arc::new(DiscardNotifications),
//!     ));
//!     let orchestrator = Arc::new(SetupOrchestrator::new(
//!         Arc::new(SetupTablePlanner::default()),
//!         Arc::clone(&factory) as _,
//!         Arc::clone(&schedule) as _,
//!         Arc::new(StaticResources::default()),
//!         &config.setup,
//!     ));
//!
//!     let mut runtime = ActonApp::launch();
//!     let agent = SchedulingAgent::spawn(&mut runtime, orchestrator).await?;
//!
//!     let gear = ProductionRecipe::new(1, "Gear");
//!     let batch = NewJobBatch::from_jobs([factory.create_production_job(gear, 10)]);
//!     let (request, rx) = AdmitJobs::new(batch);
//!     agent.send(request).await;
//!     rx.await??;
//!
//!     runtime.shutdown_all().await?;
//!     Ok(())
//! }
//! ```

// Lint configuration is handled at the workspace level in Cargo.toml

pub mod agent;
pub mod config;
pub mod error;
pub mod jobs;
pub mod notifications;
pub mod observability;
pub mod orchestrator;
pub mod planner;
pub mod recipe;
pub mod resources;
pub mod schedule;

// Test doubles, also used by the integration tests and the simulator
pub mod testing;

pub use error::{PlanningError, SchedulingError, SchedulingResult};

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use mes_scheduling::prelude::*;
    //! ```

    // Agent
    pub use crate::agent::{AdmitJobs, GetMetricsRequest, SchedulingAgent, SchedulingMetrics};

    // Configuration
    pub use crate::config::{SchedulingConfig, SetupSettings};

    // Error types
    pub use crate::error::{PlanningError, SchedulingError, SchedulingResult};

    // Jobs
    pub use crate::jobs::{
        ActivityOutcome, DefaultJobFactory, Job, JobClassification, JobEvent, JobFactory, JobId,
        JobRef, JobState, JobStateChanged,
    };

    // Notifications
    pub use crate::notifications::{
        DiscardNotifications, InMemoryNotifications, NotificationSink, SetupNotification,
    };

    // Orchestration
    pub use crate::orchestrator::{BatchOutcome, SetupOrchestrator};
    pub use crate::planner::{SetupPlanner, SetupTablePlanner};
    pub use crate::schedule::{InMemoryJobSchedule, JobSchedule, NewJobBatch};

    // Recipes and resources
    pub use crate::recipe::{ProductionRecipe, RecipeId, SetupExecution, SetupRecipe, SetupStep};
    pub use crate::resources::{CellId, CellInfo, ResourceView, StaticResources};
}
