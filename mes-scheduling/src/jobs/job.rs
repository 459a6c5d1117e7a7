//! Core job types.

use super::{JobClassification, JobEvents, JobState};
use crate::notifications::NotificationSink;
use crate::recipe::{ProductionRecipe, RecipeId, SetupExecution, SetupRecipe};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Shared handle to a job. The schedule, the batch and the orchestrator all
/// hold the same job object.
pub type JobRef = Arc<Job>;

/// What a job executes.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// Runs a product recipe.
    Production {
        /// Recipe being produced.
        recipe: Arc<ProductionRecipe>,
        /// Number of activities (parts) to produce.
        amount: u32,
    },
    /// Runs a setup or cleanup recipe.
    Setup {
        /// Before or after production; fixed at creation.
        execution: SetupExecution,
        /// Production recipe the setup serves; fixed at creation.
        target: Arc<ProductionRecipe>,
        /// Retry limit read from configuration when the job was created.
        retry_limit: i32,
    },
}

/// Mutable part of a job, guarded by the job lock.
#[derive(Debug)]
pub(super) struct JobInner {
    pub(super) state: JobState,
    pub(super) running: u32,
    pub(super) completed: u32,
    pub(super) failed: u32,
    pub(super) retries: u32,
    pub(super) attempt_failed: bool,
    /// Working recipe of a setup job; its content may be replaced, its id
    /// never changes.
    pub(super) setup: Option<SetupRecipe>,
}

/// A schedulable unit of work.
///
/// Transitions are methods on [`JobRef`]; see the `machine` module.
pub struct Job {
    pub(super) id: JobId,
    pub(super) recipe_id: RecipeId,
    pub(super) kind: JobKind,
    pub(super) created_at: DateTime<Utc>,
    pub(super) inner: Mutex<JobInner>,
    pub(super) events: JobEvents,
    pub(super) notifications: Arc<dyn NotificationSink>,
}

impl Job {
    /// Create a production job.
    #[must_use]
    pub fn production(
        recipe: Arc<ProductionRecipe>,
        amount: u32,
        events: JobEvents,
        notifications: Arc<dyn NotificationSink>,
    ) -> JobRef {
        Arc::new(Self {
            id: JobId::new(),
            recipe_id: recipe.id,
            kind: JobKind::Production { recipe, amount },
            created_at: Utc::now(),
            inner: Mutex::new(JobInner::new(None)),
            events,
            notifications,
        })
    }

    /// Create a setup or cleanup job from a setup recipe.
    #[must_use]
    pub fn setup(
        recipe: SetupRecipe,
        retry_limit: i32,
        events: JobEvents,
        notifications: Arc<dyn NotificationSink>,
    ) -> JobRef {
        Arc::new(Self {
            id: JobId::new(),
            recipe_id: recipe.id,
            kind: JobKind::Setup {
                execution: recipe.execution,
                target: Arc::clone(&recipe.target),
                retry_limit,
            },
            created_at: Utc::now(),
            inner: Mutex::new(JobInner::new(Some(recipe))),
            events,
            notifications,
        })
    }

    /// Job id.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Id of the recipe the job was created from.
    #[must_use]
    pub const fn recipe_id(&self) -> RecipeId {
        self.recipe_id
    }

    /// Kind of the job.
    #[must_use]
    pub const fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    /// Current lifecycle classification.
    #[must_use]
    pub fn classification(&self) -> JobClassification {
        self.state().classification()
    }

    /// Whether this job runs a production recipe.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self.kind, JobKind::Production { .. })
    }

    /// Whether this job runs a setup or cleanup recipe.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(self.kind, JobKind::Setup { .. })
    }

    /// Execution phase of a setup job.
    #[must_use]
    pub const fn execution(&self) -> Option<SetupExecution> {
        match &self.kind {
            JobKind::Setup { execution, .. } => Some(*execution),
            JobKind::Production { .. } => None,
        }
    }

    /// Production recipe served by a setup job.
    #[must_use]
    pub const fn target(&self) -> Option<&Arc<ProductionRecipe>> {
        match &self.kind {
            JobKind::Setup { target, .. } => Some(target),
            JobKind::Production { .. } => None,
        }
    }

    /// Recipe of a production job.
    #[must_use]
    pub const fn production_recipe(&self) -> Option<&Arc<ProductionRecipe>> {
        match &self.kind {
            JobKind::Production { recipe, .. } => Some(recipe),
            JobKind::Setup { .. } => None,
        }
    }

    /// Whether this is a setup job of the given phase serving `recipe`.
    #[must_use]
    pub fn is_setup_for(&self, execution: SetupExecution, recipe: RecipeId) -> bool {
        matches!(
            &self.kind,
            JobKind::Setup { execution: e, target, .. } if *e == execution && target.id == recipe
        )
    }

    /// Whether this is a setup job (either phase) serving `recipe`.
    #[must_use]
    pub fn targets(&self, recipe: RecipeId) -> bool {
        self.target().is_some_and(|target| target.id == recipe)
    }

    /// Whether the job is negotiating a replacement recipe. Check this
    /// before calling `update_setup`.
    #[must_use]
    pub fn recipe_required(&self) -> bool {
        self.state() == JobState::RequestRecipe
    }

    /// Failed setup attempts since the last acknowledgment.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.inner.lock().retries
    }

    /// Activities currently running.
    #[must_use]
    pub fn running_count(&self) -> u32 {
        self.inner.lock().running
    }

    /// Activities completed successfully in the current attempt.
    #[must_use]
    pub fn completed_count(&self) -> u32 {
        self.inner.lock().completed
    }

    /// Working recipe of a setup job.
    #[must_use]
    pub fn setup_recipe(&self) -> Option<SetupRecipe> {
        self.inner.lock().setup.clone()
    }

    /// Display name: the recipe name, prefixed for setup jobs.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.kind {
            JobKind::Production { recipe, .. } => recipe.name.clone(),
            JobKind::Setup {
                execution, target, ..
            } => format!("{execution} {}", target.name),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("recipe_id", &self.recipe_id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl JobInner {
    const fn new(setup: Option<SetupRecipe>) -> Self {
        Self {
            state: JobState::Initial,
            running: 0,
            completed: 0,
            failed: 0,
            retries: 0,
            attempt_failed: false,
            setup,
        }
    }
}
