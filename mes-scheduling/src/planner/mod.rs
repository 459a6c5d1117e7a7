//! Setup planner integration.
//!
//! The planner decides which setup or cleanup recipe a production recipe
//! needs. It is pluggable and may fail; the orchestrator treats every failure
//! the same way and never looks at its cause.

mod table;

pub use table::{SetupTableEntry, SetupTablePlanner};

use crate::error::PlanningError;
use crate::recipe::{ProductionRecipe, SetupExecution, SetupRecipe};
use crate::resources::ResourceView;
use async_trait::async_trait;
use std::sync::Arc;

/// Determines the setup required around a production recipe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SetupPlanner: Send + Sync {
    /// Setup recipe to run `execution` of `target`, or `None` if nothing has
    /// to be done.
    ///
    /// # Errors
    ///
    /// Any [`PlanningError`]; the orchestrator contains it by interrupting
    /// the jobs that depend on the answer.
    async fn required_setup(
        &self,
        execution: SetupExecution,
        target: &Arc<ProductionRecipe>,
        resources: Arc<dyn ResourceView>,
    ) -> Result<Option<SetupRecipe>, PlanningError>;
}
