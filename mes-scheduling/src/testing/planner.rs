//! Scripted setup planner.

use crate::error::PlanningError;
use crate::planner::SetupPlanner;
use crate::recipe::{ProductionRecipe, RecipeId, SetupExecution, SetupRecipe};
use crate::resources::ResourceView;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type Key = (RecipeId, SetupExecution);

/// Planner answering from a script that tests can change at any time.
///
/// Unscripted lookups answer `None`. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    setups: RwLock<HashMap<Key, SetupRecipe>>,
    failures: RwLock<HashSet<Key>>,
    calls: RwLock<Vec<Key>>,
}

impl ScriptedPlanner {
    /// Create a planner without any answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups for the recipe's target and phase with `recipe`.
    #[must_use]
    pub fn with_setup(self, recipe: SetupRecipe) -> Self {
        self.set_setup(recipe);
        self
    }

    /// Fail lookups for `target` in `execution`.
    #[must_use]
    pub fn failing(self, target: RecipeId, execution: SetupExecution) -> Self {
        self.fail(target, execution);
        self
    }

    /// Replace the answer for the recipe's target and phase.
    pub fn set_setup(&self, recipe: SetupRecipe) {
        self.setups
            .write()
            .insert((recipe.target.id, recipe.execution), recipe);
    }

    /// Answer `None` for `target` in `execution` from now on.
    pub fn clear_setup(&self, target: RecipeId, execution: SetupExecution) {
        self.setups.write().remove(&(target, execution));
    }

    /// Start failing lookups for `target` in `execution`.
    pub fn fail(&self, target: RecipeId, execution: SetupExecution) {
        self.failures.write().insert((target, execution));
    }

    /// Stop failing lookups for `target` in `execution`.
    pub fn recover(&self, target: RecipeId, execution: SetupExecution) {
        self.failures.write().remove(&(target, execution));
    }

    /// Lookups made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(RecipeId, SetupExecution)> {
        self.calls.read().clone()
    }

    /// Number of lookups for `target` in `execution`.
    #[must_use]
    pub fn calls_for(&self, target: RecipeId, execution: SetupExecution) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|call| **call == (target, execution))
            .count()
    }
}

#[async_trait]
impl SetupPlanner for ScriptedPlanner {
    async fn required_setup(
        &self,
        execution: SetupExecution,
        target: &Arc<ProductionRecipe>,
        _resources: Arc<dyn ResourceView>,
    ) -> Result<Option<SetupRecipe>, PlanningError> {
        let key = (target.id, execution);
        self.calls.write().push(key);

        if self.failures.read().contains(&key) {
            return Err(PlanningError::Failed(format!(
                "scripted {execution} failure for {}",
                target.name
            )));
        }
        Ok(self.setups.read().get(&key).cloned())
    }
}
