//! Declarative planner backed by a lookup table.

use super::SetupPlanner;
use crate::error::PlanningError;
use crate::recipe::{CellFilter, ProductionRecipe, RecipeId, SetupExecution, SetupRecipe, SetupStep};
use crate::resources::ResourceView;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One row of a [`SetupTablePlanner`].
///
/// ```toml
/// [[setups]]
/// target = 1
/// execution = "before_production"
/// id = 101
/// name = "Mount gear fixture"
/// steps = [{ name = "mount", cells = "any" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupTableEntry {
    /// Production recipe served.
    pub target: RecipeId,
    /// Before or after production.
    pub execution: SetupExecution,
    /// Id of the setup recipe.
    pub id: RecipeId,
    /// Name of the setup recipe.
    pub name: String,
    /// Steps to run.
    #[serde(default)]
    pub steps: Vec<SetupStep>,
    /// Fail every lookup of this row with the given reason.
    #[serde(default)]
    pub failure: Option<String>,
}

/// Planner answering from a fixed table.
///
/// Rows are matched on target recipe and execution phase; a missing row means
/// no setup is required. Steps restricted to cells that are all unavailable
/// make the lookup fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupTablePlanner {
    #[serde(default)]
    setups: Vec<SetupTableEntry>,
}

impl SetupTablePlanner {
    /// Create a planner from table rows.
    #[must_use]
    pub const fn new(setups: Vec<SetupTableEntry>) -> Self {
        Self { setups }
    }

    /// Table rows.
    #[must_use]
    pub fn entries(&self) -> &[SetupTableEntry] {
        &self.setups
    }

    fn lookup(&self, execution: SetupExecution, target: RecipeId) -> Option<&SetupTableEntry> {
        self.setups
            .iter()
            .find(|entry| entry.execution == execution && entry.target == target)
    }
}

#[async_trait]
impl SetupPlanner for SetupTablePlanner {
    async fn required_setup(
        &self,
        execution: SetupExecution,
        target: &Arc<ProductionRecipe>,
        resources: Arc<dyn ResourceView>,
    ) -> Result<Option<SetupRecipe>, PlanningError> {
        let Some(entry) = self.lookup(execution, target.id) else {
            debug!(%execution, target = %target.id, "No setup in table");
            return Ok(None);
        };

        if let Some(reason) = &entry.failure {
            return Err(PlanningError::Failed(reason.clone()));
        }

        let available = resources.available_cells();
        for step in &entry.steps {
            if let CellFilter::Cells(cells) = &step.cells {
                let reachable = available.iter().any(|cell| cells.contains(&cell.id));
                if !reachable {
                    return Err(PlanningError::Failed(format!(
                        "no available cell for step '{}' of {}",
                        step.name, entry.name
                    )));
                }
            }
        }

        Ok(Some(SetupRecipe::new(
            entry.id,
            entry.name.clone(),
            execution,
            Arc::clone(target),
            entry.steps.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{CellId, CellInfo, StaticResources};

    fn entry(execution: SetupExecution, cells: CellFilter) -> SetupTableEntry {
        SetupTableEntry {
            target: RecipeId::new(1),
            execution,
            id: RecipeId::new(10),
            name: "Fixture".to_string(),
            steps: vec![SetupStep::new("mount", cells)],
            failure: None,
        }
    }

    fn cells(available: bool) -> StaticResources {
        StaticResources::new(vec![CellInfo {
            id: CellId::new("press"),
            capabilities: Vec::new(),
            available,
        }])
    }

    #[tokio::test]
    async fn test_lookup_by_target_and_execution() {
        let planner = SetupTablePlanner::new(vec![entry(
            SetupExecution::BeforeProduction,
            CellFilter::Any,
        )]);
        let target = ProductionRecipe::new(1, "Gear");

        let setup = planner
            .required_setup(SetupExecution::BeforeProduction, &target, Arc::new(cells(true)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(setup.id, RecipeId::new(10));
        assert_eq!(setup.target.id, target.id);

        let cleanup = planner
            .required_setup(SetupExecution::AfterProduction, &target, Arc::new(cells(true)))
            .await
            .unwrap();
        assert!(cleanup.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_cells_fail() {
        let planner = SetupTablePlanner::new(vec![entry(
            SetupExecution::BeforeProduction,
            CellFilter::Cells(vec![CellId::new("press")]),
        )]);
        let target = ProductionRecipe::new(1, "Gear");

        let result = planner
            .required_setup(SetupExecution::BeforeProduction, &target, Arc::new(cells(false)))
            .await;
        assert!(matches!(result, Err(PlanningError::Failed(_))));
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let mut row = entry(SetupExecution::AfterProduction, CellFilter::Any);
        row.failure = Some("cleanup service down".to_string());
        let planner = SetupTablePlanner::new(vec![row]);

        let err = planner
            .required_setup(
                SetupExecution::AfterProduction,
                &ProductionRecipe::new(1, "Gear"),
                Arc::new(cells(true)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "setup planner failed: cleanup service down");
    }

    #[test]
    fn test_table_from_toml() {
        let planner: SetupTablePlanner = toml::from_str(
            r#"
            [[setups]]
            target = 1
            execution = "before_production"
            id = 101
            name = "Mount gear fixture"
            steps = [{ name = "mount", cells = "any" }]
            "#,
        )
        .unwrap();
        assert_eq!(planner.entries().len(), 1);
        assert_eq!(planner.entries()[0].steps[0].cells, CellFilter::Any);
    }
}
