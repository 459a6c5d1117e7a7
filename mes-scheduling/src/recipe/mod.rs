//! Recipe definitions consumed by the scheduler.
//!
//! Recipes are owned by an external store; the scheduler only reads them.
//! A setup recipe names the production recipe it serves through its
//! [`SetupRecipe::target`].

use crate::resources::CellId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(u64);

impl RecipeId {
    /// Id carried by the catch-all temporary cleanup recipe.
    pub const TEMPORARY: Self = Self(0);

    /// Create a recipe id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the id of the temporary cleanup recipe.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        self.0 == Self::TEMPORARY.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecipeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Recipe of a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecipe {
    /// Recipe id.
    pub id: RecipeId,
    /// Display name.
    pub name: String,
}

impl ProductionRecipe {
    /// Create a shared production recipe.
    #[must_use]
    pub fn new(id: impl Into<RecipeId>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            name: name.into(),
        })
    }
}

/// When a setup recipe runs relative to the production it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupExecution {
    /// Prepare equipment before the first job of a run.
    BeforeProduction,
    /// Clean up equipment after the last job of a run.
    AfterProduction,
}

impl SetupExecution {
    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeProduction => "setup",
            Self::AfterProduction => "cleanup",
        }
    }
}

impl fmt::Display for SetupExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cells a setup step may run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellFilter {
    /// Every cell qualifies.
    Any,
    /// Only the listed cells qualify.
    Cells(Vec<CellId>),
}

impl CellFilter {
    /// Check whether `cell` qualifies.
    #[must_use]
    pub fn matches(&self, cell: &CellId) -> bool {
        match self {
            Self::Any => true,
            Self::Cells(cells) => cells.contains(cell),
        }
    }
}

/// One activity of a setup recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStep {
    /// Step name.
    pub name: String,
    /// Cells the step can be dispatched to.
    pub cells: CellFilter,
}

impl SetupStep {
    /// Create a step.
    #[must_use]
    pub fn new(name: impl Into<String>, cells: CellFilter) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

/// Recipe preparing or cleaning up equipment for a production recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRecipe {
    /// Recipe id.
    pub id: RecipeId,
    /// Display name.
    pub name: String,
    /// Before or after production.
    pub execution: SetupExecution,
    /// Production recipe served by this setup.
    pub target: Arc<ProductionRecipe>,
    /// Activities to run; one job activity per step.
    pub steps: Vec<SetupStep>,
}

impl SetupRecipe {
    /// Create a setup recipe.
    #[must_use]
    pub fn new(
        id: impl Into<RecipeId>,
        name: impl Into<String>,
        execution: SetupExecution,
        target: Arc<ProductionRecipe>,
        steps: Vec<SetupStep>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            execution,
            target,
            steps,
        }
    }

    /// Minimal cleanup recipe used when the planner has no cleanup for a
    /// run. Its single step accepts every cell; the real cleanup is fetched
    /// when the job starts.
    #[must_use]
    pub fn temporary_cleanup(target: Arc<ProductionRecipe>) -> Self {
        Self {
            id: RecipeId::TEMPORARY,
            name: format!("Cleanup {}", target.name),
            execution: SetupExecution::AfterProduction,
            target,
            steps: vec![SetupStep::new("temporary cleanup", CellFilter::Any)],
        }
    }

    /// Number of activities the recipe produces.
    #[must_use]
    pub fn activity_count(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    /// Whether the recipe has nothing left to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
