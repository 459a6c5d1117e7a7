//! Scenario files describing a production line and the batches it receives.
//!
//! ```toml
//! [setup]
//! retry_limit = 2
//!
//! [[recipes]]
//! id = 1
//! name = "Gear"
//!
//! [[cells]]
//! id = "press-1"
//!
//! [[setups]]
//! target = 1
//! execution = "before_production"
//! id = 101
//! name = "Mount gear fixture"
//! steps = [{ name = "mount", cells = "any" }]
//!
//! [[batches]]
//! jobs = [{ recipe = 1, amount = 10 }]
//!
//! [[batches]]
//! after = 1
//! jobs = [{ recipe = 1, amount = 5 }]
//! ```

use anyhow::{bail, Context, Result};
use mes_scheduling::config::SetupSettings;
use mes_scheduling::planner::SetupTableEntry;
use mes_scheduling::recipe::{ProductionRecipe, RecipeId};
use mes_scheduling::resources::CellInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A production recipe known to the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    /// Recipe id.
    pub id: RecipeId,
    /// Display name.
    pub name: String,
}

/// A production job to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDef {
    /// Recipe id of the job.
    pub recipe: RecipeId,
    /// Units to produce.
    pub amount: u32,
}

/// Jobs admitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDef {
    /// Insert after the committed job at this position (0-based) instead of
    /// appending.
    #[serde(default)]
    pub after: Option<usize>,
    /// Jobs in order.
    pub jobs: Vec<JobDef>,
}

/// A complete scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Overrides the configured setup settings.
    #[serde(default)]
    pub setup: Option<SetupSettings>,
    /// Production recipes.
    #[serde(default)]
    pub recipes: Vec<RecipeDef>,
    /// Cells of the line.
    #[serde(default)]
    pub cells: Vec<CellInfo>,
    /// Setup table consulted by the planner.
    #[serde(default)]
    pub setups: Vec<SetupTableEntry>,
    /// Batches admitted in order.
    #[serde(default)]
    pub batches: Vec<BatchDef>,
}

impl Scenario {
    /// Read and validate a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// refers to recipes it does not define.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check that every referenced recipe is defined.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unknown recipe.
    pub fn validate(&self) -> Result<()> {
        let recipes = self.recipes();
        for (index, batch) in self.batches.iter().enumerate() {
            if batch.jobs.is_empty() {
                bail!("Batch {index} has no jobs");
            }
            if let Some(job) = batch.jobs.iter().find(|job| !recipes.contains_key(&job.recipe)) {
                bail!("Batch {index} uses unknown recipe {}", job.recipe);
            }
        }
        if let Some(entry) = self.setups.iter().find(|entry| !recipes.contains_key(&entry.target)) {
            bail!("Setup {} targets unknown recipe {}", entry.name, entry.target);
        }
        Ok(())
    }

    /// Production recipes by id.
    #[must_use]
    pub fn recipes(&self) -> HashMap<RecipeId, Arc<ProductionRecipe>> {
        self.recipes
            .iter()
            .map(|recipe| (recipe.id, ProductionRecipe::new(recipe.id, recipe.name.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
[setup]
retry_limit = 1

[[recipes]]
id = 1
name = "Gear"

[[cells]]
id = "press-1"
available = false

[[setups]]
target = 1
execution = "after_production"
id = 201
name = "Clean press"
steps = [{ name = "wipe", cells = { cells = ["press-1"] } }]

[[batches]]
jobs = [{ recipe = 1, amount = 3 }]
"#;

    #[test]
    fn test_load_scenario() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();

        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.setup.as_ref().map(|s| s.retry_limit), Some(1));
        assert_eq!(scenario.cells.len(), 1);
        assert!(!scenario.cells[0].available);
        assert_eq!(scenario.setups.len(), 1);
        assert_eq!(scenario.batches[0].jobs[0].amount, 3);
        assert!(scenario.batches[0].after.is_none());
    }

    #[test]
    fn test_unknown_recipe_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[batches]]\njobs = [{ recipe = 9, amount = 1 }]\n")
            .unwrap();

        let err = Scenario::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("unknown recipe 9"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = Scenario::load("/nonexistent/scenario.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read scenario"));
    }
}
