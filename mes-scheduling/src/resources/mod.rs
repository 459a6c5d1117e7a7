//! Resource availability as seen by the setup planner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a production cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    /// Create a cell id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a cell's availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    /// Cell id.
    pub id: CellId,
    /// Capabilities the cell currently offers.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Whether the cell accepts work.
    #[serde(default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

/// Read-only view of the resources a setup planner may plan against.
pub trait ResourceView: Send + Sync {
    /// All known cells.
    fn cells(&self) -> Vec<CellInfo>;

    /// Cells that currently accept work.
    fn available_cells(&self) -> Vec<CellInfo> {
        self.cells().into_iter().filter(|cell| cell.available).collect()
    }
}

/// Fixed set of cells.
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    cells: Vec<CellInfo>,
}

impl StaticResources {
    /// Create a view over the given cells.
    #[must_use]
    pub const fn new(cells: Vec<CellInfo>) -> Self {
        Self { cells }
    }
}

impl ResourceView for StaticResources {
    fn cells(&self) -> Vec<CellInfo> {
        self.cells.clone()
    }
}
