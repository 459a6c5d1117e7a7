//! Scenario simulation for mes-scheduling
//!
//! Loads a scenario file describing recipes, cells, a setup table and
//! batches of production jobs, admits the batches through a scheduling
//! agent and reports the resulting schedule.

pub mod scenario;
pub mod simulation;

pub use scenario::Scenario;
pub use simulation::{simulate, ScheduledJob, SimulationOptions, SimulationReport};
