//! Error types for job transitions and setup planning.

use crate::jobs::{JobId, JobState};
use std::time::Duration;
use thiserror::Error;

/// Result type for scheduling operations.
pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Errors raised by job transitions, the agent front end and config loading.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// A transition was requested from a state that does not define it.
    ///
    /// This is an integration error in the calling code, never a runtime
    /// condition the orchestrator recovers from.
    #[error("job {job} cannot {action} while {state}")]
    InvalidJobState {
        /// Job the transition was requested on.
        job: JobId,
        /// State the job was in.
        state: JobState,
        /// Name of the rejected transition.
        action: &'static str,
    },

    /// The scheduling agent did not answer.
    #[error("scheduling agent not available")]
    AgentUnavailable,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure reported while asking the setup planner for a recipe.
///
/// The orchestrator never inspects the cause; any variant is handled as
/// "setup determination failed".
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The planner reported a failure.
    #[error("setup planner failed: {0}")]
    Failed(String),

    /// The planner did not answer within the configured budget.
    #[error("setup planner timed out after {0:?}")]
    Timeout(Duration),
}

impl From<String> for PlanningError {
    fn from(s: String) -> Self {
        Self::Failed(s)
    }
}

impl From<&str> for PlanningError {
    fn from(s: &str) -> Self {
        Self::Failed(s.to_string())
    }
}

impl From<anyhow::Error> for PlanningError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

impl From<figment::Error> for SchedulingError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SchedulingError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let job = JobId::new();
        let err = SchedulingError::InvalidJobState {
            job,
            state: JobState::Waiting,
            action: "update setup",
        };
        assert_eq!(
            err.to_string(),
            format!("job {job} cannot update setup while waiting")
        );
    }

    #[test]
    fn test_planning_error_conversions() {
        let err: PlanningError = "no cell available".into();
        assert!(matches!(err, PlanningError::Failed(ref msg) if msg == "no cell available"));

        let err: PlanningError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "setup planner failed: boom");

        let err = PlanningError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "setup planner timed out after 250ms");
    }
}
