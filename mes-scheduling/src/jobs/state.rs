//! Job states and their lifecycle classification.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// State of a job's state machine.
///
/// ```text
/// Initial → Waiting → Running ──────────────────────────────→ Completed
///                  ╰→ RequestRecipe ⇄ Running                  (setup only)
///                     Running → RetrySetupBlocked → RequestRecipe
///           any non-terminal → {Interrupting | Aborting} → Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not yet committed to the schedule.
    Initial,
    /// Committed, waiting to be started.
    Waiting,
    /// Activities are being dispatched.
    Running,
    /// Interrupted; waiting for running activities to finish.
    Interrupting,
    /// Setup job waiting for an up-to-date recipe.
    RequestRecipe,
    /// Setup job exhausted its retries and waits for acknowledgment.
    RetrySetupBlocked,
    /// Aborted; waiting for running activities to finish.
    Aborting,
    /// Finished all work.
    Completed,
    /// Finished without completing its work.
    Aborted,
}

impl JobState {
    /// Lifecycle classification of this state.
    #[must_use]
    pub const fn classification(self) -> JobClassification {
        match self {
            Self::Initial => JobClassification::Idle,
            Self::Waiting => JobClassification::Waiting,
            Self::Running => JobClassification::Running,
            Self::Interrupting => JobClassification::Interrupting,
            Self::RequestRecipe => JobClassification::RequestingRecipe,
            Self::RetrySetupBlocked => JobClassification::RetryBlocked,
            Self::Aborting => JobClassification::Completing,
            Self::Completed => JobClassification::Completed,
            Self::Aborted => JobClassification::Aborted,
        }
    }

    /// Check if the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Get a human-readable state name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Interrupting => "interrupting",
            Self::RequestRecipe => "requesting recipe",
            Self::RetrySetupBlocked => "blocked on retries",
            Self::Aborting => "aborting",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered lifecycle phase of a job.
///
/// `Idle < Waiting < Running < {Interrupting, RequestingRecipe, RetryBlocked}
/// < Completing < Completed < Aborted`. The three phases between `Running`
/// and `Completing` share a rank and are incomparable with each other, hence
/// only [`PartialOrd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClassification {
    /// Not yet scheduled.
    Idle,
    /// Scheduled, not started.
    Waiting,
    /// Executing.
    Running,
    /// Winding down after an interrupt.
    Interrupting,
    /// Setup negotiating a replacement recipe.
    RequestingRecipe,
    /// Setup blocked until acknowledged.
    RetryBlocked,
    /// Finishing.
    Completing,
    /// Done.
    Completed,
    /// Done without completing its work.
    Aborted,
}

impl JobClassification {
    const fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Waiting => 1,
            Self::Running => 2,
            Self::Interrupting | Self::RequestingRecipe | Self::RetryBlocked => 3,
            Self::Completing => 4,
            Self::Completed => 5,
            Self::Aborted => 6,
        }
    }

    /// Not started yet (`Idle` or `Waiting`).
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.rank() <= Self::Waiting.rank()
    }

    /// `Completed` or `Aborted`.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        self.rank() >= Self::Completed.rank()
    }
}

impl PartialOrd for JobClassification {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => None,
            ordering => Some(ordering),
        }
    }
}
