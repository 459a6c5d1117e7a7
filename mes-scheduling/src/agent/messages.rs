//! Messages for the scheduling agent.

use super::request_reply::{create_request_reply, ResponseChannel};
use crate::error::SchedulingResult;
use crate::jobs::JobStateChanged;
use crate::orchestrator::BatchOutcome;
use crate::schedule::NewJobBatch;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Admit a batch of new jobs: insert setups and cleanups, then commit.
#[derive(Clone, Debug)]
pub struct AdmitJobs {
    /// Jobs to admit.
    pub batch: NewJobBatch,
    /// Optional channel receiving the outcome.
    pub response_tx: Option<ResponseChannel<SchedulingResult<BatchOutcome>>>,
}

impl AdmitJobs {
    /// Create a request together with the receiver of its outcome.
    #[must_use]
    pub fn new(batch: NewJobBatch) -> (Self, oneshot::Receiver<SchedulingResult<BatchOutcome>>) {
        let (response_tx, rx) = create_request_reply();
        let request = Self {
            batch,
            response_tx: Some(response_tx),
        };
        (request, rx)
    }

    /// Create a fire-and-forget admission.
    #[must_use]
    pub const fn without_reply(batch: NewJobBatch) -> Self {
        Self {
            batch,
            response_tx: None,
        }
    }
}

/// A job changed state; forwarded from the schedule's event stream.
#[derive(Clone, Debug)]
pub struct ObserveStateChange {
    /// The transition.
    pub change: JobStateChanged,
}

/// Request the agent's counters.
#[derive(Clone, Debug)]
pub struct GetMetricsRequest {
    /// Channel receiving the counters.
    pub response_tx: ResponseChannel<SchedulingMetrics>,
}

impl GetMetricsRequest {
    /// Create a request together with its receiver.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<SchedulingMetrics>) {
        let (response_tx, rx) = create_request_reply();
        (Self { response_tx }, rx)
    }
}

/// Counters kept by the scheduling agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingMetrics {
    /// Batches committed.
    pub batches_admitted: u64,
    /// Batches whose commit failed.
    pub batches_rejected: u64,
    /// Setup jobs inserted.
    pub setups_inserted: u64,
    /// Cleanup jobs inserted.
    pub cleanups_inserted: u64,
    /// Jobs interrupted by planning failures.
    pub jobs_interrupted: u64,
    /// State changes processed.
    pub state_changes_observed: u64,
    /// State change reactions that were rejected by the job.
    pub reactions_failed: u64,
}

impl SchedulingMetrics {
    pub(super) fn record_outcome(&mut self, outcome: &BatchOutcome) {
        self.batches_admitted += 1;
        self.setups_inserted += outcome.setups.len() as u64;
        self.cleanups_inserted += outcome.cleanups.len() as u64;
        self.jobs_interrupted += outcome.interrupted.len() as u64;
    }
}
