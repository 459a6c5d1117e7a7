//! Job event channel.
//!
//! Jobs publish every transition on an unbounded channel while holding their
//! own lock, so events of one job are delivered in the order they happened.
//! Events of different jobs may interleave.

use super::{JobId, JobRef, JobState};
use tokio::sync::mpsc;

/// A job moved from one state to another.
#[derive(Debug, Clone)]
pub struct JobStateChanged {
    /// The job that changed.
    pub job: JobRef,
    /// State before the transition.
    pub previous: JobState,
    /// State after the transition.
    pub current: JobState,
}

/// Event emitted by a job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// State transition.
    StateChanged(JobStateChanged),
    /// Activity counters changed while activities are running.
    ProgressChanged {
        /// The job.
        job: JobId,
        /// Activities currently running.
        running: u32,
        /// Activities completed successfully.
        completed: u32,
    },
}

/// Receiving side of the job event channel.
pub type JobEventStream = mpsc::UnboundedReceiver<JobEvent>;

/// Sending side of the job event channel, cloned into every job.
#[derive(Debug, Clone, Default)]
pub struct JobEvents {
    tx: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl JobEvents {
    /// Create a connected sender and its stream.
    #[must_use]
    pub fn channel() -> (Self, JobEventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sender that drops every event.
    #[must_use]
    pub const fn detached() -> Self {
        Self { tx: None }
    }

    pub(crate) fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            // A closed stream means nobody listens anymore
            let _ = tx.send(event);
        }
    }
}
