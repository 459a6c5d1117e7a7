//! The job schedule and the batch admitted into it.
//!
//! [`JobSchedule`] is the live, ordered sequence of committed jobs. New
//! production jobs arrive as a [`NewJobBatch`]; the orchestrator inserts and
//! removes setup jobs in the batch, looking at both through a
//! [`ScheduleView`], and then commits it in one step.

mod batch;
mod memory;
mod view;

pub use batch::{BatchCursor, NewJobBatch};
pub use memory::InMemoryJobSchedule;
pub use view::ScheduleView;

use crate::error::SchedulingResult;
use crate::jobs::{JobEventStream, JobId, JobRef};

/// Ordered sequence of committed jobs with stable adjacency.
pub trait JobSchedule: Send + Sync {
    /// Look up a committed job.
    fn get(&self, id: JobId) -> Option<JobRef>;

    /// First committed job.
    fn first(&self) -> Option<JobRef>;

    /// Last committed job.
    fn last(&self) -> Option<JobRef>;

    /// Job committed right after `id`.
    fn next(&self, id: JobId) -> Option<JobRef>;

    /// Job committed right before `id`.
    fn previous(&self, id: JobId) -> Option<JobRef>;

    /// Splice the batch after its anchor (or append it) and enqueue every
    /// job. Either the whole batch is committed or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`](crate::SchedulingError::InvalidJobState)
    /// if a job of the batch already left `Initial`.
    fn commit(&self, batch: NewJobBatch) -> SchedulingResult<()>;

    /// Take the stream of state changes of every job created for this
    /// schedule. Returns `None` once taken.
    fn subscribe(&self) -> Option<JobEventStream>;

    /// Jobs after `from`, lazily. Each step re-reads the schedule.
    fn forward(&self, from: JobId) -> Box<dyn Iterator<Item = JobRef> + '_> {
        Box::new(std::iter::successors(self.next(from), move |job| {
            self.next(job.id())
        }))
    }

    /// Jobs before `from`, nearest first, lazily.
    fn backward(&self, from: JobId) -> Box<dyn Iterator<Item = JobRef> + '_> {
        Box::new(std::iter::successors(self.previous(from), move |job| {
            self.previous(job.id())
        }))
    }

    /// Snapshot of all committed jobs in order.
    fn jobs(&self) -> Vec<JobRef> {
        self.first()
            .into_iter()
            .flat_map(|first| {
                let id = first.id();
                std::iter::once(first).chain(self.forward(id))
            })
            .collect()
    }
}
