//! Union of the committed schedule and the batch being admitted.

use super::{BatchCursor, JobSchedule, NewJobBatch};
use crate::jobs::JobRef;

/// Read-only view over the schedule as it will look once the batch is
/// committed.
///
/// The batch head is preceded by its anchor, or by the last committed job
/// when the batch is appended. After the batch tail come the committed jobs
/// following the anchor.
#[derive(Clone, Copy)]
pub struct ScheduleView<'a> {
    schedule: &'a dyn JobSchedule,
    batch: &'a NewJobBatch,
}

impl<'a> ScheduleView<'a> {
    /// Create a view.
    #[must_use]
    pub const fn new(schedule: &'a dyn JobSchedule, batch: &'a NewJobBatch) -> Self {
        Self { schedule, batch }
    }

    /// Job at a batch position.
    #[must_use]
    pub fn job(&self, at: BatchCursor) -> Option<&'a JobRef> {
        self.batch.get(at)
    }

    /// Job immediately preceding `at`.
    #[must_use]
    pub fn previous(&self, at: BatchCursor) -> Option<JobRef> {
        match self.batch.previous(at) {
            Some(prev) => self.batch.get(prev).cloned(),
            None => match self.batch.anchor() {
                Some(anchor) => self.schedule.get(anchor),
                None => self.schedule.last(),
            },
        }
    }

    /// Job immediately following `at`.
    #[must_use]
    pub fn next(&self, at: BatchCursor) -> Option<JobRef> {
        self.forward(at).next()
    }

    /// Jobs following `at`, lazily.
    pub fn forward(&self, at: BatchCursor) -> impl Iterator<Item = JobRef> + 'a {
        let batch = self.batch;
        let schedule = self.schedule;
        let in_batch = std::iter::successors(batch.next(at), move |at| batch.next(*at))
            .filter_map(move |at| batch.get(at).cloned());
        let committed = batch
            .anchor()
            .into_iter()
            .flat_map(move |anchor| schedule.forward(anchor));
        in_batch.chain(committed)
    }
}

impl std::fmt::Debug for ScheduleView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleView")
            .field("batch", &self.batch.len())
            .field("anchor", &self.batch.anchor())
            .finish_non_exhaustive()
    }
}
