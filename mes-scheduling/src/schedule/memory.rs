//! In-memory job schedule.

use super::{JobSchedule, NewJobBatch};
use crate::error::{SchedulingError, SchedulingResult};
use crate::jobs::{JobEventStream, JobEvents, JobId, JobRef, JobState};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Committed {
    jobs: Vec<JobRef>,
    index: HashMap<JobId, usize>,
}

impl Committed {
    fn reindex(&mut self) {
        self.index = self
            .jobs
            .iter()
            .enumerate()
            .map(|(position, job)| (job.id(), position))
            .collect();
    }

    fn at(&self, position: Option<usize>) -> Option<JobRef> {
        position.and_then(|position| self.jobs.get(position)).cloned()
    }
}

/// Schedule keeping committed jobs in an ordered vector.
///
/// Owns the job event channel: jobs created through a factory wired with
/// [`events`](Self::events) report their transitions on the stream returned
/// by [`subscribe`](JobSchedule::subscribe).
#[derive(Debug)]
pub struct InMemoryJobSchedule {
    committed: RwLock<Committed>,
    events: JobEvents,
    stream: Mutex<Option<JobEventStream>>,
}

impl Default for InMemoryJobSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobSchedule {
    /// Create an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        let (events, stream) = JobEvents::channel();
        Self {
            committed: RwLock::new(Committed::default()),
            events,
            stream: Mutex::new(Some(stream)),
        }
    }

    /// Sender to hand to the job factory.
    #[must_use]
    pub fn events(&self) -> JobEvents {
        self.events.clone()
    }

    /// Number of committed jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.read().jobs.len()
    }

    /// Whether nothing is committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.read().jobs.is_empty()
    }

    /// Drop completed and aborted jobs from the schedule.
    ///
    /// Returns the number of retired jobs.
    pub fn retire_finished(&self) -> usize {
        let mut committed = self.committed.write();
        let before = committed.jobs.len();
        committed.jobs.retain(|job| !job.state().is_terminal());
        committed.reindex();
        let retired = before - committed.jobs.len();
        if retired > 0 {
            debug!(retired, "Retired finished jobs");
        }
        retired
    }
}

impl JobSchedule for InMemoryJobSchedule {
    fn get(&self, id: JobId) -> Option<JobRef> {
        let committed = self.committed.read();
        committed.at(committed.index.get(&id).copied())
    }

    fn first(&self) -> Option<JobRef> {
        self.committed.read().jobs.first().cloned()
    }

    fn last(&self) -> Option<JobRef> {
        self.committed.read().jobs.last().cloned()
    }

    fn next(&self, id: JobId) -> Option<JobRef> {
        let committed = self.committed.read();
        let position = committed.index.get(&id).map(|position| position + 1);
        committed.at(position)
    }

    fn previous(&self, id: JobId) -> Option<JobRef> {
        let committed = self.committed.read();
        let position = committed
            .index
            .get(&id)
            .and_then(|position| position.checked_sub(1));
        committed.at(position)
    }

    fn commit(&self, batch: NewJobBatch) -> SchedulingResult<()> {
        if let Some(job) = batch.iter().find(|job| job.state() != JobState::Initial) {
            return Err(SchedulingError::InvalidJobState {
                job: job.id(),
                state: job.state(),
                action: "be committed",
            });
        }

        let anchor = batch.anchor();
        let jobs = batch.into_jobs();
        {
            let mut committed = self.committed.write();
            let position = match anchor {
                Some(anchor) => {
                    if let Some(position) = committed.index.get(&anchor) {
                        position + 1
                    } else {
                        warn!(%anchor, "Batch anchor is not scheduled, appending");
                        committed.jobs.len()
                    }
                }
                None => committed.jobs.len(),
            };
            committed.jobs.splice(position..position, jobs.iter().cloned());
            committed.reindex();
        }

        debug!(count = jobs.len(), "Committed job batch");
        for job in &jobs {
            job.enqueue()?;
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<JobEventStream> {
        self.stream.lock().take()
    }
}
