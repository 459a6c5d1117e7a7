//! Transient batch of jobs awaiting commit.
//!
//! The batch is an index-addressed arena holding a doubly linked list.
//! Removal tombstones the slot and relinks its neighbors, so a
//! [`BatchCursor`] obtained earlier stays valid for every other node while the
//! orchestrator mutates the batch during its single left-to-right pass.

use crate::jobs::{JobId, JobRef};

/// Position of a job inside a [`NewJobBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchCursor(usize);

#[derive(Debug, Clone)]
struct Node {
    job: JobRef,
    prev: Option<usize>,
    next: Option<usize>,
    removed: bool,
}

/// Ordered, mutable sequence of new jobs.
///
/// The batch is spliced into the committed schedule right after its
/// [`anchor`](Self::anchor), or appended when no anchor is set.
#[derive(Debug, Clone, Default)]
pub struct NewJobBatch {
    nodes: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    anchor: Option<JobId>,
}

impl NewJobBatch {
    /// Create an empty batch appended to the end of the schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch from jobs in order.
    #[must_use]
    pub fn from_jobs(jobs: impl IntoIterator<Item = JobRef>) -> Self {
        let mut batch = Self::new();
        for job in jobs {
            batch.push_back(job);
        }
        batch
    }

    /// Splice the batch after the committed job `anchor` instead of
    /// appending it.
    #[must_use]
    pub fn anchored_after(mut self, anchor: JobId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Committed job the batch follows, if any.
    #[must_use]
    pub const fn anchor(&self) -> Option<JobId> {
        self.anchor
    }

    /// Number of live jobs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch holds no live job.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First live position.
    #[must_use]
    pub fn first(&self) -> Option<BatchCursor> {
        self.head.map(BatchCursor)
    }

    /// Last live position.
    #[must_use]
    pub fn last(&self) -> Option<BatchCursor> {
        self.tail.map(BatchCursor)
    }

    /// Job at `at`, `None` once removed.
    #[must_use]
    pub fn get(&self, at: BatchCursor) -> Option<&JobRef> {
        self.live(at.0).map(|node| &node.job)
    }

    /// Live position following `at`.
    #[must_use]
    pub fn next(&self, at: BatchCursor) -> Option<BatchCursor> {
        self.live(at.0).and_then(|node| node.next).map(BatchCursor)
    }

    /// Live position preceding `at`.
    #[must_use]
    pub fn previous(&self, at: BatchCursor) -> Option<BatchCursor> {
        self.live(at.0).and_then(|node| node.prev).map(BatchCursor)
    }

    /// Position of a job.
    #[must_use]
    pub fn position(&self, job: JobId) -> Option<BatchCursor> {
        self.cursors().find(|at| self.get(*at).is_some_and(|j| j.id() == job))
    }

    /// Whether the batch holds `job`.
    #[must_use]
    pub fn contains(&self, job: JobId) -> bool {
        self.position(job).is_some()
    }

    /// Append a job.
    pub fn push_back(&mut self, job: JobRef) -> BatchCursor {
        let index = self.alloc(job, self.tail, None);
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        BatchCursor(index)
    }

    /// Insert `job` right before `at`. Returns `None` if `at` was removed.
    pub fn insert_before(&mut self, at: BatchCursor, job: JobRef) -> Option<BatchCursor> {
        let prev = self.live(at.0)?.prev;
        let index = self.alloc(job, prev, Some(at.0));
        self.nodes[at.0].prev = Some(index);
        match prev {
            Some(prev) => self.nodes[prev].next = Some(index),
            None => self.head = Some(index),
        }
        Some(BatchCursor(index))
    }

    /// Insert `job` right after `at`. Returns `None` if `at` was removed.
    pub fn insert_after(&mut self, at: BatchCursor, job: JobRef) -> Option<BatchCursor> {
        let next = self.live(at.0)?.next;
        let index = self.alloc(job, Some(at.0), next);
        self.nodes[at.0].next = Some(index);
        match next {
            Some(next) => self.nodes[next].prev = Some(index),
            None => self.tail = Some(index),
        }
        Some(BatchCursor(index))
    }

    /// Remove the job at `at` and return it.
    pub fn remove(&mut self, at: BatchCursor) -> Option<JobRef> {
        let (prev, next) = {
            let node = self.live(at.0)?;
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[at.0];
        node.removed = true;
        node.prev = None;
        node.next = None;
        self.len -= 1;
        Some(node.job.clone())
    }

    /// Live positions in order.
    pub fn cursors(&self) -> impl Iterator<Item = BatchCursor> + '_ {
        std::iter::successors(self.first(), move |at| self.next(*at))
    }

    /// Live jobs in order.
    pub fn iter(&self) -> impl Iterator<Item = &JobRef> + '_ {
        self.cursors().filter_map(move |at| self.get(at))
    }

    /// Consume the batch, yielding live jobs in order.
    #[must_use]
    pub fn into_jobs(self) -> Vec<JobRef> {
        self.iter().cloned().collect()
    }

    fn live(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index).filter(|node| !node.removed)
    }

    fn alloc(&mut self, job: JobRef, prev: Option<usize>, next: Option<usize>) -> usize {
        self.nodes.push(Node {
            job,
            prev,
            next,
            removed: false,
        });
        self.len += 1;
        self.nodes.len() - 1
    }
}
