//! Production and setup jobs.
//!
//! A [`Job`] is shared as a [`JobRef`] between the committed schedule, the
//! batch being admitted and the orchestrator. All mutable state sits behind a
//! per-job lock and every transition is published on the job event channel.
//!
//! Setup jobs carry a retry counter. A failed attempt sends the job back to
//! request a recipe; once the failures exceed the configured limit the job
//! blocks and raises a notification that an operator has to acknowledge.

mod events;
mod factory;
mod job;
mod machine;
mod state;

pub use events::{JobEvent, JobEventStream, JobEvents, JobStateChanged};
pub use factory::{DefaultJobFactory, JobFactory};
pub use job::{Job, JobId, JobKind, JobRef};
pub use machine::ActivityOutcome;
pub use state::{JobClassification, JobState};

#[cfg(test)]
pub use factory::MockJobFactory;
