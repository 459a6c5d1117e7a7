//! Job state machine.
//!
//! Every transition takes the job lock, validates the current state and emits
//! a [`JobEvent::StateChanged`] before releasing the lock. Notifications are
//! published after the lock is released so a sink may call back into the job.

use super::job::JobInner;
use super::{Job, JobEvent, JobKind, JobState, JobStateChanged};
use crate::error::{SchedulingError, SchedulingResult};
use crate::notifications::SetupNotification;
use crate::recipe::SetupRecipe;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Result of a dispatched activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The activity did its work.
    Succeeded,
    /// The activity failed.
    Failed,
}

impl Job {
    /// Commit the job: `Initial → Waiting`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless the job is `Initial`.
    pub fn enqueue(self: &Arc<Self>) -> SchedulingResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            JobState::Initial => {
                self.set_state(&mut inner, JobState::Waiting);
                Ok(())
            }
            state => Err(self.invalid(state, "enqueue")),
        }
    }

    /// Start the job.
    ///
    /// Production jobs begin running. Setup jobs first request an up-to-date
    /// recipe, since what has to be prepared or cleaned may have changed since
    /// the job was planned.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless the job is `Waiting`.
    pub fn start(self: &Arc<Self>) -> SchedulingResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != JobState::Waiting {
            return Err(self.invalid(inner.state, "start"));
        }
        let next = if self.is_setup() {
            JobState::RequestRecipe
        } else {
            JobState::Running
        };
        self.set_state(&mut inner, next);
        Ok(())
    }

    /// Record a dispatched activity.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless the job is `Running`.
    pub fn activity_started(self: &Arc<Self>) -> SchedulingResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != JobState::Running {
            return Err(self.invalid(inner.state, "start an activity"));
        }
        inner.running += 1;
        self.emit_progress(&inner);
        Ok(())
    }

    /// Record a finished activity.
    ///
    /// Once no activity is running a job either completes, waits for more
    /// activities, or (setup jobs with a failed attempt) goes back to
    /// requesting a recipe. Interrupted and aborted jobs finish as `Aborted`
    /// when their last activity returns.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] if no activity of this job
    /// is running.
    pub fn activity_completed(self: &Arc<Self>, outcome: ActivityOutcome) -> SchedulingResult<()> {
        let notification = {
            let mut inner = self.inner.lock();
            let draining = matches!(
                inner.state,
                JobState::Running | JobState::Interrupting | JobState::Aborting
            );
            if !draining || inner.running == 0 {
                return Err(self.invalid(inner.state, "complete an activity"));
            }

            inner.running -= 1;
            match outcome {
                ActivityOutcome::Succeeded => inner.completed += 1,
                ActivityOutcome::Failed => {
                    inner.failed += 1;
                    inner.attempt_failed = true;
                }
            }

            if inner.running > 0 {
                if inner.state == JobState::Running {
                    self.emit_progress(&inner);
                }
                None
            } else if inner.state == JobState::Running {
                self.settle(&mut inner)
            } else {
                self.set_state(&mut inner, JobState::Aborted);
                None
            }
        };

        if let Some(notification) = notification {
            self.notifications.publish(self.id, notification);
        }
        Ok(())
    }

    /// Interrupt the job and let running activities finish.
    ///
    /// Idempotent: interrupting a job that is already winding down or finished
    /// does nothing.
    pub fn interrupt(self: &Arc<Self>) {
        self.stop(JobState::Interrupting);
    }

    /// Abort the job.
    ///
    /// Idempotent: aborting a job that is already winding down or finished
    /// does nothing.
    pub fn abort(self: &Arc<Self>) {
        self.stop(JobState::Aborting);
    }

    /// Replace the working recipe of a setup job and resume it.
    ///
    /// `None` or an empty recipe means nothing has to be done anymore and the
    /// job completes. The job keeps its recipe id and target; only the steps
    /// are taken from `recipe`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless
    /// [`recipe_required`](Job::recipe_required) is true.
    pub fn update_setup(self: &Arc<Self>, recipe: Option<SetupRecipe>) -> SchedulingResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != JobState::RequestRecipe {
            return Err(self.invalid(inner.state, "update setup"));
        }
        let JobKind::Setup {
            execution, target, ..
        } = &self.kind
        else {
            return Err(self.invalid(inner.state, "update setup"));
        };

        match recipe.filter(|recipe| !recipe.is_empty()) {
            None => {
                debug!(job = %self.id, "No setup required anymore");
                self.set_state(&mut inner, JobState::Completed);
            }
            Some(recipe) => {
                inner.setup = Some(SetupRecipe {
                    id: self.recipe_id,
                    execution: *execution,
                    target: Arc::clone(target),
                    ..recipe
                });
                inner.running = 0;
                inner.completed = 0;
                inner.failed = 0;
                inner.attempt_failed = false;
                self.set_state(&mut inner, JobState::Running);
            }
        }
        Ok(())
    }

    /// Leave `RetrySetupBlocked`: reset the retry counter and request a
    /// recipe again.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless the job is
    /// `RetrySetupBlocked`.
    pub fn unblock_retry_setup(self: &Arc<Self>) -> SchedulingResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != JobState::RetrySetupBlocked {
            return Err(self.invalid(inner.state, "unblock retries"));
        }
        inner.retries = 0;
        self.set_state(&mut inner, JobState::RequestRecipe);
        Ok(())
    }

    /// Operator acknowledged the retry notification: clear every outstanding
    /// notification of this job, then unblock it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless the job is
    /// `RetrySetupBlocked`.
    pub fn acknowledge_setup_notification(self: &Arc<Self>) -> SchedulingResult<()> {
        let state = self.state();
        if state != JobState::RetrySetupBlocked {
            return Err(self.invalid(state, "acknowledge a notification"));
        }
        self.notifications.acknowledge_all(self.id);
        self.unblock_retry_setup()
    }

    /// Block a setup job whose recipe could not be determined.
    ///
    /// Counts as a failed attempt and raises one notification regardless of
    /// the retry limit; acknowledging it requests the recipe again.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidJobState`] unless
    /// [`recipe_required`](Job::recipe_required) is true.
    pub fn escalate_setup_failure(self: &Arc<Self>, reason: &str) -> SchedulingResult<()> {
        let notification = {
            let mut inner = self.inner.lock();
            if inner.state != JobState::RequestRecipe {
                return Err(self.invalid(inner.state, "escalate a setup failure"));
            }
            inner.retries += 1;
            self.set_state(&mut inner, JobState::RetrySetupBlocked);
            self.blocked_notification(inner.retries, reason)
        };
        self.notifications.publish(self.id, notification);
        Ok(())
    }

    /// Whether the failed attempts exceed the configured limit.
    ///
    /// Always false for a negative limit (unlimited retries) and for
    /// production jobs. The limit itself is still allowed.
    #[must_use]
    pub fn is_retry_limit_reached(&self) -> bool {
        let retries = self.inner.lock().retries;
        self.limit_exceeded(retries)
    }

    fn limit_exceeded(&self, retries: u32) -> bool {
        match self.kind {
            JobKind::Setup { retry_limit, .. } => {
                u32::try_from(retry_limit).is_ok_and(|limit| retries > limit)
            }
            JobKind::Production { .. } => false,
        }
    }

    /// Decide what a running job does once its last activity returned.
    fn settle(self: &Arc<Self>, inner: &mut JobInner) -> Option<SetupNotification> {
        match &self.kind {
            JobKind::Production { amount, .. } => {
                if inner.completed + inner.failed >= *amount {
                    self.set_state(inner, JobState::Completed);
                }
                None
            }
            JobKind::Setup { .. } if inner.attempt_failed => {
                inner.attempt_failed = false;
                inner.retries += 1;
                if self.limit_exceeded(inner.retries) {
                    self.set_state(inner, JobState::RetrySetupBlocked);
                    Some(self.blocked_notification(inner.retries, "setup failed"))
                } else {
                    debug!(job = %self.id, retries = inner.retries, "Setup attempt failed, retrying");
                    self.set_state(inner, JobState::RequestRecipe);
                    None
                }
            }
            JobKind::Setup { .. } => {
                let required = inner
                    .setup
                    .as_ref()
                    .map_or(0, SetupRecipe::activity_count);
                if inner.completed >= required {
                    self.set_state(inner, JobState::Completed);
                }
                None
            }
        }
    }

    fn stop(self: &Arc<Self>, draining: JobState) {
        let was_blocked = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            match previous {
                JobState::Initial
                | JobState::Waiting
                | JobState::RequestRecipe
                | JobState::RetrySetupBlocked => {
                    self.set_state(&mut inner, JobState::Aborted);
                }
                JobState::Running if inner.running == 0 => {
                    self.set_state(&mut inner, JobState::Aborted);
                }
                JobState::Running => self.set_state(&mut inner, draining),
                JobState::Interrupting
                | JobState::Aborting
                | JobState::Completed
                | JobState::Aborted => {}
            }
            previous == JobState::RetrySetupBlocked
        };

        if was_blocked {
            self.notifications.acknowledge_all(self.id);
        }
    }

    fn set_state(self: &Arc<Self>, inner: &mut JobInner, next: JobState) {
        let previous = inner.state;
        inner.state = next;
        debug!(job = %self.id, from = %previous, to = %next, "Job state changed");
        self.events.emit(JobEvent::StateChanged(JobStateChanged {
            job: Arc::clone(self),
            previous,
            current: next,
        }));
    }

    fn emit_progress(&self, inner: &JobInner) {
        if inner.running > 0 {
            self.events.emit(JobEvent::ProgressChanged {
                job: self.id,
                running: inner.running,
                completed: inner.completed,
            });
        }
    }

    fn blocked_notification(&self, retries: u32, reason: &str) -> SetupNotification {
        let target = self
            .target()
            .map_or(self.recipe_id, |target| target.id);
        SetupNotification {
            job: self.id,
            target,
            retries,
            message: format!(
                "{} blocked after {retries} failed attempts: {reason}",
                self.display_name()
            ),
            raised_at: Utc::now(),
        }
    }

    const fn invalid(&self, state: JobState, action: &'static str) -> SchedulingError {
        SchedulingError::InvalidJobState {
            job: self.id,
            state,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobClassification, JobEvents, JobRef};
    use crate::notifications::{InMemoryNotifications, MockNotificationSink, NotificationSink};
    use crate::recipe::{CellFilter, ProductionRecipe, SetupExecution, SetupStep};

    fn setup_recipe(steps: usize) -> SetupRecipe {
        SetupRecipe::new(
            100,
            "Fixture",
            SetupExecution::BeforeProduction,
            ProductionRecipe::new(1, "Widget"),
            (0..steps)
                .map(|i| SetupStep::new(format!("step {i}"), CellFilter::Any))
                .collect(),
        )
    }

    fn setup_job(limit: i32, sink: Arc<dyn NotificationSink>) -> JobRef {
        Job::setup(setup_recipe(1), limit, JobEvents::detached(), sink)
    }

    fn running_setup(limit: i32, sink: Arc<dyn NotificationSink>) -> JobRef {
        let job = setup_job(limit, sink);
        job.enqueue().unwrap();
        job.start().unwrap();
        job.update_setup(Some(setup_recipe(1))).unwrap();
        job
    }

    fn run_activities(job: &JobRef, n: u32) {
        for _ in 0..n {
            job.activity_started().unwrap();
            job.activity_completed(ActivityOutcome::Succeeded).unwrap();
        }
    }

    fn fail_attempt(job: &JobRef) {
        job.activity_started().unwrap();
        job.activity_completed(ActivityOutcome::Failed).unwrap();
    }

    #[test]
    fn test_setup_start_requests_recipe() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();
        job.start().unwrap();

        assert!(job.recipe_required());
        assert_eq!(job.classification(), JobClassification::RequestingRecipe);
    }

    #[test]
    fn test_update_setup_requires_request_recipe() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();

        let err = job.update_setup(Some(setup_recipe(1))).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::InvalidJobState {
                state: JobState::Waiting,
                ..
            }
        ));
    }

    #[test]
    fn test_update_setup_keeps_identity() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();
        job.start().unwrap();

        let mut replacement = setup_recipe(2);
        replacement.id = crate::recipe::RecipeId::new(999);
        job.update_setup(Some(replacement)).unwrap();

        assert_eq!(job.state(), JobState::Running);
        let working = job.setup_recipe().unwrap();
        assert_eq!(working.id, job.recipe_id());
        assert_eq!(working.steps.len(), 2);
    }

    #[test]
    fn test_update_setup_without_recipe_completes() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();
        job.start().unwrap();
        job.update_setup(None).unwrap();

        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn test_setup_completes_after_all_steps() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();
        job.start().unwrap();
        job.update_setup(Some(setup_recipe(2))).unwrap();

        run_activities(&job, 1);
        assert_eq!(job.state(), JobState::Running);
        run_activities(&job, 1);
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn test_failed_attempt_requests_recipe_again() {
        let job = running_setup(2, Arc::new(InMemoryNotifications::new()));
        fail_attempt(&job);

        assert_eq!(job.retries(), 1);
        assert!(job.recipe_required());
    }

    #[test]
    fn test_retry_limit_blocks_after_limit_plus_one_failures() {
        let mut sink = MockNotificationSink::new();
        sink.expect_publish().times(1).return_const(());
        let job = running_setup(2, Arc::new(sink));

        for _ in 0..2 {
            fail_attempt(&job);
            assert!(!job.is_retry_limit_reached());
            job.update_setup(Some(setup_recipe(1))).unwrap();
        }
        fail_attempt(&job);

        assert_eq!(job.retries(), 3);
        assert!(job.is_retry_limit_reached());
        assert_eq!(job.state(), JobState::RetrySetupBlocked);
    }

    #[test]
    fn test_zero_limit_blocks_on_first_failure() {
        let job = running_setup(0, Arc::new(InMemoryNotifications::new()));
        fail_attempt(&job);
        assert_eq!(job.state(), JobState::RetrySetupBlocked);
    }

    #[test]
    fn test_negative_limit_never_blocks() {
        let job = running_setup(-1, Arc::new(InMemoryNotifications::new()));
        for _ in 0..20 {
            fail_attempt(&job);
            assert!(!job.is_retry_limit_reached());
            job.update_setup(Some(setup_recipe(1))).unwrap();
        }
        assert_eq!(job.retries(), 20);
    }

    #[test]
    fn test_acknowledge_resets_counter_and_clears_notifications() {
        let sink = Arc::new(InMemoryNotifications::new());
        let job = running_setup(0, Arc::clone(&sink) as Arc<dyn NotificationSink>);
        fail_attempt(&job);
        assert_eq!(sink.pending_for(job.id()).len(), 1);

        job.acknowledge_setup_notification().unwrap();

        assert_eq!(job.retries(), 0);
        assert!(job.recipe_required());
        assert!(sink.pending_for(job.id()).is_empty());
    }

    #[test]
    fn test_unblock_outside_blocked_state_is_rejected() {
        let job = running_setup(1, Arc::new(InMemoryNotifications::new()));
        assert!(job.unblock_retry_setup().is_err());
        assert!(job.acknowledge_setup_notification().is_err());
    }

    #[test]
    fn test_abort_is_idempotent() {
        let job = setup_job(3, Arc::new(InMemoryNotifications::new()));
        job.enqueue().unwrap();
        job.abort();
        let once = job.state();
        job.abort();

        assert_eq!(once, JobState::Aborted);
        assert_eq!(job.state(), once);
    }

    #[test]
    fn test_interrupt_drains_running_activities() {
        let job = running_setup(3, Arc::new(InMemoryNotifications::new()));
        job.activity_started().unwrap();
        job.interrupt();
        assert_eq!(job.state(), JobState::Interrupting);

        // a second interrupt or an abort does not change anything
        job.interrupt();
        job.abort();
        assert_eq!(job.state(), JobState::Interrupting);

        job.activity_completed(ActivityOutcome::Succeeded).unwrap();
        assert_eq!(job.state(), JobState::Aborted);
    }

    #[test]
    fn test_abort_while_blocked_clears_notifications() {
        let sink = Arc::new(InMemoryNotifications::new());
        let job = running_setup(0, Arc::clone(&sink) as Arc<dyn NotificationSink>);
        fail_attempt(&job);

        job.abort();
        assert_eq!(job.state(), JobState::Aborted);
        assert_eq!(sink.pending_count(), 0);
    }

    #[test]
    fn test_escalation_blocks_and_notifies() {
        let sink = Arc::new(InMemoryNotifications::new());
        let job = setup_job(5, Arc::clone(&sink) as Arc<dyn NotificationSink>);
        job.enqueue().unwrap();
        job.start().unwrap();

        job.escalate_setup_failure("planner unreachable").unwrap();

        assert_eq!(job.state(), JobState::RetrySetupBlocked);
        let pending = sink.pending_for(job.id());
        assert_eq!(pending.len(), 1);
        assert!(pending[0].message.contains("planner unreachable"));
    }

    #[test]
    fn test_production_job_lifecycle() {
        let job = Job::production(
            ProductionRecipe::new(1, "Widget"),
            2,
            JobEvents::detached(),
            Arc::new(InMemoryNotifications::new()),
        );
        job.enqueue().unwrap();
        job.start().unwrap();
        assert_eq!(job.state(), JobState::Running);

        job.activity_started().unwrap();
        job.activity_completed(ActivityOutcome::Failed).unwrap();
        assert_eq!(job.state(), JobState::Running);
        run_activities(&job, 1);
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn test_production_job_rejects_setup_actions() {
        let job = Job::production(
            ProductionRecipe::new(1, "Widget"),
            1,
            JobEvents::detached(),
            Arc::new(InMemoryNotifications::new()),
        );
        assert!(job.update_setup(None).is_err());
        assert!(job.unblock_retry_setup().is_err());
        assert!(!job.is_retry_limit_reached());
    }

    #[test]
    fn test_events_follow_transitions() {
        let (events, mut stream) = JobEvents::channel();
        let job = Job::setup(
            setup_recipe(1),
            3,
            events,
            Arc::new(InMemoryNotifications::new()),
        );
        job.enqueue().unwrap();
        job.start().unwrap();
        job.update_setup(Some(setup_recipe(1))).unwrap();
        job.activity_started().unwrap();
        job.activity_completed(ActivityOutcome::Succeeded).unwrap();

        let mut transitions = Vec::new();
        let mut progress = 0;
        while let Ok(event) = stream.try_recv() {
            match event {
                JobEvent::StateChanged(change) => transitions.push((change.previous, change.current)),
                JobEvent::ProgressChanged { running, .. } => {
                    assert!(running > 0);
                    progress += 1;
                }
            }
        }

        assert_eq!(
            transitions,
            vec![
                (JobState::Initial, JobState::Waiting),
                (JobState::Waiting, JobState::RequestRecipe),
                (JobState::RequestRecipe, JobState::Running),
                (JobState::Running, JobState::Completed),
            ]
        );
        assert_eq!(progress, 1);
    }
}
