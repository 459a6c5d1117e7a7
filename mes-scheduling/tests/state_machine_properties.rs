//! Property-based tests for job state machine invariants.

use std::sync::Arc;

use proptest::prelude::*;

use mes_scheduling::jobs::{ActivityOutcome, Job, JobEvents, JobRef, JobState};
use mes_scheduling::notifications::InMemoryNotifications;
use mes_scheduling::recipe::SetupExecution;
use mes_scheduling::testing::{production_recipe, setup_recipe};

/// Operations a caller may throw at a job in any order.
#[derive(Debug, Clone, Copy)]
enum Op {
    Enqueue,
    Start,
    Update,
    ActivityStarted,
    Succeed,
    Fail,
    Interrupt,
    Acknowledge,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop::sample::select(vec![
        Op::Enqueue,
        Op::Start,
        Op::Update,
        Op::ActivityStarted,
        Op::Succeed,
        Op::Fail,
        Op::Interrupt,
        Op::Acknowledge,
    ])
}

fn setup_job(retry_limit: i32, events: JobEvents, notifications: &Arc<InMemoryNotifications>) -> JobRef {
    let target = production_recipe(1, "Gear");
    Job::setup(
        setup_recipe(&target, SetupExecution::BeforeProduction, 1),
        retry_limit,
        events,
        Arc::clone(notifications) as _,
    )
}

fn apply(job: &JobRef, op: Op) {
    let target = production_recipe(1, "Gear");
    // Invalid transitions are rejected without side effects; ignore them
    let _ = match op {
        Op::Enqueue => job.enqueue(),
        Op::Start => job.start(),
        Op::Update => job.update_setup(Some(setup_recipe(&target, SetupExecution::BeforeProduction, 1))),
        Op::ActivityStarted => job.activity_started(),
        Op::Succeed => job.activity_completed(ActivityOutcome::Succeeded),
        Op::Fail => job.activity_completed(ActivityOutcome::Failed),
        Op::Interrupt => {
            job.interrupt();
            Ok(())
        }
        Op::Acknowledge => job.acknowledge_setup_notification(),
    };
}

proptest! {
    /// A setup job blocks exactly once its failed attempts exceed the limit,
    /// and raises a single notification when it does.
    #[test]
    fn prop_retry_limit_is_a_ceiling(retry_limit in -1i32..5, failures in 0u32..10) {
        let notifications = Arc::new(InMemoryNotifications::new());
        let job = setup_job(retry_limit, JobEvents::detached(), &notifications);
        let target = production_recipe(1, "Gear");

        job.enqueue().unwrap();
        job.start().unwrap();
        for _ in 0..failures {
            if job.state() == JobState::RetrySetupBlocked {
                break;
            }
            job.update_setup(Some(setup_recipe(&target, SetupExecution::BeforeProduction, 1))).unwrap();
            job.activity_started().unwrap();
            job.activity_completed(ActivityOutcome::Failed).unwrap();
        }

        let expect_blocked = u32::try_from(retry_limit).is_ok_and(|limit| failures > limit);
        prop_assert_eq!(job.state() == JobState::RetrySetupBlocked, expect_blocked);
        prop_assert_eq!(job.is_retry_limit_reached(), expect_blocked);
        prop_assert_eq!(notifications.pending_for(job.id()).len(), usize::from(expect_blocked));
        if !expect_blocked {
            prop_assert_eq!(job.retries(), failures);
            prop_assert_eq!(job.state(), JobState::RequestRecipe);
        }
    }

    /// After any history, a second abort changes nothing and emits nothing.
    #[test]
    fn prop_abort_is_idempotent(ops in prop::collection::vec(arb_op(), 0..24)) {
        let notifications = Arc::new(InMemoryNotifications::new());
        let (events, mut stream) = JobEvents::channel();
        let job = setup_job(1, events, &notifications);

        for op in ops {
            apply(&job, op);
        }

        job.abort();
        let after_first = job.state();
        prop_assert!(matches!(
            after_first,
            JobState::Aborted | JobState::Aborting | JobState::Interrupting | JobState::Completed
        ));
        prop_assert_eq!(notifications.pending_count(), 0);
        while stream.try_recv().is_ok() {}

        job.abort();
        prop_assert_eq!(job.state(), after_first);
        prop_assert!(stream.try_recv().is_err());
    }

    /// Running activities are never lost: a job winding down only finishes
    /// once every running activity returned.
    #[test]
    fn prop_draining_waits_for_activities(running in 1u32..6) {
        let notifications = Arc::new(InMemoryNotifications::new());
        let target = production_recipe(1, "Gear");
        let job = Job::production(target, 100, JobEvents::detached(), notifications as _);

        job.enqueue().unwrap();
        job.start().unwrap();
        for _ in 0..running {
            job.activity_started().unwrap();
        }
        job.interrupt();

        for returned in 1..=running {
            prop_assert_ne!(job.state(), JobState::Aborted);
            job.activity_completed(ActivityOutcome::Succeeded).unwrap();
            prop_assert_eq!(job.running_count(), running - returned);
        }
        prop_assert_eq!(job.state(), JobState::Aborted);
        prop_assert_eq!(job.completed_count(), running);
    }
}
