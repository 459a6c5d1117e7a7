//! Decisions about where setup and cleanup jobs are needed.
//!
//! All predicates look at the union of the committed schedule and the batch
//! through a [`ScheduleView`].

use crate::jobs::{JobClassification, JobRef};
use crate::recipe::SetupExecution;
use crate::schedule::{BatchCursor, ScheduleView};

/// Existing cleanup right after the run `at` belongs to.
///
/// Jobs sharing the recipe of `at` are skipped; the first job with another
/// recipe is the cleanup if it is an after-production setup for that recipe.
pub(super) fn following_cleanup(view: &ScheduleView<'_>, at: BatchCursor) -> Option<JobRef> {
    let job = view.job(at)?;
    let recipe = job.recipe_id();
    view.forward(at)
        .find(|other| other.recipe_id() != recipe)
        .filter(|other| other.is_setup_for(SetupExecution::AfterProduction, recipe))
}

fn pending_cleanup_follows(view: &ScheduleView<'_>, at: BatchCursor) -> bool {
    following_cleanup(view, at).is_some_and(|cleanup| cleanup.classification().is_pending())
}

/// Whether the job at `at` needs a setup inserted before it.
///
/// A setup is needed unless the job continues a run of its recipe that has
/// not gone past `Running`, or a cleanup of the run is still waiting (the
/// job joins that run).
pub(super) fn requires_setup_creation(view: &ScheduleView<'_>, at: BatchCursor) -> bool {
    let Some(job) = view.job(at) else {
        return false;
    };
    let starts_run = view.previous(at).is_none_or(|previous| {
        previous.recipe_id() != job.recipe_id()
            || previous.classification() > JobClassification::Running
    });
    starts_run && !pending_cleanup_follows(view, at)
}

/// Whether no later job shares the recipe of `at`.
pub(super) fn last_of_recipe(view: &ScheduleView<'_>, at: BatchCursor) -> bool {
    view.job(at).is_some_and(|job| {
        let recipe = job.recipe_id();
        !view.forward(at).any(|other| other.recipe_id() == recipe)
    })
}

/// Whether the job at `at` needs a cleanup inserted after it.
pub(super) fn requires_cleanup_creation(view: &ScheduleView<'_>, at: BatchCursor) -> bool {
    last_of_recipe(view, at) && !pending_cleanup_follows(view, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, JobEvents};
    use crate::notifications::DiscardNotifications;
    use crate::recipe::{CellFilter, ProductionRecipe, SetupRecipe, SetupStep};
    use crate::schedule::{InMemoryJobSchedule, JobSchedule, NewJobBatch};
    use std::sync::Arc;

    fn production(recipe: &Arc<ProductionRecipe>) -> JobRef {
        Job::production(
            Arc::clone(recipe),
            1,
            JobEvents::detached(),
            Arc::new(DiscardNotifications),
        )
    }

    fn setup(recipe: &Arc<ProductionRecipe>, execution: SetupExecution) -> JobRef {
        let id = match execution {
            SetupExecution::BeforeProduction => 100,
            SetupExecution::AfterProduction => 200,
        } + recipe.id.get();
        Job::setup(
            SetupRecipe::new(
                id,
                "fixture",
                execution,
                Arc::clone(recipe),
                vec![SetupStep::new("step", CellFilter::Any)],
            ),
            3,
            JobEvents::detached(),
            Arc::new(DiscardNotifications),
        )
    }

    #[test]
    fn test_first_job_requires_setup_and_cleanup() {
        let x = ProductionRecipe::new(1, "X");
        let schedule = InMemoryJobSchedule::new();
        let batch = NewJobBatch::from_jobs([production(&x)]);
        let view = ScheduleView::new(&schedule, &batch);
        let at = batch.first().unwrap();

        assert!(requires_setup_creation(&view, at));
        assert!(requires_cleanup_creation(&view, at));
    }

    #[test]
    fn test_same_recipe_run_shares_setup() {
        let x = ProductionRecipe::new(1, "X");
        let schedule = InMemoryJobSchedule::new();
        let batch = NewJobBatch::from_jobs([production(&x), production(&x)]);
        let view = ScheduleView::new(&schedule, &batch);
        let first = batch.first().unwrap();
        let second = batch.last().unwrap();

        assert!(!last_of_recipe(&view, first));
        assert!(!requires_setup_creation(&view, second));
        assert!(requires_cleanup_creation(&view, second));
    }

    #[test]
    fn test_finished_predecessor_requires_new_setup() {
        let x = ProductionRecipe::new(1, "X");
        let schedule = InMemoryJobSchedule::new();
        let done = production(&x);
        schedule.commit(NewJobBatch::from_jobs([done.clone()])).unwrap();
        done.abort();

        let batch = NewJobBatch::from_jobs([production(&x)]);
        let view = ScheduleView::new(&schedule, &batch);
        assert!(requires_setup_creation(&view, batch.first().unwrap()));
    }

    #[test]
    fn test_waiting_cleanup_is_joined() {
        let x = ProductionRecipe::new(1, "X");
        let schedule = InMemoryJobSchedule::new();
        let first = production(&x);
        let cleanup = setup(&x, SetupExecution::AfterProduction);
        schedule
            .commit(NewJobBatch::from_jobs([
                setup(&x, SetupExecution::BeforeProduction),
                first.clone(),
                cleanup.clone(),
            ]))
            .unwrap();

        let batch = NewJobBatch::from_jobs([production(&x)]).anchored_after(first.id());
        let view = ScheduleView::new(&schedule, &batch);
        let at = batch.first().unwrap();

        assert_eq!(following_cleanup(&view, at).map(|job| job.id()), Some(cleanup.id()));
        assert!(!requires_setup_creation(&view, at));
        assert!(last_of_recipe(&view, at));
        assert!(!requires_cleanup_creation(&view, at));
    }

    #[test]
    fn test_setup_of_other_recipe_is_not_a_cleanup() {
        let x = ProductionRecipe::new(1, "X");
        let y = ProductionRecipe::new(2, "Y");
        let schedule = InMemoryJobSchedule::new();
        let batch = NewJobBatch::from_jobs([
            production(&x),
            setup(&y, SetupExecution::AfterProduction),
        ]);
        let view = ScheduleView::new(&schedule, &batch);

        assert!(following_cleanup(&view, batch.first().unwrap()).is_none());
    }
}
