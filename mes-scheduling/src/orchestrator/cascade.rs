//! Interrupt cascades run when setup planning fails.
//!
//! Cascades only remove jobs from the batch. Committed jobs are never touched.

use crate::jobs::JobId;
use crate::recipe::{RecipeId, SetupExecution};
use crate::schedule::{BatchCursor, NewJobBatch};

/// Jobs removed by a cascade and the position to resume at.
#[derive(Debug, Default)]
pub(super) struct Cascade {
    pub(super) interrupted: Vec<JobId>,
    pub(super) resume: Option<BatchCursor>,
}

fn interrupt_at(batch: &mut NewJobBatch, at: BatchCursor, cascade: &mut Cascade) {
    if let Some(job) = batch.remove(at) {
        job.interrupt();
        cascade.interrupted.push(job.id());
    }
}

/// Setup of `recipe` failed at `from`: interrupt every batch job of that
/// recipe from `from` on. Jobs of other recipes stay; processing resumes at
/// the first of them.
pub(super) fn interrupt_jobs_forward(
    batch: &mut NewJobBatch,
    from: BatchCursor,
    recipe: RecipeId,
) -> Cascade {
    let mut cascade = Cascade::default();
    let mut cursor = Some(from);
    while let Some(at) = cursor {
        cursor = batch.next(at);
        let same_recipe = batch.get(at).is_some_and(|job| job.recipe_id() == recipe);
        if same_recipe {
            interrupt_at(batch, at, &mut cascade);
        } else if cascade.resume.is_none() {
            cascade.resume = Some(at);
        }
    }
    cascade
}

/// Cleanup of `recipe` failed at `from`: interrupt every batch job of
/// `recipe` at or before `from`, together with the before-production setup
/// directly in front of each run of them.
///
/// Runs separated by jobs of other recipes are all removed. Processing
/// resumes after `from`; nothing after it is removed.
pub(super) fn interrupt_jobs_backward(
    batch: &mut NewJobBatch,
    from: BatchCursor,
    recipe: RecipeId,
) -> Cascade {
    let mut cascade = Cascade {
        resume: batch.next(from),
        ..Cascade::default()
    };
    let mut in_run = false;
    let mut cursor = Some(from);
    while let Some(at) = cursor {
        cursor = batch.previous(at);
        let Some(job) = batch.get(at) else {
            break;
        };
        if job.recipe_id() == recipe {
            interrupt_at(batch, at, &mut cascade);
            in_run = true;
        } else {
            if in_run && job.is_setup_for(SetupExecution::BeforeProduction, recipe) {
                interrupt_at(batch, at, &mut cascade);
            }
            in_run = false;
        }
    }
    cascade
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, JobEvents, JobRef, JobState};
    use crate::notifications::DiscardNotifications;
    use crate::recipe::{CellFilter, ProductionRecipe, SetupRecipe, SetupStep};
    use std::sync::Arc;

    fn production(recipe: &Arc<ProductionRecipe>) -> JobRef {
        Job::production(
            Arc::clone(recipe),
            1,
            JobEvents::detached(),
            Arc::new(DiscardNotifications),
        )
    }

    fn before(recipe: &Arc<ProductionRecipe>) -> JobRef {
        Job::setup(
            SetupRecipe::new(
                100 + recipe.id.get(),
                "prepare",
                SetupExecution::BeforeProduction,
                Arc::clone(recipe),
                vec![SetupStep::new("mount", CellFilter::Any)],
            ),
            3,
            JobEvents::detached(),
            Arc::new(DiscardNotifications),
        )
    }

    #[test]
    fn test_forward_keeps_other_recipes() {
        let x = ProductionRecipe::new(1, "X");
        let y = ProductionRecipe::new(2, "Y");
        let jobs = [production(&x), production(&y), production(&x)];
        let mut batch = NewJobBatch::from_jobs(jobs.clone());

        let first = batch.first().unwrap();
        let cascade = interrupt_jobs_forward(&mut batch, first, x.id);

        assert_eq!(cascade.interrupted, vec![jobs[0].id(), jobs[2].id()]);
        assert_eq!(batch.len(), 1);
        assert_eq!(
            cascade.resume.and_then(|at| batch.get(at)).map(|job| job.id()),
            Some(jobs[1].id())
        );
        assert_eq!(jobs[0].state(), JobState::Aborted);
        assert_eq!(jobs[1].state(), JobState::Initial);
    }

    #[test]
    fn test_backward_removes_run_and_its_setup() {
        let x = ProductionRecipe::new(1, "X");
        let y = ProductionRecipe::new(2, "Y");
        let jobs = [
            production(&y),
            before(&x),
            production(&x),
            production(&x),
            production(&y),
        ];
        let mut batch = NewJobBatch::from_jobs(jobs.clone());
        let from = batch.position(jobs[3].id()).unwrap();

        let cascade = interrupt_jobs_backward(&mut batch, from, x.id);

        assert_eq!(
            cascade.interrupted,
            vec![jobs[3].id(), jobs[2].id(), jobs[1].id()]
        );
        let left: Vec<_> = batch.iter().map(|job| job.id()).collect();
        assert_eq!(left, vec![jobs[0].id(), jobs[4].id()]);
        assert_eq!(
            cascade.resume.and_then(|at| batch.get(at)).map(|job| job.id()),
            Some(jobs[4].id())
        );
    }

    #[test]
    fn test_backward_removes_interleaved_runs() {
        let x = ProductionRecipe::new(1, "X");
        let y = ProductionRecipe::new(2, "Y");
        let jobs = [
            before(&x),
            production(&x),
            before(&y),
            production(&y),
            before(&x),
            production(&x),
        ];
        let mut batch = NewJobBatch::from_jobs(jobs.clone());

        let last = batch.last().unwrap();
        let cascade = interrupt_jobs_backward(&mut batch, last, x.id);

        assert_eq!(
            cascade.interrupted,
            vec![jobs[5].id(), jobs[4].id(), jobs[1].id(), jobs[0].id()]
        );
        let left: Vec<_> = batch.iter().map(|job| job.id()).collect();
        assert_eq!(left, vec![jobs[2].id(), jobs[3].id()]);
        assert!(cascade.resume.is_none());
        assert_eq!(jobs[0].state(), JobState::Aborted);
        assert_eq!(jobs[3].state(), JobState::Initial);
    }

    #[test]
    fn test_backward_keeps_setup_not_in_front_of_run() {
        let x = ProductionRecipe::new(1, "X");
        let y = ProductionRecipe::new(2, "Y");
        let jobs = [before(&x), production(&y), production(&x)];
        let mut batch = NewJobBatch::from_jobs(jobs.clone());

        let last = batch.last().unwrap();
        let cascade = interrupt_jobs_backward(&mut batch, last, x.id);

        assert_eq!(cascade.interrupted, vec![jobs[2].id()]);
        let left: Vec<_> = batch.iter().map(|job| job.id()).collect();
        assert_eq!(left, vec![jobs[0].id(), jobs[1].id()]);
    }
}
