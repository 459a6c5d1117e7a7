//! Job creation.

use super::{Job, JobEvents, JobRef};
use crate::config::SetupSettings;
use crate::notifications::NotificationSink;
use crate::recipe::{ProductionRecipe, SetupRecipe};
use std::sync::Arc;

/// Creates jobs wired to the schedule's event channel and notification sink.
#[cfg_attr(test, mockall::automock)]
pub trait JobFactory: Send + Sync {
    /// Create a production job for `amount` parts of `recipe`.
    fn create_production_job(&self, recipe: Arc<ProductionRecipe>, amount: u32) -> JobRef;

    /// Create a setup or cleanup job from `recipe`.
    fn create_setup_job(&self, recipe: SetupRecipe) -> JobRef;
}

/// Factory reading the retry limit from [`SetupSettings`].
pub struct DefaultJobFactory {
    retry_limit: i32,
    events: JobEvents,
    notifications: Arc<dyn NotificationSink>,
}

impl DefaultJobFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(
        settings: &SetupSettings,
        events: JobEvents,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            retry_limit: settings.retry_limit,
            events,
            notifications,
        }
    }
}

impl std::fmt::Debug for DefaultJobFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultJobFactory")
            .field("retry_limit", &self.retry_limit)
            .finish_non_exhaustive()
    }
}

impl JobFactory for DefaultJobFactory {
    fn create_production_job(&self, recipe: Arc<ProductionRecipe>, amount: u32) -> JobRef {
        Job::production(
            recipe,
            amount,
            self.events.clone(),
            Arc::clone(&self.notifications),
        )
    }

    fn create_setup_job(&self, recipe: SetupRecipe) -> JobRef {
        Job::setup(
            recipe,
            self.retry_limit,
            self.events.clone(),
            Arc::clone(&self.notifications),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobKind;
    use crate::notifications::DiscardNotifications;
    use crate::recipe::SetupExecution;

    #[test]
    fn test_setup_job_gets_configured_retry_limit() {
        let settings = SetupSettings {
            retry_limit: 7,
            ..SetupSettings::default()
        };
        let factory =
            DefaultJobFactory::new(&settings, JobEvents::detached(), Arc::new(DiscardNotifications));

        let job = factory.create_setup_job(SetupRecipe::temporary_cleanup(ProductionRecipe::new(
            3, "Bracket",
        )));

        assert!(matches!(
            job.kind(),
            JobKind::Setup {
                retry_limit: 7,
                execution: SetupExecution::AfterProduction,
                ..
            }
        ));
    }
}
