//! Observability (logging, tracing)
//!
//! Provides structured logging for the orchestrator. Every cascade, inserted
//! setup job and rejected transition is reported through `tracing`.

use crate::config::LogSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging stack
///
/// `RUST_LOG` takes precedence over [`LogSettings::filter`]. Debug builds
/// log in pretty format, release builds in JSON.
///
/// # Errors
///
/// Returns an error if the filter directives do not parse or a global
/// subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use mes_scheduling::config::SchedulingConfig;
/// use mes_scheduling::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = SchedulingConfig::load_for_service("line-7")?;
/// observability::init(&config.logging)?;
/// tracing::info!("Scheduler started");
/// # Ok(())
/// # }
/// ```
pub fn init(settings: &LogSettings) -> anyhow::Result<()> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = EnvFilter::try_new(directives(settings, from_env.as_deref()))?;

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

fn directives<'a>(settings: &'a LogSettings, from_env: Option<&'a str>) -> &'a str {
    match from_env {
        Some(env) if !env.trim().is_empty() => env,
        _ => &settings.filter,
    }
}
