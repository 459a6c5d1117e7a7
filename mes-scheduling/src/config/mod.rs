//! Configuration management for mes-scheduling
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `MES_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/mes-scheduling/{service}/config.toml` (user config, XDG)
//! 4. `/etc/mes-scheduling/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! [setup]
//! retry_limit = 3          # negative = unlimited retries
//! planner_timeout_ms = 30000
//!
//! [logging]
//! filter = "info,mes_scheduling=debug"   # RUST_LOG wins when set
//! ```
//!
//! The retry limit is read once per setup job, when the job is created.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use crate::error::SchedulingResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Setup job policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupSettings {
    /// Number of failed setup attempts tolerated before the job blocks and
    /// asks for acknowledgment. Negative values disable the limit.
    pub retry_limit: i32,

    /// Budget for a single setup planner call in milliseconds
    pub planner_timeout_ms: u64,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            planner_timeout_ms: 30_000,
        }
    }
}

impl SetupSettings {
    /// Planner budget as a [`Duration`]
    #[must_use]
    pub const fn planner_timeout(&self) -> Duration {
        Duration::from_millis(self.planner_timeout_ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        let filter = if cfg!(debug_assertions) {
            "info,mes_scheduling=debug"
        } else {
            "info,mes_scheduling=info"
        };
        Self {
            filter: filter.to_string(),
        }
    }
}

/// Complete mes-scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulingConfig {
    /// Setup job settings
    #[serde(default)]
    pub setup: SetupSettings,

    /// Log output
    #[serde(default)]
    pub logging: LogSettings,
}

impl SchedulingConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Config`](crate::SchedulingError::Config) if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use mes_scheduling::config::SchedulingConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = SchedulingConfig::load_for_service("line-7")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> SchedulingResult<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config: /etc/mes-scheduling/{service_name}/config.toml
        let system_config = PathBuf::from("/etc/mes-scheduling")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("MES_").split("__").lowercase(true));

        Ok(figment.extract()?)
    }

    /// Load configuration from a specific file
    ///
    /// Missing files fall back to the defaults; environment variables still
    /// override everything.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Config`](crate::SchedulingError::Config)
    /// if the file contains invalid TOML or values of the wrong type.
    pub fn load_from(path: impl AsRef<Path>) -> SchedulingResult<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MES_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("mes-scheduling")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }
}
