//! Configuration inspection command

use anyhow::Result;
use console::{style, Emoji};
use mes_scheduling::config::SchedulingConfig;
use std::path::PathBuf;

static INFO: Emoji = Emoji("ℹ", "i");

/// Show the effective configuration
#[derive(Debug)]
pub struct ConfigCommand {
    file: Option<PathBuf>,
}

impl ConfigCommand {
    /// Create a new config command
    #[must_use]
    pub const fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    /// Print the merged configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or serialized.
    pub fn execute(&self) -> Result<()> {
        let (config, source) = match &self.file {
            Some(path) => (SchedulingConfig::load_from(path)?, path.display().to_string()),
            None => {
                let config = SchedulingConfig::load_for_service("mes-sched")?;
                let user = SchedulingConfig::recommended_path("mes-sched");
                (config, format!("defaults, {}, ./config.toml, MES_*", user.display()))
            }
        };

        println!("{} Sources: {}", INFO, style(source).cyan());
        println!();
        print!("{}", toml::to_string_pretty(&config)?);
        Ok(())
    }
}
