//! Process configuration: event subsystem settings plus the run parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use walletcore_event::{ConfigError, ConfigLoader, EventsConfig};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AppConfig {
    /// Handler and alarm clock settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Run parameters.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// How the process drives its handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DemoConfig {
    /// Total run time in milliseconds.
    #[serde(default = "default_run_ms")]
    pub run_ms: u64,

    /// Wallet manager timeout period in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Events produced over the run.
    #[serde(default = "default_events")]
    pub events: u64,
}

fn default_run_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_events() -> u64 {
    200
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            run_ms: default_run_ms(),
            timeout_ms: default_timeout_ms(),
            events: default_events(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = match path {
            Some(path) => ConfigLoader::load(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.events.validate()?;
        if self.demo.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "demo.timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
