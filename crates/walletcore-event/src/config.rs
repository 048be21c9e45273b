//! Configuration for event handlers and the alarm clock.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest thread name the platform thread APIs reliably accept.
pub const MAX_THREAD_NAME_LEN: usize = 32;

/// Event subsystem configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Alarm clock configuration.
    #[serde(default)]
    pub alarm_clock: AlarmClockConfig,

    /// Per-handler configuration, looked up by handler name.
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl EventsConfig {
    /// Find the configuration for a named handler.
    pub fn handler(&self, name: &str) -> Option<&HandlerConfig> {
        self.handlers.iter().find(|h| h.name == name)
    }

    /// Configuration for a named handler, falling back to defaults.
    pub fn handler_or_default(&self, name: &str) -> HandlerConfig {
        self.handler(name)
            .cloned()
            .unwrap_or_else(|| HandlerConfig::new(name))
    }

    /// Check values that would make thread creation fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alarm_clock.validate()?;
        for handler in &self.handlers {
            handler.validate()?;
        }
        Ok(())
    }
}

/// Event handler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Handler name; also names the worker thread.
    pub name: String,

    /// Worker thread stack size in bytes.
    #[serde(default = "default_handler_stack_size")]
    pub stack_size: usize,

    /// Events the queue holds before it first grows.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_handler_stack_size() -> usize {
    512 * 1024
}

fn default_queue_capacity() -> usize {
    64
}

impl HandlerConfig {
    /// Default configuration for a named handler.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: default_handler_stack_size(),
            queue_capacity: default_queue_capacity(),
        }
    }

    /// Set the worker stack size.
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Set the initial queue capacity.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Worker thread name, truncated to [`MAX_THREAD_NAME_LEN`].
    pub fn thread_name(&self) -> String {
        truncate_thread_name(&self.name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "handlers.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.stack_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("handlers.{}.stack_size", self.name),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Alarm clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmClockConfig {
    /// Timer thread name.
    #[serde(default = "default_alarm_thread_name")]
    pub thread_name: String,

    /// Timer thread stack size in bytes.
    #[serde(default = "default_alarm_stack_size")]
    pub stack_size: usize,
}

fn default_alarm_thread_name() -> String {
    "alarm-clock".to_string()
}

fn default_alarm_stack_size() -> usize {
    128 * 1024
}

impl Default for AlarmClockConfig {
    fn default() -> Self {
        Self {
            thread_name: default_alarm_thread_name(),
            stack_size: default_alarm_stack_size(),
        }
    }
}

impl AlarmClockConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "alarm_clock.stack_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn truncate_thread_name(name: &str) -> String {
    name.chars().take(MAX_THREAD_NAME_LEN).collect()
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|e| panic!("invalid env pattern: {e}"))
        });

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
