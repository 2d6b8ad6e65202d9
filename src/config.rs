//! Scheduler configuration.
//!
//! [`SchedulerConfig`] carries the knobs that shape one scheduler instance.
//! It is plain data: build it with the `with_*` methods, deserialize it with
//! serde, or (with the `config-file` feature) parse it from TOML.

use serde::{Deserialize, Serialize};

/// Errors produced while validating or loading a [`SchedulerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The runnable list must start with room for at least one task.
    #[error("initial_capacity must be greater than zero")]
    ZeroCapacity,
    /// A task must be allowed to interpret at least one effect per tick.
    #[error("max_effects_per_step must be greater than zero")]
    ZeroEffectBudget,
    /// A live-task limit of zero would reject the root saga.
    #[error("max_live_tasks must be greater than zero when set")]
    ZeroTaskLimit,
    /// The configuration text could not be parsed.
    #[error("failed to parse scheduler config: {0}")]
    Parse(String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::new(crate::error::ErrorKind::Config).with_source(err)
    }
}

/// Configuration for a scheduler and the middleware that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Initial capacity of the runnable list.
    pub initial_capacity: usize,
    /// Immediate effects a task may chain within one tick before it is
    /// parked until the next tick.
    pub max_effects_per_step: usize,
    /// Upper bound on tasks alive at once; `None` means unbounded.
    pub max_live_tasks: Option<usize>,
    /// Catch panics raised by saga code and latch them on the task.
    pub catch_panics: bool,
    /// Whether an errored child task requests cancellation of its own
    /// live children. Root tasks always do.
    pub cancel_children_on_error: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_effects_per_step: 1024,
            max_live_tasks: None,
            catch_panics: true,
            cancel_children_on_error: true,
        }
    }
}

impl SchedulerConfig {
    /// Sets the initial runnable-list capacity.
    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the per-step effect budget.
    #[must_use]
    pub const fn with_max_effects_per_step(mut self, budget: usize) -> Self {
        self.max_effects_per_step = budget;
        self
    }

    /// Sets the live-task limit.
    #[must_use]
    pub const fn with_max_live_tasks(mut self, limit: Option<usize>) -> Self {
        self.max_live_tasks = limit;
        self
    }

    /// Enables or disables panic isolation.
    #[must_use]
    pub const fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Sets whether errored child tasks cancel their own children.
    #[must_use]
    pub const fn with_cancel_children_on_error(mut self, cancel: bool) -> Self {
        self.cancel_children_on_error = cancel;
        self
    }

    /// Checks the configuration for values the scheduler cannot run with.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_effects_per_step == 0 {
            return Err(ConfigError::ZeroEffectBudget);
        }
        if let Some(0) = self.max_live_tasks {
            return Err(ConfigError::ZeroTaskLimit);
        }
        Ok(())
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing keys take their default values.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.initial_capacity, 16);
        assert_eq!(config.max_effects_per_step, 1024);
        assert!(config.max_live_tasks.is_none());
        assert!(config.catch_panics);
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = SchedulerConfig::default().with_initial_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = SchedulerConfig::default().with_max_effects_per_step(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroEffectBudget));

        let config = SchedulerConfig::default().with_max_live_tasks(Some(0));
        assert_eq!(config.validate(), Err(ConfigError::ZeroTaskLimit));
    }

    #[test]
    fn config_error_converts_to_crate_error() {
        let err: crate::error::Error = ConfigError::ZeroCapacity.into();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert!(err.to_string().contains("initial_capacity"));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn parses_partial_toml() {
        let config = SchedulerConfig::from_toml_str(
            "max_effects_per_step = 8\nmax_live_tasks = 32\n",
        )
        .expect("parse");
        assert_eq!(config.max_effects_per_step, 8);
        assert_eq!(config.max_live_tasks, Some(32));
        assert_eq!(config.initial_capacity, 16);

        let err = SchedulerConfig::from_toml_str("initial_capacity = 0").unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity);
    }
}
