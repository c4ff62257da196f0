//! Engine configuration.
//!
//! Configuration can be built in code with [`EngineConfig::builder`] or read
//! from JSON with [`EngineConfig::from_json`]. Missing JSON fields take their
//! default values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for an [`Engine`](crate::engine::Engine).
///
/// # Example
///
/// ```rust
/// use contextflow::config::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "background_workers": 4, "screen_context": false }"#).unwrap();
///
/// assert_eq!(config.background_workers, 4);
/// assert!(!config.screen_context);
/// assert!(config.lifecycle_context);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the serial executor thread; background workers are named
    /// after it.
    pub executor_thread_name: String,
    /// Threads running after-track callbacks.
    pub background_workers: usize,
    pub lifecycle_context: bool,
    pub deep_link_context: bool,
    pub screen_context: bool,
    pub immersive_space_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor_thread_name: "contextflow-executor".to_string(),
            background_workers: 2,
            lifecycle_context: true,
            deep_link_context: true,
            screen_context: true,
            immersive_space_context: true,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "executor_thread_name must not be empty".to_string(),
            ));
        }
        if self.background_workers == 0 {
            return Err(ConfigError::Invalid(
                "background_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn executor_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.executor_thread_name = name.into();
        self
    }

    pub fn background_workers(mut self, n: usize) -> Self {
        self.config.background_workers = n;
        self
    }

    /// Register the application lifecycle machine
    pub fn lifecycle_context(mut self, enabled: bool) -> Self {
        self.config.lifecycle_context = enabled;
        self
    }

    /// Register the deep link machine
    pub fn deep_link_context(mut self, enabled: bool) -> Self {
        self.config.deep_link_context = enabled;
        self
    }

    /// Register the screen machine
    pub fn screen_context(mut self, enabled: bool) -> Self {
        self.config.screen_context = enabled;
        self
    }

    /// Register the immersive space machine
    pub fn immersive_space_context(mut self, enabled: bool) -> Self {
        self.config.immersive_space_context = enabled;
        self
    }

    /// Disable every built-in machine.
    pub fn without_builtin_contexts(self) -> Self {
        self.lifecycle_context(false)
            .deep_link_context(false)
            .screen_context(false)
            .immersive_space_context(false)
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_builtin_context() {
        let config = EngineConfig::default();

        assert_eq!(config.executor_thread_name, "contextflow-executor");
        assert_eq!(config.background_workers, 2);
        assert!(config.lifecycle_context);
        assert!(config.deep_link_context);
        assert!(config.screen_context);
        assert!(config.immersive_space_context);
    }

    #[test]
    fn empty_json_yields_defaults() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = EngineConfig::from_json(r#"{ "background_workers": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EngineConfig::builder().background_workers(0).build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = EngineConfig::from_json(r#"{ "background_workers": "many" }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = EngineConfig::builder()
            .executor_thread_name("tracker")
            .without_builtin_contexts()
            .screen_context(true)
            .build()
            .unwrap();

        assert_eq!(config.executor_thread_name, "tracker");
        assert!(config.screen_context);
        assert!(!config.lifecycle_context);
        assert!(!config.deep_link_context);
        assert!(!config.immersive_space_context);
    }
}
