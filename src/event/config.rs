//! Notifier Configuration
//!
//! Settings for building an [`ObserverNotifier`](crate::event::ObserverNotifier),
//! normally extracted from the `[notifier]` and `[executor]` configuration
//! sections.

use serde::{Deserialize, Serialize};

/// Default worker thread name prefix for a dedicated async pool
pub const DEFAULT_THREAD_NAME: &str = "eventwire-async";

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Executor thread count must be greater than zero")]
    InvalidThreadCount,
    #[error("Executor thread name must not be empty")]
    EmptyThreadName,
    #[error("Reserved event type names must not be empty")]
    EmptyReservedType,
}

/// Notifier settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Perform event type checks before resolution
    pub strict: bool,

    /// Lifecycle event type names reserved in addition to the built-in ones
    pub reserved_event_types: Vec<String>,

    /// Async delivery pool settings
    pub executor: ExecutorConfig,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            strict: true,
            reserved_event_types: Vec::new(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Async delivery pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Size of a dedicated pool; `None` uses the shared default pool
    pub threads: Option<usize>,

    /// Name prefix for dedicated pool threads
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl NotifierConfig {
    /// Lenient configuration for the engine's own internal dispatch
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Check the configuration for values that cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.threads == Some(0) {
            return Err(ConfigError::InvalidThreadCount);
        }
        if self.executor.thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        if self.reserved_event_types.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::EmptyReservedType);
        }
        Ok(())
    }
}
