//! # Dispatch Configuration
//!
//! Loaded once at startup, usually as a table inside a larger config file.
//!
//! ```toml
//! queue_capacity = 64
//! worker_name = "render-worker"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

/// Default queue depth. Deep enough to absorb a frame's worth of state
/// changes, shallow enough that a runaway producer stalls quickly.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default name given to the worker thread.
pub const DEFAULT_WORKER_NAME: &str = "tandem-worker";

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum commands in flight before producers block.
    pub queue_capacity: usize,
    /// Name of the worker thread (shows up in debuggers and log spans).
    pub worker_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl DispatchConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] if the text is not valid TOML
    /// or a value is out of range.
    pub fn from_toml_str(text: &str) -> DispatchResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| DispatchError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for a zero capacity or an
    /// empty worker name.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.queue_capacity == 0 {
            return Err(DispatchError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(DispatchError::InvalidConfig(
                "worker_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}
