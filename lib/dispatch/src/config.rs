//! Dispatcher configuration.

use serde::Deserialize;
use std::time::Duration;

/// Limits applied to listener invocations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Per-invocation handler timeout in seconds. `None` or 0 disables it.
    #[serde(default = "default_handler_timeout_seconds")]
    pub handler_timeout_seconds: Option<u64>,
}

fn default_handler_timeout_seconds() -> Option<u64> {
    Some(30)
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_seconds: default_handler_timeout_seconds(),
        }
    }
}

impl DispatchConfig {
    /// The effective per-handler timeout, if any.
    #[must_use]
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
