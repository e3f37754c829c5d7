//! Cache lifetime configuration.

use chrono::Duration;
use serde::Deserialize;

/// How long sessions live and how often the reaper looks for stale ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Sessions older than this are evicted, in seconds.
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,

    /// Interval between reaper passes, in seconds.
    #[serde(default = "default_reap_interval_seconds")]
    pub reap_interval_seconds: u64,

    /// Whether the reaper runs at all.
    /// Tests that need deterministic cache contents turn this off.
    #[serde(default = "default_reap_enabled")]
    pub reap_enabled: bool,
}

fn default_max_age_seconds() -> u64 {
    3600
}

fn default_reap_interval_seconds() -> u64 {
    60
}

fn default_reap_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_max_age_seconds(),
            reap_interval_seconds: default_reap_interval_seconds(),
            reap_enabled: default_reap_enabled(),
        }
    }
}

impl CacheConfig {
    /// Maximum session age as a chrono duration.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        let secs = i64::try_from(self.max_age_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Duration::seconds(secs)
    }

    /// Reaper cadence. Never zero, so the interval timer cannot spin.
    #[must_use]
    pub fn reap_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reap_interval_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_config_has_correct_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_age_seconds, 3600);
        assert_eq!(config.reap_interval_seconds, 60);
        assert!(config.reap_enabled);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"reap_enabled": false}"#).expect("deserialize");
        assert!(!config.reap_enabled);
        assert_eq!(config.max_age_seconds, 3600);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = CacheConfig {
            reap_interval_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.reap_interval(), std::time::Duration::from_secs(1));
    }
}
