//! Centralized server configuration.
//!
//! Loaded via the `config` crate from `SWITCHBOARD_`-prefixed environment
//! variables. Nested sections use a double underscore, for example
//! `SWITCHBOARD_CACHE__MAX_AGE_SECONDS`.
//!
//! See [`CacheConfig`] and [`DispatchConfig`] for the library sections.

use serde::Deserialize;
use switchboard_cache::CacheConfig;
use switchboard_dispatch::DispatchConfig;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Externally reachable base URL. Tool server URLs handed to the
    /// platform are built from it.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Shared secret the platform sends in `x-vapi-secret`.
    /// When unset every webhook request is accepted.
    #[serde(default)]
    pub secret: Option<String>,

    /// Session cache and reaper settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Event dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            secret: None,
            cache: CacheConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SWITCHBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// URL the platform posts webhooks to.
    #[must_use]
    pub fn webhook_url(&self) -> String {
        format!("{}/webhook", self.public_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_has_correct_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.secret.is_none());
        assert_eq!(config.cache.max_age_seconds, 3600);
        assert_eq!(config.cache.reap_interval_seconds, 60);
        assert!(config.cache.reap_enabled);
    }

    #[test]
    fn empty_source_deserializes_to_defaults() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.public_url, "http://localhost:8080");
        assert_eq!(config.cache.max_age_seconds, 3600);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let config: ServerConfig = config::Config::builder()
            .set_override("secret", "s3cret")
            .unwrap()
            .set_override("cache.max_age_seconds", 120)
            .unwrap()
            .set_override("cache.reap_enabled", false)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.cache.max_age_seconds, 120);
        assert!(!config.cache.reap_enabled);
        assert_eq!(config.cache.reap_interval_seconds, 60);
    }

    #[test]
    fn webhook_url_trims_trailing_slash() {
        let config = ServerConfig {
            public_url: "https://example.test/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.webhook_url(), "https://example.test/webhook");
    }
}
