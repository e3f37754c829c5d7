//! Shared state for route handlers.

use crate::assistant::AssistantBuilder;
use crate::config::ServerConfig;
use crate::outbound::CallPlacer;
use crate::tool::ToolBinding;
use std::fmt;
use std::sync::Arc;
use switchboard_cache::SessionCache;
use switchboard_core::SessionIdGenerator;
use switchboard_dispatch::EventPublisher;

/// Application state available to every handler.
pub struct AppState {
    /// Tool bindings of live sessions.
    pub cache: Arc<SessionCache<ToolBinding>>,
    /// Source of provisional session IDs.
    pub session_ids: SessionIdGenerator,
    /// Where request and response events go.
    pub publisher: EventPublisher,
    /// Builds the assistant configuration for new sessions.
    pub builder: Arc<dyn AssistantBuilder>,
    /// Places outbound calls, if the deployment supports them.
    pub placer: Option<Arc<dyn CallPlacer>>,
    /// Expected webhook secret.
    pub secret: Option<String>,
    /// Base URL for tool server URLs.
    pub webhook_url: String,
}

impl AppState {
    /// Creates state without outbound call support.
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        cache: Arc<SessionCache<ToolBinding>>,
        publisher: EventPublisher,
        builder: Arc<dyn AssistantBuilder>,
    ) -> Self {
        Self {
            cache,
            session_ids: SessionIdGenerator::new(),
            publisher,
            builder,
            placer: None,
            secret: config.secret.clone(),
            webhook_url: config.webhook_url(),
        }
    }

    /// Enables outbound calls through `placer`.
    #[must_use]
    pub fn with_placer(mut self, placer: Arc<dyn CallPlacer>) -> Self {
        self.placer = Some(placer);
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.cache.len())
            .field("publisher", &self.publisher)
            .field("outbound", &self.placer.is_some())
            .field("webhook_url", &self.webhook_url)
            .finish_non_exhaustive()
    }
}
