//! Assistant configuration building.
//!
//! A builder produces the assistant JSON returned to the platform. Every
//! tool it declares is registered through the response's
//! [`SessionScope`], and the tool's server URL carries the issued sub ID so
//! the later `tool-calls` webhook can find the binding again.

use crate::error::BuildError;
use crate::tool::{EchoTool, ToolBinding};
use rootcause::Report;
use serde_json::{Value as JsonValue, json};
use switchboard_cache::SessionScope;
use switchboard_core::SessionKey;

/// Query parameter the sub ID travels in.
pub const SUB_ID_PARAM: &str = "subId";

/// What a builder sees while building one response.
pub struct AssistantContext<'a> {
    scope: &'a SessionScope<ToolBinding>,
    webhook_url: &'a str,
    request: &'a JsonValue,
}

impl<'a> AssistantContext<'a> {
    /// Creates a context over an open scope.
    #[must_use]
    pub fn new(
        scope: &'a SessionScope<ToolBinding>,
        webhook_url: &'a str,
        request: &'a JsonValue,
    ) -> Self {
        Self {
            scope,
            webhook_url,
            request,
        }
    }

    /// The session the response belongs to.
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        self.scope.key()
    }

    /// The inbound payload that triggered the build.
    #[must_use]
    pub fn request(&self) -> &JsonValue {
        self.request
    }

    /// Registers `binding` and returns its tool declaration, server URL
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ToolRegistration`] if the cache refuses the
    /// binding.
    pub fn register_tool(&self, binding: ToolBinding) -> Result<JsonValue, Report<BuildError>> {
        let function = binding.function_spec();
        let name = binding.name().to_string();
        let sub_id = self
            .scope
            .register(binding)
            .map_err(|e| BuildError::ToolRegistration {
                tool: name,
                details: e.to_string(),
            })?;

        Ok(json!({
            "type": "function",
            "function": function,
            "server": {
                "url": format!("{}?{SUB_ID_PARAM}={sub_id}", self.webhook_url),
            },
        }))
    }
}

/// Builds the assistant configuration for a session.
pub trait AssistantBuilder: Send + Sync {
    /// Builds the assistant, registering its tools through `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is unusable or a tool cannot be
    /// registered.
    fn build(&self, ctx: &AssistantContext<'_>) -> Result<JsonValue, Report<BuildError>>;
}

/// Minimal assistant exposing the echo tool.
#[derive(Debug, Clone)]
pub struct EchoAssistant {
    name: String,
    first_message: String,
}

impl EchoAssistant {
    /// Creates an assistant with the given display name and greeting.
    #[must_use]
    pub fn new(name: impl Into<String>, first_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            first_message: first_message.into(),
        }
    }
}

impl Default for EchoAssistant {
    fn default() -> Self {
        Self::new("Switchboard", "Hello, what should I repeat?")
    }
}

impl AssistantBuilder for EchoAssistant {
    fn build(&self, ctx: &AssistantContext<'_>) -> Result<JsonValue, Report<BuildError>> {
        let echo = ctx.register_tool(EchoTool::binding())?;
        Ok(json!({
            "assistant": {
                "name": self.name,
                "firstMessage": self.first_message,
                "model": {
                    "provider": "openai",
                    "model": "gpt-4o",
                    "tools": [echo],
                },
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use switchboard_cache::SessionCache;
    use switchboard_core::{CallId, SubId};

    #[test]
    fn echo_assistant_registers_tool_with_sub_id_url() {
        let cache = Arc::new(SessionCache::new());
        let scope = SessionScope::new(Arc::clone(&cache), CallId::new("call-1"));
        let request = json!({});
        let ctx = AssistantContext::new(&scope, "https://example.test/webhook", &request);

        let assistant = EchoAssistant::default().build(&ctx).unwrap();
        let tool = &assistant["assistant"]["model"]["tools"][0];

        assert_eq!(tool["function"]["name"], "echo");
        assert_eq!(tool["server"]["url"], "https://example.test/webhook?subId=0");
        let binding = cache.get(scope.key(), SubId::new(0)).unwrap();
        assert_eq!(binding.name(), "echo");
    }

    #[test]
    fn each_tool_gets_its_own_sub_id() {
        let cache = Arc::new(SessionCache::new());
        let scope = SessionScope::new(Arc::clone(&cache), CallId::new("call-2"));
        let request = json!({});
        let ctx = AssistantContext::new(&scope, "http://h/webhook", &request);

        let first = ctx.register_tool(EchoTool::binding()).unwrap();
        let second = ctx.register_tool(EchoTool::binding()).unwrap();

        assert_eq!(first["server"]["url"], "http://h/webhook?subId=0");
        assert_eq!(second["server"]["url"], "http://h/webhook?subId=1");
        assert_eq!(cache.binding_count(scope.key()), Some(2));
    }
}
