//! Tools the assistant can call back into.
//!
//! A [`ToolBinding`] is what the session cache holds: the declaration sent
//! to the platform plus the handler that runs when the platform invokes it.

use crate::error::ToolError;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::sync::Arc;

/// Executes one tool invocation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with the arguments the model supplied.
    async fn call(&self, arguments: JsonValue) -> Result<JsonValue, Report<ToolError>>;
}

/// A registered tool: its declaration and its handler.
#[derive(Clone)]
pub struct ToolBinding {
    name: String,
    description: String,
    parameters: JsonValue,
    handler: Arc<dyn ToolHandler>,
}

impl ToolBinding {
    /// Creates a binding with an empty parameter schema.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object", "properties": {}}),
            handler,
        }
    }

    /// Sets the JSON schema of the tool's arguments.
    #[must_use]
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns the tool name the model calls it by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the function declaration in the platform's format.
    #[must_use]
    pub fn function_spec(&self) -> JsonValue {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn invoke(&self, arguments: JsonValue) -> Result<JsonValue, Report<ToolError>> {
        self.handler.call(arguments).await
    }
}

impl fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Echoes its `text` argument back.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTool;

impl EchoTool {
    /// The binding for this tool.
    #[must_use]
    pub fn binding() -> ToolBinding {
        ToolBinding::new("echo", "Repeats the given text back", Arc::new(Self)).with_parameters(
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to repeat"}
                },
                "required": ["text"]
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, arguments: JsonValue) -> Result<JsonValue, Report<ToolError>> {
        let text = arguments
            .get("text")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                details: "missing string field 'text'".to_string(),
            })?;
        Ok(JsonValue::String(text.to_string()))
    }
}
