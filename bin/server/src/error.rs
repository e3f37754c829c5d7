//! Error types for server operations.
//!
//! `WebhookError` is what route handlers return and maps onto HTTP
//! responses. The others are produced by pluggable collaborators and are
//! wrapped in rootcause reports until a handler turns them into a
//! `WebhookError`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Errors surfaced by the HTTP routes.
#[derive(Debug)]
pub enum WebhookError {
    /// The shared secret header was missing or wrong.
    Unauthorized,
    /// The body was not a usable platform message.
    InvalidPayload { details: String },
    /// The assistant configuration could not be built.
    BuildFailed { details: String },
    /// No call placer is configured.
    PlacementUnavailable,
    /// The platform refused or failed to place the call.
    PlacementFailed { details: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "invalid or missing webhook secret"),
            Self::InvalidPayload { details } => write!(f, "invalid payload: {details}"),
            Self::BuildFailed { details } => {
                write!(f, "failed to build assistant: {details}")
            }
            Self::PlacementUnavailable => write!(f, "outbound calls are not configured"),
            Self::PlacementFailed { details } => {
                write!(f, "failed to place outbound call: {details}")
            }
        }
    }
}

impl std::error::Error for WebhookError {}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Self::BuildFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PlacementUnavailable => StatusCode::NOT_IMPLEMENTED,
            Self::PlacementFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs.
        let message = match &self {
            Self::BuildFailed { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Errors from building an assistant configuration.
#[derive(Debug)]
pub enum BuildError {
    /// A tool could not be registered in the session cache.
    ToolRegistration { tool: String, details: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolRegistration { tool, details } => {
                write!(f, "failed to register tool '{tool}': {details}")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Errors from tool execution.
#[derive(Debug)]
pub enum ToolError {
    /// The arguments did not match what the tool expects.
    InvalidArguments { details: String },
    /// The tool ran and failed.
    ExecutionFailed { details: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments { details } => write!(f, "invalid arguments: {details}"),
            Self::ExecutionFailed { details } => write!(f, "tool failed: {details}"),
        }
    }
}

impl std::error::Error for ToolError {}

/// Errors from placing an outbound call.
#[derive(Debug)]
pub enum OutboundError {
    /// The placement request failed.
    RequestFailed { details: String },
    /// The platform's answer had no usable call ID.
    InvalidResponse { details: String },
}

impl fmt::Display for OutboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { details } => write!(f, "call placement failed: {details}"),
            Self::InvalidResponse { details } => {
                write!(f, "invalid call placement response: {details}")
            }
        }
    }
}

impl std::error::Error for OutboundError {}

/// Errors that stop the server from starting or running.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The listen address could not be bound.
    Bind { addr: String, details: String },
    /// The HTTP server failed.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind to {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_error_status_codes() {
        assert_eq!(WebhookError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            WebhookError::InvalidPayload {
                details: "x".to_string()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::PlacementUnavailable.status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn build_error_display() {
        let err = BuildError::ToolRegistration {
            tool: "echo".to_string(),
            details: "duplicate".to_string(),
        };
        assert!(err.to_string().contains("'echo'"));
    }

    #[test]
    fn server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:1".to_string(),
            details: "in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:1"));
    }
}
