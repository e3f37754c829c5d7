//! Outbound call placement.
//!
//! The assistant is built before the platform knows about the call, so its
//! tools are registered under a provisional session ID. Once the platform
//! answers with its call ID the session is renamed, and later webhooks for
//! that call find their bindings under the call ID.

use crate::error::{OutboundError, WebhookError};
use crate::secret;
use crate::state::AppState;
use crate::webhook::{build_assistant, rekey};
use async_trait::async_trait;
use axum::{Json, extract::State, http::HeaderMap};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use switchboard_core::CallId;
use tracing::{info, warn};

/// Body of `POST /calls/outbound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallRequest {
    /// Number to dial, E.164.
    pub phone_number: String,
    /// Opaque data passed through to the assistant builder.
    #[serde(default)]
    pub metadata: JsonValue,
}

/// Reply to a placed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallResponse {
    /// The platform's call ID; the session now lives under it.
    pub call_id: String,
    /// The provisional session ID the assistant was built under.
    pub session_id: String,
}

/// Asks the platform to place a call.
#[async_trait]
pub trait CallPlacer: Send + Sync {
    /// Places a call running `assistant` and returns the platform's call ID.
    async fn place_call(
        &self,
        request: &OutboundCallRequest,
        assistant: JsonValue,
    ) -> Result<CallId, Report<OutboundError>>;
}

/// Reads the call ID out of the platform's create-call reply.
///
/// For [`CallPlacer`] implementations talking to the platform's API.
///
/// # Errors
///
/// Returns [`OutboundError::InvalidResponse`] when `id` is missing, not a
/// string or empty.
pub fn call_id_from_response(body: &JsonValue) -> Result<CallId, Report<OutboundError>> {
    match body.get("id").and_then(JsonValue::as_str) {
        Some(id) if !id.is_empty() => Ok(CallId::new(id)),
        _ => Err(OutboundError::InvalidResponse {
            details: format!("no call id in {body}"),
        }
        .into()),
    }
}

/// Handles `POST /calls/outbound`.
pub async fn place(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<OutboundCallRequest>,
) -> Result<Json<OutboundCallResponse>, WebhookError> {
    if !secret::verify(state.secret.as_deref(), &headers) {
        warn!("rejected outbound call request with invalid secret");
        return Err(WebhookError::Unauthorized);
    }
    let placer = state
        .placer
        .as_ref()
        .ok_or(WebhookError::PlacementUnavailable)?;

    let request_json = serde_json::to_value(&request).map_err(|e| WebhookError::InvalidPayload {
        details: e.to_string(),
    })?;
    let (scope, assistant) = build_assistant(&state, &request_json)?;
    let session_key = scope.key().clone();

    // On failure the provisional session is left for the reaper.
    let call_id = placer
        .place_call(&request, assistant)
        .await
        .map_err(|e| {
            warn!(session = %session_key, error = %e, "outbound call placement failed");
            WebhookError::PlacementFailed {
                details: e.to_string(),
            }
        })?;

    rekey(&state, &session_key, &call_id);
    info!(call_id = %call_id, session = %session_key, tools = scope.registered(), "outbound call placed");

    Ok(Json(OutboundCallResponse {
        call_id: call_id.to_string(),
        session_id: session_key.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_id_is_read_from_reply() {
        let id = call_id_from_response(&json!({"id": "call-9", "status": "queued"})).unwrap();
        assert_eq!(id, CallId::new("call-9"));
    }

    #[test]
    fn reply_without_usable_id_is_rejected() {
        assert!(call_id_from_response(&json!({"status": "queued"})).is_err());
        assert!(call_id_from_response(&json!({"id": ""})).is_err());
        let err = call_id_from_response(&json!({"id": 42})).unwrap_err();
        assert!(err.to_string().contains("invalid call placement response"));
    }
}
