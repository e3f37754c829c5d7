//! The platform webhook.
//!
//! Every inbound message is published as a request event before it is
//! handled, and the reply is published as a response event after. Only
//! `assistant-request` and `tool-calls` produce a non-empty reply.

use crate::assistant::{AssistantContext, SUB_ID_PARAM};
use crate::error::WebhookError;
use crate::secret;
use crate::state::AppState;
use crate::tool::ToolBinding;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Instant;
use switchboard_cache::{RenameOutcome, SessionScope};
use switchboard_core::{CallId, SessionKey, SubId};
use switchboard_dispatch::{Event, RequestEvent, RequestType, ResponseError, ResponseEvent};
use tracing::{debug, error, info, warn};

/// Query parameters on the webhook URL.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookParams {
    /// Sub ID of the binding a tool call is for.
    #[serde(rename = "subId")]
    pub sub_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolCallsEnvelope {
    message: ToolCallsMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallsMessage {
    call: Option<CallRef>,
    #[serde(default)]
    tool_call_list: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct CallRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: JsonValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallResult {
    tool_call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ToolCallResult {
    fn ok(tool_call_id: String, value: JsonValue) -> Self {
        let result = match value {
            JsonValue::String(s) => s,
            other => other.to_string(),
        };
        Self {
            tool_call_id,
            result: Some(result),
            error: None,
        }
    }

    fn error(tool_call_id: String, message: impl Into<String>) -> Self {
        Self {
            tool_call_id,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Handles `POST /webhook`.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, WebhookError> {
    if !secret::verify(state.secret.as_deref(), &headers) {
        warn!("rejected webhook with invalid secret");
        return Err(WebhookError::Unauthorized);
    }

    let started = Instant::now();
    let payload: JsonValue =
        serde_json::from_slice(&body).map_err(|e| WebhookError::InvalidPayload {
            details: e.to_string(),
        })?;
    let request_type = RequestType::classify(&payload);
    debug!(%request_type, call_id = ?payload_call_id(&payload), "webhook received");

    publish(&state, RequestEvent::new(request_type, payload.clone()));

    let outcome = match request_type {
        RequestType::AssistantRequest => assistant_request(&state, &payload),
        RequestType::ToolCalls => tool_calls(&state, &payload, params.sub_id.as_deref()).await,
        _ => Ok(json!({})),
    };

    let elapsed = started.elapsed();
    match outcome {
        Ok(response) => {
            publish(
                &state,
                ResponseEvent::serializing(request_type, elapsed, response.clone()),
            );
            Ok(Json(response))
        }
        Err(err) => {
            let reason = err.to_string();
            publish(
                &state,
                ResponseEvent::new(request_type, elapsed, move || {
                    Err(ResponseError::ComputationFailed { reason }.into())
                }),
            );
            Err(err)
        }
    }
}

fn publish(state: &AppState, event: impl Into<Event>) {
    if let Err(e) = state.publisher.publish(event) {
        warn!(error = %e, "event not published");
    }
}

fn payload_call_id(payload: &JsonValue) -> Option<&str> {
    payload.pointer("/message/call/id").and_then(JsonValue::as_str)
}

/// Builds the assistant and files its bindings under the platform's call ID
/// when the request carries one.
///
/// A redelivered request for the same call replaces the earlier bindings.
fn assistant_request(state: &AppState, payload: &JsonValue) -> Result<JsonValue, WebhookError> {
    let (scope, assistant) = build_assistant(state, payload)?;
    if let Some(id) = payload_call_id(payload) {
        rekey(state, scope.key(), &CallId::new(id));
    }
    Ok(assistant)
}

/// Builds an assistant under a fresh provisional session ID.
pub(crate) fn build_assistant(
    state: &AppState,
    request: &JsonValue,
) -> Result<(SessionScope<ToolBinding>, JsonValue), WebhookError> {
    let scope = SessionScope::new(Arc::clone(&state.cache), state.session_ids.next_id());
    let ctx = AssistantContext::new(&scope, &state.webhook_url, request);

    let assistant = state.builder.build(&ctx).map_err(|e| {
        error!(session = %scope.key(), error = %e, "assistant build failed");
        WebhookError::BuildFailed {
            details: e.to_string(),
        }
    })?;
    debug!(session = %scope.key(), tools = scope.registered(), "assistant built");
    Ok((scope, assistant))
}

/// Moves a provisional session onto the platform's call ID.
pub(crate) fn rekey(state: &AppState, from: &SessionKey, call_id: &CallId) {
    let to = SessionKey::from(call_id.clone());
    match state.cache.rename_key(from, &to) {
        RenameOutcome::Renamed => {
            debug!(%from, %to, "session re-keyed to call id");
        }
        RenameOutcome::SourceMissing => {
            debug!(session = %from, "assistant registered no bindings, nothing to re-key");
        }
        RenameOutcome::ReplacedExisting => {
            info!(%call_id, "call id already had a session, replaced");
        }
    }
}

/// Runs each requested tool against the binding the sub ID points at.
///
/// Lookup misses become per-call errors in the reply, never a failed
/// request.
async fn tool_calls(
    state: &AppState,
    payload: &JsonValue,
    sub_id: Option<&str>,
) -> Result<JsonValue, WebhookError> {
    let envelope =
        ToolCallsEnvelope::deserialize(payload).map_err(|e| WebhookError::InvalidPayload {
            details: e.to_string(),
        })?;
    let message = envelope.message;
    let call_id = message
        .call
        .map(|call| call.id)
        .ok_or_else(|| WebhookError::InvalidPayload {
            details: "tool-calls message without call id".to_string(),
        })?;
    let key = SessionKey::from(CallId::new(call_id));

    let lookup = match sub_id.map(str::parse::<SubId>) {
        Some(Ok(sub_id)) => state
            .cache
            .get(&key, sub_id)
            .ok_or_else(|| format!("no tool bound for session {key} sub id {sub_id}")),
        Some(Err(e)) => Err(e.to_string()),
        None => Err(format!("missing {SUB_ID_PARAM} query parameter")),
    };

    let mut results = Vec::with_capacity(message.tool_call_list.len());
    for call in message.tool_call_list {
        let result = match &lookup {
            Ok(binding) => run_tool(binding, call).await,
            Err(reason) => {
                warn!(session = %key, tool = %call.function.name, reason = %reason, "tool lookup failed");
                ToolCallResult::error(call.id, reason.clone())
            }
        };
        results.push(result);
    }

    Ok(json!({ "results": results }))
}

async fn run_tool(binding: &ToolBinding, call: ToolCall) -> ToolCallResult {
    if call.function.name != binding.name() {
        warn!(
            requested = %call.function.name,
            bound = %binding.name(),
            "tool name does not match binding"
        );
        return ToolCallResult::error(
            call.id,
            format!("tool '{}' is not bound to this server url", call.function.name),
        );
    }

    match binding.invoke(normalize_arguments(call.function.arguments)).await {
        Ok(value) => ToolCallResult::ok(call.id, value),
        Err(e) => {
            warn!(tool = %binding.name(), error = %e, "tool call failed");
            ToolCallResult::error(call.id, e.to_string())
        }
    }
}

/// Some platform versions send arguments as a JSON-encoded string.
fn normalize_arguments(arguments: JsonValue) -> JsonValue {
    match arguments {
        JsonValue::String(raw) => serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw)),
        JsonValue::Null => json!({}),
        other => other,
    }
}
