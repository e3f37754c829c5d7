//! Lifecycle events flowing through the dispatcher.

use crate::error::ResponseError;
use crate::request_type::RequestType;
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;

/// Deferred computation of a response payload.
///
/// Runs at most once, on the dispatcher side, and only when the event is
/// actually consumed.
pub type ResponseThunk = Box<dyn FnOnce() -> Result<JsonValue, Report<ResponseError>> + Send>;

/// An inbound request, as received.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub request_type: RequestType,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl RequestEvent {
    /// Creates a request event stamped with the current time.
    #[must_use]
    pub fn new(request_type: RequestType, payload: JsonValue) -> Self {
        Self {
            request_type,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// A computed (or to-be-computed) response to a request.
pub struct ResponseEvent {
    pub request_type: RequestType,
    pub elapsed: Duration,
    thunk: ResponseThunk,
}

impl ResponseEvent {
    /// Creates a response event whose payload is produced by `thunk`.
    pub fn new<F>(request_type: RequestType, elapsed: Duration, thunk: F) -> Self
    where
        F: FnOnce() -> Result<JsonValue, Report<ResponseError>> + Send + 'static,
    {
        Self {
            request_type,
            elapsed,
            thunk: Box::new(thunk),
        }
    }

    /// Creates a response event that serializes `value` when consumed.
    pub fn serializing<T>(request_type: RequestType, elapsed: Duration, value: T) -> Self
    where
        T: Serialize + Send + 'static,
    {
        Self::new(request_type, elapsed, move || {
            serde_json::to_value(value).map_err(|e| {
                ResponseError::SerializationFailed {
                    reason: e.to_string(),
                }
                .into()
            })
        })
    }

    pub(crate) fn into_parts(self) -> (RequestType, Duration, ResponseThunk) {
        (self.request_type, self.elapsed, self.thunk)
    }
}

impl fmt::Debug for ResponseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEvent")
            .field("request_type", &self.request_type)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

/// Anything that can be published to the dispatcher.
#[derive(Debug)]
pub enum Event {
    Request(RequestEvent),
    Response(ResponseEvent),
}

impl Event {
    /// The request type the event is routed by.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Request(event) => event.request_type,
            Self::Response(event) => event.request_type,
        }
    }
}

impl From<RequestEvent> for Event {
    fn from(event: RequestEvent) -> Self {
        Self::Request(event)
    }
}

impl From<ResponseEvent> for Event {
    fn from(event: ResponseEvent) -> Self {
        Self::Response(event)
    }
}

/// Result of evaluating a response thunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The payload was computed.
    Computed(JsonValue),
    /// The computation failed or panicked; handlers see only the reason.
    Failed { reason: String },
}

/// What response listeners receive.
#[derive(Debug, Clone)]
pub struct ResponseDelivery {
    pub request_type: RequestType,
    pub elapsed: Duration,
    pub outcome: ResponseOutcome,
}

impl ResponseDelivery {
    /// The computed payload, or the failure reason.
    pub fn payload(&self) -> Result<&JsonValue, &str> {
        match &self.outcome {
            ResponseOutcome::Computed(value) => Ok(value),
            ResponseOutcome::Failed { reason } => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializing_event_defers_serialization() {
        let event = ResponseEvent::serializing(
            RequestType::ToolCalls,
            Duration::from_millis(12),
            json!({"results": []}),
        );
        let (request_type, elapsed, thunk) = event.into_parts();
        assert_eq!(request_type, RequestType::ToolCalls);
        assert_eq!(elapsed, Duration::from_millis(12));
        assert_eq!(thunk().unwrap(), json!({"results": []}));
    }

    #[test]
    fn event_routes_by_request_type() {
        let event: Event = RequestEvent::new(RequestType::Hang, json!({})).into();
        assert_eq!(event.request_type(), RequestType::Hang);
    }

    #[test]
    fn delivery_payload_exposes_failure_reason() {
        let delivery = ResponseDelivery {
            request_type: RequestType::AssistantRequest,
            elapsed: Duration::ZERO,
            outcome: ResponseOutcome::Failed {
                reason: "nope".to_string(),
            },
        };
        assert_eq!(delivery.payload(), Err("nope"));
    }
}
