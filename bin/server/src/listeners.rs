//! Listeners the server registers on the event dispatcher.

use serde_json::Value as JsonValue;
use switchboard_dispatch::{Listeners, RequestType};
use tracing::{debug, info, warn};

fn field<'a>(payload: &'a JsonValue, pointer: &str) -> &'a str {
    payload
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown")
}

/// Logs call lifecycle messages and webhook responses.
#[must_use]
pub fn logging_listeners() -> Listeners {
    let mut listeners = Listeners::new();
    listeners
        .on_every_request(|event| async move {
            debug!(request_type = %event.request_type, received_at = %event.received_at, "webhook request");
            Ok(())
        })
        .on_request_of_type(RequestType::StatusUpdate, |event| async move {
            info!(
                call_id = field(&event.payload, "/message/call/id"),
                status = field(&event.payload, "/message/status"),
                "call status update"
            );
            Ok(())
        })
        .on_request_of_type(RequestType::EndOfCallReport, |event| async move {
            info!(
                call_id = field(&event.payload, "/message/call/id"),
                ended_reason = field(&event.payload, "/message/endedReason"),
                "call ended"
            );
            Ok(())
        })
        .on_every_response(|delivery| async move {
            let elapsed_ms = u64::try_from(delivery.elapsed.as_millis()).unwrap_or(u64::MAX);
            match delivery.payload() {
                Ok(_) => debug!(request_type = %delivery.request_type, elapsed_ms, "webhook response"),
                Err(reason) => warn!(
                    request_type = %delivery.request_type,
                    elapsed_ms,
                    reason,
                    "webhook response failed"
                ),
            }
            Ok(())
        });
    listeners
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registers_lifecycle_listeners() {
        assert_eq!(logging_listeners().len(), 4);
    }

    #[test]
    fn missing_fields_read_as_unknown() {
        let payload = json!({"message": {"status": "ended"}});
        assert_eq!(field(&payload, "/message/status"), "ended");
        assert_eq!(field(&payload, "/message/call/id"), "unknown");
    }
}
