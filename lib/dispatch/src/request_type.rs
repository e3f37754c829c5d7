//! Classification of inbound platform messages.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Kind of server message the platform sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestType {
    AssistantRequest,
    ConversationUpdate,
    EndOfCallReport,
    FunctionCall,
    Hang,
    ModelOutput,
    PhoneCallControl,
    SpeechUpdate,
    StatusUpdate,
    ToolCalls,
    Transcript,
    TransferDestinationRequest,
    UserInterrupted,
    VoiceInput,
    /// Anything this build does not recognize.
    #[serde(other)]
    Unknown,
}

impl RequestType {
    /// Every recognized type, `Unknown` last.
    pub const ALL: [Self; 15] = [
        Self::AssistantRequest,
        Self::ConversationUpdate,
        Self::EndOfCallReport,
        Self::FunctionCall,
        Self::Hang,
        Self::ModelOutput,
        Self::PhoneCallControl,
        Self::SpeechUpdate,
        Self::StatusUpdate,
        Self::ToolCalls,
        Self::Transcript,
        Self::TransferDestinationRequest,
        Self::UserInterrupted,
        Self::VoiceInput,
        Self::Unknown,
    ];

    /// Wire name, as it appears in `message.type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssistantRequest => "assistant-request",
            Self::ConversationUpdate => "conversation-update",
            Self::EndOfCallReport => "end-of-call-report",
            Self::FunctionCall => "function-call",
            Self::Hang => "hang",
            Self::ModelOutput => "model-output",
            Self::PhoneCallControl => "phone-call-control",
            Self::SpeechUpdate => "speech-update",
            Self::StatusUpdate => "status-update",
            Self::ToolCalls => "tool-calls",
            Self::Transcript => "transcript",
            Self::TransferDestinationRequest => "transfer-destination-request",
            Self::UserInterrupted => "user-interrupted",
            Self::VoiceInput => "voice-input",
            Self::Unknown => "unknown",
        }
    }

    /// Reads `message.type` from an inbound payload.
    ///
    /// Missing, non-string or unrecognized values classify as `Unknown`.
    #[must_use]
    pub fn classify(payload: &JsonValue) -> Self {
        payload
            .pointer("/message/type")
            .and_then(JsonValue::as_str)
            .map_or(Self::Unknown, Self::from_wire)
    }

    fn from_wire(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_wire(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_reads_message_type() {
        let payload = json!({"message": {"type": "tool-calls", "toolCallList": []}});
        assert_eq!(RequestType::classify(&payload), RequestType::ToolCalls);
    }

    #[test]
    fn classify_falls_back_to_unknown() {
        assert_eq!(RequestType::classify(&json!({})), RequestType::Unknown);
        assert_eq!(
            RequestType::classify(&json!({"message": {"type": 7}})),
            RequestType::Unknown
        );
        assert_eq!(
            RequestType::classify(&json!({"message": {"type": "brand-new"}})),
            RequestType::Unknown
        );
    }

    #[test]
    fn wire_names_match_serde() {
        for request_type in RequestType::ALL {
            let json = serde_json::to_value(request_type).expect("serialize");
            assert_eq!(json, JsonValue::String(request_type.as_str().to_string()));
        }
    }

    #[test]
    fn unknown_wire_name_deserializes_to_unknown() {
        let parsed: RequestType = serde_json::from_str("\"not-a-type\"").expect("deserialize");
        assert_eq!(parsed, RequestType::Unknown);
    }
}
