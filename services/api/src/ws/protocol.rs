//! Message formats on both sides of the relay.
//!
//! Client envelopes are only classified, never re-encoded: whatever the
//! browser sent is what the model receives. Server frames are likewise
//! forwarded untouched; this module only peeks into them for tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// A message received from the browser, classified by its top-level key.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEnvelope {
    RealtimeInput,
    ClientContent,
    Setup(SetupInfo),
    /// Not JSON, not an object, or none of the known keys.
    Unexpected,
}

/// Attribution metadata sent by the client once it knows its run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetupInfo {
    pub run_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ClientEnvelope {
    pub fn parse(raw: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
            return ClientEnvelope::Unexpected;
        };
        if map.contains_key("realtimeInput") {
            ClientEnvelope::RealtimeInput
        } else if map.contains_key("clientContent") {
            ClientEnvelope::ClientContent
        } else if let Some(setup) = map.get("setup") {
            serde_json::from_value(setup.clone())
                .map(ClientEnvelope::Setup)
                .unwrap_or(ClientEnvelope::Unexpected)
        } else {
            ClientEnvelope::Unexpected
        }
    }
}

/// `{"status": "..."}` notices pushed to the browser.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusMessage {
    pub status: String,
}

impl StatusMessage {
    pub fn ready() -> Self {
        Self {
            status: "Backend is ready for conversation".to_string(),
        }
    }

    pub fn retrying(wait: Duration) -> Self {
        Self {
            status: format!(
                "Model connection error, retrying in {} seconds...",
                wait.as_secs()
            ),
        }
    }
}

/// One function the model wants executed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    tool_call: Option<ToolCall>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCall {
    #[serde(default)]
    function_calls: Option<Vec<Value>>,
}

/// Extracts the function calls of a server frame.
///
/// Returns `None` when the frame carries no `toolCall` (or is not JSON at
/// all); a `toolCall` without `functionCalls` yields an empty list. Entries
/// are decoded one by one so a malformed call does not hide its siblings.
pub fn tool_calls(frame: &[u8]) -> Option<Vec<FunctionCall>> {
    let message = match serde_json::from_slice::<ServerMessage>(frame) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Server frame is not a decodable message");
            return None;
        }
    };
    let entries = message.tool_call?.function_calls.unwrap_or_default();
    Some(
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<FunctionCall>(entry.clone()) {
                Ok(call) => Some(call),
                Err(e) => {
                    warn!(error = %e, call = %entry, "Skipping malformed function call");
                    None
                }
            })
            .collect(),
    )
}

/// `{"toolResponse": {"functionResponses": [...]}}`, sent back to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseEnvelope {
    pub tool_response: ToolResponse,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

impl ToolResponseEnvelope {
    pub fn single(id: Option<String>, name: String, response: Value) -> Self {
        Self {
            tool_response: ToolResponse {
                function_responses: vec![FunctionResponse { id, name, response }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_envelope_classification() {
        assert_eq!(
            ClientEnvelope::parse(r#"{"realtimeInput":{"mediaChunks":[]}}"#),
            ClientEnvelope::RealtimeInput
        );
        assert_eq!(
            ClientEnvelope::parse(r#"{"clientContent":{"turns":[]}}"#),
            ClientEnvelope::ClientContent
        );
        assert_eq!(
            ClientEnvelope::parse(r#"{"setup":{"run_id":"r1","user_id":"u1"}}"#),
            ClientEnvelope::Setup(SetupInfo {
                run_id: "r1".into(),
                user_id: Some("u1".into()),
            })
        );
    }

    #[test]
    fn test_unexpected_client_input() {
        assert_eq!(ClientEnvelope::parse("not json"), ClientEnvelope::Unexpected);
        assert_eq!(ClientEnvelope::parse("[1,2]"), ClientEnvelope::Unexpected);
        assert_eq!(ClientEnvelope::parse(r#"{"hello":1}"#), ClientEnvelope::Unexpected);
        // A setup without a run id cannot be attributed.
        assert_eq!(
            ClientEnvelope::parse(r#"{"setup":{"user_id":"u1"}}"#),
            ClientEnvelope::Unexpected
        );
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            serde_json::to_string(&StatusMessage::ready()).unwrap(),
            r#"{"status":"Backend is ready for conversation"}"#
        );
        assert_eq!(
            StatusMessage::retrying(Duration::from_secs(4)).status,
            "Model connection error, retrying in 4 seconds..."
        );
    }

    #[test]
    fn test_tool_calls_extraction() {
        let frame = br#"{"toolCall":{"functionCalls":[
            {"id":"c1","name":"cancel_flight_tool","args":{"ticket_number":"TK1"}},
            {"id":"c2","name":"baggage_info_tool"}
        ]}}"#;
        let calls = tool_calls(frame).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("c1"));
        assert_eq!(calls[0].args.as_ref().unwrap()["ticket_number"], "TK1");
        assert_eq!(calls[1].name.as_deref(), Some("baggage_info_tool"));
        assert!(calls[1].args.is_none());

        assert_eq!(tool_calls(br#"{"toolCall":{}}"#), Some(vec![]));
        assert_eq!(tool_calls(br#"{"serverContent":{"turnComplete":true}}"#), None);
        assert_eq!(tool_calls(b"\x00\x01binary"), None);
    }

    #[test]
    fn test_malformed_call_does_not_drop_its_siblings() {
        let frame = br#"{"toolCall":{"functionCalls":[
            {"id":7,"name":"cancel_flight_tool"},
            {"id":"c2","name":"baggage_info_tool"},
            {"id":"c3","name":"open_ticket_tool","args":"x"},
            {"id":"c4","name":"transfer_support_tool","args":{}}
        ]}}"#;
        let ids: Vec<_> = tool_calls(frame)
            .unwrap()
            .into_iter()
            .map(|call| call.id.unwrap())
            .collect();
        assert_eq!(ids, vec!["c2", "c4"]);
    }

    #[test]
    fn test_tool_response_envelope_shape() {
        let envelope =
            ToolResponseEnvelope::single(Some("c1".into()), "t".into(), json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"toolResponse": {"functionResponses": [
                {"id": "c1", "name": "t", "response": {"ok": true}}
            ]}})
        );
    }
}
