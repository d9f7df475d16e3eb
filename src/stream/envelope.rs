//! JSON envelope extraction for frame payloads.

use serde_json::Value;

use crate::types::EventEnvelope;

/// Decode one frame payload into an event.
///
/// Malformed JSON and non-object values are dropped; a lossy network is
/// expected to produce some of both.
pub fn parse_envelope(payload: &str) -> Option<EventEnvelope> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, len = payload.len(), "Dropping malformed frame");
            return None;
        }
    };

    match EventEnvelope::from_value(&value) {
        Some(envelope) => Some(envelope),
        None => {
            tracing::debug!(kind = json_kind(&value), "Dropping non-object frame");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatEvent;

    #[test]
    fn forwards_objects() {
        let envelope = parse_envelope(r#"{"type":"run.start","chatId":"c1"}"#).unwrap();
        assert_eq!(envelope.event, ChatEvent::RunStart);
        assert_eq!(envelope.chat_id.as_deref(), Some("c1"));
    }

    #[test]
    fn drops_malformed_and_non_objects() {
        assert!(parse_envelope("{\"type\":").is_none());
        assert!(parse_envelope("null").is_none());
        assert!(parse_envelope("42").is_none());
        assert!(parse_envelope("[{\"type\":\"run.start\"}]").is_none());
        assert!(parse_envelope("ping").is_none());
    }
}
