//! Folds chat events into an ordered message list.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::types::{user_message_id, ChatEvent, EventEnvelope, Message, Role};

use super::content_index::ContentIndex;

/// What an empty `content.snapshot` does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmptySnapshotPolicy {
    /// No mutation at all.
    Ignore,
    /// Create the message (with empty text) when it does not exist yet.
    CreateMessage,
}

/// Options that differ between live folding and history rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerOptions {
    pub empty_snapshot: EmptySnapshotPolicy,
}

impl ReducerOptions {
    pub fn live() -> Self {
        Self {
            empty_snapshot: EmptySnapshotPolicy::Ignore,
        }
    }

    pub fn historical() -> Self {
        Self {
            empty_snapshot: EmptySnapshotPolicy::CreateMessage,
        }
    }
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self::live()
    }
}

/// Progress of the current assistant turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    Idle,
    Thinking,
    Streaming,
    Ended,
}

/// Side effects of one `apply` that live outside the message list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// Conversation identity carried by the event.
    pub chat_id: Option<String>,
    pub status: Option<TurnStatus>,
    pub turn_ended: bool,
    /// Id of the message created or changed.
    pub message_id: Option<String>,
}

/// Insertion-ordered messages with id lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageList {
    messages: Vec<Message>,
    positions: HashMap<String, usize>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.positions.get(id).map(|&pos| &self.messages[pos])
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }

    /// Replace the text of `id`, inserting at the end when new.
    pub fn upsert_text(
        &mut self,
        id: &str,
        role: Role,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let message = self.entry(id, role, timestamp);
        message.text.clear();
        message.text.push_str(text);
    }

    /// Append to the text of `id`, inserting an empty message when new.
    pub fn append_text(
        &mut self,
        id: &str,
        role: Role,
        delta: &str,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.entry(id, role, timestamp).text.push_str(delta);
    }

    /// Make sure `id` exists without touching its text.
    pub fn ensure(&mut self, id: &str, role: Role, timestamp: Option<DateTime<Utc>>) {
        self.entry(id, role, timestamp);
    }

    fn entry(&mut self, id: &str, role: Role, timestamp: Option<DateTime<Utc>>) -> &mut Message {
        let pos = match self.positions.get(id) {
            Some(&pos) => pos,
            None => {
                self.messages
                    .push(Message::new(id, role, String::new()).with_timestamp(timestamp));
                self.positions.insert(id.to_string(), self.messages.len() - 1);
                self.messages.len() - 1
            }
        };
        let message = &mut self.messages[pos];
        if message.timestamp.is_none() {
            message.timestamp = timestamp;
        }
        message
    }
}

impl<'a> IntoIterator for &'a MessageList {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Apply one event to the accumulators.
///
/// Never fails: unrecognized events are ignored and malformed fields have
/// already been defaulted during envelope parsing.
pub fn apply(
    envelope: &EventEnvelope,
    messages: &mut MessageList,
    index: &mut ContentIndex,
    options: &ReducerOptions,
) -> Effects {
    let timestamp = envelope.timestamp;
    let mut effects = Effects {
        chat_id: envelope.chat_id.clone(),
        ..Effects::default()
    };

    match &envelope.event {
        ChatEvent::RequestQuery {
            request_id,
            message,
        } => {
            let request_id = request_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let id = user_message_id(&request_id);
            messages.upsert_text(&id, Role::User, message, timestamp);
            effects.message_id = Some(id);
        }
        ChatEvent::RunStart => {
            effects.status = Some(TurnStatus::Thinking);
        }
        ChatEvent::RunComplete => {
            effects.status = Some(TurnStatus::Ended);
            effects.turn_ended = true;
        }
        ChatEvent::RunError { error } => {
            let id = system_message_id("error", messages);
            let text = format!("Error: {}", describe_error(error.as_ref()));
            messages.upsert_text(&id, Role::System, &text, timestamp);
            effects.message_id = Some(id);
            effects.status = Some(TurnStatus::Ended);
            effects.turn_ended = true;
        }
        ChatEvent::RunCancel { error } => {
            let id = system_message_id("cancel", messages);
            let text = match error {
                Some(reason) => format!("Request cancelled: {}", describe_error(Some(reason))),
                None => "Request cancelled".to_string(),
            };
            messages.upsert_text(&id, Role::System, &text, timestamp);
            effects.message_id = Some(id);
            effects.status = Some(TurnStatus::Ended);
            effects.turn_ended = true;
        }
        ChatEvent::ContentStart { content_id, text } => {
            let id = index.resolve(content_id);
            messages.upsert_text(&id, Role::Assistant, text, timestamp);
            effects.message_id = Some(id);
            effects.status = Some(TurnStatus::Streaming);
        }
        ChatEvent::ContentDelta { content_id, delta } => {
            let id = index.resolve(content_id);
            messages.append_text(&id, Role::Assistant, delta, timestamp);
            effects.message_id = Some(id);
            effects.status = Some(TurnStatus::Streaming);
        }
        ChatEvent::ContentSnapshot { content_id, text } => {
            let id = index.resolve(content_id);
            match text.as_deref() {
                Some(text) if !text.is_empty() => {
                    messages.upsert_text(&id, Role::Assistant, text, timestamp);
                    effects.message_id = Some(id);
                }
                _ => {
                    if options.empty_snapshot == EmptySnapshotPolicy::CreateMessage
                        && messages.get(&id).is_none()
                    {
                        messages.ensure(&id, Role::Assistant, timestamp);
                        effects.message_id = Some(id);
                    }
                }
            }
            effects.status = Some(TurnStatus::Streaming);
        }
        ChatEvent::ContentEnd { content_id } => {
            let id = index.resolve(content_id);
            messages.ensure(&id, Role::Assistant, timestamp);
            effects.message_id = Some(id);
        }
        ChatEvent::Unrecognized { event_type } => {
            tracing::trace!(event_type = %event_type, "Ignoring unrecognized event");
        }
    }

    effects
}

/// Unique per occurrence, yet identical across replays of the same events:
/// the list only grows, so its length never repeats.
fn system_message_id(kind: &str, messages: &MessageList) -> String {
    format!("system:{kind}:{}", messages.len())
}

/// Human-readable rendering of an error payload.
pub fn describe_error(error: Option<&Value>) -> String {
    let Some(error) = error else {
        return "Something went wrong".to_string();
    };

    match error {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Object(map) => {
            let message = ["message", "msg", "detail"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .filter(|m| !m.trim().is_empty());
            let code = map.get("code").filter(|c| !c.is_null()).map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            match (message, code) {
                (Some(message), Some(code)) => format!("{message} ({code})"),
                (Some(message), None) => message.to_string(),
                (None, _) => error.to_string(),
            }
        }
        Value::Null => "Something went wrong".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(value: Value) -> EventEnvelope {
        EventEnvelope::from_value(&value).unwrap()
    }

    fn fold(events: &[Value], options: ReducerOptions) -> MessageList {
        let mut messages = MessageList::new();
        let mut index = ContentIndex::new();
        for event in events {
            apply(&env(event.clone()), &mut messages, &mut index, &options);
        }
        messages
    }

    #[test]
    fn request_query_upserts_instead_of_appending() {
        let messages = fold(
            &[
                json!({"type": "request.query", "requestId": "r1", "message": "hi"}),
                json!({"type": "request.query", "requestId": "r1", "message": "hi again"}),
            ],
            ReducerOptions::live(),
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages.get("user:r1").unwrap().text, "hi again");
    }

    #[test]
    fn missing_request_id_is_synthesized() {
        let messages = fold(
            &[json!({"type": "request.query", "message": "hi"})],
            ReducerOptions::live(),
        );
        let message = &messages.as_slice()[0];
        assert!(message.id.starts_with("user:"));
        assert!(message.id.len() > "user:".len());
        assert_eq!(message.role, Role::User);
    }

    #[test]
    fn start_replaces_and_delta_appends() {
        let messages = fold(
            &[
                json!({"type": "content.delta", "contentId": "c1", "delta": "zzz"}),
                json!({"type": "content.start", "contentId": "c1", "text": "He"}),
                json!({"type": "content.delta", "contentId": "c1", "delta": "llo"}),
            ],
            ReducerOptions::live(),
        );
        assert_eq!(messages.get("assistant:c1").unwrap().text, "Hello");
    }

    #[test]
    fn empty_snapshot_is_a_noop_when_live() {
        let messages = fold(
            &[json!({"type": "content.snapshot", "contentId": "c1", "text": ""})],
            ReducerOptions::live(),
        );
        assert!(messages.is_empty());
    }

    #[test]
    fn empty_snapshot_creates_message_in_history() {
        let messages = fold(
            &[json!({"type": "content.snapshot", "contentId": "c1", "text": ""})],
            ReducerOptions::historical(),
        );
        assert_eq!(messages.get("assistant:c1").unwrap().text, "");
    }

    #[test]
    fn empty_snapshot_never_clears_existing_text() {
        let messages = fold(
            &[
                json!({"type": "content.start", "contentId": "c1", "text": "keep"}),
                json!({"type": "content.snapshot", "contentId": "c1"}),
            ],
            ReducerOptions::historical(),
        );
        assert_eq!(messages.get("assistant:c1").unwrap().text, "keep");
    }

    #[test]
    fn content_end_ensures_message_exists() {
        let messages = fold(
            &[json!({"type": "content.end", "contentId": "c9"})],
            ReducerOptions::live(),
        );
        assert_eq!(messages.get("assistant:c9").unwrap().text, "");
    }

    #[test]
    fn errors_and_cancels_get_distinct_system_messages() {
        let messages = fold(
            &[
                json!({"type": "run.error", "error": {"message": "quota exceeded", "code": 429}}),
                json!({"type": "run.error", "error": "boom"}),
                json!({"type": "run.cancel"}),
            ],
            ReducerOptions::live(),
        );
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Error: quota exceeded (429)", "Error: boom", "Request cancelled"]
        );
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["system:error:0", "system:error:1", "system:cancel:2"]);
        assert!(messages.iter().all(|m| m.role == Role::System));
    }

    #[test]
    fn lifecycle_effects() {
        let mut messages = MessageList::new();
        let mut index = ContentIndex::new();
        let options = ReducerOptions::live();

        let effects = apply(
            &env(json!({"type": "run.start", "chatId": "chat-1"})),
            &mut messages,
            &mut index,
            &options,
        );
        assert_eq!(effects.status, Some(TurnStatus::Thinking));
        assert_eq!(effects.chat_id.as_deref(), Some("chat-1"));
        assert!(!effects.turn_ended);

        let effects = apply(
            &env(json!({"type": "run.complete"})),
            &mut messages,
            &mut index,
            &options,
        );
        assert!(effects.turn_ended);
        assert!(messages.is_empty());
    }

    #[test]
    fn unrecognized_events_change_nothing() {
        let mut messages = MessageList::new();
        let mut index = ContentIndex::new();
        let effects = apply(
            &env(json!({"type": "tool.progress", "chatId": "chat-2"})),
            &mut messages,
            &mut index,
            &ReducerOptions::live(),
        );
        assert!(messages.is_empty());
        assert!(index.is_empty());
        assert_eq!(effects.chat_id.as_deref(), Some("chat-2"));
        assert!(effects.message_id.is_none());
    }

    #[test]
    fn describe_error_falls_back_to_json() {
        assert_eq!(describe_error(None), "Something went wrong");
        assert_eq!(describe_error(Some(&json!({"reason": 1}))), "{\"reason\":1}");
        assert_eq!(describe_error(Some(&json!(503))), "503");
    }
}
