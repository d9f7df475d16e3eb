//! Wire-level chat events.
//!
//! Events arrive as loosely shaped JSON objects discriminated by `type`.
//! Parsing is lenient: a missing or wrong-typed field falls back to a
//! default instead of rejecting the whole event.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// A recognized event, one variant per `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// `request.query`: the user's outgoing turn.
    RequestQuery {
        request_id: Option<String>,
        message: String,
    },
    /// `run.start`
    RunStart,
    /// `run.complete`
    RunComplete,
    /// `run.error`
    RunError { error: Option<Value> },
    /// `run.cancel`
    RunCancel { error: Option<Value> },
    /// `content.start`: replaces the content with `text`.
    ContentStart { content_id: String, text: String },
    /// `content.delta`: appends `delta`.
    ContentDelta { content_id: String, delta: String },
    /// `content.snapshot`: replaces the content when `text` is non-empty.
    ContentSnapshot {
        content_id: String,
        text: Option<String>,
    },
    /// `content.end`
    ContentEnd { content_id: String },
    /// Any other `type`; ignored by the reducer.
    Unrecognized { event_type: String },
}

impl ChatEvent {
    /// The wire tag for this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::RequestQuery { .. } => "request.query",
            Self::RunStart => "run.start",
            Self::RunComplete => "run.complete",
            Self::RunError { .. } => "run.error",
            Self::RunCancel { .. } => "run.cancel",
            Self::ContentStart { .. } => "content.start",
            Self::ContentDelta { .. } => "content.delta",
            Self::ContentSnapshot { .. } => "content.snapshot",
            Self::ContentEnd { .. } => "content.end",
            Self::Unrecognized { event_type } => event_type,
        }
    }

    /// The `contentId` for content events.
    pub fn content_id(&self) -> Option<&str> {
        match self {
            Self::ContentStart { content_id, .. }
            | Self::ContentDelta { content_id, .. }
            | Self::ContentSnapshot { content_id, .. }
            | Self::ContentEnd { content_id } => Some(content_id),
            _ => None,
        }
    }
}

/// An event together with the fields every event may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub chat_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub event: ChatEvent,
}

impl EventEnvelope {
    pub fn new(event: ChatEvent) -> Self {
        Self {
            chat_id: None,
            timestamp: None,
            event,
        }
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build an envelope from a decoded JSON object.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let event_type = string_field(object, "type").unwrap_or_default();
        let content_id = || string_field(object, "contentId").unwrap_or_default();

        let event = match event_type.as_str() {
            "request.query" => ChatEvent::RequestQuery {
                request_id: string_field(object, "requestId").filter(|id| !id.is_empty()),
                message: string_field(object, "message").unwrap_or_default(),
            },
            "run.start" => ChatEvent::RunStart,
            "run.complete" => ChatEvent::RunComplete,
            "run.error" => ChatEvent::RunError {
                error: present(object.get("error")),
            },
            "run.cancel" => ChatEvent::RunCancel {
                error: present(object.get("error")),
            },
            "content.start" => ChatEvent::ContentStart {
                content_id: content_id(),
                text: string_field(object, "text").unwrap_or_default(),
            },
            "content.delta" => ChatEvent::ContentDelta {
                content_id: content_id(),
                delta: string_field(object, "delta").unwrap_or_default(),
            },
            "content.snapshot" => ChatEvent::ContentSnapshot {
                content_id: content_id(),
                text: string_field(object, "text"),
            },
            "content.end" => ChatEvent::ContentEnd {
                content_id: content_id(),
            },
            _ => ChatEvent::Unrecognized { event_type },
        };

        Self {
            chat_id: string_field(object, "chatId").filter(|id| !id.is_empty()),
            timestamp: object.get("timestamp").and_then(parse_timestamp),
            event,
        }
    }

    /// Build an envelope from any JSON value, rejecting non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(Self::from_object)
    }
}

/// Accepts epoch milliseconds (integer or float) or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                let millis = raw.parse::<i64>().ok()?;
                Utc.timestamp_millis_opt(millis).single()
            }),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        // Ids occasionally arrive as numbers.
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}
