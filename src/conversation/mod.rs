//! Conversation state built from the event stream.
//!
//! The reducer itself ([`reducer::apply`]) is a plain function over two
//! caller-owned accumulators. [`Conversation`] bundles those accumulators
//! for one scope and tracks the externally observed chat id and turn status.

pub mod content_index;
pub mod history;
pub mod reducer;

pub use content_index::ContentIndex;
pub use history::{rebuild, rebuild_from_values};
pub use reducer::{
    apply, describe_error, Effects, EmptySnapshotPolicy, MessageList, ReducerOptions, TurnStatus,
};

use std::fmt;
use std::sync::Arc;

use crate::config::ChatflowConfig;
use crate::types::{EventEnvelope, Message};

/// Receives state changes that live outside the message list.
pub trait ConversationObserver: Send + Sync {
    /// The current conversation identity changed.
    fn on_chat_id(&self, _chat_id: &str) {}
    /// The turn status changed.
    fn on_status(&self, _status: TurnStatus) {}
}

/// Messages, content index and status for one fold scope.
pub struct Conversation {
    messages: MessageList,
    index: ContentIndex,
    options: ReducerOptions,
    chat_id: Option<String>,
    status: TurnStatus,
    observer: Option<Arc<dyn ConversationObserver>>,
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.messages.len())
            .field("index", &self.index.len())
            .field("options", &self.options)
            .field("chat_id", &self.chat_id)
            .field("status", &self.status)
            .field("observer", &self.observer.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ReducerOptions::live())
    }
}

impl Conversation {
    pub fn new(options: ReducerOptions) -> Self {
        Self {
            messages: MessageList::new(),
            index: ContentIndex::new(),
            options,
            chat_id: None,
            status: TurnStatus::Idle,
            observer: None,
        }
    }

    /// A conversation folding live turns, using the configured policy.
    pub fn live(config: &ChatflowConfig) -> Self {
        Self::new(ReducerOptions {
            empty_snapshot: config.live_empty_snapshot,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Start a new assistant turn; content ids from earlier turns are forgotten.
    pub fn begin_turn(&mut self) {
        self.index.reset();
        self.set_status(TurnStatus::Idle);
    }

    /// Apply one event in arrival order.
    pub fn apply(&mut self, envelope: &EventEnvelope) -> Effects {
        let effects = apply(envelope, &mut self.messages, &mut self.index, &self.options);

        if let Some(chat_id) = effects.chat_id.as_deref() {
            if self.chat_id.as_deref() != Some(chat_id) {
                tracing::debug!(chat_id, "Conversation identity changed");
                self.chat_id = Some(chat_id.to_string());
                if let Some(observer) = &self.observer {
                    observer.on_chat_id(chat_id);
                }
            }
        }
        if let Some(status) = effects.status {
            self.set_status(status);
        }

        effects
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.as_slice()
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    pub fn is_turn_active(&self) -> bool {
        matches!(self.status, TurnStatus::Thinking | TurnStatus::Streaming)
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages.into_vec()
    }

    fn set_status(&mut self, status: TurnStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        if let Some(observer) = &self.observer {
            observer.on_status(status);
        }
    }
}
