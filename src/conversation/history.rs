//! Rebuilding a conversation from stored events.

use serde_json::Value;

use crate::config::ChatflowConfig;
use crate::types::EventEnvelope;

use super::reducer::ReducerOptions;
use super::Conversation;

/// Fold a historical event list against fresh accumulators.
///
/// One content index spans the whole replay.
pub fn rebuild<I>(events: I, options: ReducerOptions) -> Conversation
where
    I: IntoIterator<Item = EventEnvelope>,
{
    let mut conversation = Conversation::new(options);
    for envelope in events {
        conversation.apply(&envelope);
    }
    conversation
}

/// Like [`rebuild`], from raw JSON values. Non-objects are skipped.
pub fn rebuild_from_values(values: &[Value], config: &ChatflowConfig) -> Conversation {
    let options = ReducerOptions {
        empty_snapshot: config.historical_empty_snapshot,
    };
    rebuild(values.iter().filter_map(EventEnvelope::from_value), options)
}
