//! Convenience re-exports for common use.

pub use crate::auth::{AccessToken, AuthBridge, RefreshCoordinator, RefreshOutcome, TokenRefresher};
pub use crate::config::ChatflowConfig;
pub use crate::conversation::{Conversation, ConversationObserver, ReducerOptions, TurnStatus};
pub use crate::error::{ChatflowError, ErrorCategory, Result};
pub use crate::markdown::BlockStream;
pub use crate::types::{Block, BlockKind, ChatEvent, EventEnvelope, Message, Partition, Role};
