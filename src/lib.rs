//! Chatflow: streaming reconciliation core for chat clients.
//!
//! Decodes a server-sent event stream into typed events, folds them into an
//! ordered message list, partitions growing markdown into stable render
//! blocks, and coordinates single-flight credential refresh.
//!
//! # Quick Start
//!
//! ```
//! use chatflow::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> chatflow::error::Result<()> {
//! let config = ChatflowConfig::default();
//! let mut conversation = Conversation::live(&config);
//! let chunks = futures::stream::iter(vec![
//!     Ok::<_, ChatflowError>(
//!         br#"data: {"type":"content.delta","contentId":"c1","delta":"Hi"}"#.to_vec(),
//!     ),
//!     Ok(b"\n\n".to_vec()),
//! ]);
//! let cancel = CancellationToken::new();
//! chatflow::stream::stream_turn(chunks, cancel, &config, &mut conversation).await?;
//! assert_eq!(conversation.messages()[0].text, "Hi");
//!
//! let blocks = chatflow::markdown::partition("# Title\n\nbody", None);
//! assert_eq!(blocks.frozen_blocks.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod markdown;
pub mod prelude;
pub mod stream;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
