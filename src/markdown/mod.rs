//! Stable render units for streaming markdown.
//!
//! Text is tokenized into leaf blocks on every growth tick, then split into
//! frozen blocks (safe to render permanently) and at most one tail block.
//!
//! ```
//! use chatflow::markdown::BlockStream;
//!
//! let mut blocks = BlockStream::new();
//! blocks.update("para1\n\npara");
//! let first_key = blocks.partition().frozen_blocks[0].key.clone();
//! blocks.update("para1\n\npara2\n\n");
//! assert_eq!(blocks.partition().frozen_blocks[0].key, first_key);
//! assert!(blocks.partition().tail_block.is_none());
//! ```

pub mod freeze;
pub mod partition;

pub use freeze::{ends_with_blank_line, freeze, has_closing_fence};
pub use partition::partition_blocks;

use crate::types::{Block, Partition};

/// Partition `text`, protecting blocks frozen by a previous call.
pub fn partition(text: &str, previous_frozen: Option<&[Block]>) -> Partition {
    freeze(text, partition_blocks(text), previous_frozen.unwrap_or_default())
}

/// Per-message partition state across growth ticks.
#[derive(Debug, Clone, Default)]
pub struct BlockStream {
    text: String,
    current: Partition,
}

impl BlockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-partition after the text changed.
    ///
    /// When the new text does not extend the previous one (a snapshot
    /// replaced it), earlier frozen blocks are no longer trusted.
    pub fn update(&mut self, text: &str) -> &Partition {
        if text == self.text && !self.current.is_empty() {
            return &self.current;
        }

        let previous: &[Block] = if text.starts_with(self.text.as_str()) {
            &self.current.frozen_blocks
        } else {
            tracing::debug!("Text was replaced; dropping frozen blocks");
            &[]
        };

        let next = partition(text, Some(previous));
        self.current = next;
        self.text.clear();
        self.text.push_str(text);
        &self.current
    }

    pub fn partition(&self) -> &Partition {
        &self.current
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.current = Partition::default();
    }
}
