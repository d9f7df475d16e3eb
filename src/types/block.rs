//! Markdown render units.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Leaf block type produced by the partitioner.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    /// Fenced code (```` ``` ```` or `~~~`).
    Fence,
    /// Indented code.
    CodeBlock,
    Table,
    HtmlBlock,
    Hr,
    /// Whole-text block used when nothing else was recognized.
    Fallback,
}

/// A contiguous slice of the source text with line provenance.
///
/// Lines are zero-based; `end_line` is exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub key: String,
    pub content: String,
    pub kind: BlockKind,
    pub start_line: usize,
    pub end_line: usize,
}

impl Block {
    /// Render identity for a line span and kind.
    pub fn key_for(start_line: usize, end_line: usize, kind: BlockKind) -> String {
        format!("{kind}-{start_line}-{end_line}")
    }

    pub fn new(
        content: impl Into<String>,
        kind: BlockKind,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            key: Self::key_for(start_line, end_line, kind),
            content: content.into(),
            kind,
            start_line,
            end_line,
        }
    }

    /// Whether the line spans intersect.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.start_line < other.end_line && other.start_line < self.end_line
    }
}

/// Partition of the current text into settled and still-growing blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partition {
    pub frozen_blocks: Vec<Block>,
    pub tail_block: Option<Block>,
}

impl Partition {
    /// All blocks in order, tail last.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.frozen_blocks.iter().chain(self.tail_block.iter())
    }

    pub fn len(&self) -> usize {
        self.frozen_blocks.len() + usize::from(self.tail_block.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
