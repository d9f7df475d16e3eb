//! Leaf-block partitioning of markdown text.

use markdown::mdast::Node;
use markdown::{to_mdast, ParseOptions};

use crate::types::{Block, BlockKind};

/// Byte offsets of line starts, for line-range slicing.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    pub(crate) fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Text of lines `[start_line, end_line)`, without the final line break.
    pub(crate) fn slice(&self, start_line: usize, end_line: usize) -> &'a str {
        let begin = self
            .starts
            .get(start_line)
            .copied()
            .unwrap_or(self.text.len());
        let end = self
            .starts
            .get(end_line)
            .copied()
            .unwrap_or(self.text.len())
            .max(begin);
        self.text[begin..end].trim_end_matches(['\n', '\r'])
    }

    pub(crate) fn block(
        &self,
        kind: BlockKind,
        start_line: usize,
        end_line: usize,
    ) -> Option<Block> {
        let content = self.slice(start_line, end_line);
        (!content.is_empty()).then(|| Block::new(content, kind, start_line, end_line))
    }
}

/// Split `text` into ordered leaf blocks.
///
/// Only leaf blocks are emitted: list items and quotes contribute their
/// inner paragraphs, never a container block. Content is sliced by whole
/// lines, so container markers (`- `, `> `) stay in the block text.
pub fn partition_blocks(text: &str) -> Vec<Block> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lines = LineIndex::new(text);
    let mut spans = Vec::new();

    match to_mdast(text, &ParseOptions::gfm()) {
        Ok(root) => collect_spans(&root, text, &mut spans),
        Err(err) => {
            tracing::debug!(error = ?err, "Markdown tokenizer failed; using fallback block");
        }
    }

    spans.sort_unstable();
    spans.dedup();

    let blocks: Vec<Block> = spans
        .into_iter()
        .filter_map(|(start, end, kind)| lines.block(kind, start, end))
        .collect();

    if blocks.is_empty() {
        return lines
            .block(BlockKind::Fallback, 0, lines.line_count())
            .into_iter()
            .collect();
    }
    blocks
}

fn collect_spans(node: &Node, text: &str, spans: &mut Vec<(usize, usize, BlockKind)>) {
    let kind = match node {
        Node::Root(_)
        | Node::Blockquote(_)
        | Node::List(_)
        | Node::ListItem(_)
        | Node::FootnoteDefinition(_) => {
            for child in node.children().into_iter().flatten() {
                collect_spans(child, text, spans);
            }
            return;
        }
        Node::Paragraph(_) => BlockKind::Paragraph,
        Node::Heading(_) => BlockKind::Heading,
        Node::Code(_) => code_kind(node, text),
        Node::Table(_) => BlockKind::Table,
        Node::Html(_) => BlockKind::HtmlBlock,
        Node::ThematicBreak(_) => BlockKind::Hr,
        _ => return,
    };

    let Some(position) = node.position() else {
        return;
    };
    if position.start.line == 0 || position.end.line < position.start.line {
        return;
    }

    let start = position.start.line - 1;
    // A node ending at column 1 stops before that line begins.
    let end = if position.end.column == 1 && position.end.line > position.start.line {
        position.end.line - 1
    } else {
        position.end.line
    };
    spans.push((start, end.max(start + 1), kind));
}

fn code_kind(node: &Node, text: &str) -> BlockKind {
    let fenced = node
        .position()
        .and_then(|p| text.get(p.start.offset..))
        .map(|rest| {
            let rest = rest.trim_start_matches([' ', '\t']);
            rest.starts_with("```") || rest.starts_with("~~~")
        })
        .unwrap_or(false);
    if fenced {
        BlockKind::Fence
    } else {
        BlockKind::CodeBlock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(text: &str) -> Vec<(BlockKind, usize, usize)> {
        partition_blocks(text)
            .into_iter()
            .map(|b| (b.kind, b.start_line, b.end_line))
            .collect()
    }

    #[test]
    fn line_index_slices_whole_lines() {
        let lines = LineIndex::new("a\nbb\n\nccc");
        assert_eq!(lines.line_count(), 4);
        assert_eq!(lines.slice(0, 2), "a\nbb");
        assert_eq!(lines.slice(3, 4), "ccc");
        assert_eq!(lines.slice(2, 3), "");
        assert_eq!(lines.slice(9, 12), "");
    }

    #[test]
    fn headings_rules_and_indented_code() {
        let text = "# Title\n\n---\n\n    let x = 1;\n";
        assert_eq!(
            summary(text),
            vec![
                (BlockKind::Heading, 0, 1),
                (BlockKind::Hr, 2, 3),
                (BlockKind::CodeBlock, 4, 5),
            ]
        );
    }

    #[test]
    fn html_block_is_a_leaf() {
        let text = "<div>\nhi\n</div>\n\nafter";
        let blocks = partition_blocks(text);
        assert_eq!(blocks[0].kind, BlockKind::HtmlBlock);
        assert_eq!(blocks[0].content, "<div>\nhi\n</div>");
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].content, "after");
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let blocks = partition_blocks("```js\nconsole.log(1);");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Fence);
        assert_eq!((blocks[0].start_line, blocks[0].end_line), (0, 2));
    }

    #[test]
    fn fallback_when_nothing_recognized() {
        let blocks = partition_blocks("[ref]: https://example.com");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Fallback);
        assert_eq!(blocks[0].content, "[ref]: https://example.com");
        assert_eq!(blocks[0].key, "fallback-0-1");
    }

    #[test]
    fn blank_text_has_no_blocks() {
        assert!(partition_blocks("").is_empty());
        assert!(partition_blocks("\n \n").is_empty());
    }
}
