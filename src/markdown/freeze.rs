//! Tail/frozen decision for partitioned blocks.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Block, BlockKind, Partition};

use super::partition::LineIndex;

static BLANK_LINE_END: OnceLock<Regex> = OnceLock::new();
static IMAGE_REF: OnceLock<Regex> = OnceLock::new();

fn blank_line_end() -> &'static Regex {
    BLANK_LINE_END.get_or_init(|| {
        Regex::new(r"\r?\n[ \t]*\r?\n\s*\z").expect("blank line pattern is valid")
    })
}

fn image_ref() -> &'static Regex {
    IMAGE_REF.get_or_init(|| {
        Regex::new(r"!\[[^\]]*\](?:\([^)]*\)|\[[^\]]*\])").expect("image pattern is valid")
    })
}

/// Decide which blocks are settled.
///
/// Every block but the last is frozen. The last block stays as the tail
/// unless the text already moved past it (trailing blank line), it is a
/// fence with a valid closing fence, or it is an image paragraph whose line
/// has ended. Any block that overlaps a block frozen by an earlier call is
/// split so that block keeps its key, whether or not the last block settles.
pub fn freeze(text: &str, mut blocks: Vec<Block>, previous_frozen: &[Block]) -> Partition {
    let Some(last) = blocks.pop() else {
        return Partition::default();
    };
    let settled = tail_is_settled(text, &last);
    let lines = LineIndex::new(text);
    let mut frozen_blocks = Vec::with_capacity(blocks.len() + 1);

    for block in blocks {
        let (carried, rest) = protect_frozen(&lines, block, &frozen_blocks, previous_frozen);
        frozen_blocks.extend(carried);
        frozen_blocks.extend(rest);
    }

    let (carried, rest) = protect_frozen(&lines, last, &frozen_blocks, previous_frozen);
    frozen_blocks.extend(carried);
    let tail_block = if settled {
        frozen_blocks.extend(rest);
        None
    } else {
        rest
    };

    Partition {
        frozen_blocks,
        tail_block,
    }
}

fn tail_is_settled(text: &str, last: &Block) -> bool {
    let blank_end = ends_with_blank_line(text);
    if blank_end {
        return true;
    }
    match last.kind {
        BlockKind::Fence => has_closing_fence(&last.content),
        BlockKind::Paragraph => text.ends_with('\n') && image_ref().is_match(&last.content),
        _ => false,
    }
}

/// Text ends with two line breaks, optionally followed by whitespace.
pub fn ends_with_blank_line(text: &str) -> bool {
    blank_line_end().is_match(text)
}

/// Whether a fenced block contains a closing fence on its own line.
///
/// The closer must use the opening character and be at least as long.
/// Each line must repeat the containers the opening line sits in (`>`
/// markers, list item indentation). After those, the closer may be
/// indented by at most three spaces.
pub fn has_closing_fence(content: &str) -> bool {
    let mut lines = content.lines();
    let Some(opener) = lines.next().and_then(OpeningFence::parse) else {
        return false;
    };

    lines.any(|line| {
        let Some(inner) = strip_containers(line, &opener.containers) else {
            return false;
        };
        let indent = leading_spaces(inner);
        if indent > 3 {
            return false;
        }
        let candidate = &inner[indent..];
        let run = candidate.chars().take_while(|&c| c == opener.fence_char).count();
        run >= opener.len && candidate[run * opener.fence_char.len_utf8()..].trim().is_empty()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Quote,
    /// List item content column, in spaces.
    Indent(usize),
}

#[derive(Debug)]
struct OpeningFence {
    containers: Vec<Container>,
    fence_char: char,
    len: usize,
}

impl OpeningFence {
    fn parse(line: &str) -> Option<Self> {
        let start = match (line.find("```"), line.find("~~~")) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        let containers = parse_containers(&line[..start])?;
        let rest = &line[start..];
        let fence_char = rest.chars().next()?;
        Some(Self {
            containers,
            fence_char,
            len: rest.chars().take_while(|&c| c == fence_char).count(),
        })
    }
}

/// Container markers in front of an opening fence.
///
/// Returns `None` when the prefix holds anything other than markers and at
/// most three spaces of fence indentation.
fn parse_containers(mut prefix: &str) -> Option<Vec<Container>> {
    let mut containers = Vec::new();
    loop {
        let lead = leading_spaces(prefix);
        let trimmed = &prefix[lead..];
        if lead <= 3 {
            if let Some(after) = trimmed.strip_prefix('>') {
                containers.push(Container::Quote);
                prefix = after.strip_prefix(' ').unwrap_or(after);
                continue;
            }
            if let Some(marker) = list_marker_len(trimmed) {
                let after = &trimmed[marker..];
                let gap = leading_spaces(after);
                let pad = if (1..=4).contains(&gap) { gap } else { 1 };
                containers.push(Container::Indent(lead + marker + pad));
                prefix = &after[pad.min(gap)..];
                continue;
            }
        }
        return (trimmed.is_empty() && lead <= 3).then_some(containers);
    }
}

fn list_marker_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let len = match bytes.first()? {
        b'-' | b'*' | b'+' => 1,
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            match bytes.get(digits) {
                Some(b'.' | b')') if digits <= 9 => digits + 1,
                _ => return None,
            }
        }
        _ => return None,
    };
    match bytes.get(len) {
        Some(b' ') => Some(len),
        _ => None,
    }
}

/// Strip the same containers from a later line. `None` means the line has
/// left one of them.
fn strip_containers<'a>(mut line: &'a str, containers: &[Container]) -> Option<&'a str> {
    for container in containers {
        match *container {
            Container::Quote => {
                let lead = leading_spaces(line);
                if lead > 3 {
                    return None;
                }
                let after = line[lead..].strip_prefix('>')?;
                line = after.strip_prefix(' ').unwrap_or(after);
            }
            Container::Indent(width) => {
                if leading_spaces(line) < width {
                    return None;
                }
                line = &line[width..];
            }
        }
    }
    Some(line)
}

fn leading_spaces(s: &str) -> usize {
    s.bytes().take_while(|&b| b == b' ').count()
}

/// Split previously frozen spans out of a block.
///
/// Returns the carried blocks (in line order) and what remains of the block.
fn protect_frozen(
    lines: &LineIndex<'_>,
    tail: Block,
    frozen: &[Block],
    previous_frozen: &[Block],
) -> (Vec<Block>, Option<Block>) {
    let mut candidates: Vec<&Block> = previous_frozen
        .iter()
        .filter(|prev| prev.overlaps(&tail))
        .filter(|prev| !frozen.iter().any(|f| f.key == prev.key))
        .collect();
    if candidates.is_empty() {
        return (Vec::new(), Some(tail));
    }
    candidates.sort_by_key(|b| (b.start_line, b.end_line));

    let mut carried = Vec::new();
    let mut current = Some(tail);

    for prev in candidates {
        let Some(tail) = current.take() else {
            break;
        };
        if !prev.overlaps(&tail) {
            current = Some(tail);
            continue;
        }

        // Anything before the frozen span cannot change either.
        if tail.start_line < prev.start_line {
            carried.extend(lines.block(tail.kind, tail.start_line, prev.start_line));
        }

        let start = prev.start_line.max(tail.start_line);
        let end = prev.end_line.min(tail.end_line);
        let content = lines.slice(start, end);
        tracing::trace!(key = %prev.key, start, end, "Carrying frozen block out of tail");
        carried.push(Block {
            key: prev.key.clone(),
            content: if content.is_empty() {
                prev.content.clone()
            } else {
                content.to_string()
            },
            kind: prev.kind,
            start_line: start,
            end_line: end,
        });

        current = if end < tail.end_line {
            lines.block(tail.kind, end, tail.end_line)
        } else {
            None
        };
    }

    (carried, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_detection() {
        assert!(ends_with_blank_line("a\n\n"));
        assert!(ends_with_blank_line("a\n\n  "));
        assert!(ends_with_blank_line("a\r\n\r\n"));
        assert!(ends_with_blank_line("a\n \n"));
        assert!(!ends_with_blank_line("a\n"));
        assert!(!ends_with_blank_line("a\n\nb"));
    }

    #[test]
    fn closing_fence_rules() {
        assert!(has_closing_fence("```js\nx\n```"));
        assert!(has_closing_fence("~~~~\nx\n~~~~~  "));
        assert!(!has_closing_fence("```js\nconsole.log(1);"));
        assert!(!has_closing_fence("````\n```\n"));
        assert!(!has_closing_fence("```\nx\n~~~"));
        assert!(!has_closing_fence("```\nx\n``` trailing"));
        assert!(has_closing_fence("> ```\n> x\n> ```"));
        assert!(has_closing_fence("- ```\n  x\n  ```"));
        assert!(has_closing_fence("  ```\nx\n   ```"));
        assert!(has_closing_fence("> > ~~~\n> > x\n> > ~~~"));
        assert!(has_closing_fence("1. ```\n   x\n   ```"));
    }

    #[test]
    fn indented_or_foreign_closers_do_not_close() {
        // Four spaces of indent make the line code content.
        assert!(!has_closing_fence("```\n    ```"));
        assert!(!has_closing_fence("> ```\n>     ```"));
        assert!(!has_closing_fence("- ```\n      ```"));
        // The closer must sit in the same containers as the opener.
        assert!(!has_closing_fence("> ```\nx\n```"));
        assert!(!has_closing_fence("- ```\n  x\n```"));
        assert!(!has_closing_fence("```\nx\n> ```"));
    }

    #[test]
    fn carried_block_keeps_key_and_tail_shrinks() {
        let text = "![alt](a.png)\nmore";
        let previous = vec![Block::new("![alt](a.png)", BlockKind::Paragraph, 0, 1)];
        let tail = Block::new(text, BlockKind::Paragraph, 0, 2);
        let partition = freeze(text, vec![tail], &previous);

        assert_eq!(partition.frozen_blocks.len(), 1);
        assert_eq!(partition.frozen_blocks[0].key, "paragraph-0-1");
        assert_eq!(partition.frozen_blocks[0].content, "![alt](a.png)");
        let tail = partition.tail_block.unwrap();
        assert_eq!(tail.content, "more");
        assert_eq!((tail.start_line, tail.end_line), (1, 2));
        assert_eq!(tail.key, "paragraph-1-2");
    }

    #[test]
    fn tail_collapses_when_fully_covered() {
        let text = "abc\ndef";
        let previous = vec![Block::new("abc\ndef", BlockKind::Paragraph, 0, 2)];
        let tail = Block::new("abc\ndef", BlockKind::Heading, 0, 2);
        let partition = freeze(text, vec![tail], &previous);
        assert!(partition.tail_block.is_none());
        assert_eq!(partition.frozen_blocks[0].key, "paragraph-0-2");
    }

    #[test]
    fn prefix_before_frozen_span_is_frozen_too() {
        let text = "a\nb\nc";
        let previous = vec![Block::new("b", BlockKind::Paragraph, 1, 2)];
        let tail = Block::new(text, BlockKind::Paragraph, 0, 3);
        let partition = freeze(text, vec![tail], &previous);
        let keys: Vec<&str> = partition.frozen_blocks.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["paragraph-0-1", "paragraph-1-2"]);
        assert_eq!(partition.tail_block.unwrap().content, "c");
    }

    #[test]
    fn settled_tail_still_carries_previous_keys() {
        let text = "![img](a.png)\nmore\n\n";
        let previous = vec![
            Block::new("![img](a.png)", BlockKind::Paragraph, 0, 1),
            Block::new("more", BlockKind::Paragraph, 1, 2),
        ];
        let last = Block::new("![img](a.png)\nmore", BlockKind::Paragraph, 0, 2);
        let partition = freeze(text, vec![last], &previous);

        let keys: Vec<&str> = partition.frozen_blocks.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["paragraph-0-1", "paragraph-1-2"]);
        assert!(partition.tail_block.is_none());
    }

    #[test]
    fn earlier_blocks_also_carry_previous_keys() {
        let text = "![img](a.png)\nmore\n\nnext";
        let previous = vec![Block::new("![img](a.png)", BlockKind::Paragraph, 0, 1)];
        let blocks = vec![
            Block::new("![img](a.png)\nmore", BlockKind::Paragraph, 0, 2),
            Block::new("next", BlockKind::Paragraph, 3, 4),
        ];
        let partition = freeze(text, blocks, &previous);

        let keys: Vec<&str> = partition.frozen_blocks.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["paragraph-0-1", "paragraph-1-2"]);
        assert_eq!(partition.tail_block.unwrap().key, "paragraph-3-4");
    }

    #[test]
    fn empty_input_has_no_tail() {
        let partition = freeze("", Vec::new(), &[]);
        assert!(partition.is_empty());
    }
}
