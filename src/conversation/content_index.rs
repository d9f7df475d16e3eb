//! Content id to message id mapping for one fold scope.

use std::collections::HashMap;

use crate::types::assistant_message_id;

/// Maps opaque `contentId`s to the message ids they feed.
///
/// Owned by a single fold scope (one live turn or one history rebuild) and
/// reset when that scope starts over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIndex {
    entries: HashMap<String, String>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message id for `content_id`, registering it on first sight.
    pub fn resolve(&mut self, content_id: &str) -> String {
        self.entries
            .entry(content_id.to_string())
            .or_insert_with(|| assistant_message_id(content_id))
            .clone()
    }

    pub fn get(&self, content_id: &str) -> Option<&str> {
        self.entries.get(content_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_stable_per_content_id() {
        let mut index = ContentIndex::new();
        assert_eq!(index.resolve("c1"), "assistant:c1");
        assert_eq!(index.resolve("c1"), "assistant:c1");
        assert_eq!(index.resolve("c2"), "assistant:c2");
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("c2"), Some("assistant:c2"));
    }

    #[test]
    fn reset_clears_entries() {
        let mut index = ContentIndex::new();
        index.resolve("c1");
        index.reset();
        assert!(index.is_empty());
        assert!(index.get("c1").is_none());
    }
}
