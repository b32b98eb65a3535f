//! Graph diffs
//!
//! A [`GraphUpdate`] is what the rendering layer receives instead of a full
//! snapshot: nodes to add, nodes to replace in place, ids to delete and, when
//! tags changed, the replacement tag index.

use crate::models::{Node, TagIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUpdate {
    pub graph_id: String,
    #[serde(default)]
    pub add: Vec<Node>,
    /// Replace-in-place semantics: each entry is the complete new node
    #[serde(default)]
    pub update: Vec<Node>,
    #[serde(default)]
    pub delete: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_index: Option<TagIndex>,
}

impl GraphUpdate {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            add: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
            tag_index: None,
        }
    }

    /// True iff add, update and delete are all empty
    ///
    /// The tag index is deliberately not considered; see [`Self::should_publish`].
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Whether the update carries anything a consumer must see
    ///
    /// An update holding only a replacement tag index is still published.
    pub fn should_publish(&self) -> bool {
        !self.is_empty() || self.tag_index.is_some()
    }

    /// Append `other`'s entries after this update's own
    ///
    /// A tag index carried by `other` replaces this one.
    pub fn merge(&mut self, other: GraphUpdate) {
        self.add.extend(other.add);
        self.update.extend(other.update);
        self.delete.extend(other.delete);
        if other.tag_index.is_some() {
            self.tag_index = other.tag_index;
        }
    }

    /// Whether `id` already appears in the add or update list
    pub fn touches(&self, id: &str) -> bool {
        self.add.iter().chain(self.update.iter()).any(|node| node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeType, Tag};

    fn node(id: &str) -> Node {
        Node::new(id, id, NodeType::Note, "local")
    }

    #[test]
    fn test_is_empty_tracks_all_three_lists() {
        let mut update = GraphUpdate::new("local");
        assert!(update.is_empty());

        update.delete.push("x".into());
        assert!(!update.is_empty());

        let mut update = GraphUpdate::new("local");
        update.update.push(node("a"));
        assert!(!update.is_empty());

        let mut update = GraphUpdate::new("local");
        update.add.push(node("a"));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_tag_index_only_update_is_empty_but_published() {
        let mut update = GraphUpdate::new("local");
        update.tag_index = Some(TagIndex::from([("t".to_string(), Tag::new("t"))]));

        assert!(update.is_empty());
        assert!(update.should_publish());
    }

    #[test]
    fn test_merge_appends_and_replaces_tag_index() {
        let mut first = GraphUpdate::new("local");
        first.add.push(node("a"));

        let mut second = GraphUpdate::new("local");
        second.add.push(node("b"));
        second.delete.push("c".into());
        second.tag_index = Some(TagIndex::new());

        first.merge(second);

        assert_eq!(
            first.add.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(first.delete, vec!["c".to_string()]);
        assert!(first.tag_index.is_some());
        assert!(first.touches("b"));
        assert!(!first.touches("c"));
    }
}
