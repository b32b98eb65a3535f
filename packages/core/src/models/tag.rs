//! Tags and the tag index
//!
//! Every tag maps 1:1 onto a synthetic `NodeType::Tag` node whose outbound
//! links point at the notes currently carrying the tag.

use crate::models::{Link, Node, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tag label -> tag
pub type TagIndex = BTreeMap<String, Tag>;

/// Prefix of synthetic tag node ids, keeps them apart from note ids
const TAG_ID_PREFIX: &str = "tag:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub node_ids: BTreeSet<String>,
}

impl Tag {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: Self::synthetic_id(&label),
            label,
            node_ids: BTreeSet::new(),
        }
    }

    pub fn with_members<I, S>(label: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tag = Self::new(label);
        tag.node_ids = members.into_iter().map(Into::into).collect();
        tag
    }

    /// Node id of the tag node for `label`
    pub fn synthetic_id(label: &str) -> String {
        format!("{TAG_ID_PREFIX}{label}")
    }

    /// Build the tag node: one membership link per member note
    pub fn to_node(&self, graph_id: &str) -> Node {
        let mut node = Node::new(self.id.clone(), self.label.clone(), NodeType::Tag, graph_id);
        node.rel = self
            .node_ids
            .iter()
            .map(|note_id| Link::tag_membership(self.id.clone(), note_id.clone()))
            .collect();
        node
    }
}
