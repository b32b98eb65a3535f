//! Node and Link Data Structures
//!
//! This module defines the graph-facing value types that the canonical [`Graph`]
//! stores and that [`GraphUpdate`] diffs carry to the rendering layer.
//!
//! # Architecture
//!
//! - **Id references only**: a `Link` names its source and target by id; it never
//!   holds a handle to another `Node`, so there are no ownership cycles
//! - **Links owned by source**: the outbound links of a node live in `Node::rel`
//!   and are replaced wholesale whenever the node is rebuilt
//! - **Two node kinds**: `NodeType::Note` for store notes, `NodeType::Tag` for the
//!   synthetic nodes derived from tags
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::models::{Link, Node, NodeType};
//!
//! let mut node = Node::new("note-a", "Meeting notes", NodeType::Note, "local");
//! node.rel.push(Link::reference("note-a", "note-b"));
//!
//! assert_eq!(node.targets().collect::<Vec<_>>(), vec!["note-b"]);
//! ```
//!
//! [`Graph`]: crate::models::Graph
//! [`GraphUpdate`]: crate::models::GraphUpdate

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Link type assigned to note references that declare no explicit type
pub const REFERENCE_LINK_TYPE: &str = "reference";

/// Link type of the edges from a tag node to each note carrying the tag
pub const TAG_LINK_TYPE: &str = "tag";

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A note fetched from the note store
    Note,
    /// A synthetic node standing for one tag
    Tag,
}

/// Byte-offset span of the markup a link was extracted from
///
/// Two links between the same pair of notes are told apart by their span, and
/// spans give links a stable order inside their source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkPosition {
    pub start: usize,
    pub end: usize,
}

impl LinkPosition {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Directed edge `source_id -> target_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub source_id: String,
    pub target_id: String,

    /// Edge type, e.g. [`REFERENCE_LINK_TYPE`] or [`TAG_LINK_TYPE`]
    #[serde(rename = "type")]
    pub link_type: String,

    /// Display label (the link text for note references)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Anchor inside the target note, if the reference pointed at one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<LinkPosition>,
}

impl Link {
    /// Create an untyped-by-author note reference
    pub fn reference(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            link_type: REFERENCE_LINK_TYPE.to_string(),
            label: None,
            element_id: None,
            position: None,
        }
    }

    /// Create a tag-membership edge from a tag node to a note
    pub fn tag_membership(tag_node_id: impl Into<String>, note_id: impl Into<String>) -> Self {
        Self {
            source_id: tag_node_id.into(),
            target_id: note_id.into(),
            link_type: TAG_LINK_TYPE.to_string(),
            label: None,
            element_id: None,
            position: None,
        }
    }

    pub fn with_position(mut self, position: LinkPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Graph node for a note or a tag
///
/// # Fields
///
/// - `id`: store id for notes, synthetic tag id for tags
/// - `label`: display title
/// - `node_type`: see [`NodeType`]
/// - `rel`: ordered outbound links
/// - `tags`: tag labels carried by the note (always empty for tag nodes)
/// - `graph_id`: owning graph
///
/// Equality is structural over every field, which is what the sync engine uses
/// to detect that a refetched note did not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub rel: Vec<Link>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub graph_id: String,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: NodeType,
        graph_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            rel: Vec::new(),
            tags: BTreeSet::new(),
            graph_id: graph_id.into(),
        }
    }

    pub fn is_tag(&self) -> bool {
        self.node_type == NodeType::Tag
    }

    /// Ids of every link target, in link order (duplicates kept)
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.rel.iter().map(|link| link.target_id.as_str())
    }
}
