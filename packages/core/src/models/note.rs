//! Notes as fetched from the note store
//!
//! A [`RawNote`] is the record the store hands back. [`Note`] is that record
//! enriched with the note's tag titles and the references extracted from its
//! body, plus the bookkeeping the bulk collector needs while traversing
//! (`degree`, `visit_links`). [`Note::into_node`] maps a note onto its graph
//! [`Node`].

use crate::models::{Link, LinkPosition, Node, NodeType, REFERENCE_LINK_TYPE};
use crate::utils::extract_note_links;
use serde::{Deserialize, Serialize};

/// Note record returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNote {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl RawNote {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Reference found in a note body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteLink {
    /// Target note id (the owning note for `(#anchor)` self references)
    pub note_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// Type declared through the link title, `[x](:/id "type")`
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub position: LinkPosition,
}

/// A fetched note with its extracted links and tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    pub links: Vec<NoteLink>,
    pub tags: Vec<String>,

    /// Breadth-first distance from the seed of a range collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<usize>,

    /// False when the note sits on the degree cutoff: its links are out of
    /// scope, kept but never followed nor pruned as dangling
    #[serde(default = "default_visit_links")]
    pub visit_links: bool,
}

fn default_visit_links() -> bool {
    true
}

impl Note {
    /// Build a note from its store record and tag titles, extracting links
    pub fn from_raw(raw: RawNote, tags: Vec<String>) -> Self {
        let links = extract_note_links(&raw.body, &raw.id);
        Self {
            id: raw.id,
            title: raw.title,
            body: raw.body,
            links,
            tags,
            degree: None,
            visit_links: true,
        }
    }

    /// Map the note onto its graph node, owned by `graph_id`
    pub fn into_node(self, graph_id: &str) -> Node {
        let mut node = Node::new(self.id, self.title, NodeType::Note, graph_id);
        node.rel = self
            .links
            .into_iter()
            .map(|link| Link {
                source_id: node.id.clone(),
                target_id: link.note_id,
                link_type: link
                    .link_type
                    .unwrap_or_else(|| REFERENCE_LINK_TYPE.to_string()),
                label: link.label,
                element_id: link.element_id,
                position: Some(link.position),
            })
            .collect();
        node.tags = self.tags.into_iter().collect();
        node
    }
}
