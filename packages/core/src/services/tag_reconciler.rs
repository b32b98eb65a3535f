//! Tag index reconciliation
//!
//! The change feed never reports tag membership changes, so the tag index is
//! rebuilt from the store and diffed against the previous one. The diff is
//! staged, not applied: the caller commits the mutations together with the
//! rest of its cycle.
//!
//! Diff rules, keyed by tag label:
//!
//! - in the previous index only: the tag node is deleted
//! - in both with a different member set: the tag node is updated
//! - in the current index only: the tag node is added
//!
//! Tags with no member notes are left out of the index, so a tag whose last
//! note was untagged disappears from the graph.

use crate::db::StoreResult;
use crate::models::{GraphMutation, GraphUpdate, Tag, TagIndex};
use crate::services::{NoteClient, TagMembers};
use std::sync::Arc;
use tracing::debug;

/// Staged outcome of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReconciliation {
    /// Tag node changes; carries the new tag index iff anything changed
    pub update: GraphUpdate,
    pub mutations: Vec<GraphMutation>,
}

impl TagReconciliation {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty()
    }
}

pub struct TagReconciler {
    client: Arc<NoteClient>,
    graph_id: String,
}

impl TagReconciler {
    pub fn new(client: Arc<NoteClient>, graph_id: impl Into<String>) -> Self {
        Self {
            client,
            graph_id: graph_id.into(),
        }
    }

    /// Fetch the current tag index from the store
    pub async fn current_index(&self) -> StoreResult<TagIndex> {
        let mut index = TagIndex::new();
        for TagMembers { tag, note_ids } in self.client.get_tags().await? {
            if note_ids.is_empty() {
                continue;
            }
            // distinct tags sharing a title collapse onto one node
            index
                .entry(tag.title.clone())
                .or_insert_with(|| Tag::new(tag.title))
                .node_ids
                .extend(note_ids);
        }
        Ok(index)
    }

    /// Rebuild the tag index and diff it against `previous`
    pub async fn reconcile(&self, previous: &TagIndex) -> StoreResult<TagReconciliation> {
        let current = self.current_index().await?;
        Ok(self.diff(previous, current))
    }

    /// Diff two tag indexes into staged tag node changes
    pub fn diff(&self, previous: &TagIndex, current: TagIndex) -> TagReconciliation {
        let mut update = GraphUpdate::new(&self.graph_id);
        let mut mutations = Vec::new();

        for (label, tag) in previous {
            if !current.contains_key(label) {
                update.delete.push(tag.id.clone());
                mutations.push(GraphMutation::Remove(tag.id.clone()));
            }
        }

        for (label, tag) in &current {
            match previous.get(label) {
                None => {
                    let node = tag.to_node(&self.graph_id);
                    mutations.push(GraphMutation::Upsert(node.clone()));
                    update.add.push(node);
                }
                Some(prev) if prev.node_ids != tag.node_ids => {
                    let node = tag.to_node(&self.graph_id);
                    mutations.push(GraphMutation::Upsert(node.clone()));
                    update.update.push(node);
                }
                Some(_) => {}
            }
        }

        if !update.is_empty() {
            debug!(
                "Tag index changed: {} added, {} updated, {} deleted",
                update.add.len(),
                update.update.len(),
                update.delete.len()
            );
            update.tag_index = Some(current);
        }

        TagReconciliation { update, mutations }
    }
}
