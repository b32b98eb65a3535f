//! Canonical Graph
//!
//! The single authoritative in-memory mirror of notes, their links and the tag
//! index. Both the bulk collector (full loads) and the sync engine (diff merges)
//! write into one `Graph`.
//!
//! # Dangling links
//!
//! A link whose target is not in the node map never lives in `Node::rel`. It is
//! parked under its source instead:
//!
//! - when the target appears, the parked links are moved back into the source's
//!   `rel` (ordered by position, then target id) and the source is reported as
//!   relinked
//! - when a target is removed, every link pointing at it is parked and its source
//!   is reported as relinked
//!
//! Relinked sources are appended to the `update` list of the [`GraphUpdate`]
//! being committed, so consumers always see the graph as stored.
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::models::{Graph, GraphMutation, GraphUpdate, Link, Node, NodeType};
//!
//! let mut graph = Graph::new("local");
//! let mut a = Node::new("a", "A", NodeType::Note, "local");
//! a.rel.push(Link::reference("a", "b"));
//!
//! let mut update = GraphUpdate::new("local");
//! update.add.push(a.clone());
//! graph.commit(vec![GraphMutation::Upsert(a)], &mut update);
//! assert!(graph.node("a").unwrap().rel.is_empty(), "b is unknown so the link is parked");
//!
//! let b = Node::new("b", "B", NodeType::Note, "local");
//! let mut update = GraphUpdate::new("local");
//! update.add.push(b.clone());
//! graph.commit(vec![GraphMutation::Upsert(b)], &mut update);
//! assert_eq!(graph.node("a").unwrap().rel.len(), 1);
//! assert_eq!(update.update[0].id, "a");
//! ```

use crate::models::{GraphUpdate, Link, Node, TagIndex};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One staged change to the canonical graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphMutation {
    /// Insert the node or replace it wholesale
    Upsert(Node),
    /// Remove the node with this id
    Remove(String),
}

#[derive(Debug, Clone)]
pub struct Graph {
    id: String,
    nodes: BTreeMap<String, Node>,
    tag_index: TagIndex,
    /// source id -> links whose target is absent
    parked: HashMap<String, Vec<Link>>,
    /// absent target id -> sources holding parked links to it
    waiting: HashMap<String, BTreeSet<String>>,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: BTreeMap::new(),
            tag_index: TagIndex::new(),
            parked: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.tag_index
    }

    /// Links of `source_id` currently waiting for their target
    pub fn parked_links(&self, source_id: &str) -> &[Link] {
        self.parked
            .get(source_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `node` as it would be stored right now: links to absent targets dropped
    pub fn resolve(&self, node: &Node) -> Node {
        let mut resolved = node.clone();
        resolved.graph_id = self.id.clone();
        resolved
            .rel
            .retain(|link| link.target_id == node.id || self.nodes.contains_key(&link.target_id));
        resolved
    }

    /// Insert or replace a node
    ///
    /// Returns the ids of other nodes whose parked links were restored because
    /// this node appeared.
    pub fn upsert(&mut self, mut node: Node) -> BTreeSet<String> {
        node.graph_id = self.id.clone();
        let id = node.id.clone();

        let (resolved, dangling): (Vec<Link>, Vec<Link>) = std::mem::take(&mut node.rel)
            .into_iter()
            .partition(|link| link.target_id == id || self.nodes.contains_key(&link.target_id));
        node.rel = resolved;
        self.park(&id, dangling);

        if self.nodes.insert(id.clone(), node).is_some() {
            BTreeSet::new()
        } else {
            self.unpark(&id)
        }
    }

    /// Remove a node
    ///
    /// Links from other nodes to the removed one are parked; the ids of those
    /// sources are returned alongside the removed node.
    pub fn remove(&mut self, id: &str) -> (Option<Node>, BTreeSet<String>) {
        self.drop_parked(id);
        let removed = self.nodes.remove(id);
        let mut relinked = BTreeSet::new();
        if removed.is_none() {
            return (None, relinked);
        }

        for (source_id, source) in self.nodes.iter_mut() {
            if !source.rel.iter().any(|link| link.target_id == id) {
                continue;
            }
            let (gone, kept): (Vec<Link>, Vec<Link>) = std::mem::take(&mut source.rel)
                .into_iter()
                .partition(|link| link.target_id == id);
            source.rel = kept;
            self.parked.entry(source_id.clone()).or_default().extend(gone);
            self.waiting
                .entry(id.to_string())
                .or_default()
                .insert(source_id.clone());
            relinked.insert(source_id.clone());
        }

        (removed, relinked)
    }

    pub fn set_tag_index(&mut self, tag_index: TagIndex) {
        self.tag_index = tag_index;
    }

    /// Apply staged mutations in order and align `update` with the stored state
    ///
    /// After the mutations run, the update's tag index (if any) is installed,
    /// every add/update entry is replaced by the node as stored, and relinked
    /// sources not already listed are appended to `update.update`.
    pub fn commit(&mut self, mutations: Vec<GraphMutation>, update: &mut GraphUpdate) {
        let mut relinked = BTreeSet::new();
        for mutation in mutations {
            match mutation {
                GraphMutation::Upsert(node) => relinked.extend(self.upsert(node)),
                GraphMutation::Remove(id) => relinked.extend(self.remove(&id).1),
            }
        }

        if let Some(tag_index) = &update.tag_index {
            self.tag_index = tag_index.clone();
        }

        for node in update.add.iter_mut().chain(update.update.iter_mut()) {
            if let Some(stored) = self.nodes.get(&node.id) {
                *node = stored.clone();
            }
        }

        for id in relinked {
            if update.touches(&id) {
                continue;
            }
            if let Some(stored) = self.nodes.get(&id) {
                update.update.push(stored.clone());
            }
        }
    }

    /// Swap the whole set of note nodes, keeping tag nodes and the tag index
    pub fn replace_notes(&mut self, notes: Vec<Node>) {
        let tags: Vec<Node> = self
            .nodes
            .values()
            .filter(|node| node.is_tag())
            .cloned()
            .collect();
        // tag links into the old note set are rebuilt from the tag nodes themselves
        let tag_links: HashMap<String, Vec<Link>> = tags
            .iter()
            .map(|tag| {
                let mut links = tag.rel.clone();
                links.extend(self.parked_links(&tag.id).iter().cloned());
                (tag.id.clone(), links)
            })
            .collect();

        self.nodes.clear();
        self.parked.clear();
        self.waiting.clear();

        for node in notes {
            self.upsert(node);
        }
        for mut tag in tags {
            tag.rel = tag_links.get(&tag.id).cloned().unwrap_or_default();
            tag.rel.sort_by(link_order);
            self.upsert(tag);
        }
    }

    fn park(&mut self, source_id: &str, links: Vec<Link>) {
        self.drop_parked(source_id);
        if links.is_empty() {
            return;
        }
        for link in &links {
            self.waiting
                .entry(link.target_id.clone())
                .or_default()
                .insert(source_id.to_string());
        }
        self.parked.insert(source_id.to_string(), links);
    }

    fn drop_parked(&mut self, source_id: &str) {
        let Some(links) = self.parked.remove(source_id) else {
            return;
        };
        for link in links {
            if let Some(sources) = self.waiting.get_mut(&link.target_id) {
                sources.remove(source_id);
                if sources.is_empty() {
                    self.waiting.remove(&link.target_id);
                }
            }
        }
    }

    fn unpark(&mut self, target_id: &str) -> BTreeSet<String> {
        let Some(sources) = self.waiting.remove(target_id) else {
            return BTreeSet::new();
        };

        for source_id in &sources {
            let Some(links) = self.parked.remove(source_id) else {
                continue;
            };
            let (restored, still): (Vec<Link>, Vec<Link>) = links
                .into_iter()
                .partition(|link| link.target_id == target_id);
            if !still.is_empty() {
                self.parked.insert(source_id.clone(), still);
            }
            if let Some(source) = self.nodes.get_mut(source_id) {
                source.rel.extend(restored);
                source.rel.sort_by(link_order);
            }
        }

        sources
    }
}

fn link_order(a: &Link, b: &Link) -> Ordering {
    a.position
        .cmp(&b.position)
        .then_with(|| a.target_id.cmp(&b.target_id))
}
