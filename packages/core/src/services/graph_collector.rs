//! Bulk graph collection
//!
//! [`GraphCollector`] assembles graph content in one go, either every note in
//! the store or the neighbourhood of a source note up to a link distance.
//!
//! # Bad links
//!
//! Links whose target could not be collected are discarded before nodes leave
//! the collector:
//!
//! - links to ids the store reported as missing are always dropped
//! - links to targets absent from the result are dropped only for notes whose
//!   links were meant to be followed (`visit_links`)
//!
//! When a listing was truncated, pruning is skipped entirely: an absent target
//! may simply lie past the cutoff.

use crate::config::SyncConfig;
use crate::db::{NoteQuery, StoreResult};
use crate::models::{Node, Note};
use crate::services::NoteClient;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Notes gathered by one collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedNotes {
    /// Notes in collection order
    pub notes: Vec<Note>,
    /// Requested ids the store could not resolve
    pub missing_notes: Vec<String>,
    /// Link distance reached by a range collection
    pub degree: usize,
    pub truncated: bool,
}

pub struct GraphCollector {
    client: Arc<NoteClient>,
    query: NoteQuery,
    graph_id: String,
    max_concurrent_requests: usize,
}

impl GraphCollector {
    pub fn new(client: Arc<NoteClient>, config: &SyncConfig) -> Self {
        Self {
            client,
            query: NoteQuery::default(),
            graph_id: config.graph_id.clone(),
            max_concurrent_requests: config.max_concurrent_requests,
        }
    }

    pub fn with_query(mut self, query: NoteQuery) -> Self {
        self.query = query;
        self
    }

    /// Collect every note in the store, up to `max_notes`
    pub async fn collect_all_notes(&self, max_notes: Option<usize>) -> StoreResult<CollectedNotes> {
        let fetched = self.client.get_notes(&self.query, max_notes).await?;
        let mut notes = fetched.results;

        if fetched.truncated {
            warn!(
                "Collected {} notes before reaching the limit; keeping links to uncollected notes",
                notes.len()
            );
        } else {
            discard_bad_links(&mut notes, &HashSet::new());
        }

        debug!("Collected {} notes", notes.len());
        Ok(CollectedNotes {
            notes,
            missing_notes: Vec::new(),
            degree: 0,
            truncated: fetched.truncated,
        })
    }

    /// Collect `source_id` and every note reachable from it in at most
    /// `max_degree` link hops
    ///
    /// The walk is breadth-first, one degree per batch. Notes at the last
    /// degree are collected but their links are not followed. No note is
    /// fetched twice. Once `max_notes` notes are held, the walk stops and the
    /// result is flagged as truncated.
    pub async fn collect_notes_in_range(
        &self,
        source_id: &str,
        max_degree: usize,
        max_notes: Option<usize>,
    ) -> StoreResult<CollectedNotes> {
        let max_notes = max_notes.unwrap_or(usize::MAX);
        let mut notes: Vec<Note> = Vec::new();
        let mut collected: HashSet<String> = HashSet::new();
        let mut missing_notes: Vec<String> = Vec::new();
        let mut pending: Vec<String> = vec![source_id.to_string()];
        let mut degree = 0;
        let mut truncated = false;

        loop {
            let mut batch: HashSet<String> = HashSet::new();
            pending.retain(|id| {
                !collected.contains(id) && !missing_notes.contains(id) && batch.insert(id.clone())
            });

            let fetched = self
                .client
                .get_notes_by_ids(&self.query, &pending, self.max_concurrent_requests)
                .await?;
            pending.clear();

            for mut note in fetched.results {
                if collected.contains(&note.id) {
                    continue;
                }
                if notes.len() >= max_notes {
                    truncated = true;
                    break;
                }

                note.degree = Some(degree);
                if degree >= max_degree {
                    note.visit_links = false;
                    if !note.links.is_empty() {
                        warn!(
                            "Not following {} link(s) of note {} at degree {}",
                            note.links.len(),
                            note.id,
                            degree
                        );
                    }
                } else {
                    pending.extend(
                        note.links
                            .iter()
                            .filter(|link| !collected.contains(&link.note_id))
                            .map(|link| link.note_id.clone()),
                    );
                }

                collected.insert(note.id.clone());
                notes.push(note);
            }
            missing_notes.extend(fetched.ids_not_found);

            degree += 1;
            if pending.is_empty() || degree > max_degree || truncated {
                break;
            }
        }

        if truncated {
            warn!(
                "Max number of notes reached: {}. Some notes may not be visible.",
                max_notes
            );
        }

        discard_bad_links(&mut notes, &missing_notes.iter().cloned().collect());

        Ok(CollectedNotes {
            notes,
            missing_notes,
            degree,
            truncated,
        })
    }

    /// Every note in the store as graph nodes
    pub async fn get_all_nodes(&self, max_notes: Option<usize>) -> StoreResult<Vec<Node>> {
        let collected = self.collect_all_notes(max_notes).await?;
        Ok(self.into_nodes(collected.notes))
    }

    /// The neighbourhood of `source_id` as graph nodes
    pub async fn get_nodes_in_range(
        &self,
        source_id: &str,
        max_degree: usize,
        max_notes: Option<usize>,
    ) -> StoreResult<Vec<Node>> {
        let collected = self
            .collect_notes_in_range(source_id, max_degree, max_notes)
            .await?;
        Ok(self.into_nodes(collected.notes))
    }

    /// One note as a graph node; fails with `StoreError::NotFound` if absent
    pub async fn get_node(&self, id: &str) -> StoreResult<Node> {
        let note = self.client.get_note(&self.query, id).await?;
        Ok(note.into_node(&self.graph_id))
    }

    fn into_nodes(&self, notes: Vec<Note>) -> Vec<Node> {
        notes
            .into_iter()
            .map(|note| note.into_node(&self.graph_id))
            .collect()
    }
}

/// Drop links that can never resolve
///
/// See the module docs for the two rules applied.
pub fn discard_bad_links(notes: &mut [Note], ids_not_found: &HashSet<String>) {
    let present: HashSet<String> = notes.iter().map(|note| note.id.clone()).collect();
    let mut discarded: Vec<String> = Vec::new();

    for note in notes.iter_mut() {
        let visit_links = note.visit_links;
        let source_id = note.id.clone();
        note.links.retain(|link| {
            let bad = ids_not_found.contains(&link.note_id)
                || (visit_links && !present.contains(&link.note_id));
            if bad {
                discarded.push(format!("{} -> {}", source_id, link.note_id));
            }
            !bad
        });
    }

    if !discarded.is_empty() {
        warn!(
            "Discarded {} link(s) to missing notes: {}",
            discarded.len(),
            discarded.join(", ")
        );
    }
}
