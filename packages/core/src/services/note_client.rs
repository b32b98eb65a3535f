//! Note store client
//!
//! [`NoteClient`] turns the raw [`NoteStore`] primitives into the queries the
//! graph layer works with:
//!
//! - paginated listing with a node cutoff that reports truncation distinctly
//! - batched lookup by id with a concurrency limit that reports unresolvable
//!   ids instead of failing
//! - building [`Note`]s (tags attached, links extracted) from raw records
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::db::{InMemoryNoteStore, NoteQuery};
//! use notegraph_core::models::RawNote;
//! use notegraph_core::services::NoteClient;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryNoteStore::new());
//! store.insert_note(RawNote::new("a", "Alpha", "[b](:/b)"));
//! let client = NoteClient::new(store);
//!
//! let ids = vec!["a".to_string(), "gone".to_string()];
//! let fetched = client
//!     .get_notes_by_ids(&NoteQuery::default(), &ids, 10)
//!     .await?;
//! assert_eq!(fetched.results[0].links[0].note_id, "b");
//! assert_eq!(fetched.ids_not_found, vec!["gone".to_string()]);
//! # Ok(())
//! # }
//! ```

use crate::db::{NoteQuery, NoteStore, StoreResult, StoreTag};
use crate::models::{ChangeBatch, Cursor, Note, RawNote};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of notes requested per listing page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A tag with the ids of the notes carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMembers {
    pub tag: StoreTag,
    pub note_ids: Vec<String>,
}

/// Result of a note query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQueryResults {
    pub results: Vec<Note>,
    /// Requested ids the store reported as missing
    pub ids_not_found: Vec<String>,
    /// True if a cutoff kept some matching notes out of `results`
    pub truncated: bool,
}

pub struct NoteClient {
    store: Arc<dyn NoteStore>,
    page_size: usize,
}

impl NoteClient {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    /// Fetch every note matching `query`, up to `max` notes
    ///
    /// Pages are requested until the store has no more or more than `max`
    /// notes were received. In the latter case the result is cut to `max` and
    /// flagged as truncated.
    pub async fn get_notes(
        &self,
        query: &NoteQuery,
        max: Option<usize>,
    ) -> StoreResult<NoteQueryResults> {
        let max = max.unwrap_or(usize::MAX);
        let mut query = query.clone();
        query.limit = Some(query.limit.unwrap_or(self.page_size));

        let mut raw_notes: Vec<RawNote> = Vec::new();
        let mut page_num = 1;
        let mut truncated = false;

        loop {
            let page = self.store.fetch_notes_page(&query, page_num).await?;
            raw_notes.extend(page.items);
            page_num += 1;

            if raw_notes.len() > max {
                truncated = true;
                break;
            }
            if !page.has_more {
                break;
            }
        }

        if truncated {
            warn!(
                "Max number of notes reached: {}. Some notes may not be visible.",
                max
            );
            raw_notes.truncate(max);
        }

        let results = try_join_all(raw_notes.into_iter().map(|raw| self.build_note(raw))).await?;

        Ok(NoteQueryResults {
            results,
            ids_not_found: Vec::new(),
            truncated,
        })
    }

    /// Fetch the notes with the given ids, `max_concurrent` requests at a time
    ///
    /// Ids the store does not know are listed in `ids_not_found`. Any other
    /// store error aborts the whole lookup: a transient failure says nothing
    /// about whether the note exists.
    pub async fn get_notes_by_ids(
        &self,
        query: &NoteQuery,
        ids: &[String],
        max_concurrent: usize,
    ) -> StoreResult<NoteQueryResults> {
        let mut results = Vec::with_capacity(ids.len());
        let mut ids_not_found = Vec::new();

        for chunk in ids.chunks(max_concurrent.max(1)) {
            let fetched = join_all(chunk.iter().map(|id| self.get_note(query, id))).await;
            for (id, outcome) in chunk.iter().zip(fetched) {
                match outcome {
                    Ok(note) => results.push(note),
                    Err(e) if e.is_not_found() => ids_not_found.push(id.clone()),
                    Err(e) => return Err(e),
                }
            }
        }

        if !ids_not_found.is_empty() {
            warn!("Notes not found: {:?}", ids_not_found);
        }

        Ok(NoteQueryResults {
            results,
            ids_not_found,
            truncated: false,
        })
    }

    /// Fetch a single note; fails with `StoreError::NotFound` if absent
    pub async fn get_note(&self, query: &NoteQuery, id: &str) -> StoreResult<Note> {
        let raw = self.store.fetch_note(query, id).await?;
        self.build_note(raw).await
    }

    pub async fn get_changes(&self, cursor: Option<&Cursor>) -> StoreResult<ChangeBatch> {
        let batch = self.store.fetch_changes(cursor).await?;
        debug!(
            "Fetched {} change record(s), cursor {:?} -> {}",
            batch.records.len(),
            cursor,
            batch.cursor
        );
        Ok(batch)
    }

    /// Every tag with its member note ids
    ///
    /// A tag deleted between listing and member lookup is skipped.
    pub async fn get_tags(&self) -> StoreResult<Vec<TagMembers>> {
        let tags = self.store.fetch_tags().await?;
        let lookups = join_all(tags.iter().map(|tag| self.get_node_ids_for_tag(tag))).await;

        let mut members = Vec::with_capacity(tags.len());
        for (tag, lookup) in tags.into_iter().zip(lookups) {
            match lookup {
                Ok(note_ids) => members.push(TagMembers { tag, note_ids }),
                Err(e) if e.is_not_found() => debug!("Tag {} vanished during lookup", tag.id),
                Err(e) => return Err(e),
            }
        }
        Ok(members)
    }

    pub async fn get_node_ids_for_tag(&self, tag: &StoreTag) -> StoreResult<Vec<String>> {
        self.store.fetch_note_ids_for_tag(&tag.id).await
    }

    async fn build_note(&self, raw: RawNote) -> StoreResult<Note> {
        let tags = self.store.fetch_note_tags(&raw.id).await?;
        Ok(Note::from_raw(raw, tags))
    }
}
