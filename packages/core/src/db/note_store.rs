//! NoteStore Trait - Note Store Abstraction Layer
//!
//! This module defines the `NoteStore` trait: the raw primitives NoteGraph needs
//! from the host note store. Pagination, batching and note building live one
//! layer up in [`NoteClient`], so a backend only has to answer single requests.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: every primitive is async; the host API is remote or IPC
//! 2. **Not-found is data**: a missing note is `StoreError::NotFound`, any other
//!    error is transient
//! 3. **Lossy change feed**: `fetch_changes` never reports tag membership changes
//!    and may miss deletions; callers reconcile those separately
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::db::{InMemoryNoteStore, NoteStore};
//! use notegraph_core::models::RawNote;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = InMemoryNoteStore::new();
//! store.insert_note(RawNote::new("a", "Alpha", "[b](:/b)"));
//!
//! let head = store.fetch_changes(None).await?;
//! assert!(head.records.is_empty());
//!
//! store.insert_note(RawNote::new("b", "Beta", ""));
//! let batch = store.fetch_changes(Some(&head.cursor)).await?;
//! assert_eq!(batch.records.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! [`NoteClient`]: crate::services::NoteClient

use crate::db::StoreResult;
use crate::models::{ChangeBatch, Cursor, RawNote};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Query parameters forwarded to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteQuery {
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_dir: Option<String>,
    /// Page size for paginated listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            fields: ["id", "parent_id", "title", "body"]
                .into_iter()
                .map(String::from)
                .collect(),
            order_by: None,
            order_dir: Some("DESC".to_string()),
            limit: None,
        }
    }
}

impl NoteQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of a note listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePage {
    pub items: Vec<RawNote>,
    pub has_more: bool,
}

/// Tag record as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTag {
    pub id: String,
    pub title: String,
}

impl StoreTag {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Raw note store primitives
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the sync engine calls them from a
/// spawned tokio task.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch page `page` (1-based) of the note listing
    async fn fetch_notes_page(&self, query: &NoteQuery, page: usize) -> StoreResult<NotePage>;

    /// Fetch one note; `StoreError::NotFound` if it does not exist
    async fn fetch_note(&self, query: &NoteQuery, id: &str) -> StoreResult<RawNote>;

    /// Titles of the tags attached to a note
    async fn fetch_note_tags(&self, note_id: &str) -> StoreResult<Vec<String>>;

    /// Change records after `cursor`
    ///
    /// With no cursor, returns no records and the current head cursor so that
    /// polling starts from "now".
    async fn fetch_changes(&self, cursor: Option<&Cursor>) -> StoreResult<ChangeBatch>;

    /// Every tag in the store
    async fn fetch_tags(&self) -> StoreResult<Vec<StoreTag>>;

    /// Ids of the notes currently carrying a tag
    async fn fetch_note_ids_for_tag(&self, tag_id: &str) -> StoreResult<Vec<String>>;
}
