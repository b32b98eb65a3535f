//! In-memory NoteStore backend
//!
//! A deterministic, in-process [`NoteStore`] holding notes, tags, tag membership
//! and an append-only change log. The cursor is the offset into that log.
//!
//! Mutators record change records the way the host store does, including its
//! blind spots: tag operations record nothing, and deletions can be made silent.
//! Failure injection hooks make transient store errors reproducible, and a
//! read gate holds note reads in flight so interleavings can be tested.

use crate::db::{NotePage, NoteQuery, NoteStore, StoreError, StoreResult, StoreTag};
use crate::models::{ChangeBatch, ChangeKind, ChangeRecord, Cursor, RawNote};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_CHANGE_BATCH_LIMIT: usize = 100;

/// Serializable store content, used to seed a store from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub notes: Vec<RawNote>,
    #[serde(default)]
    pub tags: Vec<FixtureTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureTag {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub note_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    notes: BTreeMap<String, RawNote>,
    tags: BTreeMap<String, StoreTag>,
    /// tag id -> note ids
    members: BTreeMap<String, BTreeSet<String>>,
    changes: Vec<ChangeRecord>,
    failing_change_fetches: usize,
    failing_tag_fetches: usize,
    failing_notes: HashSet<String>,
    fetch_log: Vec<String>,
}

#[derive(Debug)]
pub struct InMemoryNoteStore {
    state: Mutex<MemoryState>,
    change_batch_limit: usize,
    /// `false` while note reads are held
    reads_open: watch::Sender<bool>,
    held_reads: AtomicUsize,
    change_fetches: AtomicUsize,
}

impl Default for InMemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            change_batch_limit: DEFAULT_CHANGE_BATCH_LIMIT,
            reads_open: watch::channel(true).0,
            held_reads: AtomicUsize::new(0),
            change_fetches: AtomicUsize::new(0),
        }
    }

    /// Cap the number of records returned by one `fetch_changes` call
    pub fn with_change_batch_limit(mut self, limit: usize) -> Self {
        self.change_batch_limit = limit.max(1);
        self
    }

    /// Seed a store; seeding records no change
    pub fn from_fixture(fixture: StoreFixture) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for note in fixture.notes {
                state.notes.insert(note.id.clone(), note);
            }
            for tag in fixture.tags {
                state
                    .members
                    .insert(tag.id.clone(), tag.note_ids.into_iter().collect());
                state
                    .tags
                    .insert(tag.id.clone(), StoreTag::new(tag.id, tag.title));
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_note(&self, note: RawNote) {
        let mut state = self.lock();
        state
            .changes
            .push(ChangeRecord::new(note.id.clone(), ChangeKind::Add));
        state.notes.insert(note.id.clone(), note);
    }

    /// Replace a note's content, recording an update
    pub fn update_note(&self, note: RawNote) {
        let mut state = self.lock();
        state
            .changes
            .push(ChangeRecord::new(note.id.clone(), ChangeKind::Update));
        state.notes.insert(note.id.clone(), note);
    }

    /// Record an update without changing anything, like an editor save that
    /// settles on identical content
    pub fn touch_note(&self, id: &str) {
        self.push_change(ChangeRecord::new(id, ChangeKind::Update));
    }

    pub fn delete_note(&self, id: &str) {
        self.remove_note(id);
        self.push_change(ChangeRecord::new(id, ChangeKind::Delete));
    }

    /// Delete a note without recording it, as the host store does for some
    /// deletion paths
    pub fn delete_note_silently(&self, id: &str) {
        self.remove_note(id);
    }

    fn remove_note(&self, id: &str) {
        let mut state = self.lock();
        state.notes.remove(id);
        for members in state.members.values_mut() {
            members.remove(id);
        }
    }

    pub fn push_change(&self, record: ChangeRecord) {
        self.lock().changes.push(record);
    }

    pub fn add_tag(&self, id: &str, title: &str) {
        let mut state = self.lock();
        state.tags.insert(id.to_string(), StoreTag::new(id, title));
        state.members.entry(id.to_string()).or_default();
    }

    pub fn remove_tag(&self, id: &str) {
        let mut state = self.lock();
        state.tags.remove(id);
        state.members.remove(id);
    }

    pub fn tag_note(&self, tag_id: &str, note_id: &str) {
        self.lock()
            .members
            .entry(tag_id.to_string())
            .or_default()
            .insert(note_id.to_string());
    }

    pub fn untag_note(&self, tag_id: &str, note_id: &str) {
        if let Some(members) = self.lock().members.get_mut(tag_id) {
            members.remove(note_id);
        }
    }

    /// Make the next `count` change feed requests fail
    pub fn fail_next_change_fetches(&self, count: usize) {
        self.lock().failing_change_fetches = count;
    }

    /// Make the next `count` tag listings fail
    pub fn fail_next_tag_fetches(&self, count: usize) {
        self.lock().failing_tag_fetches = count;
    }

    /// Make every fetch of `id` fail with a transient error until restored
    pub fn fail_note(&self, id: &str) {
        self.lock().failing_notes.insert(id.to_string());
    }

    pub fn restore_note(&self, id: &str) {
        self.lock().failing_notes.remove(id);
    }

    /// Ids passed to `fetch_note`, in call order
    pub fn fetched_note_ids(&self) -> Vec<String> {
        self.lock().fetch_log.clone()
    }

    pub fn clear_fetch_log(&self) {
        self.lock().fetch_log.clear();
    }

    /// Hold note reads (`fetch_notes_page`, `fetch_note`) after they have
    /// read the store, until `release_note_reads`
    pub fn hold_note_reads(&self) {
        self.reads_open.send_replace(false);
    }

    pub fn release_note_reads(&self) {
        self.reads_open.send_replace(true);
    }

    /// Note reads currently waiting on the gate
    pub fn held_reads(&self) -> usize {
        self.held_reads.load(Ordering::SeqCst)
    }

    /// Number of `fetch_changes` calls so far
    pub fn change_fetch_count(&self) -> usize {
        self.change_fetches.load(Ordering::SeqCst)
    }

    async fn pass_read_gate(&self) {
        let mut open = self.reads_open.subscribe();
        if *open.borrow_and_update() {
            return;
        }
        self.held_reads.fetch_add(1, Ordering::SeqCst);
        // the sender lives as long as the store
        let _ = open.wait_for(|open| *open).await;
        self.held_reads.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn note_count(&self) -> usize {
        self.lock().notes.len()
    }

    /// Cursor pointing past every recorded change
    pub fn head(&self) -> Cursor {
        Cursor::new(self.lock().changes.len().to_string())
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn fetch_notes_page(&self, query: &NoteQuery, page: usize) -> StoreResult<NotePage> {
        let page = {
            let state = self.lock();
            let page_size = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
            let skip = page.saturating_sub(1) * page_size;
            let items: Vec<RawNote> = state
                .notes
                .values()
                .skip(skip)
                .take(page_size)
                .cloned()
                .collect();
            NotePage {
                has_more: state.notes.len() > skip + items.len(),
                items,
            }
        };
        self.pass_read_gate().await;
        Ok(page)
    }

    async fn fetch_note(&self, _query: &NoteQuery, id: &str) -> StoreResult<RawNote> {
        let note = {
            let mut state = self.lock();
            state.fetch_log.push(id.to_string());
            if state.failing_notes.contains(id) {
                Err(StoreError::unavailable(format!("fetch of note {id} failed")))
            } else {
                state
                    .notes
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found(id))
            }
        };
        self.pass_read_gate().await;
        note
    }

    async fn fetch_note_tags(&self, note_id: &str) -> StoreResult<Vec<String>> {
        let state = self.lock();
        Ok(state
            .members
            .iter()
            .filter(|(_, members)| members.contains(note_id))
            .filter_map(|(tag_id, _)| state.tags.get(tag_id))
            .map(|tag| tag.title.clone())
            .collect())
    }

    async fn fetch_changes(&self, cursor: Option<&Cursor>) -> StoreResult<ChangeBatch> {
        self.change_fetches.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.failing_change_fetches > 0 {
            state.failing_change_fetches -= 1;
            return Err(StoreError::unavailable("change feed request failed"));
        }

        let head = state.changes.len();
        let Some(cursor) = cursor else {
            return Ok(ChangeBatch {
                records: Vec::new(),
                cursor: Cursor::new(head.to_string()),
            });
        };

        let start: usize = cursor
            .as_str()
            .parse()
            .map_err(|_| StoreError::invalid_response(format!("bad cursor {cursor}")))?;
        let start = start.min(head);
        let end = (start + self.change_batch_limit).min(head);

        Ok(ChangeBatch {
            records: state.changes[start..end].to_vec(),
            cursor: Cursor::new(end.to_string()),
        })
    }

    async fn fetch_tags(&self) -> StoreResult<Vec<StoreTag>> {
        let mut state = self.lock();
        if state.failing_tag_fetches > 0 {
            state.failing_tag_fetches -= 1;
            return Err(StoreError::unavailable("tag listing failed"));
        }
        Ok(state.tags.values().cloned().collect())
    }

    async fn fetch_note_ids_for_tag(&self, tag_id: &str) -> StoreResult<Vec<String>> {
        let state = self.lock();
        let members = state
            .members
            .get(tag_id)
            .ok_or_else(|| StoreError::not_found(tag_id))?;
        Ok(members
            .iter()
            .filter(|id| state.notes.contains_key(*id))
            .cloned()
            .collect())
    }
}
