//! Incremental Graph Sync
//!
//! Keeps the canonical [`Graph`] current by polling the note store's change
//! feed and publishing a [`GraphUpdate`] per cycle through the notification
//! channel.
//!
//! ## Sync Cycle
//!
//! 1. Fetch change records after the saved cursor and advance the cursor
//! 2. Stage one graph mutation per record, fetching ADD/UPDATE notes
//! 3. Optionally stage the tag index reconciliation (inline mode)
//! 4. Commit the staged mutations to the graph in one step
//! 5. Publish the resulting update if it carries anything
//!
//! ## Failure Handling
//!
//! A cycle either commits completely or not at all. On any error the cursor is
//! restored to its value before the cycle and nothing is written to the graph,
//! so the next tick retries the same records. Cycles are serialized by the
//! cursor lock: a tick that fires while a cycle is in flight waits for it.
//! Full reloads take the same lock through [`GraphSyncService::hold_cycles`],
//! so a reload can never write an older snapshot over a newer cycle.
//!
//! ## Update Suppression
//!
//! Editors save the open note continuously. An UPDATE for the note currently
//! open in the editor is dropped when the rebuilt node equals the stored one.
//! Updates to other notes are always published, even when unchanged.

use crate::config::{SyncConfig, TagSyncMode};
use crate::db::NoteQuery;
use crate::models::{
    ChangeKind, ChangeRecord, Cursor, Graph, GraphMutation, GraphUpdate, PluginMessage,
};
use crate::services::{NoteClient, NotificationChannel, SyncError, TagReconciler, TagReconciliation};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio::time::MissedTickBehavior;

/// State shared between the service handle and its timer task
struct SyncShared {
    client: Arc<NoteClient>,
    graph: Arc<AsyncRwLock<Graph>>,
    channel: Arc<NotificationChannel<PluginMessage>>,
    reconciler: TagReconciler,
    query: NoteQuery,
    graph_id: String,
    track_tags: bool,
    tag_sync: TagSyncMode,
    poll_interval: Mutex<Duration>,
    /// Held for the whole cycle; `None` until the first cycle reads the head
    cursor: AsyncMutex<Option<Cursor>>,
    open_note: RwLock<Option<String>>,
    /// Held while a tag reconciliation pass runs
    tag_pass: AsyncMutex<()>,
}

/// Polling sync engine
///
/// Must be resumed from within a tokio runtime. Dropping the service stops the
/// timer.
pub struct GraphSyncService {
    shared: Arc<SyncShared>,
    timer: Mutex<Option<mpsc::Sender<()>>>,
}

impl GraphSyncService {
    pub fn new(
        client: Arc<NoteClient>,
        graph: Arc<AsyncRwLock<Graph>>,
        channel: Arc<NotificationChannel<PluginMessage>>,
        config: &SyncConfig,
    ) -> Self {
        let reconciler = TagReconciler::new(Arc::clone(&client), config.graph_id.clone());
        Self {
            shared: Arc::new(SyncShared {
                client,
                graph,
                channel,
                reconciler,
                query: NoteQuery::default(),
                graph_id: config.graph_id.clone(),
                track_tags: config.track_tags,
                tag_sync: config.tag_sync,
                poll_interval: Mutex::new(config.poll_interval()),
                cursor: AsyncMutex::new(None),
                open_note: RwLock::new(None),
                tag_pass: AsyncMutex::new(()),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Start (or restart) periodic polling
    ///
    /// The first cycle runs one poll interval from now.
    pub fn resume(&self) {
        let mut timer = self.timer_slot();
        // dropping the previous sender stops the previous loop
        timer.take();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let shared = Arc::clone(&self.shared);
        let period = shared.poll_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Sync timer stopped");
                        break;
                    }

                    _ = ticker.tick() => {
                        // failures are logged and retried on the next tick
                        let _ = shared.poll_once().await;
                    }
                }
            }
        });

        *timer = Some(shutdown_tx);
        tracing::info!("Graph sync resumed, polling every {:?}", period);
    }

    /// Stop periodic polling
    ///
    /// A cycle already in flight runs to completion; no further cycle starts.
    pub fn pause(&self) {
        if self.timer_slot().take().is_some() {
            tracing::info!("Graph sync paused");
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer_slot()
            .as_ref()
            .is_some_and(|shutdown_tx| !shutdown_tx.is_closed())
    }

    /// Change the poll interval, re-arming the timer if it is running
    pub fn set_poll_interval(&self, interval: Duration) {
        *self
            .shared
            .poll_interval
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = interval;
        if self.is_active() {
            self.resume();
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval()
    }

    /// Record the note open in the editor, for update suppression
    pub fn set_open_note(&self, note_id: Option<String>) {
        *self
            .shared
            .open_note
            .write()
            .unwrap_or_else(PoisonError::into_inner) = note_id;
    }

    pub fn open_note(&self) -> Option<String> {
        self.shared.open_note()
    }

    /// Cursor after the last successful cycle
    pub async fn cursor(&self) -> Option<Cursor> {
        self.shared.cursor.lock().await.clone()
    }

    /// Run one sync cycle now
    ///
    /// Returns the published update, or `None` when the cycle changed nothing.
    /// The first cycle only reads the head of the change feed.
    pub async fn poll_once(&self) -> Result<Option<GraphUpdate>, SyncError> {
        self.shared.poll_once().await
    }

    /// Run `work` with no sync cycle in flight
    ///
    /// Waits for a running cycle to finish, and holds off the next one until
    /// `work` completes. Changes recorded meanwhile are applied by the next
    /// cycle.
    pub async fn hold_cycles<F: Future>(&self, work: F) -> F::Output {
        let _cursor = self.shared.cursor.lock().await;
        work.await
    }

    /// Run a tag reconciliation pass now and publish its update on its own
    ///
    /// Waits for any pass already running.
    pub async fn reconcile_tags(&self) -> Result<Option<GraphUpdate>, SyncError> {
        let _pass = self.shared.tag_pass.lock().await;
        self.shared.reconcile_tags_locked().await
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GraphSyncService {
    fn drop(&mut self) {
        self.pause();
    }
}

impl SyncShared {
    fn poll_interval(&self) -> Duration {
        *self
            .poll_interval
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn open_note(&self) -> Option<String> {
        self.open_note
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn poll_once(self: &Arc<Self>) -> Result<Option<GraphUpdate>, SyncError> {
        let mut cursor = self.cursor.lock().await;
        let recovery_cursor = cursor.clone();

        match self.run_cycle(&mut cursor).await {
            Ok(update) => Ok(update),
            Err(e) => {
                tracing::warn!(
                    "Sync cycle failed, retrying from cursor {:?} on next tick: {}",
                    recovery_cursor,
                    e
                );
                *cursor = recovery_cursor;
                Err(e)
            }
        }
    }

    async fn run_cycle(
        self: &Arc<Self>,
        cursor: &mut Option<Cursor>,
    ) -> Result<Option<GraphUpdate>, SyncError> {
        let first_cycle = cursor.is_none();
        let batch = self.client.get_changes(cursor.as_ref()).await?;
        *cursor = Some(batch.cursor);

        if first_cycle {
            tracing::debug!("Change feed head at {:?}", cursor);
            return Ok(None);
        }

        let open_note = self.open_note();
        let mut update = GraphUpdate::new(&self.graph_id);
        let mut mutations = Vec::new();
        for record in batch.records {
            self.stage_record(record, open_note.as_deref(), &mut update, &mut mutations)
                .await?;
        }

        if !self.track_tags {
            return Ok(self.commit_and_publish(mutations, update).await);
        }

        match self.tag_sync {
            TagSyncMode::Inline => {
                let _pass = self.tag_pass.lock().await;
                let previous = self.graph.read().await.tag_index().clone();
                let tags = self.reconciler.reconcile(&previous).await?;
                update.merge(tags.update);
                mutations.extend(tags.mutations);
                Ok(self.commit_and_publish(mutations, update).await)
            }
            TagSyncMode::Deferred => {
                let published = self.commit_and_publish(mutations, update).await;
                self.spawn_tag_pass();
                Ok(published)
            }
        }
    }

    /// Stage the graph mutation for one change record
    async fn stage_record(
        &self,
        record: ChangeRecord,
        open_note: Option<&str>,
        update: &mut GraphUpdate,
        mutations: &mut Vec<GraphMutation>,
    ) -> Result<(), SyncError> {
        let id = record.item_id;
        let kind = record.change_kind;

        if kind == ChangeKind::Delete {
            mutations.push(GraphMutation::Remove(id.clone()));
            update.delete.push(id);
            return Ok(());
        }

        let note = match self.client.get_note(&self.query, &id).await {
            Ok(note) => note,
            Err(e) if e.is_not_found() => {
                // deleted before we could read it
                if self.graph.read().await.contains(&id) {
                    tracing::debug!("Note {} vanished, staging removal", id);
                    mutations.push(GraphMutation::Remove(id.clone()));
                    update.delete.push(id);
                } else {
                    tracing::debug!("Skipping {:?} record for vanished note {}", kind, id);
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let node = note.into_node(&self.graph_id);

        if kind == ChangeKind::Add {
            mutations.push(GraphMutation::Upsert(node.clone()));
            update.add.push(node);
            return Ok(());
        }

        if open_note == Some(id.as_str()) {
            let graph = self.graph.read().await;
            if graph.node(&id) == Some(&graph.resolve(&node)) {
                tracing::debug!("Suppressing unchanged update of open note {}", id);
                return Ok(());
            }
        }
        mutations.push(GraphMutation::Upsert(node.clone()));
        update.update.push(node);
        Ok(())
    }

    /// Apply staged mutations and publish the update if it carries anything
    async fn commit_and_publish(
        &self,
        mutations: Vec<GraphMutation>,
        mut update: GraphUpdate,
    ) -> Option<GraphUpdate> {
        if !mutations.is_empty() || update.tag_index.is_some() {
            self.graph.write().await.commit(mutations, &mut update);
        }

        if !update.should_publish() {
            tracing::debug!("Sync cycle produced no changes");
            return None;
        }

        tracing::debug!(
            "Publishing graph update: {} added, {} updated, {} deleted",
            update.add.len(),
            update.update.len(),
            update.delete.len()
        );
        self.channel
            .notify(PluginMessage::PartialUpdate(update.clone()));
        Some(update)
    }

    async fn reconcile_tags_locked(&self) -> Result<Option<GraphUpdate>, SyncError> {
        let previous = self.graph.read().await.tag_index().clone();
        let TagReconciliation { update, mutations } = self.reconciler.reconcile(&previous).await?;
        Ok(self.commit_and_publish(mutations, update).await)
    }

    /// Reconcile tags off the cycle; skipped if a pass is already running
    fn spawn_tag_pass(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(_pass) = shared.tag_pass.try_lock() else {
                tracing::debug!("Tag reconciliation already running, skipping");
                return;
            };
            if let Err(e) = shared.reconcile_tags_locked().await {
                tracing::warn!("Deferred tag reconciliation failed: {}", e);
            }
        });
    }
}
