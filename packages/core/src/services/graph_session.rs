//! Graph session
//!
//! [`GraphSession`] wires one canonical [`Graph`] to everything that reads or
//! writes it and is the only surface a consumer talks to:
//!
//! ```text
//!                 ┌──────────────── GraphSession ────────────────┐
//! consumer ──────►│ request_full_update ─► GraphCollector ─┐     │
//!  (requests)     │ on_note_selection_changed              ├─► Graph
//!                 │ on_settings_changed   GraphSyncService ┘     │
//!                 │                              │               │
//! consumer ◄──────│ accept ◄── NotificationChannel ◄─────────────┘
//!  (long-poll)    └──────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::config::SyncConfig;
//! use notegraph_core::db::InMemoryNoteStore;
//! use notegraph_core::models::{PluginMessage, RawNote};
//! use notegraph_core::services::GraphSession;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryNoteStore::new());
//! store.insert_note(RawNote::new("a", "Alpha", "[b](:/b)"));
//! store.insert_note(RawNote::new("b", "Beta", ""));
//!
//! let session = GraphSession::new(store, SyncConfig::default())?;
//! session.request_full_update().await?;
//!
//! let PluginMessage::FullUpdate(snapshot) = session.accept().await? else {
//!     panic!("expected a full update");
//! };
//! assert_eq!(snapshot.nodes.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::SyncConfig;
use crate::db::NoteStore;
use crate::models::{Graph, GraphSnapshot, PluginMessage, Setting, Settings};
use crate::services::{
    ChannelError, GraphCollector, GraphSyncService, NoteClient, NotificationChannel, SyncError,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct GraphSession {
    config: Mutex<SyncConfig>,
    graph: Arc<RwLock<Graph>>,
    channel: Arc<NotificationChannel<PluginMessage>>,
    collector: GraphCollector,
    sync: GraphSyncService,
    settings: Mutex<Settings>,
}

impl GraphSession {
    pub fn new(store: Arc<dyn NoteStore>, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;

        let client = Arc::new(NoteClient::new(store).with_page_size(config.page_size));
        let graph = Arc::new(RwLock::new(Graph::new(config.graph_id.clone())));
        let channel = Arc::new(NotificationChannel::new());
        let collector = GraphCollector::new(Arc::clone(&client), &config);
        let sync = GraphSyncService::new(client, Arc::clone(&graph), Arc::clone(&channel), &config);

        Ok(Self {
            config: Mutex::new(config),
            graph,
            channel,
            collector,
            sync,
            settings: Mutex::new(Settings::default()),
        })
    }

    pub fn graph(&self) -> &Arc<RwLock<Graph>> {
        &self.graph
    }

    pub fn channel(&self) -> &Arc<NotificationChannel<PluginMessage>> {
        &self.channel
    }

    pub fn sync(&self) -> &GraphSyncService {
        &self.sync
    }

    pub fn config(&self) -> SyncConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load the graph and start syncing
    ///
    /// The change feed head is read before the full load so that no change made
    /// during the load is missed. With tag tracking on, the initial tag nodes
    /// follow the full update as a partial update.
    pub async fn start(&self) -> Result<(), SyncError> {
        if self.sync.cursor().await.is_none() {
            self.sync.poll_once().await?;
        }
        self.request_full_update().await?;
        if self.config().track_tags {
            self.sync.reconcile_tags().await?;
        }
        self.sync.resume();
        Ok(())
    }

    pub fn stop(&self) {
        self.sync.pause();
    }

    /// Reload every note and publish the whole graph
    ///
    /// Sync cycles are held off from the fetch until the snapshot is queued,
    /// so every later partial update applies on top of it.
    pub async fn request_full_update(&self) -> Result<(), SyncError> {
        self.sync.hold_cycles(self.reload_and_publish()).await
    }

    async fn reload_and_publish(&self) -> Result<(), SyncError> {
        let nodes = self.collector.get_all_nodes(self.config().max_notes).await?;

        let snapshot = {
            let mut graph = self.graph.write().await;
            graph.replace_notes(nodes);
            GraphSnapshot {
                graph_id: graph.id().to_string(),
                nodes: graph.snapshot(),
                tag_index: graph.tag_index().clone(),
            }
        };

        info!("Full graph update: {} nodes", snapshot.nodes.len());
        self.channel.notify(PluginMessage::FullUpdate(snapshot));
        Ok(())
    }

    /// Publish every setting with its current value
    pub fn request_settings(&self) {
        let settings = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        self.channel.notify(PluginMessage::SettingsUpdate { settings });
    }

    /// Apply settings changed by the host and publish the ones that changed
    pub fn on_settings_changed(&self, changes: Vec<Setting>) {
        let changed = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(changes);
        if changed.is_empty() {
            debug!("Settings change carried no new values");
            return;
        }

        let interval = {
            let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
            config
                .apply_settings(&changed)
                .then(|| config.poll_interval())
        };
        if let Some(interval) = interval {
            self.sync.set_poll_interval(interval);
        }

        self.channel
            .notify(PluginMessage::SettingsUpdate { settings: changed });
    }

    /// Track the note open in the editor and forward the selection
    pub async fn on_note_selection_changed(&self, note_ids: Vec<String>) -> Result<(), SyncError> {
        self.sync.set_open_note(note_ids.first().cloned());
        if self.config().refresh_on_selection {
            self.request_full_update().await?;
        }
        self.channel.notify(PluginMessage::NoteSelected { note_ids });
        Ok(())
    }

    /// Long-poll for the next message
    pub async fn accept(&self) -> Result<PluginMessage, ChannelError> {
        self.channel.accept().await
    }
}
