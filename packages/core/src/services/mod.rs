//! Business Services
//!
//! This module contains the services that build and maintain the graph:
//!
//! - `NoteClient` - pagination and batching over the raw note store
//! - `GraphCollector` - bulk collection (whole store or a link neighbourhood)
//! - `TagReconciler` - rebuilds the tag index and diffs it
//! - `GraphSyncService` - polls the change feed and publishes graph updates
//! - `NotificationChannel` - ordered long-poll delivery to the consumer
//! - `GraphSession` - composition root exposed to the consumer
//!
//! Services share the canonical graph and never hold references to each
//! other's internals; the session owns them all.

pub mod error;
pub mod graph_collector;
pub mod graph_session;
pub mod graph_sync_service;
pub mod note_client;
pub mod notification_channel;
pub mod tag_reconciler;

pub use error::{ChannelError, SyncError};
pub use graph_collector::{discard_bad_links, CollectedNotes, GraphCollector};
pub use graph_session::GraphSession;
pub use graph_sync_service::GraphSyncService;
pub use note_client::{NoteClient, NoteQueryResults, TagMembers, DEFAULT_PAGE_SIZE};
pub use notification_channel::NotificationChannel;
pub use tag_reconciler::{TagReconciler, TagReconciliation};
