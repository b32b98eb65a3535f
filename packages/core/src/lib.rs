//! NoteGraph Core
//!
//! This crate mirrors a note store as a live graph: notes become nodes, the
//! references in their Markdown bodies become links, and tags become tag nodes
//! linked to the notes that carry them.
//!
//! # Architecture
//!
//! - **Single canonical graph**: bulk loads and incremental sync both write into
//!   one [`models::Graph`]; links to absent notes are parked, never stored
//! - **Polling sync**: the store's change feed is polled on a timer; each cycle
//!   commits atomically or rolls its cursor back
//! - **Reconciled tags**: tag membership is rebuilt and diffed, since the change
//!   feed never reports it
//! - **Long-poll delivery**: consumers pull ordered messages from a
//!   notification channel
//!
//! # Modules
//!
//! - [`models`] - Value types (Node, Link, Note, Tag, Graph, GraphUpdate, ...)
//! - [`db`] - Note store seam and the in-memory backend
//! - [`services`] - Collector, sync engine, tag reconciler, channel, session
//! - [`utils`] - Link extraction from Markdown bodies
//! - [`config`] - Session configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{SyncConfig, TagSyncMode};
pub use models::*;
pub use services::*;
