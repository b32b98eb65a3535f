//! Messages delivered to the rendering consumer
//!
//! Every message the consumer can receive through the notification channel is a
//! variant of [`PluginMessage`]; consumers match on it exhaustively.

use crate::models::{GraphUpdate, Node, Setting, TagIndex};
use serde::{Deserialize, Serialize};

/// Complete graph state, sent in answer to a data request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub graph_id: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub tag_index: TagIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginMessage {
    /// Replace (or merge) the consumer's whole node set
    FullUpdate(GraphSnapshot),
    /// Incremental diff
    PartialUpdate(GraphUpdate),
    /// Selection changed in the host editor
    #[serde(rename_all = "camelCase")]
    NoteSelected { note_ids: Vec<String> },
    /// Key/value settings snapshot or change set
    SettingsUpdate { settings: Vec<Setting> },
}

impl PluginMessage {
    /// Event name as seen on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            PluginMessage::FullUpdate(_) => "FULL_UPDATE",
            PluginMessage::PartialUpdate(_) => "PARTIAL_UPDATE",
            PluginMessage::NoteSelected { .. } => "NOTE_SELECTED",
            PluginMessage::SettingsUpdate { .. } => "SETTINGS_UPDATE",
        }
    }
}
