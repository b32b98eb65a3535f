//! Data Models
//!
//! This module contains the value types shared by every layer of NoteGraph:
//!
//! - `Node`, `Link` - graph nodes and the edges they own
//! - `Note`, `RawNote`, `NoteLink` - notes as fetched from the store
//! - `Tag`, `TagIndex` - tags and their member notes
//! - `Graph` - the canonical mirror, `GraphUpdate` - diffs against it
//! - `ChangeRecord`, `Cursor` - change feed records
//! - `Setting`, `Settings` - view settings forwarded to the consumer
//! - `PluginMessage` - everything the consumer can receive
//!
//! Types reference each other by id only; the canonical `Graph` is the single
//! owner of node identity.

mod change;
mod graph;
mod graph_update;
mod message;
mod node;
mod note;
mod settings;
mod tag;

pub use change::{ChangeBatch, ChangeKind, ChangeRecord, Cursor};
pub use graph::{Graph, GraphMutation};
pub use graph_update::GraphUpdate;
pub use message::{GraphSnapshot, PluginMessage};
pub use node::{Link, LinkPosition, Node, NodeType, REFERENCE_LINK_TYPE, TAG_LINK_TYPE};
pub use note::{Note, NoteLink, RawNote};
pub use settings::{Setting, SettingLabel, SettingValue, Settings};
pub use tag::{Tag, TagIndex};
