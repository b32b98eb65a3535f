//! Change feed records
//!
//! The note store reports note-level changes as an ordered list of
//! [`ChangeRecord`]s plus a [`Cursor`] to resume from. Tag membership changes are
//! never reported here, and deletions are reported unreliably.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque resumption token of the change feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub item_id: String,
    pub change_kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(item_id: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            item_id: item_id.into(),
            change_kind,
        }
    }
}

/// One page of the change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub records: Vec<ChangeRecord>,
    pub cursor: Cursor,
}
