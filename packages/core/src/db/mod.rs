//! Note store layer
//!
//! - [`NoteStore`] - raw primitives of the host note store
//! - [`InMemoryNoteStore`] - in-process backend with a recorded change log
//! - [`StoreError`] - backend errors (not-found vs transient)

mod error;
mod memory_store;
mod note_store;

pub use error::{StoreError, StoreResult};
pub use memory_store::{FixtureTag, InMemoryNoteStore, StoreFixture};
pub use note_store::{NotePage, NoteQuery, NoteStore, StoreTag};
