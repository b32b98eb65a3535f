//! Utility functions for NoteGraph Core
//!
//! This module provides the pure text-processing helpers used when notes are
//! turned into graph nodes.

mod note_links;

pub use note_links::extract_note_links;
