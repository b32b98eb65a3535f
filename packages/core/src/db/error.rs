//! Note Store Error Types
//!
//! This module defines the errors a note store backend can report. Only
//! `NotFound` says something about the data; every other variant is a transient
//! failure the caller is expected to retry.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested note or tag does not exist
    #[error("Item not found: {id}")]
    NotFound { id: String },

    /// The store could not be reached or refused the request
    #[error("Note store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with something that could not be interpreted
    #[error("Invalid response from note store: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
