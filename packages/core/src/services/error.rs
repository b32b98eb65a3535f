//! Service Layer Error Types
//!
//! This module defines error types for the sync services and the notification
//! channel.

use crate::db::StoreError;
use thiserror::Error;

/// Sync service errors
///
/// None of these is fatal to the sync engine: a failed cycle is logged, rolled
/// back and retried on the next tick.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Note store request failed
    #[error("Note store request failed: {0}")]
    Store(#[from] StoreError),

    /// Notification channel refused an operation
    #[error("Notification channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading configuration failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Notification channel errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// `accept()` was called while another acceptance was still outstanding
    ///
    /// This is a broken consumer contract; the channel is poisoned afterwards.
    #[error("An acceptance is already pending on this channel")]
    AcceptAlreadyPending,

    /// The channel was poisoned by an earlier protocol violation
    #[error("Channel poisoned by a protocol violation")]
    Poisoned,

    /// The channel was closed
    #[error("Channel closed")]
    Closed,
}
