//! # Playback Error Types
//!
//! Failures surfaced by player slots. User-facing playback failures (timeouts,
//! engine errors) are never returned as errors: they become
//! [`PlaybackStatus::Error`](crate::state::PlaybackStatus) with a message.
//! This enum covers misuse of the slot API and host bridge failures.

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The slot task has stopped (unmounted or dropped).
    #[error("Player slot is closed")]
    SlotClosed,

    /// The source URL is empty or otherwise unusable.
    #[error("Invalid audio source: {0}")]
    InvalidSource(String),

    /// Seek target is not a finite number of seconds.
    #[error("Invalid seek position: {0}")]
    InvalidSeek(f64),

    /// Host playback engine failed.
    #[error("Playback engine error: {0}")]
    Engine(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the slot can no longer accept commands.
    pub fn is_closed(&self) -> bool {
        matches!(self, PlaybackError::SlotClosed)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
