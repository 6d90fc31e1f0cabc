//! # Event Bus System
//!
//! Typed events broadcast through `tokio::sync::broadcast`, so hosts can
//! observe player slots, conversions and uploads without polling.
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ Player slot ├──────────────>│           │     subscribe    ┌────────────┐
//! └─────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌─────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ Transcoder  ├──────────────>│  channel) │
//! └─────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Finished {
//!     slot: "alto-part".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Playback(PlaybackEvent::Finished { .. })));
//! # }
//! ```
//!
//! Emitting with no subscribers returns an error that publishers ignore; an
//! absent observer is never a failure of the operation being observed.

use core_async::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Conversion(ConversionEvent),
    Upload(UploadEvent),
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by player slots. `slot` is the host-chosen slot label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A source started loading into a fresh engine.
    Loading { slot: String, source: String },
    /// The engine reported readiness with a positive duration.
    Ready { slot: String, duration_ms: u64 },
    Started { slot: String },
    Paused { slot: String, position_ms: u64 },
    Finished { slot: String },
    /// The slot entered the error state.
    Failed {
        slot: String,
        message: String,
        /// `true` when the failure was attributed to the restricted-codec
        /// environment rather than a generic error.
        incompatible: bool,
    },
    /// The slot was torn down.
    Unmounted { slot: String },
}

impl PlaybackEvent {
    /// Label of the slot that emitted the event.
    pub fn slot(&self) -> &str {
        match self {
            PlaybackEvent::Loading { slot, .. }
            | PlaybackEvent::Ready { slot, .. }
            | PlaybackEvent::Started { slot }
            | PlaybackEvent::Paused { slot, .. }
            | PlaybackEvent::Finished { slot }
            | PlaybackEvent::Failed { slot, .. }
            | PlaybackEvent::Unmounted { slot } => slot,
        }
    }
}

// ============================================================================
// Conversion Events
// ============================================================================

/// Events emitted by the transcoder service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConversionEvent {
    Queued { job_id: String, file_name: String },
    Progress { job_id: String, percent: u8 },
    Completed {
        job_id: String,
        output_name: String,
        output_bytes: u64,
    },
    Failed { job_id: String, message: String },
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted by the upload path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    Started { file_name: String, bytes: u64 },
    Completed { file_id: String, file_name: String },
    Failed { file_name: String, message: String },
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an
/// independent receiver that sees events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error if
    /// there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribes with a predicate; see [`EventStream::filter`].
    pub fn stream<F>(&self, predicate: F) -> EventStream
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        EventStream::new(self.subscribe()).filter(predicate)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
