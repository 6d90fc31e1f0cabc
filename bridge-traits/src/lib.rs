//! # Host Bridge Traits
//!
//! Capabilities the repertory core needs from its host but cannot provide
//! itself.
//!
//! ## Traits
//!
//! ### Media engines
//! - [`PlaybackEngine`](playback::PlaybackEngine) - Waveform rendering and
//!   native audio decode, one instance per player slot
//! - [`PlaybackEngineFactory`](playback::PlaybackEngineFactory) - Constructs
//!   engines wired to an event channel
//! - [`TranscodingEngine`](transcode::TranscodingEngine) - Re-encoding engine
//!   with a virtual filesystem (ffmpeg-style)
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations used by the
//!   token refresher and the storage provider
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep the original message, since
//! the core embeds that message in user-facing diagnostics.
//!
//! ## Thread Safety
//!
//! Shared bridges (`HttpClient`, `TranscodingEngine`, factories) are
//! `Send + Sync`. A `PlaybackEngine` is owned by exactly one player task and
//! only needs to be `Send`.

pub mod error;
pub mod http;
pub mod playback;
pub mod time;
pub mod transcode;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use playback::{
    engine_event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, EngineOptions,
    PlaybackEngine, PlaybackEngineFactory,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
pub use transcode::{ProgressCallback, TranscodingEngine};
