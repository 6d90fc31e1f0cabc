//! Playback engine bridge.
//!
//! A playback engine is the host's waveform-rendering/native-decode widget.
//! The core never decodes audio for playback itself; it constructs one engine
//! per player slot through a [`PlaybackEngineFactory`], listens to the
//! [`EngineEvent`]s the engine pushes into its channel, and drives it through
//! the [`PlaybackEngine`] methods.
//!
//! Each engine gets its own event channel. Dropping the receiver when an
//! engine is torn down guarantees that events from a stale instance can never
//! reach the slot that replaced it.

use core_async::sync::mpsc;

use crate::error::Result;

/// Lifecycle and transport events emitted by a playback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Media decoded far enough to play. Carries the reported duration in
    /// seconds, which may be zero for engines that report it late.
    Ready { duration: f64 },
    /// Periodic position update while playing (`audioprocess`/`timeupdate`).
    TimeUpdate { current_time: f64 },
    /// The user scrubbed the waveform.
    Seeking { current_time: f64 },
    Play,
    Pause,
    /// End of media reached.
    Finish,
    /// Engine-level failure (network, decode, unsupported codec).
    Error { message: String },
}

/// Sending half handed to an engine at construction.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    inner: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSender {
    /// Push an event to the owning slot.
    ///
    /// Returns `false` once the slot has dropped this engine; engines should
    /// treat that as a signal to stop emitting.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.inner.send(event).is_ok()
    }

    /// `true` when the owning slot no longer listens to this engine.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Receiving half owned by the player slot.
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create a fresh event channel for one engine instance.
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EngineEventSender { inner: tx }, rx)
}

/// Styling options forwarded to the engine at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Host-side identifier of the container element the waveform renders in.
    pub container: String,
    pub wave_color: String,
    pub progress_color: String,
    pub cursor_color: String,
    /// Waveform height in CSS pixels.
    pub height: u32,
    pub bar_width: u32,
    pub normalize: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            container: "waveform".to_string(),
            wave_color: "#c4b5fd".to_string(),
            progress_color: "#7c3aed".to_string(),
            cursor_color: "#4c1d95".to_string(),
            height: 64,
            bar_width: 2,
            normalize: true,
        }
    }
}

/// One live playback engine instance.
///
/// Methods are synchronous: hosts forward them to their UI-thread widget and
/// report outcomes through [`EngineEvent`]s. `destroy` must release every
/// native resource and stop event emission; it is called exactly once by the
/// owning slot.
pub trait PlaybackEngine: Send {
    /// Start loading `url`. Readiness is reported with [`EngineEvent::Ready`].
    fn load(&mut self, url: &str) -> Result<()>;

    /// Toggle between playing and paused.
    fn play_pause(&mut self) -> Result<()>;

    fn set_playback_rate(&mut self, rate: f32) -> Result<()>;

    /// Jump to `seconds` from the start of the media.
    fn seek_to(&mut self, seconds: f64) -> Result<()>;

    /// Duration in seconds as currently known by the engine (0 when unknown).
    fn duration(&self) -> f64;

    fn current_time(&self) -> f64;

    fn destroy(&mut self);
}

/// Constructs playback engines for player slots.
pub trait PlaybackEngineFactory: Send + Sync {
    fn create(
        &self,
        options: &EngineOptions,
        events: EngineEventSender,
    ) -> Result<Box<dyn PlaybackEngine>>;
}
