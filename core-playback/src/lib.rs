//! # Playback Module
//!
//! Player slots for the repertory UI and the rules that explain their
//! failures.
//!
//! ## Overview
//!
//! - [`classifier`]: whether a failure is due to the client's missing
//!   OPUS/Ogg support, and the user-facing message that follows
//! - [`machine`]: pure state transitions of a slot
//! - [`player`]: the slot task driving a host playback engine, with a bounded
//!   wait for readiness
//! - [`view`]: what the UI renders for a given state
//!
//! Decoding is left to the host engine. The core only decides what the user
//! sees when native playback hangs or fails.

pub mod classifier;
pub mod error;
pub mod machine;
pub mod player;
pub mod source;
pub mod state;
pub mod timer;
pub mod view;

pub use classifier::{
    classify_failure, is_probably_incompatible_format, is_restricted_playback_environment,
    CapabilityProbe, ClientEnvironment, FailureKind, FixedCapability, PlaybackCapability,
    PlaybackFailure, UserAgentProbe,
};
pub use error::{PlaybackError, Result};
pub use player::{PlayerCommand, PlayerContext, PlayerSlot};
pub use source::AudioSource;
pub use state::{PlaybackRate, PlaybackState, PlaybackStatus};
pub use timer::ReadinessTimer;
pub use view::{PlayButton, PlayerView};
