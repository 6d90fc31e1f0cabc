//! Observable state of a player slot.

use core_runtime::config::PLAYBACK_RATES;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    /// Transport controls are usable in this status.
    pub fn allows_transport(self) -> bool {
        !matches!(self, PlaybackStatus::Loading | PlaybackStatus::Error)
    }
}

/// One step of the fixed playback-rate cycle.
///
/// ```
/// use core_playback::PlaybackRate;
///
/// let rate = PlaybackRate::default();
/// assert_eq!(rate.value(), 1.0);
/// assert_eq!(rate.next().value(), 1.25);
/// assert_eq!(rate.next().next().next().value(), 0.5);
/// ```
///
/// Serialised as the rate itself (`1.25`), never as a position in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct PlaybackRate(usize);

impl PlaybackRate {
    /// The rate equal to `value`, if it is part of the cycle.
    pub fn from_value(value: f32) -> Option<Self> {
        PLAYBACK_RATES.iter().position(|&r| r == value).map(Self)
    }

    pub fn value(self) -> f32 {
        PLAYBACK_RATES[self.0]
    }

    /// Next rate in ascending order, wrapping to the slowest.
    pub fn next(self) -> Self {
        Self((self.0 + 1) % PLAYBACK_RATES.len())
    }
}

impl Default for PlaybackRate {
    fn default() -> Self {
        // 1.0 sits in the middle of the cycle.
        Self::from_value(1.0).unwrap_or(Self(0))
    }
}

impl TryFrom<f32> for PlaybackRate {
    type Error = String;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| format!("unsupported playback rate {value}"))
    }
}

impl From<PlaybackRate> for f32 {
    fn from(rate: PlaybackRate) -> Self {
        rate.value()
    }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.value())
    }
}

/// Snapshot published by a player slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Seconds from the start of the media.
    pub current_time: f64,
    /// Seconds; 0 until the engine reports a positive duration.
    pub duration: f64,
    pub playback_rate: PlaybackRate,
    pub error_message: Option<String>,
}

impl PlaybackState {
    pub fn with_rate(playback_rate: PlaybackRate) -> Self {
        Self {
            playback_rate,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == PlaybackStatus::Error
    }

    /// Playback position as a ratio of the duration, 0 when unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
