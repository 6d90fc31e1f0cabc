//! Rendering model of a player: what the UI shows for a [`PlaybackState`].

use crate::state::{PlaybackState, PlaybackStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayButton {
    Play,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub show_spinner: bool,
    pub show_waveform: bool,
    pub transport_enabled: bool,
    pub play_button: PlayButton,
    /// Position in `0.0..=1.0` for the progress bar.
    pub progress: f64,
    pub elapsed_label: String,
    pub total_label: String,
    pub rate_label: String,
    /// Error panel text, shown instead of the waveform.
    pub error: Option<String>,
}

impl PlayerView {
    pub fn render(state: &PlaybackState) -> Self {
        let error = match state.status {
            PlaybackStatus::Error => Some(
                state
                    .error_message
                    .clone()
                    .unwrap_or_else(|| crate::classifier::GENERIC_PLAYBACK_MESSAGE.to_string()),
            ),
            _ => None,
        };

        Self {
            show_spinner: state.status == PlaybackStatus::Loading,
            show_waveform: error.is_none(),
            transport_enabled: state.status.allows_transport(),
            play_button: if state.status == PlaybackStatus::Playing {
                PlayButton::Pause
            } else {
                PlayButton::Play
            },
            progress: state.progress(),
            elapsed_label: format_timestamp(state.current_time),
            total_label: format_timestamp(state.duration),
            rate_label: state.playback_rate.to_string(),
            error,
        }
    }
}

impl From<&PlaybackState> for PlayerView {
    fn from(state: &PlaybackState) -> Self {
        Self::render(state)
    }
}

/// Formats seconds as `m:ss`. Negative and non-finite values render as `0:00`.
///
/// ```
/// use core_playback::view::format_timestamp;
///
/// assert_eq!(format_timestamp(0.0), "0:00");
/// assert_eq!(format_timestamp(65.9), "1:05");
/// assert_eq!(format_timestamp(3600.0), "60:00");
/// ```
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
