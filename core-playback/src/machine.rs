//! Pure transition logic of a player slot.
//!
//! The machine owns the [`PlaybackState`] and the facts needed to classify a
//! failure (current source, client capability). It performs no I/O: the slot
//! task feeds it [`Input`]s and carries out the returned [`Outcome`].

use crate::classifier::{classify_failure, FailureKind, PlaybackCapability, PlaybackFailure};
use crate::source::AudioSource;
use crate::state::{PlaybackRate, PlaybackState, PlaybackStatus};
use bridge_traits::playback::EngineEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A fresh engine started loading `source`.
    LoadStarted(AudioSource),
    Engine(EngineEvent),
    /// The readiness deadline elapsed.
    ReadinessTimedOut,
    /// Engine construction or `load` failed before any event arrived.
    EngineFailed(String),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub cancel_timer: bool,
    pub destroy_engine: bool,
    /// Set when the transition entered [`PlaybackStatus::Error`].
    pub failure: Option<PlaybackFailure>,
}

#[derive(Debug, Clone)]
pub struct PlaybackMachine {
    state: PlaybackState,
    source: Option<AudioSource>,
    capability: PlaybackCapability,
    /// The live engine has reported a positive duration.
    engine_ready: bool,
}

impl PlaybackMachine {
    pub fn new(capability: PlaybackCapability, rate: PlaybackRate) -> Self {
        Self {
            state: PlaybackState::with_rate(rate),
            source: None,
            capability,
            engine_ready: false,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    /// Whether transport commands may be forwarded to the engine.
    pub fn engine_ready(&self) -> bool {
        self.engine_ready && self.state.status != PlaybackStatus::Error
    }

    pub fn handle(&mut self, input: Input) -> Outcome {
        match input {
            Input::LoadStarted(source) => {
                let rate = self.state.playback_rate;
                self.state = PlaybackState::with_rate(rate);
                self.state.status = PlaybackStatus::Loading;
                self.source = Some(source);
                self.engine_ready = false;
                Outcome::default()
            }
            Input::ReadinessTimedOut => {
                if self.state.status != PlaybackStatus::Loading {
                    return Outcome::default();
                }
                let mut outcome = self.fail(FailureKind::ReadinessTimeout);
                outcome.destroy_engine = true;
                outcome
            }
            Input::EngineFailed(message) => {
                let mut outcome = self.fail(FailureKind::Engine(message));
                outcome.destroy_engine = true;
                outcome
            }
            Input::Engine(event) => self.on_engine_event(event),
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) -> Outcome {
        let status = self.state.status;
        // A failed slot only leaves Error through a new load.
        if status == PlaybackStatus::Error {
            return Outcome::default();
        }

        match event {
            EngineEvent::Error { message } => return self.fail(FailureKind::Engine(message)),
            EngineEvent::Ready { duration } => {
                if duration > 0.0 && duration.is_finite() {
                    self.state.duration = duration;
                    self.engine_ready = true;
                    if status == PlaybackStatus::Loading {
                        self.state.status = PlaybackStatus::Ready;
                        return Outcome {
                            cancel_timer: true,
                            ..Outcome::default()
                        };
                    }
                } else {
                    tracing::debug!(duration, "Ready without a usable duration, still loading");
                }
            }
            EngineEvent::TimeUpdate { current_time } | EngineEvent::Seeking { current_time } => {
                if self.engine_ready {
                    self.state.current_time = current_time.clamp(0.0, self.state.duration);
                }
            }
            EngineEvent::Play => {
                if self.engine_ready {
                    self.state.status = PlaybackStatus::Playing;
                }
            }
            EngineEvent::Pause => {
                if status == PlaybackStatus::Playing {
                    self.state.status = PlaybackStatus::Paused;
                }
            }
            EngineEvent::Finish => {
                if matches!(status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
                    self.state.status = PlaybackStatus::Idle;
                    self.state.current_time = 0.0;
                }
            }
        }
        Outcome::default()
    }

    /// Records a seek the slot forwarded to the engine.
    pub fn seeked(&mut self, seconds: f64) {
        self.state.current_time = seconds;
    }

    /// Moves to the next rate and returns it.
    pub fn cycle_rate(&mut self) -> PlaybackRate {
        self.state.playback_rate = self.state.playback_rate.next();
        self.state.playback_rate
    }

    /// Clamp a seek target into the known media range.
    pub fn clamp_seek(&self, seconds: f64) -> f64 {
        seconds.clamp(0.0, self.state.duration.max(0.0))
    }

    fn fail(&mut self, kind: FailureKind) -> Outcome {
        let failure = match &self.source {
            Some(source) => classify_failure(&kind, source, self.capability),
            None => PlaybackFailure::Generic,
        };
        self.state.status = PlaybackStatus::Error;
        self.state.error_message = Some(failure.message().to_string());
        self.engine_ready = false;
        Outcome {
            cancel_timer: true,
            destroy_engine: false,
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{GENERIC_PLAYBACK_MESSAGE, INCOMPATIBLE_FORMAT_MESSAGE};

    fn loading(url: &str, capability: PlaybackCapability) -> PlaybackMachine {
        let mut machine = PlaybackMachine::new(capability, PlaybackRate::default());
        machine.handle(Input::LoadStarted(AudioSource::new(url).unwrap()));
        machine
    }

    fn ready(duration: f64) -> Input {
        Input::Engine(EngineEvent::Ready { duration })
    }

    #[test]
    fn test_load_enters_loading() {
        let machine = loading("/a.mp3", PlaybackCapability::Unrestricted);
        assert_eq!(machine.state().status, PlaybackStatus::Loading);
        assert!(!machine.engine_ready());
    }

    #[test]
    fn test_ready_requires_positive_duration() {
        let mut machine = loading("/a.mp3", PlaybackCapability::Unrestricted);

        let outcome = machine.handle(ready(0.0));
        assert_eq!(machine.state().status, PlaybackStatus::Loading);
        assert!(!outcome.cancel_timer);

        let outcome = machine.handle(ready(93.5));
        assert_eq!(machine.state().status, PlaybackStatus::Ready);
        assert_eq!(machine.state().duration, 93.5);
        assert!(outcome.cancel_timer);
    }

    #[test]
    fn test_timeout_is_classified_and_destroys_engine() {
        let mut machine = loading("/a.opus", PlaybackCapability::OpusRestricted);

        let outcome = machine.handle(Input::ReadinessTimedOut);

        assert!(outcome.destroy_engine);
        assert_eq!(outcome.failure, Some(PlaybackFailure::IncompatibleEnvironment));
        assert_eq!(machine.state().status, PlaybackStatus::Error);
        assert_eq!(
            machine.state().error_message.as_deref(),
            Some(INCOMPATIBLE_FORMAT_MESSAGE)
        );
    }

    #[test]
    fn test_late_ready_after_timeout_is_ignored() {
        let mut machine = loading("/a.opus", PlaybackCapability::Unrestricted);
        machine.handle(Input::ReadinessTimedOut);

        machine.handle(ready(10.0));
        machine.handle(Input::Engine(EngineEvent::Play));

        assert_eq!(machine.state().status, PlaybackStatus::Error);
        assert_eq!(
            machine.state().error_message.as_deref(),
            Some(GENERIC_PLAYBACK_MESSAGE)
        );
    }

    #[test]
    fn test_timeout_after_ready_is_ignored() {
        let mut machine = loading("/a.mp3", PlaybackCapability::Unrestricted);
        machine.handle(ready(5.0));

        let outcome = machine.handle(Input::ReadinessTimedOut);
        assert_eq!(outcome, Outcome::default());
        assert_eq!(machine.state().status, PlaybackStatus::Ready);
    }

    #[test]
    fn test_engine_error_from_any_state() {
        let mut machine = loading("/a.mp3", PlaybackCapability::OpusRestricted);
        machine.handle(ready(5.0));
        machine.handle(Input::Engine(EngineEvent::Play));

        let outcome = machine.handle(Input::Engine(EngineEvent::Error {
            message: "network".to_string(),
        }));

        assert!(outcome.cancel_timer);
        assert!(!outcome.destroy_engine);
        assert_eq!(outcome.failure, Some(PlaybackFailure::Generic));
        assert!(machine.state().is_error());
    }

    #[test]
    fn test_transport_cycle() {
        let mut machine = loading("/a.mp3", PlaybackCapability::Unrestricted);
        machine.handle(ready(120.0));

        machine.handle(Input::Engine(EngineEvent::Play));
        assert_eq!(machine.state().status, PlaybackStatus::Playing);

        machine.handle(Input::Engine(EngineEvent::TimeUpdate { current_time: 42.0 }));
        assert_eq!(machine.state().current_time, 42.0);

        machine.handle(Input::Engine(EngineEvent::Pause));
        assert_eq!(machine.state().status, PlaybackStatus::Paused);

        machine.handle(Input::Engine(EngineEvent::Play));
        machine.handle(Input::Engine(EngineEvent::Finish));
        assert_eq!(machine.state().status, PlaybackStatus::Idle);
        assert_eq!(machine.state().current_time, 0.0);
        assert_eq!(machine.state().duration, 120.0);

        // Replay from the start after finishing.
        machine.handle(Input::Engine(EngineEvent::Play));
        assert_eq!(machine.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_play_while_loading_is_ignored() {
        let mut machine = loading("/a.mp3", PlaybackCapability::Unrestricted);
        machine.handle(Input::Engine(EngineEvent::Play));
        assert_eq!(machine.state().status, PlaybackStatus::Loading);
    }

    #[test]
    fn test_reload_keeps_rate_and_clears_error() {
        let mut machine = loading("/a.opus", PlaybackCapability::Unrestricted);
        machine.cycle_rate();
        machine.handle(Input::ReadinessTimedOut);

        machine.handle(Input::LoadStarted(AudioSource::new("/a.mp3").unwrap()));

        assert_eq!(machine.state().status, PlaybackStatus::Loading);
        assert_eq!(machine.state().error_message, None);
        assert_eq!(machine.state().playback_rate.value(), 1.25);
    }

    #[test]
    fn test_seek_clamping() {
        let mut machine = loading("/a.mp3", PlaybackCapability::Unrestricted);
        machine.handle(ready(60.0));

        assert_eq!(machine.clamp_seek(-3.0), 0.0);
        assert_eq!(machine.clamp_seek(30.0), 30.0);
        assert_eq!(machine.clamp_seek(75.0), 60.0);
    }

    #[test]
    fn test_failure_without_source_is_generic() {
        let mut machine =
            PlaybackMachine::new(PlaybackCapability::OpusRestricted, PlaybackRate::default());
        let outcome = machine.handle(Input::EngineFailed("no engine".to_string()));
        assert_eq!(outcome.failure, Some(PlaybackFailure::Generic));
        assert!(outcome.destroy_engine);
    }
}
