//! # Player Slot
//!
//! One player slot owns at most one live playback engine. The slot runs as a
//! single task that selects over:
//!
//! - its [`CancellationToken`] (unmount),
//! - events of the current engine,
//! - the [`ReadinessTimer`],
//! - commands from the [`PlayerSlot`] handle.
//!
//! Every input goes through the [`PlaybackMachine`]; the resulting state is
//! published on a `watch` channel and, when a bus is configured, as
//! [`PlaybackEvent`]s.
//!
//! Loading a new source destroys the previous engine and drops its event
//! receiver before the next engine is constructed, so two engines are never
//! alive for one slot and a stale engine cannot reach the new state.

use crate::classifier::{PlaybackCapability, PlaybackFailure};
use crate::error::{PlaybackError, Result};
use crate::machine::{Input, PlaybackMachine};
use crate::source::AudioSource;
use crate::state::{PlaybackRate, PlaybackState, PlaybackStatus};
use crate::timer::ReadinessTimer;
use crate::view::PlayerView;

use bridge_traits::playback::{
    engine_event_channel, EngineEvent, EngineEventReceiver, EngineOptions, PlaybackEngine,
    PlaybackEngineFactory,
};
use core_async::sync::{mpsc, watch, CancellationToken};
use core_async::task::JoinHandle;
use core_runtime::config::PlayerSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::future::pending;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

const COMMAND_BUFFER: usize = 16;

/// Collaborators shared by the slots a host mounts.
#[derive(Clone)]
pub struct PlayerContext {
    pub factory: Arc<dyn PlaybackEngineFactory>,
    pub capability: PlaybackCapability,
    pub settings: PlayerSettings,
    pub engine_options: EngineOptions,
    pub events: Option<EventBus>,
}

impl PlayerContext {
    pub fn new(factory: Arc<dyn PlaybackEngineFactory>, capability: PlaybackCapability) -> Self {
        Self {
            factory,
            capability,
            settings: PlayerSettings::default(),
            engine_options: EngineOptions::default(),
            events: None,
        }
    }

    pub fn with_settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.engine_options = options;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }
}

/// Commands accepted by a slot task.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load(AudioSource),
    PlayPause,
    Seek(f64),
    CycleRate,
}

/// Handle to a mounted player slot.
///
/// Dropping the handle unmounts the slot.
pub struct PlayerSlot {
    label: String,
    commands: mpsc::Sender<PlayerCommand>,
    state: watch::Receiver<PlaybackState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PlayerSlot {
    /// Spawns the slot task and, if given, starts loading `source`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(label: impl Into<String>, context: PlayerContext, source: Option<AudioSource>) -> Self {
        let label = label.into();
        let rate = PlaybackRate::from_value(context.settings.default_rate).unwrap_or_default();
        let machine = PlaybackMachine::new(context.capability, rate);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(machine.state().clone());
        let cancel = CancellationToken::new();

        let task = SlotTask {
            label: label.clone(),
            context,
            machine,
            engine: None,
            engine_events: None,
            timer: ReadinessTimer::new(),
            state_tx,
            commands: command_rx,
            cancel: cancel.clone(),
        };
        let span = tracing::info_span!("player_slot", slot = %label);
        let handle = core_async::spawn(task.run(source).instrument(span));

        Self {
            label,
            commands: command_tx,
            state: state_rx,
            cancel,
            task: Some(handle),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replaces the current source.
    pub async fn load(&self, source: AudioSource) -> Result<()> {
        self.send(PlayerCommand::Load(source)).await
    }

    /// Toggles play/pause. Ignored until the engine is ready.
    pub async fn play_pause(&self) -> Result<()> {
        self.send(PlayerCommand::PlayPause).await
    }

    /// Seeks to `seconds`, clamped into `[0, duration]`.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(PlaybackError::InvalidSeek(seconds));
        }
        self.send(PlayerCommand::Seek(seconds)).await
    }

    /// Advances to the next playback rate, wrapping.
    pub async fn cycle_rate(&self) -> Result<()> {
        self.send(PlayerCommand::CycleRate).await
    }

    /// Latest published state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView::render(&self.state.borrow())
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Stops the slot and waits for its engine to be destroyed.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(slot = %self.label, error = %err, "Player slot task ended abnormally");
            }
        }
    }

    async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::SlotClosed)
    }
}

impl Drop for PlayerSlot {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SlotTask {
    label: String,
    context: PlayerContext,
    machine: PlaybackMachine,
    engine: Option<Box<dyn PlaybackEngine>>,
    engine_events: Option<EngineEventReceiver>,
    timer: ReadinessTimer,
    state_tx: watch::Sender<PlaybackState>,
    commands: mpsc::Receiver<PlayerCommand>,
    cancel: CancellationToken,
}

async fn next_engine_event(events: &mut Option<EngineEventReceiver>) -> Option<EngineEvent> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

impl SlotTask {
    async fn run(mut self, initial: Option<AudioSource>) {
        if let Some(source) = initial {
            self.load(source);
        }

        loop {
            core_async::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                event = next_engine_event(&mut self.engine_events) => match event {
                    Some(event) => self.apply(Input::Engine(event)),
                    // The engine dropped its sender; nothing more will arrive.
                    None => self.engine_events = None,
                },

                _ = self.timer.fired() => {
                    warn!(
                        timeout_ms = self.context.settings.readiness_timeout.as_millis() as u64,
                        "Engine not ready before timeout"
                    );
                    self.apply(Input::ReadinessTimedOut);
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Load(source) => self.load(source),
            PlayerCommand::PlayPause => {
                if !self.machine.engine_ready() {
                    debug!("Ignoring play/pause before readiness");
                    return;
                }
                if let Some(Err(err)) = self.engine.as_mut().map(|engine| engine.play_pause()) {
                    self.apply(Input::EngineFailed(err.to_string()));
                }
            }
            PlayerCommand::Seek(seconds) => {
                if !self.machine.engine_ready() {
                    debug!(seconds, "Ignoring seek before readiness");
                    return;
                }
                let target = self.machine.clamp_seek(seconds);
                match self.engine.as_mut().map(|engine| engine.seek_to(target)) {
                    Some(Ok(())) => {
                        self.machine.seeked(target);
                        self.publish(self.machine.state().status, None);
                    }
                    Some(Err(err)) => self.apply(Input::EngineFailed(err.to_string())),
                    None => {}
                }
            }
            PlayerCommand::CycleRate => {
                let rate = self.machine.cycle_rate();
                if let Some(Err(err)) = self
                    .engine
                    .as_mut()
                    .map(|engine| engine.set_playback_rate(rate.value()))
                {
                    warn!(rate = rate.value(), error = %err, "Engine rejected playback rate");
                }
                self.publish(self.machine.state().status, None);
            }
        }
    }

    /// Tears down the current engine and starts a fresh one on `source`.
    fn load(&mut self, source: AudioSource) {
        self.destroy_engine();
        self.timer.cancel();

        let previous = self.machine.state().status;
        let url = source.url().to_string();
        info!(source = %source.identifier(), "Loading audio");
        self.machine.handle(Input::LoadStarted(source));

        let (events_tx, events_rx) = engine_event_channel();
        let engine = match self
            .context
            .factory
            .create(&self.context.engine_options, events_tx)
        {
            Ok(engine) => engine,
            Err(err) => {
                self.publish(previous, None);
                self.apply(Input::EngineFailed(err.to_string()));
                return;
            }
        };

        self.engine = Some(engine);
        self.engine_events = Some(events_rx);
        self.timer.arm(self.context.settings.readiness_timeout);
        self.publish(previous, None);

        let rate = self.machine.state().playback_rate.value();
        let started = self
            .engine
            .as_mut()
            .map(|engine| engine.set_playback_rate(rate).and_then(|_| engine.load(&url)));
        if let Some(Err(err)) = started {
            self.apply(Input::EngineFailed(err.to_string()));
        }
    }

    fn apply(&mut self, input: Input) {
        let previous = self.machine.state().status;
        let outcome = self.machine.handle(input);

        if outcome.cancel_timer {
            self.timer.cancel();
        }
        if outcome.destroy_engine {
            self.destroy_engine();
        }
        self.publish(previous, outcome.failure.as_ref());
    }

    fn destroy_engine(&mut self) {
        // Dropping the receiver first closes the channel for the old engine.
        self.engine_events = None;
        if let Some(mut engine) = self.engine.take() {
            debug!("Destroying playback engine");
            engine.destroy();
        }
    }

    fn teardown(&mut self) {
        self.timer.cancel();
        self.destroy_engine();
        self.emit(PlaybackEvent::Unmounted {
            slot: self.label.clone(),
        });
        debug!("Player slot unmounted");
    }

    fn publish(&mut self, previous: PlaybackStatus, failure: Option<&PlaybackFailure>) {
        let state = self.machine.state().clone();
        let status = state.status;
        self.state_tx.send_replace(state.clone());

        if status == previous {
            return;
        }
        debug!(?previous, ?status, "Playback status changed");

        let slot = self.label.clone();
        let event = match status {
            PlaybackStatus::Loading => self.machine.source().map(|source| PlaybackEvent::Loading {
                slot,
                source: source.identifier(),
            }),
            PlaybackStatus::Ready => Some(PlaybackEvent::Ready {
                slot,
                duration_ms: seconds_to_ms(state.duration),
            }),
            PlaybackStatus::Playing => Some(PlaybackEvent::Started { slot }),
            PlaybackStatus::Paused => Some(PlaybackEvent::Paused {
                slot,
                position_ms: seconds_to_ms(state.current_time),
            }),
            PlaybackStatus::Idle => Some(PlaybackEvent::Finished { slot }),
            PlaybackStatus::Error => {
                let message = state.error_message.clone().unwrap_or_default();
                warn!(%message, "Playback failed");
                Some(PlaybackEvent::Failed {
                    slot,
                    message,
                    incompatible: failure.is_some_and(PlaybackFailure::is_incompatible),
                })
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.context.events {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_ms() {
        assert_eq!(seconds_to_ms(1.2345), 1235);
        assert_eq!(seconds_to_ms(-1.0), 0);
        assert_eq!(seconds_to_ms(f64::INFINITY), 0);
    }
}
