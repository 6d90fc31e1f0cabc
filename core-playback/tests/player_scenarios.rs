//! Scenario tests for player slots
//!
//! This test suite verifies, against a scripted fake engine and a paused
//! Tokio clock:
//! - The readiness timeout and its classified messages
//! - Teardown on unmount and on reload
//! - Transport commands and rate cycling
//! - Events published on the bus

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    EngineEvent, EngineEventSender, EngineOptions, PlaybackEngine, PlaybackEngineFactory,
};
use core_playback::classifier::{GENERIC_PLAYBACK_MESSAGE, INCOMPATIBLE_FORMAT_MESSAGE};
use core_playback::{
    AudioSource, CapabilityProbe, ClientEnvironment, PlaybackCapability, PlaybackError,
    PlaybackState, PlaybackStatus, PlayerContext, PlayerSlot, UserAgentProbe,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

const IOS_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

// ============================================================================
// Fake engine
// ============================================================================

#[derive(Debug, Default)]
struct EngineRecord {
    loaded: Vec<String>,
    rates: Vec<f32>,
    seeks: Vec<f64>,
    play_pauses: usize,
    destroyed: bool,
}

struct FakeEngine {
    record: Arc<Mutex<EngineRecord>>,
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, url: &str) -> BridgeResult<()> {
        self.record.lock().unwrap().loaded.push(url.to_string());
        Ok(())
    }

    fn play_pause(&mut self) -> BridgeResult<()> {
        self.record.lock().unwrap().play_pauses += 1;
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> BridgeResult<()> {
        self.record.lock().unwrap().rates.push(rate);
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> BridgeResult<()> {
        self.record.lock().unwrap().seeks.push(seconds);
        Ok(())
    }

    fn duration(&self) -> f64 {
        0.0
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn destroy(&mut self) {
        self.record.lock().unwrap().destroyed = true;
    }
}

#[derive(Default)]
struct FakeFactory {
    engines: Mutex<Vec<(Arc<Mutex<EngineRecord>>, EngineEventSender)>>,
    /// Set if an engine was created while a previous one was still alive.
    overlapped: Mutex<bool>,
    fail: bool,
}

impl FakeFactory {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn engine(&self, index: usize) -> (Arc<Mutex<EngineRecord>>, EngineEventSender) {
        let engines = self.engines.lock().unwrap();
        let (record, sender) = &engines[index];
        (record.clone(), sender.clone())
    }

    fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }
}

impl PlaybackEngineFactory for FakeFactory {
    fn create(
        &self,
        _options: &EngineOptions,
        events: EngineEventSender,
    ) -> BridgeResult<Box<dyn PlaybackEngine>> {
        if self.fail {
            return Err(BridgeError::NotAvailable("no audio output".to_string()));
        }

        let mut engines = self.engines.lock().unwrap();
        if engines.iter().any(|(record, _)| !record.lock().unwrap().destroyed) {
            *self.overlapped.lock().unwrap() = true;
        }
        let record = Arc::new(Mutex::new(EngineRecord::default()));
        engines.push((record.clone(), events));
        Ok(Box::new(FakeEngine { record }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn context(factory: &Arc<FakeFactory>, user_agent: &str) -> PlayerContext {
    let capability = UserAgentProbe::new(ClientEnvironment::new(user_agent, 5)).probe();
    PlayerContext::new(factory.clone(), capability)
}

fn source(url: &str) -> AudioSource {
    AudioSource::new(url).unwrap()
}

async fn wait_for_status(
    rx: &mut watch::Receiver<PlaybackState>,
    status: PlaybackStatus,
) -> PlaybackState {
    rx.wait_for(|state| state.status == status)
        .await
        .expect("slot task stopped")
        .clone()
}

/// Lets the slot task drain its queues.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Readiness timeout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_opus_on_ios_times_out_with_incompatibility_message() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "tenor",
        context(&factory, IOS_SAFARI),
        Some(source("/audio/ave-verum-tenor.opus")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    tokio::time::advance(Duration::from_secs(9)).await;
    settle().await;
    assert_eq!(slot.state().status, PlaybackStatus::Loading);

    tokio::time::advance(Duration::from_secs(2)).await;
    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;

    assert_eq!(state.error_message.as_deref(), Some(INCOMPATIBLE_FORMAT_MESSAGE));
    let (record, sender) = factory.engine(0);
    assert!(record.lock().unwrap().destroyed);
    assert!(sender.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_opus_on_desktop_chrome_times_out_with_generic_message() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "tenor",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/ave-verum-tenor.opus")),
    );
    let mut rx = slot.subscribe();

    tokio::time::advance(Duration::from_secs(11)).await;
    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;

    assert_eq!(state.error_message.as_deref(), Some(GENERIC_PLAYBACK_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_restricted_client_with_mp3_gets_generic_message() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "alto",
        context(&factory, IOS_SAFARI),
        Some(source("/audio/alto.mp3")),
    );
    let mut rx = slot.subscribe();

    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;
    assert_eq!(state.error_message.as_deref(), Some(GENERIC_PLAYBACK_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_ready_with_duration_cancels_timeout() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "soprano",
        context(&factory, IOS_SAFARI),
        Some(source("/audio/soprano.opus")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    let (_, sender) = factory.engine(0);
    sender.emit(EngineEvent::Ready { duration: 187.0 });
    let state = wait_for_status(&mut rx, PlaybackStatus::Ready).await;
    assert_eq!(state.duration, 187.0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(slot.state().status, PlaybackStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_ready_without_duration_keeps_timeout_armed() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "bass",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/bass.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    let (_, sender) = factory.engine(0);
    sender.emit(EngineEvent::Ready { duration: 0.0 });
    settle().await;
    assert_eq!(slot.state().status, PlaybackStatus::Loading);

    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;
    assert_eq!(state.error_message.as_deref(), Some(GENERIC_PLAYBACK_MESSAGE));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unmount_while_loading_clears_timeout() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "tenor",
        context(&factory, IOS_SAFARI).with_event_bus(bus.clone()),
        Some(source("/audio/tenor.opus")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    slot.unmount().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(rx.borrow().status, PlaybackStatus::Loading);
    assert!(factory.engine(0).0.lock().unwrap().destroyed);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen
        .iter()
        .all(|e| !matches!(e, CoreEvent::Playback(PlaybackEvent::Failed { .. }))));
    assert!(matches!(
        seen.last(),
        Some(CoreEvent::Playback(PlaybackEvent::Unmounted { slot })) if slot == "tenor"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_destroys_engine() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "alto",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/alto.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    drop(slot);
    settle().await;

    assert!(factory.engine(0).0.lock().unwrap().destroyed);
}

#[tokio::test(start_paused = true)]
async fn test_reload_destroys_previous_engine_first() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "soprano",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/first.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    slot.load(source("/audio/second.mp3")).await.unwrap();
    settle().await;

    assert_eq!(factory.created(), 2);
    assert!(!*factory.overlapped.lock().unwrap());

    let (first, stale_sender) = factory.engine(0);
    assert!(first.lock().unwrap().destroyed);
    assert!(!stale_sender.emit(EngineEvent::Ready { duration: 5.0 }));

    let (second, _) = factory.engine(1);
    assert_eq!(second.lock().unwrap().loaded, vec!["/audio/second.mp3".to_string()]);
    assert_eq!(slot.state().status, PlaybackStatus::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_reload_after_error_recovers() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "bass",
        context(&factory, IOS_SAFARI),
        Some(source("/audio/bass.opus")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Error).await;

    slot.load(source("/audio/bass.mp3")).await.unwrap();
    let state = wait_for_status(&mut rx, PlaybackStatus::Loading).await;
    assert_eq!(state.error_message, None);

    factory.engine(1).1.emit(EngineEvent::Ready { duration: 64.0 });
    wait_for_status(&mut rx, PlaybackStatus::Ready).await;
}

// ============================================================================
// Engine errors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_engine_error_is_classified() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "tenor",
        context(&factory, IOS_SAFARI).with_event_bus(bus),
        Some(source("/stream/1AbC").with_file_name_hint("tenor.ogg")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    factory.engine(0).1.emit(EngineEvent::Error {
        message: "MEDIA_ERR_SRC_NOT_SUPPORTED".to_string(),
    });
    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;
    assert_eq!(state.error_message.as_deref(), Some(INCOMPATIBLE_FORMAT_MESSAGE));

    let failed = loop {
        match events.recv().await.unwrap() {
            CoreEvent::Playback(PlaybackEvent::Failed { incompatible, .. }) => break incompatible,
            _ => continue,
        }
    };
    assert!(failed);

    // The timeout was cleared together with the error.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(slot.state().error_message.as_deref(), Some(INCOMPATIBLE_FORMAT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_engine_creation_failure() {
    let factory = Arc::new(FakeFactory::failing());
    let slot = PlayerSlot::mount(
        "alto",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/alto.mp3")),
    );
    let mut rx = slot.subscribe();

    let state = wait_for_status(&mut rx, PlaybackStatus::Error).await;
    assert_eq!(state.error_message.as_deref(), Some(GENERIC_PLAYBACK_MESSAGE));
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_commands_wait_for_readiness() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "soprano",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/soprano.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;
    let (record, sender) = factory.engine(0);

    slot.play_pause().await.unwrap();
    slot.seek(10.0).await.unwrap();
    settle().await;
    assert_eq!(record.lock().unwrap().play_pauses, 0);
    assert!(record.lock().unwrap().seeks.is_empty());

    sender.emit(EngineEvent::Ready { duration: 90.0 });
    wait_for_status(&mut rx, PlaybackStatus::Ready).await;

    slot.play_pause().await.unwrap();
    slot.seek(120.0).await.unwrap();
    slot.seek(-5.0).await.unwrap();
    settle().await;

    let record = record.lock().unwrap();
    assert_eq!(record.play_pauses, 1);
    assert_eq!(record.seeks, vec![90.0, 0.0]);
}

#[tokio::test(start_paused = true)]
async fn test_play_pause_finish_cycle() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "bass",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/bass.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;
    let (_, sender) = factory.engine(0);

    sender.emit(EngineEvent::Ready { duration: 30.0 });
    sender.emit(EngineEvent::Play);
    sender.emit(EngineEvent::TimeUpdate { current_time: 12.5 });
    let state = wait_for_status(&mut rx, PlaybackStatus::Playing).await;
    assert!(state.current_time <= 12.5);

    sender.emit(EngineEvent::Pause);
    wait_for_status(&mut rx, PlaybackStatus::Paused).await;
    assert_eq!(slot.view().elapsed_label, "0:12");

    sender.emit(EngineEvent::Play);
    sender.emit(EngineEvent::Finish);
    let state = wait_for_status(&mut rx, PlaybackStatus::Idle).await;
    assert_eq!(state.current_time, 0.0);
    assert_eq!(state.duration, 30.0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_is_reapplied_to_new_engine() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount(
        "tenor",
        context(&factory, DESKTOP_CHROME),
        Some(source("/audio/one.mp3")),
    );
    let mut rx = slot.subscribe();
    wait_for_status(&mut rx, PlaybackStatus::Loading).await;

    slot.cycle_rate().await.unwrap();
    slot.cycle_rate().await.unwrap();
    settle().await;
    assert_eq!(slot.state().playback_rate.value(), 1.5);
    assert_eq!(factory.engine(0).0.lock().unwrap().rates, vec![1.0, 1.25, 1.5]);

    slot.load(source("/audio/two.mp3")).await.unwrap();
    settle().await;
    assert_eq!(factory.engine(1).0.lock().unwrap().rates, vec![1.5]);

    slot.cycle_rate().await.unwrap();
    settle().await;
    assert_eq!(slot.state().playback_rate.value(), 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_mount_without_source_stays_idle() {
    let factory = Arc::new(FakeFactory::default());
    let slot = PlayerSlot::mount("alto", context(&factory, DESKTOP_CHROME), None);

    assert!(matches!(
        slot.seek(f64::NAN).await,
        Err(PlaybackError::InvalidSeek(_))
    ));

    let rx = slot.subscribe();
    slot.unmount().await;
    assert_eq!(rx.borrow().status, PlaybackStatus::Idle);
    assert_eq!(factory.created(), 0);
}

#[test]
fn test_fixed_capability_probe() {
    let probe = core_playback::FixedCapability(PlaybackCapability::OpusRestricted);
    assert!(probe.probe().is_restricted());
}
