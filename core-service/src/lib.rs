//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (playback engine,
//! transcoding engine, HTTP) into the shared Rust core and exposes the
//! operations the repertory UI needs: mounting player slots, converting
//! uploads to a universally playable format, uploading to Drive and
//! streaming back with range support. Desktop apps typically enable the
//! `desktop-shims` feature, which provides the ffmpeg transcoding engine and
//! the reqwest HTTP client from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::playback::PlaybackEngineFactory;
use bridge_traits::transcode::TranscodingEngine;
use core_auth::{OAuthConfig, OAuthFlowManager, TokenRefresher};
use core_playback::{AudioSource, CapabilityProbe, PlayerContext, PlayerSlot};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, UploadEvent};
use core_runtime::logging::{strip_path, LoggingConfig};
use core_transcode::{AudioFile, ProgressSink, TranscoderService};
use provider_google_drive::{DriveFile, DriveProxy, GoogleDriveConnector, StreamResponse};
use tracing::{info, instrument, warn};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub playback_factory: Arc<dyn PlaybackEngineFactory>,
    pub capability_probe: Arc<dyn CapabilityProbe>,
    pub transcoding_engine: Arc<dyn TranscodingEngine>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        playback_factory: Arc<dyn PlaybackEngineFactory>,
        capability_probe: Arc<dyn CapabilityProbe>,
        transcoding_engine: Arc<dyn TranscodingEngine>,
    ) -> Self {
        Self {
            playback_factory,
            capability_probe,
            transcoding_engine,
        }
    }

    /// Bundle using the ffmpeg engine configured in `config.transcoder`.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(
        playback_factory: Arc<dyn PlaybackEngineFactory>,
        capability_probe: Arc<dyn CapabilityProbe>,
        config: &CoreConfig,
    ) -> Self {
        let engine = bridge_desktop::FfmpegEngine::with_binary(config.transcoder.ffmpeg_path.clone());
        Self::new(playback_factory, capability_probe, Arc::new(engine))
    }
}

/// Installs the global tracing subscriber, mirroring events to the
/// configured `LoggerSink` when there is one. Call once at startup.
pub fn init_logging(config: &CoreConfig, logging: LoggingConfig) -> Result<()> {
    let logging = match &config.logger_sink {
        Some(sink) => logging.with_logger_sink(sink.clone()),
        None => logging,
    };
    core_runtime::logging::init_logging(logging)?;
    Ok(())
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

struct Inner {
    events: EventBus,
    players: PlayerContext,
    transcoder: TranscoderService,
    storage: Option<DriveProxy>,
}

impl CoreService {
    /// Create a new service from a validated configuration and the host's
    /// bridges.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapabilityMissing`] when Drive is configured without an
    /// `HttpClient`.
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        let events = EventBus::new(config.event_buffer_size);

        let capability = deps.capability_probe.probe();
        info!(?capability, "Detected playback capability");
        let players = PlayerContext::new(deps.playback_factory, capability)
            .with_settings(config.player.clone())
            .with_event_bus(events.clone());

        let transcoder = TranscoderService::with_event_bus(
            deps.transcoding_engine,
            config.transcoder.clone(),
            events.clone(),
        );

        let storage = match &config.drive {
            Some(drive) => {
                let http = config.http_client.clone().ok_or_else(|| CoreError::CapabilityMissing {
                    capability: "HttpClient".to_string(),
                    message: "Drive storage requires an HttpClient".to_string(),
                })?;
                let flow = OAuthFlowManager::new(OAuthConfig::from(drive), http.clone(), config.clock.clone());
                let tokens = TokenRefresher::new(flow, config.clock.clone(), drive.refresh_token.clone());
                let connector = GoogleDriveConnector::new(http, Arc::new(tokens));
                Some(DriveProxy::new(Arc::new(connector), Some(drive.folder_id.clone())))
            }
            None => None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                events,
                players,
                transcoder,
                storage,
            }),
        })
    }

    /// Event bus carrying playback, conversion and upload events.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Playback events of the slot labelled `label`.
    pub fn slot_events(&self, label: impl Into<String>) -> EventStream {
        let label = label.into();
        self.inner.events.stream(move |event| {
            matches!(event, CoreEvent::Playback(playback) if playback.slot() == label)
        })
    }

    /// Upload progress, completions and failures.
    pub fn upload_events(&self) -> EventStream {
        self.inner
            .events
            .stream(|event| matches!(event, CoreEvent::Upload(_)))
    }

    pub fn transcoder(&self) -> &TranscoderService {
        &self.inner.transcoder
    }

    pub fn has_storage(&self) -> bool {
        self.inner.storage.is_some()
    }

    /// Mounts a player slot; see [`PlayerSlot::mount`].
    pub fn mount_player(&self, label: impl Into<String>, source: Option<AudioSource>) -> PlayerSlot {
        PlayerSlot::mount(label, self.inner.players.clone(), source)
    }

    /// Converts `file` to MP3 when its format is not universally playable.
    pub async fn convert(&self, file: AudioFile, progress: Option<ProgressSink>) -> Result<AudioFile> {
        Ok(self
            .inner
            .transcoder
            .convert_to_universal_format(file, progress)
            .await?)
    }

    /// Converts `file` if needed, then uploads it to the repertory folder.
    ///
    /// A failed conversion aborts the upload; the original file is never
    /// uploaded in its place.
    #[instrument(skip(self, file, progress), fields(file = %strip_path(&file.name)))]
    pub async fn upload_audio(&self, file: AudioFile, progress: Option<ProgressSink>) -> Result<DriveFile> {
        let storage = self.inner.storage.as_ref().ok_or(CoreError::StorageUnavailable)?;
        let original_name = file.name.clone();

        let file = match self.convert(file, progress).await {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "Conversion failed, upload aborted");
                self.emit(UploadEvent::Failed {
                    file_name: original_name,
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        self.emit(UploadEvent::Started {
            file_name: file.name.clone(),
            bytes: file.len() as u64,
        });

        match storage.upload(&file.name, &file.mime_type, file.data.clone()).await {
            Ok(uploaded) => {
                info!(file_id = %uploaded.id, "Upload finished");
                self.emit(UploadEvent::Completed {
                    file_id: uploaded.id.clone(),
                    file_name: uploaded.name.clone(),
                });
                Ok(uploaded)
            }
            Err(err) => {
                warn!(error = %err, "Upload failed");
                self.emit(UploadEvent::Failed {
                    file_name: file.name,
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Streams a stored file, honouring a single `Range` header.
    pub async fn stream_audio(&self, file_id: &str, range_header: Option<&str>) -> Result<StreamResponse> {
        let storage = self.inner.storage.as_ref().ok_or(CoreError::StorageUnavailable)?;
        Ok(storage.stream(file_id, range_header).await?)
    }

    /// Releases the transcoding engine. Mounted player slots stay usable
    /// until their handles are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.transcoder.shutdown().await?;
        Ok(())
    }

    fn emit(&self, event: UploadEvent) {
        self.inner.events.emit(CoreEvent::Upload(event)).ok();
    }
}
