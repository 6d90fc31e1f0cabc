//! # Core Configuration Module
//!
//! Configuration for the repertory audio core.
//!
//! The configuration system uses a builder to construct a [`CoreConfig`]
//! holding the injected bridges and the settings of each component. It
//! validates eagerly so a misconfigured host fails at startup rather than on
//! the first upload.
//!
//! ## Bridges
//!
//! - `HttpClient`: required when Drive storage is configured (desktop
//!   default: reqwest, behind the `desktop-shims` feature)
//! - `Clock`: token expiry bookkeeping (default: system clock)
//! - `LoggerSink`: optional mirror of log events into the host
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, PlayerSettings};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .player(PlayerSettings::default().with_readiness_timeout(Duration::from_secs(5)))
//!     .build()
//!     .expect("player-only configuration is valid");
//!
//! assert!(config.drive.is_none());
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, LoggerSink, SystemClock};
use core_async::time::Duration;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Playback rates a player cycles through, ascending.
pub const PLAYBACK_RATES: [f32; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];

/// Default bound on the wait for an engine's first `Ready` with a duration.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Settings shared by every player slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub readiness_timeout: Duration,
    /// Initial playback rate; must be one of [`PLAYBACK_RATES`].
    pub default_rate: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            default_rate: 1.0,
        }
    }
}

impl PlayerSettings {
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    pub fn with_default_rate(mut self, rate: f32) -> Self {
        self.default_rate = rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness_timeout.is_zero() {
            return Err(Error::Config(
                "Readiness timeout must be greater than zero".to_string(),
            ));
        }
        if !PLAYBACK_RATES.contains(&self.default_rate) {
            return Err(Error::Config(format!(
                "Default playback rate {} is not one of {:?}",
                self.default_rate, PLAYBACK_RATES
            )));
        }
        Ok(())
    }
}

/// Encoding parameters of the fallback transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderSettings {
    /// ffmpeg binary used by the desktop engine
    pub ffmpeg_path: PathBuf,
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub bitrate_kbps: u32,
    /// Requests allowed to wait while one conversion runs.
    pub queue_depth: usize,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            sample_rate_hz: 44_100,
            channels: 2,
            bitrate_kbps: 192,
            queue_depth: 1,
        }
    }
}

impl TranscoderSettings {
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(Error::Config("ffmpeg path cannot be empty".to_string()));
        }
        if self.sample_rate_hz == 0 || self.channels == 0 || self.bitrate_kbps == 0 {
            return Err(Error::Config(
                "Sample rate, channel count and bitrate must be positive".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(Error::Config(
                "Transcoder queue depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Credentials and destination folder of the Drive storage backend.
#[derive(Clone, PartialEq, Eq)]
pub struct DriveSettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Folder uploads are placed in
    pub folder_id: String,
    pub token_url: String,
}

impl DriveSettings {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        folder_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            folder_id: folder_id.into(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Reads `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`,
    /// `GOOGLE_REFRESH_TOKEN` and `GOOGLE_DRIVE_FOLDER_ID`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::MissingEnv(key.to_string()))
        };

        Ok(Self::new(
            get("GOOGLE_CLIENT_ID")?,
            get("GOOGLE_CLIENT_SECRET")?,
            get("GOOGLE_REFRESH_TOKEN")?,
            get("GOOGLE_DRIVE_FOLDER_ID")?,
        ))
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
            ("folder_id", &self.folder_id),
            ("token_url", &self.token_url),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("Drive {} cannot be empty", name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DriveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("folder_id", &self.folder_id)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for token refresh and Drive calls
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub clock: Arc<dyn Clock>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub player: PlayerSettings,
    pub transcoder: TranscoderSettings,
    /// Storage backend; `None` runs the core without upload/streaming.
    pub drive: Option<DriveSettings>,
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("player", &self.player)
            .field("transcoder", &self.transcoder)
            .field("drive", &self.drive)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates settings and their consistency with the injected bridges.
    pub fn validate(&self) -> Result<()> {
        self.player.validate()?;
        self.transcoder.validate()?;

        if let Some(drive) = &self.drive {
            drive.validate()?;
            if self.http_client.is_none() {
                return Err(http_client_missing_error());
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "Drive storage is configured but no HttpClient was provided. \
                  Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
                  Other hosts: inject an HttpClient implementation."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to build default HTTP client: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    player: Option<PlayerSettings>,
    transcoder: Option<TranscoderSettings>,
    drive: Option<DriveSettings>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn player(mut self, settings: PlayerSettings) -> Self {
        self.player = Some(settings);
        self
    }

    pub fn transcoder(mut self, settings: TranscoderSettings) -> Self {
        self.transcoder = Some(settings);
        self
    }

    /// Enables upload and streaming through Google Drive.
    pub fn drive(mut self, settings: DriveSettings) -> Self {
        self.drive = Some(settings);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// With the `desktop-shims` feature, a reqwest-backed `HttpClient` is
    /// injected when Drive is configured and none was provided.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid settings, [`Error::CapabilityMissing`]
    /// when Drive is configured without an `HttpClient`.
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match (self.http_client, &self.drive) {
            (Some(client), _) => Some(client),
            (None, Some(_)) => provide_default_http_client()?,
            (None, None) => None,
        };

        let config = CoreConfig {
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            player: self.player.unwrap_or_default(),
            transcoder: self.transcoder.unwrap_or_default(),
            drive: self.drive,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
