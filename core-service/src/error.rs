use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// Upload or streaming was requested but no Drive backend is configured.
    #[error("Storage backend is not configured")]
    StorageUnavailable,

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error(transparent)]
    Transcode(#[from] core_transcode::TranscodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] provider_google_drive::GoogleDriveError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
