use bridge_traits::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of a conversion at which the engine failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionStage {
    Load,
    Write,
    Exec,
    Read,
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ConversionStage::Load => "engine load",
            ConversionStage::Write => "input write",
            ConversionStage::Exec => "encoding",
            ConversionStage::Read => "output read",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Audio conversion failed during {stage}: {message}")]
    ConversionFailed {
        stage: ConversionStage,
        message: String,
    },

    #[error("Transcoder service has been shut down")]
    ServiceShutDown,

    #[error("Invalid conversion state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl TranscodeError {
    pub(crate) fn at(stage: ConversionStage) -> impl FnOnce(BridgeError) -> Self {
        move |err| TranscodeError::ConversionFailed {
            stage,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranscodeError>;
