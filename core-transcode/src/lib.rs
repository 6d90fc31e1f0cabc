//! # Transcode Module
//!
//! Fallback re-encoding of uploads that some clients cannot play.
//!
//! ## Overview
//!
//! - [`format`]: deny-list of encodings and the MP3 target
//! - [`job`]: lifecycle of one conversion
//! - [`service`]: the shared engine behind a serialised queue
//!
//! Conversion happens once, at upload time, so every stored file is
//! playable everywhere. Files already in a compatible format pass through
//! untouched.

pub mod error;
pub mod format;
pub mod job;
pub mod service;

pub use error::{ConversionStage, Result, TranscodeError};
pub use format::{converted_file_name, needs_conversion, AudioFile, TARGET_MIME_TYPE};
pub use job::{
    ConversionJob, ConversionJobId, ConversionMilestone, ConversionProgress, ConversionStatus,
};
pub use service::{encode_args, ProgressSink, TranscoderService};
