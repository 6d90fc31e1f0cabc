//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//! - `TranscodingEngine` running an `ffmpeg` subprocess over a scratch
//!   directory
//!
//! Playback engines are UI widgets and are always supplied by the host.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FfmpegEngine, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let engine = Arc::new(FfmpegEngine::with_binary(&settings.transcoder.ffmpeg_path));
//! ```

mod http;
mod transcode;

pub use http::ReqwestHttpClient;
pub use transcode::FfmpegEngine;
