//! # Google Drive Provider
//!
//! Storage backend for the repertory audio files, on Google Drive API v3.
//!
//! ## Overview
//!
//! This crate provides:
//! - `multipart/related` uploads into the repertory folder
//! - Metadata lookups and deletes
//! - Ranged media downloads and a range-aware streaming proxy
//! - Bearer tokens from `core_auth::TokenRefresher` or a fixed token

pub mod connector;
pub mod error;
pub mod proxy;
pub mod range;
pub mod token;
pub mod types;

pub use connector::{DriveDownload, GoogleDriveConnector, DRIVE_API_BASE, DRIVE_UPLOAD_BASE};
pub use error::{GoogleDriveError, Result};
pub use proxy::{DriveProxy, StreamResponse};
pub use range::{ByteRange, ResolvedRange, Unsatisfiable};
pub use token::{AccessTokenSource, StaticToken};
pub use types::DriveFile;
