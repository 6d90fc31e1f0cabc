//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the repertory core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other `core-*` crate depends on this one for its settings types and
//! for the event bus the player slots and the transcoder publish to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
