//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map onto the individual workspace
//! crates (`core-service`, `core-playback`, `core-transcode`). Host
//! applications can depend on `repertory-workspace` and enable the documented
//! features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "player")]
pub use core_playback;

#[cfg(feature = "transcoder")]
pub use core_transcode;
