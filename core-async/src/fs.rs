//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! Used by host bridges for scratch files; signatures match Tokio's.

pub use tokio::fs::{read, remove_file, write};
