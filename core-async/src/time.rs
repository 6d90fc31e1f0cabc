//! Time-related abstractions.
//!
//! Re-exports Tokio's timer primitives. Because every timer in the core goes
//! through this module, tests can drive them with a paused clock
//! (`#[tokio::test(start_paused = true)]` plus `tokio::time::advance`).
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//! }
//! ```

pub use tokio::time::{interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
