//! Async abstraction layer for the repertory core.
//!
//! All `core-*` and `provider-*` crates depend on this crate instead of naming
//! Tokio directly, so the executor can be swapped in one place.
//!
//! # Modules
//!
//! - `runtime`: Executor handles and `block_on`
//! - `task`: Task spawning and execution
//! - `time`: Sleep, deadlines and instants
//! - `sync`: Channels, locks and cancellation
//! - `fs`: Async filesystem helpers
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod fs;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use tokio::select;
pub use time::{sleep, Duration, Instant};
