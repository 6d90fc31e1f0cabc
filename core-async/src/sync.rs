//! Synchronization primitives.
//!
//! Re-exports Tokio's async-aware primitives together with the cooperative
//! [`CancellationToken`] used to tie background tasks to their owner's
//! lifetime.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!     token.cancel();
//!     assert!(child.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OnceCell, RwLock, Semaphore,
};

pub use tokio_util::sync::CancellationToken;
