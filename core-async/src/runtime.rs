//! Runtime utilities that abstract over the underlying async executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on the current thread.
///
/// Used from synchronous contexts (tracing layers, drop glue) where no Tokio
/// runtime is guaranteed to be entered.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    futures::executor::block_on(future)
}
