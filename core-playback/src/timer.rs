//! Cancellable readiness deadline.

use core_async::time::{sleep, Duration, Instant, Sleep};
use std::future::pending;
use std::pin::Pin;

/// A one-shot deadline polled from a `select!` loop.
///
/// [`fired`](Self::fired) never completes while the timer is disarmed, so
/// the branch can stay in the loop unconditionally.
#[derive(Debug, Default)]
pub struct ReadinessTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl ReadinessTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer, replacing any previous deadline.
    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Box::pin(sleep(timeout)));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|sleep| sleep.deadline())
    }

    /// Completes once when the armed deadline elapses, then disarms.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}
