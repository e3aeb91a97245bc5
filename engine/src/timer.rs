//! Single-shot, cancellable round timer.
//!
//! Every arm gets a new epoch. The callback receives the epoch it was armed
//! with and must check [`RoundTimer::complete`] under the same lock that
//! guards the session before touching anything, so a timer that already woke
//! up but lost the race against a re-arm or reset does nothing.

use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct RoundTimer {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while an armed timer has neither fired nor been cancelled.
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Invalidates the current arm and aborts its task.
    pub fn cancel(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.handle.take() {
            debug!("Cancelling round timer (epoch now {})", self.epoch);
            handle.abort();
        }
    }

    /// Cancels any previous arm, then runs `on_fire(epoch)` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let epoch = self.epoch;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(epoch).await;
        }));
        debug!("Round timer armed for {:?} (epoch {})", delay, epoch);
        epoch
    }

    /// Claims the firing of `epoch`. Returns false for a stale or cancelled arm.
    pub fn complete(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.handle.is_none() {
            return false;
        }
        // Dropping the handle detaches the task that is calling us.
        self.handle = None;
        true
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
