//! Cooperative cancellation (spec §5).
//!
//! Every loop that may sleep or block observes a [`StopToken`]: in-flight
//! send retries abort with their last error, drain tasks stop after the
//! current frame, and receiver loops break to their exit path. A single
//! [`StopSource`] is owned by the facade and shared by reference with
//! everything it constructs.

use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

struct Inner {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

/// Owns the cancellation flag and can request a stop.
#[derive(Clone)]
pub struct StopSource {
    inner: Arc<Inner>,
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSource {
    /// Create a new, not-yet-stopped source.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { stopped: Mutex::new(false), condvar: Condvar::new() }) }
    }

    /// Request stop. Wakes every waiter blocked in [`StopToken::wait_for`].
    /// Idempotent.
    pub fn request_stop(&self) {
        let mut stopped = self.inner.stopped.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *stopped = true;
        self.inner.condvar.notify_all();
    }

    /// Obtain a token observers can poll or wait on.
    #[must_use]
    pub fn token(&self) -> StopToken {
        StopToken { inner: Arc::clone(&self.inner) }
    }
}

/// A read-only, cloneable view onto a [`StopSource`]'s cancellation state.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl StopToken {
    /// Whether stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        *self.inner.stopped.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Sleep for up to `duration`, waking early if stop is requested.
    ///
    /// Returns `true` if the wait ended because stop was requested, `false`
    /// if it ended because `duration` elapsed naturally.
    #[must_use]
    pub fn wait_for(&self, duration: Duration) -> bool {
        let stopped = self.inner.stopped.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if *stopped {
            return true;
        }
        let (stopped, timeout) = self
            .inner
            .condvar
            .wait_timeout_while(stopped, duration, |s| !*s)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        !timeout.timed_out() || *stopped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{thread, time::Instant};

    use super::*;

    #[test]
    fn wait_for_times_out_without_stop() {
        let source = StopSource::new();
        let token = source.token();
        let start = Instant::now();
        assert!(!token.wait_for(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn request_stop_wakes_waiters_promptly() {
        let source = StopSource::new();
        let token = source.token();
        let handle = thread::spawn({
            let source = source.clone();
            move || {
                thread::sleep(Duration::from_millis(10));
                source.request_stop();
            }
        });
        let woke_due_to_stop = token.wait_for(Duration::from_secs(5));
        handle.join().unwrap();
        assert!(woke_due_to_stop);
        assert!(token.is_stop_requested());
    }
}
