//! Retry policy for outbound sends (spec §4.2, §6).

use std::time::Duration;

use lola_wire::{MediumFrame, ShortFrame};

use crate::{Sender, StopToken, TransportError};

/// Bounded retry configuration applied by the core around a sender's
/// possibly-blocking `try_send`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of `try_send` attempts.
    pub retry_count: u32,
    /// Sleep between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { retry_count: 5, retry_delay: Duration::ZERO }
    }
}

/// Send a short frame, retrying on transient failure up to `config.retry_count`
/// times, aborting early if `stop` is signaled.
///
/// # Errors
///
/// Returns the last [`TransportError`] encountered if all attempts fail or
/// stop is requested mid-retry.
pub fn send_short_with_retry(
    sender: &dyn Sender,
    frame: ShortFrame,
    config: &RetryConfig,
    stop: &StopToken,
) -> Result<(), TransportError> {
    retry_loop(config, stop, || sender.try_send_short(frame))
}

/// Send a medium frame with the same retry/cancellation contract as
/// [`send_short_with_retry`].
///
/// # Errors
///
/// Returns the last [`TransportError`] encountered if all attempts fail or
/// stop is requested mid-retry.
pub fn send_medium_with_retry(
    sender: &dyn Sender,
    frame: MediumFrame,
    config: &RetryConfig,
    stop: &StopToken,
) -> Result<(), TransportError> {
    retry_loop(config, stop, || sender.try_send_medium(frame))
}

fn retry_loop(
    config: &RetryConfig,
    stop: &StopToken,
    mut attempt: impl FnMut() -> Result<(), TransportError>,
) -> Result<(), TransportError> {
    let mut attempts = 0u32;
    loop {
        match attempt() {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempts += 1;
                if attempts >= config.retry_count.max(1) || stop.is_stop_requested() {
                    return Err(err);
                }
                if stop.wait_for(config.retry_delay) {
                    return Err(err);
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use lola_wire::{FrameKind, PeerId};

    use super::*;
    use crate::StopSource;

    struct FlakySender {
        attempts: AtomicU32,
        succeed_on: u32,
        last_sent: Mutex<Option<ShortFrame>>,
    }

    impl Sender for FlakySender {
        fn try_send_short(&self, frame: ShortFrame) -> Result<(), TransportError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeed_on {
                *self.last_sent.lock().unwrap() = Some(frame);
                Ok(())
            } else {
                Err(TransportError::SendWouldBlock("not yet".into()))
            }
        }

        fn try_send_medium(&self, _frame: MediumFrame) -> Result<(), TransportError> {
            unreachable!("not exercised by this test")
        }

        fn has_nonblocking_guarantee(&self) -> bool {
            false
        }
    }

    fn frame(pid: PeerId) -> ShortFrame {
        ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid: pid, payload: 0 }
    }

    #[test]
    fn succeeds_after_retries_within_budget() {
        let sender = FlakySender { attempts: AtomicU32::new(0), succeed_on: 3, last_sent: Mutex::new(None) };
        let stop = StopSource::new().token();
        let config = RetryConfig { retry_count: 5, retry_delay: Duration::ZERO };

        send_short_with_retry(&sender, frame(4444), &config, &stop).unwrap();
        assert_eq!(*sender.last_sent.lock().unwrap(), Some(frame(4444)));
    }

    #[test]
    fn gives_up_after_retry_count_exhausted() {
        let sender = FlakySender { attempts: AtomicU32::new(0), succeed_on: 100, last_sent: Mutex::new(None) };
        let stop = StopSource::new().token();
        let config = RetryConfig { retry_count: 3, retry_delay: Duration::ZERO };

        let err = send_short_with_retry(&sender, frame(4444), &config, &stop).unwrap_err();
        assert_eq!(err, TransportError::SendWouldBlock("not yet".into()));
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn stop_aborts_retry_loop_promptly() {
        let sender = FlakySender { attempts: AtomicU32::new(0), succeed_on: 100, last_sent: Mutex::new(None) };
        let source = StopSource::new();
        source.request_stop();
        let config = RetryConfig { retry_count: 5, retry_delay: Duration::from_secs(60) };

        let err = send_short_with_retry(&sender, frame(4444), &config, &source.token()).unwrap_err();
        assert_eq!(err, TransportError::SendWouldBlock("not yet".into()));
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 1);
    }
}
