//! Non-blocking sender wrapper (spec §4.4).
//!
//! Wraps any [`Sender`] (blocking or not) with a bounded FIFO queue and a
//! single drain task submitted to an external [`WorkerPool`], so that
//! `try_send` on the wrapper never blocks the caller for longer than a
//! bounded queue-insertion time. Required whenever the local process runs at
//! ASIL-B integrity and the target peer is on the QM plane and the chosen
//! transport does not itself guarantee non-blocking (spec §4.4 "Use
//! policy").

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
};

use lola_wire::{MediumFrame, ShortFrame};

use crate::{Sender, TransportError, WorkerPool};

/// Hard cap on configured queue capacity. Exceeding this at construction is
/// a programming error, not a runtime condition - see [`NonBlockingSender::new`].
pub const MAX_QUEUE_CAPACITY: usize = 100;

#[derive(Clone, Copy)]
enum QueuedFrame {
    Short(ShortFrame),
    Medium(MediumFrame),
}

struct QueueState {
    queue: VecDeque<QueuedFrame>,
    draining: bool,
    shutdown: bool,
}

/// Bounds any [`Sender`] with a non-blocking contract.
///
/// # Panics
///
/// Construction panics if `capacity` exceeds [`MAX_QUEUE_CAPACITY`] - this is
/// a misconfiguration the caller must fix, not a recoverable runtime
/// condition (spec §4.4).
pub struct NonBlockingSender {
    inner: Arc<dyn Sender>,
    state: Arc<(Mutex<QueueState>, Condvar)>,
    capacity: usize,
    pool: Arc<WorkerPool>,
}

impl NonBlockingSender {
    /// Wrap `inner` with a queue of the given `capacity`, draining onto
    /// `pool`.
    #[must_use]
    pub fn new(inner: Arc<dyn Sender>, capacity: usize, pool: Arc<WorkerPool>) -> Self {
        assert!(
            capacity <= MAX_QUEUE_CAPACITY,
            "non-blocking sender queue capacity {capacity} exceeds hard cap {MAX_QUEUE_CAPACITY}"
        );
        Self {
            inner,
            state: Arc::new((
                Mutex::new(QueueState { queue: VecDeque::new(), draining: false, shutdown: false }),
                Condvar::new(),
            )),
            capacity,
            pool,
        }
    }

    fn enqueue(&self, item: QueuedFrame) -> Result<(), TransportError> {
        let (mutex, condvar) = &*self.state;
        let mut state = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.shutdown {
            return Err(TransportError::Closed);
        }
        if state.queue.len() >= self.capacity {
            return Err(TransportError::QueueFull);
        }
        let was_empty = state.queue.is_empty();
        state.queue.push_back(item);
        let should_spawn = was_empty && !state.draining;
        if should_spawn {
            state.draining = true;
        }
        drop(state);
        condvar.notify_all();

        if should_spawn {
            let state_handle = Arc::clone(&self.state);
            let inner = Arc::clone(&self.inner);
            self.pool.submit(Box::new(move || drain(&state_handle, &inner)));
        }
        Ok(())
    }

    /// Request shutdown and block until any in-flight drain task has
    /// finished, so the wrapper's storage can be released without a race
    /// (spec §4.4, "Race-free teardown is required").
    pub fn shutdown(&self) {
        let (mutex, condvar) = &*self.state;
        let mut state = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.shutdown = true;
        condvar.notify_all();
        while state.draining {
            state = condvar.wait(state).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

impl Drop for NonBlockingSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Sender for NonBlockingSender {
    fn try_send_short(&self, frame: ShortFrame) -> Result<(), TransportError> {
        self.enqueue(QueuedFrame::Short(frame))
    }

    fn try_send_medium(&self, frame: MediumFrame) -> Result<(), TransportError> {
        self.enqueue(QueuedFrame::Medium(frame))
    }

    fn has_nonblocking_guarantee(&self) -> bool {
        true
    }
}

fn drain(state_handle: &Arc<(Mutex<QueueState>, Condvar)>, inner: &Arc<dyn Sender>) {
    let (mutex, condvar) = &**state_handle;
    loop {
        let front = {
            let state = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.queue.front().copied()
        };

        let Some(item) = front else {
            let mut state = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.draining = false;
            condvar.notify_all();
            return;
        };

        let result = match item {
            QueuedFrame::Short(frame) => inner.try_send_short(frame),
            QueuedFrame::Medium(frame) => inner.try_send_medium(frame),
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "non-blocking sender: drain task send failed, continuing");
        }

        let mut state = mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.queue.pop_front();
        condvar.notify_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use lola_wire::{FrameKind, PeerId};

    use super::*;

    struct RecordingSender {
        sent: StdMutex<Vec<ShortFrame>>,
    }

    impl Sender for RecordingSender {
        fn try_send_short(&self, frame: ShortFrame) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        fn try_send_medium(&self, _frame: MediumFrame) -> Result<(), TransportError> {
            Ok(())
        }

        fn has_nonblocking_guarantee(&self) -> bool {
            false
        }
    }

    fn frame(pid: PeerId) -> ShortFrame {
        ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid: pid, payload: u64::from(pid as u32) }
    }

    #[test]
    fn has_nonblocking_guarantee_is_always_true() {
        let inner = Arc::new(RecordingSender { sent: StdMutex::new(Vec::new()) });
        let pool = Arc::new(WorkerPool::new(1));
        let wrapped = NonBlockingSender::new(inner, 10, pool);
        assert!(wrapped.has_nonblocking_guarantee());
    }

    #[test]
    #[should_panic(expected = "exceeds hard cap")]
    fn rejects_capacity_above_hard_cap() {
        let inner = Arc::new(RecordingSender { sent: StdMutex::new(Vec::new()) });
        let pool = Arc::new(WorkerPool::new(1));
        let _ = NonBlockingSender::new(inner, MAX_QUEUE_CAPACITY + 1, pool);
    }

    #[test]
    fn frames_are_eventually_sent_in_fifo_order() {
        let inner = Arc::new(RecordingSender { sent: StdMutex::new(Vec::new()) });
        let pool = Arc::new(WorkerPool::new(2));
        let wrapped = NonBlockingSender::new(Arc::clone(&inner) as Arc<dyn Sender>, 10, pool);

        for pid in 0..20 {
            wrapped.try_send_short(frame(pid)).unwrap();
        }

        wrapped.shutdown();

        let sent = inner.sent.lock().unwrap();
        let pids: Vec<PeerId> = sent.iter().map(|f| f.sender_pid).collect();
        assert_eq!(pids, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn queue_full_is_reported_once_capacity_reached() {
        struct BlockedSender;
        impl Sender for BlockedSender {
            fn try_send_short(&self, _frame: ShortFrame) -> Result<(), TransportError> {
                std::thread::sleep(std::time::Duration::from_millis(200));
                Ok(())
            }

            fn try_send_medium(&self, _frame: MediumFrame) -> Result<(), TransportError> {
                Ok(())
            }

            fn has_nonblocking_guarantee(&self) -> bool {
                false
            }
        }

        let pool = Arc::new(WorkerPool::new(1));
        let wrapped = NonBlockingSender::new(Arc::new(BlockedSender), 1, pool);

        wrapped.try_send_short(frame(1)).unwrap();
        // The drain task may have already picked up the sole slot; a
        // second and third enqueue race against it, so retry briefly
        // before asserting the queue is full.
        let mut saw_full = false;
        for pid in 2..50 {
            match wrapped.try_send_short(frame(pid)) {
                Ok(()) => {},
                Err(TransportError::QueueFull) => {
                    saw_full = true;
                    break;
                },
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(saw_full, "expected queue to fill at capacity 1 under a slow sender");
        wrapped.shutdown();
    }
}
