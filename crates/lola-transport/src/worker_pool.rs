//! A small, explicit, non-global worker pool.
//!
//! Used both for local fan-out dispatch (unbounded-duration user callbacks
//! must not run on the caller's thread) and as the "external worker pool"
//! the non-blocking sender wrapper submits drain tasks to. Worker pools are
//! never global state (spec §5): each [`WorkerPool`] owns its threads and is
//! handed to whatever needs it.

use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads draining a shared job queue.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool with `size` worker threads. `size` is clamped to at
    /// least 1 (spec §4.3: "worker pool size >= 1").
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = std::sync::Arc::new(std::sync::Mutex::new(receiver));

        let workers = (0..size)
            .map(|_| {
                let receiver = std::sync::Arc::clone(&receiver);
                thread::spawn(move || {
                    loop {
                        let job = {
                            let guard =
                                receiver.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                            guard.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();

        Self { sender: Some(sender), workers }
    }

    /// Submit a job to be run on some worker thread.
    ///
    /// Silently dropped if the pool has already been shut down - callers
    /// that need to observe shutdown should check a [`crate::StopToken`]
    /// themselves before submitting.
    pub fn submit(&self, job: Job) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, which unblocks every
        // worker's `recv()` with an `Err`, letting them exit their loops.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn runs_submitted_jobs() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }));
        }

        for _ in 0..8 {
            rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn drop_joins_workers_without_panic() {
        let pool = WorkerPool::new(1);
        pool.submit(Box::new(|| {}));
        drop(pool);
    }
}
