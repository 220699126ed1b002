//! Per-plane cache mapping peer id to a shared transport sender (spec §4.5).

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use lola_transport::{MAX_QUEUE_CAPACITY, NonBlockingSender, SenderFactory, SharedSender};
use lola_wire::{PeerId, Plane, endpoint_name};

/// Lazily-populated, pid-keyed cache of senders, one map per plane.
///
/// Applies the asymmetric non-blocking wrap policy of spec §4.4: a sender
/// is wrapped only when this process is ASIL-B capable, the target plane is
/// QM, and the raw sender does not itself guarantee non-blocking sends.
pub struct SenderCache {
    factory: Arc<dyn SenderFactory>,
    worker_pool: Arc<lola_transport::WorkerPool>,
    asil_b_capable: bool,
    sender_queue_size: usize,
    qm: Mutex<HashMap<PeerId, SharedSender>>,
    asil_b: Mutex<HashMap<PeerId, SharedSender>>,
}

impl SenderCache {
    /// Construct an empty cache.
    ///
    /// `sender_queue_size` must already have passed
    /// [`crate::MessagingConfig::validate`]; it is clamped to
    /// [`MAX_QUEUE_CAPACITY`] defensively.
    #[must_use]
    pub fn new(
        factory: Arc<dyn SenderFactory>,
        worker_pool: Arc<lola_transport::WorkerPool>,
        asil_b_capable: bool,
        sender_queue_size: usize,
    ) -> Self {
        Self {
            factory,
            worker_pool,
            asil_b_capable,
            sender_queue_size: sender_queue_size.min(MAX_QUEUE_CAPACITY),
            qm: Mutex::new(HashMap::new()),
            asil_b: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self, plane: Plane) -> &Mutex<HashMap<PeerId, SharedSender>> {
        match plane {
            Plane::Qm => &self.qm,
            Plane::AsilB => &self.asil_b,
        }
    }

    /// Return the cached sender for `(plane, peer_id)`, constructing one if
    /// absent.
    ///
    /// A transport layer that cannot produce a sender leaves the process
    /// unable to participate correctly in the control plane at all; per spec
    /// §4.5 this is treated as fatal and aborts the process after logging.
    #[must_use]
    pub fn get_or_create(&self, plane: Plane, peer_id: PeerId) -> SharedSender {
        let mut map = self.map(plane).lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = map.get(&peer_id) {
            return Arc::clone(existing);
        }

        let endpoint = endpoint_name(plane, peer_id);
        let raw = self.factory.create_sender(&endpoint).unwrap_or_else(|err| {
            tracing::error!(%endpoint, error = %err, "sender cache: failed to construct sender, aborting");
            std::process::abort();
        });

        let sender: SharedSender = if self.asil_b_capable
            && plane == Plane::Qm
            && !raw.has_nonblocking_guarantee()
        {
            Arc::new(NonBlockingSender::new(raw, self.sender_queue_size, Arc::clone(&self.worker_pool)))
        } else {
            raw
        };

        map.insert(peer_id, Arc::clone(&sender));
        sender
    }

    /// Drop the cached entry for `(plane, peer_id)`, if any.
    ///
    /// Outstanding shared handles already obtained by callers continue to
    /// work; the next [`SenderCache::get_or_create`] for the same peer
    /// constructs a fresh sender.
    pub fn remove(&self, plane: Plane, peer_id: PeerId) {
        self.map(plane).lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&peer_id);
    }
}
