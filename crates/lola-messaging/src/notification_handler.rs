//! The notification handler: per-plane registries and fan-out (spec §4.6).
//!
//! Two identical control blocks, one per plane, share the same algorithm;
//! [`NotificationHandler::control_block`] is the single place that validates
//! a plane against this instance's ASIL-B capability (spec §4.6.7) before
//! handing back the block to operate on. Internal code below that point is
//! plane-agnostic (spec §9, "Two-plane symmetry").

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use lola_transport::{RetryConfig, StopToken, WorkerPool, send_short_with_retry};
use lola_wire::{ElementId, Message, PeerId, Plane, RegistrationHandle};

use crate::{MessagingError, SenderCache};

/// A locally-registered event callback.
///
/// Held weakly by the handler: the caller owns the strong `Arc`, and when it
/// drops, the weak reference fails to upgrade and fan-out silently skips the
/// entry (spec §9, "Weak callbacks and scoped functions").
pub type EventCallback = dyn Fn() + Send + Sync;

const MAX_LOCAL_HANDLERS_PER_ELEMENT: usize = 5;
const REMOTE_FANOUT_BATCH_SIZE: usize = 20;
const REMOTE_FANOUT_ITERATION_CAP: usize = 255;

struct LocalHandlerEntry {
    handle: RegistrationHandle,
    callback: Weak<EventCallback>,
}

struct RemoteRegistration {
    peer_id: PeerId,
    refcount: u16,
}

#[derive(Default)]
struct ControlBlock {
    local_handlers: RwLock<HashMap<ElementId, Vec<LocalHandlerEntry>>>,
    remote_subscribers: RwLock<HashMap<ElementId, HashSet<PeerId>>>,
    remote_reg_counts: RwLock<HashMap<ElementId, RemoteRegistration>>,
    next_registration_handle: AtomicU64,
}

/// Owns both planes' registries and implements every control-plane
/// operation against them.
pub struct NotificationHandler {
    local_pid: PeerId,
    asil_b_capable: bool,
    qm: ControlBlock,
    asil_b: ControlBlock,
    sender_cache: Arc<SenderCache>,
    local_dispatch: Arc<WorkerPool>,
    retry_config: RetryConfig,
    stop: StopToken,
}

impl NotificationHandler {
    /// Construct a handler for `local_pid`. `asil_b_capable` gates whether
    /// [`Plane::AsilB`] operations are accepted at all (see
    /// [`NotificationHandler::control_block`]).
    #[must_use]
    pub fn new(
        local_pid: PeerId,
        asil_b_capable: bool,
        sender_cache: Arc<SenderCache>,
        local_dispatch: Arc<WorkerPool>,
        retry_config: RetryConfig,
        stop: StopToken,
    ) -> Self {
        Self {
            local_pid,
            asil_b_capable,
            qm: ControlBlock::default(),
            asil_b: ControlBlock::default(),
            sender_cache,
            local_dispatch,
            retry_config,
            stop,
        }
    }

    /// Entry-point precondition check (spec §4.6.7): every public operation
    /// asserts the supplied plane is either QM or an ASIL-B-capable
    /// instance's ASIL-B. Violations are a caller bug and fatal.
    fn control_block(&self, plane: Plane) -> &ControlBlock {
        match plane {
            Plane::Qm => &self.qm,
            Plane::AsilB => {
                if !self.asil_b_capable {
                    tracing::error!(
                        "notification handler: ASIL-B operation requested on a QM-only instance"
                    );
                    std::process::abort();
                }
                &self.asil_b
            },
        }
    }

    /// Broadcast that a locally-provided element has been updated.
    ///
    /// Remote fan-out happens synchronously on the caller's thread so
    /// propagation latency is deterministic; local fan-out is dispatched to
    /// the internal worker pool, since local callbacks are user code of
    /// unbounded duration (spec §4.6.1).
    pub fn notify_event(self: &Arc<Self>, plane: Plane, element_id: ElementId) {
        self.remote_fan_out(plane, element_id);
        self.dispatch_local_fan_out(plane, element_id, false);
    }

    /// Subscribe a local callback to updates of `element_id`. If
    /// `target_peer_id` is this process, installation is purely local;
    /// otherwise the reference-counted upstream registration (spec §4.6.2)
    /// also runs.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::SubscriberLimitExceeded`] if the provider
    /// side rejects the subscription (that machinery lives outside this
    /// crate; this implementation never produces that error itself).
    pub fn register_event_notification(
        &self,
        plane: Plane,
        element_id: ElementId,
        callback: Weak<EventCallback>,
        target_peer_id: PeerId,
    ) -> Result<RegistrationHandle, MessagingError> {
        let cb = self.control_block(plane);
        let handle = self.install_local_handler(cb, element_id, callback);
        if target_peer_id != self.local_pid {
            self.register_upstream(cb, plane, element_id, target_peer_id);
        }
        Ok(handle)
    }

    /// Called when the service has migrated to a new provider pid (spec
    /// §4.6.1). No `UnregisterNotifier` is sent to the old peer - the core
    /// relies on `OutdatedPeer` reconciliation for that.
    pub fn reregister_event_notification(&self, plane: Plane, element_id: ElementId, new_target_peer_id: PeerId) {
        let cb = self.control_block(plane);
        {
            let local = cb.local_handlers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            if !local.contains_key(&element_id) {
                tracing::warn!(?element_id, "reregister_event_notification: no local handler list, no-op");
                return;
            }
        }

        if new_target_peer_id == self.local_pid {
            return;
        }

        let send_register = {
            let mut counts = cb.remote_reg_counts.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            match counts.get_mut(&element_id) {
                Some(existing) if existing.peer_id == new_target_peer_id => {
                    existing.refcount = existing.refcount.saturating_add(1);
                    false
                },
                Some(existing) => {
                    existing.peer_id = new_target_peer_id;
                    existing.refcount = 1;
                    true
                },
                None => {
                    tracing::warn!(?element_id, "reregister_event_notification: no prior remote registration, no-op");
                    false
                },
            }
        };

        if send_register {
            self.send_to_peer(
                plane,
                new_target_peer_id,
                Message::RegisterNotifier { element_id, sender_pid: self.local_pid },
            );
        }
    }

    /// Remove the local handler with `handle`; if remote, apply the 1→0
    /// decrement and emit `UnregisterNotifier` as needed (spec §4.6.3).
    pub fn unregister_event_notification(
        &self,
        plane: Plane,
        element_id: ElementId,
        handle: RegistrationHandle,
        target_peer_id: PeerId,
    ) {
        let cb = self.control_block(plane);
        if !self.remove_local_handler(cb, element_id, handle) {
            tracing::warn!(?element_id, ?handle, "unregister_event_notification: handle not found, no-op");
            return;
        }
        if target_peer_id != self.local_pid {
            self.unregister_upstream(cb, plane, element_id, target_peer_id);
        }
    }

    /// Inform `target_peer_id` that `outdated_peer_id` should be purged
    /// from its subscriber sets. Idempotent.
    pub fn notify_outdated_peer(&self, plane: Plane, outdated_peer_id: PeerId, target_peer_id: PeerId) {
        self.send_to_peer(plane, target_peer_id, Message::OutdatedPeer { outdated_peer_id, sender_pid: self.local_pid });
    }

    /// Handle an inbound `RegisterNotifier` frame (spec §4.6.6).
    pub fn handle_register_notifier(&self, plane: Plane, element_id: ElementId, from_peer: PeerId) {
        let cb = self.control_block(plane);
        let mut subs = cb.remote_subscribers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !subs.entry(element_id).or_default().insert(from_peer) {
            tracing::warn!(?element_id, from_peer, "redundant RegisterNotifier from already-registered peer");
        }
    }

    /// Handle an inbound `UnregisterNotifier` frame (spec §4.6.6).
    pub fn handle_unregister_notifier(&self, plane: Plane, element_id: ElementId, from_peer: PeerId) {
        let cb = self.control_block(plane);
        let mut subs = cb.remote_subscribers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        match subs.get_mut(&element_id) {
            Some(set) if set.remove(&from_peer) => {},
            _ => tracing::warn!(?element_id, from_peer, "UnregisterNotifier from a peer that was not subscribed"),
        }
    }

    /// Handle an inbound `NotifyUpdate` frame: run local fan-out (spec
    /// §4.6.6).
    pub fn handle_notify_update(self: &Arc<Self>, plane: Plane, element_id: ElementId) {
        self.dispatch_local_fan_out(plane, element_id, true);
    }

    /// Handle an inbound `OutdatedPeer` frame: purge the peer from every
    /// subscriber set and evict it from the sender cache (spec §4.6.6).
    pub fn handle_outdated_peer(&self, plane: Plane, outdated_peer: PeerId) {
        let cb = self.control_block(plane);
        let removed = {
            let mut subs = cb.remote_subscribers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            subs.values_mut().filter(|set| set.remove(&outdated_peer)).count()
        };
        tracing::info!(outdated_peer, removed, "purged outdated peer from subscriber sets");
        self.sender_cache.remove(plane, outdated_peer);
    }

    fn install_local_handler(&self, cb: &ControlBlock, element_id: ElementId, callback: Weak<EventCallback>) -> RegistrationHandle {
        let handle = RegistrationHandle::from_raw(cb.next_registration_handle.fetch_add(1, Ordering::SeqCst));
        let mut handlers = cb.local_handlers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.entry(element_id).or_default().push(LocalHandlerEntry { handle, callback });
        handle
    }

    fn remove_local_handler(&self, cb: &ControlBlock, element_id: ElementId, handle: RegistrationHandle) -> bool {
        let mut handlers = cb.local_handlers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&element_id) else { return false };
        match list.binary_search_by_key(&handle, |entry| entry.handle) {
            Ok(index) => {
                list.remove(index);
                true
            },
            Err(_) => false,
        }
    }

    /// Upstream registration algorithm (spec §4.6.2): transmit
    /// `RegisterNotifier` only on the 0→1 edge of the local refcount.
    fn register_upstream(&self, cb: &ControlBlock, plane: Plane, element_id: ElementId, target_peer_id: PeerId) {
        let resulting_count = {
            let mut counts = cb.remote_reg_counts.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            match counts.get_mut(&element_id) {
                Some(existing) if existing.peer_id == target_peer_id => {
                    existing.refcount = existing.refcount.saturating_add(1);
                    existing.refcount
                },
                Some(existing) => {
                    tracing::error!(
                        ?element_id,
                        old_peer = existing.peer_id,
                        new_peer = target_peer_id,
                        "register_upstream: peer mismatch for existing count entry, treating as migration"
                    );
                    existing.peer_id = target_peer_id;
                    existing.refcount = 1;
                    1
                },
                None => {
                    counts.insert(element_id, RemoteRegistration { peer_id: target_peer_id, refcount: 1 });
                    1
                },
            }
        };

        if resulting_count == 1 {
            self.send_to_peer(plane, target_peer_id, Message::RegisterNotifier { element_id, sender_pid: self.local_pid });
        }
    }

    /// Upstream unregistration algorithm (spec §4.6.3): transmit
    /// `UnregisterNotifier` only on the 1→0 edge.
    fn unregister_upstream(&self, cb: &ControlBlock, plane: Plane, element_id: ElementId, target_peer_id: PeerId) {
        let send_unregister = {
            let mut counts = cb.remote_reg_counts.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(existing) = counts.get_mut(&element_id) else {
                tracing::error!(?element_id, "unregister_upstream: no registration count entry, ignoring");
                return;
            };
            if existing.peer_id != target_peer_id {
                tracing::error!(
                    ?element_id,
                    expected = existing.peer_id,
                    got = target_peer_id,
                    "unregister_upstream: peer mismatch, ignoring mis-sequenced unsubscribe"
                );
                return;
            }
            if existing.refcount == 0 {
                tracing::error!(?element_id, "unregister_upstream: refcount already zero");
                std::process::abort();
            }
            existing.refcount -= 1;
            let reached_zero = existing.refcount == 0;
            if reached_zero {
                counts.remove(&element_id);
            }
            reached_zero
        };

        if send_unregister {
            self.send_to_peer(plane, target_peer_id, Message::UnregisterNotifier { element_id, sender_pid: self.local_pid });
        }
    }

    fn dispatch_local_fan_out(self: &Arc<Self>, plane: Plane, element_id: ElementId, report_if_empty: bool) {
        let handler = Arc::clone(self);
        self.local_dispatch.submit(Box::new(move || {
            let cb = handler.control_block(plane);
            handler.local_fan_out(cb, element_id, report_if_empty);
        }));
    }

    /// Local fan-out (spec §4.6.4): copy up to [`MAX_LOCAL_HANDLERS_PER_ELEMENT`]
    /// weak references under the read lock, release it, then upgrade and
    /// invoke each outside the lock.
    fn local_fan_out(&self, cb: &ControlBlock, element_id: ElementId, report_if_empty: bool) {
        let copied: Vec<Weak<EventCallback>> = {
            let handlers = cb.local_handlers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(list) = handlers.get(&element_id) else { return };
            if list.is_empty() {
                return;
            }
            if list.len() > MAX_LOCAL_HANDLERS_PER_ELEMENT {
                tracing::error!(
                    ?element_id,
                    registered = list.len(),
                    cap = MAX_LOCAL_HANDLERS_PER_ELEMENT,
                    "local fan-out: more handlers registered than the cap, excess will not be invoked"
                );
            }
            list.iter().take(MAX_LOCAL_HANDLERS_PER_ELEMENT).map(|entry| entry.callback.clone()).collect()
        };

        let mut invoked = 0usize;
        for weak in copied {
            if self.stop.is_stop_requested() {
                break;
            }
            if let Some(callback) = weak.upgrade() {
                callback();
                invoked += 1;
            }
        }

        if report_if_empty && invoked == 0 {
            tracing::info!(?element_id, "NotifyUpdate invoked zero local handlers (possibly-racy notify)");
        }
    }

    /// Remote fan-out (spec §4.6.5): copy subscriber pids in bounded
    /// batches, releasing the lock before any I/O.
    fn remote_fan_out(&self, plane: Plane, element_id: ElementId) {
        let cb = self.control_block(plane);
        let mut start_pid: PeerId = 0;
        let mut iterations = 0usize;

        loop {
            iterations += 1;
            if iterations > REMOTE_FANOUT_ITERATION_CAP {
                tracing::error!(?element_id, "remote fan-out: hit the defensive iteration cap, truncating this fan-out");
                break;
            }

            let (batch, more_remain) = {
                let subs = cb.remote_subscribers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
                let Some(set) = subs.get(&element_id) else { break };
                let mut candidates: Vec<PeerId> = set.iter().copied().filter(|&pid| pid >= start_pid).collect();
                candidates.sort_unstable();
                let more = candidates.len() > REMOTE_FANOUT_BATCH_SIZE;
                candidates.truncate(REMOTE_FANOUT_BATCH_SIZE);
                (candidates, more)
            };

            if batch.is_empty() {
                break;
            }

            for peer_id in &batch {
                self.send_to_peer(plane, *peer_id, Message::NotifyUpdate { element_id, sender_pid: self.local_pid });
            }

            if let Some(&last) = batch.last().filter(|_| more_remain) {
                start_pid = last + 1;
            } else {
                break;
            }
        }

        if iterations > 1 {
            tracing::warn!(?element_id, iterations, "remote fan-out: subscriber set required more than one batch");
        }
    }

    fn send_to_peer(&self, plane: Plane, peer_id: PeerId, message: Message) {
        let sender = self.sender_cache.get_or_create(plane, peer_id);
        let frame = message.to_short_frame();
        if let Err(err) = send_short_with_retry(sender.as_ref(), frame, &self.retry_config, &self.stop) {
            tracing::warn!(?plane, peer_id, ?message, error = %err, "send_to_peer: giving up after retries");
        }
    }
}
