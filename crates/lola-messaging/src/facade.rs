//! Per-process messaging facade (spec §4.7): the public entry point wiring
//! receivers, the notification handler and the sender cache together.

use std::sync::Arc;

use lola_transport::{Receiver, ReceiverConfig, ReceiverFactory, RetryConfig, SenderFactory, StopSource, WorkerPool};
use lola_wire::{FrameKind, Message, PeerId, Plane, RegistrationHandle, endpoint_name};

use crate::{EventCallback, MessagingConfig, MessagingError, NotificationHandler, SenderCache};

/// Owns one receiver per enabled plane, the notification handler, the
/// sender cache and the stop-source used to cancel receiver worker pools on
/// destruction.
///
/// Field order matters: receivers are declared before the handler they hold
/// callbacks into, so they are dropped first (spec §4.7, §9 "Cyclic
/// references").
pub struct MessagingFacade {
    qm_receiver: Box<dyn Receiver>,
    asil_b_receiver: Option<Box<dyn Receiver>>,
    handler: Arc<NotificationHandler>,
    sender_cache: Arc<SenderCache>,
    stop_source: StopSource,
    local_dispatch: Arc<WorkerPool>,
}

impl MessagingFacade {
    /// Construct a facade for `local_pid`.
    ///
    /// Creates the QM receiver (always) and, if `config.asil_b_capable`,
    /// the ASIL-B receiver, registering the four notification-handler
    /// callbacks on each before calling `start_listening`. Receiver
    /// construction or listen failures are treated as fatal (spec §4.3,
    /// §4.7): the process cannot reliably participate in the control plane
    /// without its receiver.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::ConfigError`] if `config` fails
    /// validation.
    pub fn new(
        local_pid: PeerId,
        config: MessagingConfig,
        sender_factory: Arc<dyn SenderFactory>,
        receiver_factory: Arc<dyn ReceiverFactory>,
    ) -> Result<Self, MessagingError> {
        config.validate()?;

        let stop_source = StopSource::new();
        let local_dispatch = Arc::new(WorkerPool::new(2));
        let sender_cache = Arc::new(SenderCache::new(
            Arc::clone(&sender_factory),
            Arc::new(WorkerPool::new(2)),
            config.asil_b_capable,
            config.sender_queue_size,
        ));
        let retry_config = RetryConfig { retry_count: config.send_retry_count, retry_delay: config.send_retry_delay };
        let handler = Arc::new(NotificationHandler::new(
            local_pid,
            config.asil_b_capable,
            Arc::clone(&sender_cache),
            Arc::clone(&local_dispatch),
            retry_config,
            stop_source.token(),
        ));

        let qm_receiver = build_receiver(
            Plane::Qm,
            local_pid,
            ReceiverConfig { queue_size: config.receiver_queue_size_qm, allowed_user_ids: config.allowed_user_ids_qm.clone() },
            receiver_factory.as_ref(),
            &handler,
        );

        let asil_b_receiver = config.asil_b_capable.then(|| {
            build_receiver(
                Plane::AsilB,
                local_pid,
                ReceiverConfig {
                    queue_size: config.receiver_queue_size_asil_b,
                    allowed_user_ids: config.allowed_user_ids_asil_b.clone(),
                },
                receiver_factory.as_ref(),
                &handler,
            )
        });

        Ok(Self { qm_receiver, asil_b_receiver, handler, sender_cache, stop_source, local_dispatch })
    }

    /// Broadcast that a locally-provided element has been updated.
    pub fn notify_event(&self, plane: Plane, element_id: lola_wire::ElementId) {
        self.handler.notify_event(plane, element_id);
    }

    /// Subscribe a local callback to updates of `element_id`.
    ///
    /// # Errors
    ///
    /// See [`NotificationHandler::register_event_notification`].
    pub fn register_event_notification(
        &self,
        plane: Plane,
        element_id: lola_wire::ElementId,
        callback: std::sync::Weak<EventCallback>,
        target_peer_id: PeerId,
    ) -> Result<RegistrationHandle, MessagingError> {
        self.handler.register_event_notification(plane, element_id, callback, target_peer_id)
    }

    /// Re-point an existing local subscription at a new provider pid after
    /// service migration.
    pub fn reregister_event_notification(&self, plane: Plane, element_id: lola_wire::ElementId, new_target_peer_id: PeerId) {
        self.handler.reregister_event_notification(plane, element_id, new_target_peer_id);
    }

    /// Remove a local subscription previously returned by
    /// [`MessagingFacade::register_event_notification`].
    pub fn unregister_event_notification(
        &self,
        plane: Plane,
        element_id: lola_wire::ElementId,
        handle: RegistrationHandle,
        target_peer_id: PeerId,
    ) {
        self.handler.unregister_event_notification(plane, element_id, handle, target_peer_id);
    }

    /// Inform `target_peer_id` that `outdated_peer_id` is stale and should
    /// be purged from its subscriber sets.
    pub fn notify_outdated_peer(&self, plane: Plane, outdated_peer_id: PeerId, target_peer_id: PeerId) {
        self.handler.notify_outdated_peer(plane, outdated_peer_id, target_peer_id);
    }

    /// Access the underlying sender cache, e.g. for `get_or_create` in
    /// scenarios that bypass the handler (test harnesses).
    #[must_use]
    pub fn sender_cache(&self) -> &Arc<SenderCache> {
        &self.sender_cache
    }
}

impl Drop for MessagingFacade {
    fn drop(&mut self) {
        self.stop_source.request_stop();
        self.qm_receiver.stop();
        if let Some(receiver) = &self.asil_b_receiver {
            receiver.stop();
        }
    }
}

fn build_receiver(
    plane: Plane,
    local_pid: PeerId,
    receiver_config: ReceiverConfig,
    receiver_factory: &dyn ReceiverFactory,
    handler: &Arc<NotificationHandler>,
) -> Box<dyn Receiver> {
    let endpoint = endpoint_name(plane, local_pid);
    let mut receiver = receiver_factory.create_receiver(&endpoint, receiver_config).unwrap_or_else(|err| {
        tracing::error!(%endpoint, error = %err, "facade: failed to construct receiver, aborting");
        std::process::abort();
    });

    register_callbacks(receiver.as_mut(), plane, handler, &endpoint);

    if let Err(err) = receiver.start_listening() {
        tracing::error!(%endpoint, error = %err, "facade: receiver failed to start listening, aborting");
        std::process::abort();
    }

    receiver
}

fn register_callbacks(receiver: &mut dyn Receiver, plane: Plane, handler: &Arc<NotificationHandler>, endpoint: &str) {
    let register_notifier_handler = Arc::clone(handler);
    abort_on_err(
        endpoint,
        receiver.register_short(
            FrameKind::RegisterNotifier,
            Box::new(move |frame| match Message::from_short_frame(frame) {
                Ok(Message::RegisterNotifier { element_id, sender_pid }) => {
                    register_notifier_handler.handle_register_notifier(plane, element_id, sender_pid);
                },
                other => tracing::warn!(?other, "unexpected decode on RegisterNotifier callback"),
            }),
        ),
    );

    let unregister_notifier_handler = Arc::clone(handler);
    abort_on_err(
        endpoint,
        receiver.register_short(
            FrameKind::UnregisterNotifier,
            Box::new(move |frame| match Message::from_short_frame(frame) {
                Ok(Message::UnregisterNotifier { element_id, sender_pid }) => {
                    unregister_notifier_handler.handle_unregister_notifier(plane, element_id, sender_pid);
                },
                other => tracing::warn!(?other, "unexpected decode on UnregisterNotifier callback"),
            }),
        ),
    );

    let notify_update_handler = Arc::clone(handler);
    abort_on_err(
        endpoint,
        receiver.register_short(
            FrameKind::NotifyUpdate,
            Box::new(move |frame| match Message::from_short_frame(frame) {
                Ok(Message::NotifyUpdate { element_id, .. }) => {
                    notify_update_handler.handle_notify_update(plane, element_id);
                },
                other => tracing::warn!(?other, "unexpected decode on NotifyUpdate callback"),
            }),
        ),
    );

    let outdated_peer_handler = Arc::clone(handler);
    abort_on_err(
        endpoint,
        receiver.register_short(
            FrameKind::OutdatedPeer,
            Box::new(move |frame| match Message::from_short_frame(frame) {
                Ok(Message::OutdatedPeer { outdated_peer_id, .. }) => {
                    outdated_peer_handler.handle_outdated_peer(plane, outdated_peer_id);
                },
                other => tracing::warn!(?other, "unexpected decode on OutdatedPeer callback"),
            }),
        ),
    );
}

fn abort_on_err(endpoint: &str, result: Result<(), lola_transport::TransportError>) {
    if let Err(err) = result {
        tracing::error!(%endpoint, error = %err, "facade: registering a callback after listening started (internal bug)");
        std::process::abort();
    }
}
