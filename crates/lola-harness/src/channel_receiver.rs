//! In-process [`Receiver`] backed by [`InProcessNetwork`].

use std::{
    collections::HashMap,
    sync::{Arc, mpsc},
    thread::JoinHandle,
};

use lola_transport::{MediumCallback, Receiver, ReceiverConfig, ReceiverFactory, ShortCallback, TransportError, WorkerPool};
use lola_wire::FrameKind;

use crate::network::{InProcessNetwork, NetworkFrame};

/// Dispatches frames arriving on one endpoint's inbox to registered
/// callbacks, running each callback on an internal worker pool so a slow
/// callback never blocks the dispatch loop (spec §4.3).
///
/// `config`'s peer allowlist is applied against the sending frame's pid,
/// the closest analog this in-process transport has to an OS user id -
/// there is no real OS connection to authenticate here.
pub struct ChannelReceiver {
    network: Arc<InProcessNetwork>,
    endpoint: String,
    inbox_tx: mpsc::Sender<NetworkFrame>,
    inbox_rx: Option<mpsc::Receiver<NetworkFrame>>,
    config: ReceiverConfig,
    short_callbacks: HashMap<FrameKind, Arc<dyn Fn(lola_wire::ShortFrame) + Send + Sync>>,
    medium_callbacks: HashMap<FrameKind, Arc<dyn Fn(lola_wire::MediumFrame) + Send + Sync>>,
    worker_pool: Arc<WorkerPool>,
    dispatch_thread: Option<JoinHandle<()>>,
    listening: bool,
}

impl ChannelReceiver {
    fn new(network: Arc<InProcessNetwork>, endpoint: String, config: ReceiverConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            network,
            endpoint,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
            config,
            short_callbacks: HashMap::new(),
            medium_callbacks: HashMap::new(),
            worker_pool: Arc::new(WorkerPool::new(2)),
            dispatch_thread: None,
            listening: false,
        }
    }
}

impl Receiver for ChannelReceiver {
    fn register_short(&mut self, kind: FrameKind, callback: ShortCallback) -> Result<(), TransportError> {
        if self.listening {
            return Err(TransportError::InvalidConfig("register_short called after start_listening".to_string()));
        }
        self.short_callbacks.insert(kind, Arc::from(callback));
        Ok(())
    }

    fn register_medium(&mut self, kind: FrameKind, callback: MediumCallback) -> Result<(), TransportError> {
        if self.listening {
            return Err(TransportError::InvalidConfig("register_medium called after start_listening".to_string()));
        }
        self.medium_callbacks.insert(kind, Arc::from(callback));
        Ok(())
    }

    fn start_listening(&mut self) -> Result<(), TransportError> {
        self.network.bind(&self.endpoint, self.inbox_tx.clone())?;

        let Some(rx) = self.inbox_rx.take() else {
            return Err(TransportError::InvalidConfig("start_listening called twice".to_string()));
        };
        let short_callbacks = self.short_callbacks.clone();
        let medium_callbacks = self.medium_callbacks.clone();
        let worker_pool = Arc::clone(&self.worker_pool);
        let endpoint = self.endpoint.clone();
        let config = self.config.clone();

        self.dispatch_thread = Some(std::thread::spawn(move || {
            loop {
                match rx.recv() {
                    Ok(NetworkFrame::Stop) | Err(_) => break,
                    Ok(NetworkFrame::Short(frame)) => {
                        if !config.accepts_user(frame.sender_pid as u32) {
                            tracing::warn!(?endpoint, sender_pid = frame.sender_pid, "rejecting short frame from disallowed peer");
                            continue;
                        }
                        if let Some(callback) = short_callbacks.get(&frame.kind) {
                            let callback = Arc::clone(callback);
                            worker_pool.submit(Box::new(move || callback(frame)));
                        } else {
                            tracing::debug!(?endpoint, kind = ?frame.kind, "no short callback registered, discarding");
                        }
                    },
                    Ok(NetworkFrame::Medium(frame)) => {
                        if !config.accepts_user(frame.sender_pid as u32) {
                            tracing::warn!(?endpoint, sender_pid = frame.sender_pid, "rejecting medium frame from disallowed peer");
                            continue;
                        }
                        if let Some(callback) = medium_callbacks.get(&frame.kind) {
                            let callback = Arc::clone(callback);
                            worker_pool.submit(Box::new(move || callback(frame)));
                        } else {
                            tracing::debug!(?endpoint, kind = ?frame.kind, "no medium callback registered, discarding");
                        }
                    },
                }
            }
        }));

        self.listening = true;
        Ok(())
    }

    fn stop(&self) {
        let _ = self.inbox_tx.send(NetworkFrame::Stop);
    }
}

impl Drop for ChannelReceiver {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.dispatch_thread.take() {
            let _ = thread.join();
        }
        self.network.unbind(&self.endpoint);
    }
}

/// Constructs [`ChannelReceiver`]s bound into a shared [`InProcessNetwork`].
pub struct InProcessReceiverFactory {
    network: Arc<InProcessNetwork>,
}

impl InProcessReceiverFactory {
    /// Build a factory binding receivers into `network`.
    #[must_use]
    pub fn new(network: Arc<InProcessNetwork>) -> Self {
        Self { network }
    }
}

impl ReceiverFactory for InProcessReceiverFactory {
    fn create_receiver(&self, endpoint: &str, config: ReceiverConfig) -> Result<Box<dyn Receiver>, TransportError> {
        Ok(Box::new(ChannelReceiver::new(Arc::clone(&self.network), endpoint.to_string(), config)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{sync::mpsc as std_mpsc, time::Duration};

    use lola_wire::ShortFrame;

    use super::*;

    #[test]
    fn delivers_registered_frame_kind_to_callback() {
        let network = InProcessNetwork::new();
        let receiver_factory = InProcessReceiverFactory::new(Arc::clone(&network));
        let mut receiver = receiver_factory.create_receiver("/LoLa_4444_QM", ReceiverConfig::default()).unwrap();

        let (tx, rx) = std_mpsc::channel();
        receiver
            .register_short(
                FrameKind::NotifyUpdate,
                Box::new(move |frame| {
                    let _ = tx.send(frame);
                }),
            )
            .unwrap();
        receiver.start_listening().unwrap();

        let sender_factory = crate::InProcessSenderFactory::new(network);
        let sender = lola_transport::SenderFactory::create_sender(&sender_factory, "/LoLa_4444_QM").unwrap();
        sender
            .try_send_short(ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid: 5555, payload: 7 })
            .unwrap();

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received.sender_pid, 5555);
        assert_eq!(received.payload, 7);
    }

    #[test]
    fn rejects_double_bind_on_same_endpoint() {
        let network = InProcessNetwork::new();
        let receiver_factory = InProcessReceiverFactory::new(Arc::clone(&network));
        let mut first = receiver_factory.create_receiver("/LoLa_4444_QM", ReceiverConfig::default()).unwrap();
        first.start_listening().unwrap();

        let mut second = receiver_factory.create_receiver("/LoLa_4444_QM", ReceiverConfig::default()).unwrap();
        let err = second.start_listening().unwrap_err();
        assert!(matches!(err, TransportError::BindFailed { .. }));
    }

    #[test]
    fn rejects_frames_from_peers_outside_the_allowlist() {
        let network = InProcessNetwork::new();
        let receiver_factory = InProcessReceiverFactory::new(Arc::clone(&network));
        let config = ReceiverConfig { queue_size: 16, allowed_user_ids: [5555].into_iter().collect() };
        let mut receiver = receiver_factory.create_receiver("/LoLa_4444_QM", config).unwrap();

        let (tx, rx) = std_mpsc::channel();
        receiver
            .register_short(
                FrameKind::NotifyUpdate,
                Box::new(move |frame| {
                    let _ = tx.send(frame);
                }),
            )
            .unwrap();
        receiver.start_listening().unwrap();

        let sender_factory = crate::InProcessSenderFactory::new(network);
        let sender = lola_transport::SenderFactory::create_sender(&sender_factory, "/LoLa_4444_QM").unwrap();
        sender
            .try_send_short(ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid: 9999, payload: 1 })
            .unwrap();
        sender
            .try_send_short(ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid: 5555, payload: 2 })
            .unwrap();

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received.sender_pid, 5555, "only the allowlisted peer's frame should be delivered");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "no second frame should arrive");
    }
}
