//! Multi-node test cluster: spins up several [`MessagingFacade`] instances
//! sharing one [`InProcessNetwork`], the way a handful of real OS processes
//! would share the same transport.

use std::sync::Arc;

use lola_messaging::{MessagingConfig, MessagingError, MessagingFacade};
use lola_wire::PeerId;

use crate::{InProcessNetwork, InProcessReceiverFactory, InProcessSenderFactory};

/// A set of facades wired to the same in-process network, keyed by pid.
pub struct TestCluster {
    network: Arc<InProcessNetwork>,
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCluster {
    /// Build an empty cluster with a fresh network.
    #[must_use]
    pub fn new() -> Self {
        Self { network: InProcessNetwork::new() }
    }

    /// Spawn a node at `local_pid` with `config`, wired into this cluster's
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::ConfigError`] if `config` fails
    /// validation.
    pub fn spawn_node(&self, local_pid: PeerId, config: MessagingConfig) -> Result<MessagingFacade, MessagingError> {
        let sender_factory = Arc::new(InProcessSenderFactory::new(Arc::clone(&self.network)));
        let receiver_factory = Arc::new(InProcessReceiverFactory::new(Arc::clone(&self.network)));
        MessagingFacade::new(local_pid, config, sender_factory, receiver_factory)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lola_wire::{ElementId, Plane};

    use super::*;

    const E: ElementId = ElementId { service_id: 1, element_id: 1, instance_id: 1, element_kind: 0 };

    #[test]
    fn two_nodes_exchange_register_and_notify() {
        let cluster = TestCluster::new();
        let provider = cluster.spawn_node(4444, MessagingConfig::default()).unwrap();
        let consumer = cluster.spawn_node(5555, MessagingConfig::default()).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let _ = tx.send(());
        });
        consumer.register_event_notification(Plane::Qm, E, Arc::downgrade(&callback), 4444).unwrap();

        // Give the consumer's RegisterNotifier frame a moment to be
        // processed by the provider before notifying.
        std::thread::sleep(std::time::Duration::from_millis(100));
        provider.notify_event(Plane::Qm, E);

        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        drop(callback);
    }

    #[test]
    fn facade_teardown_completes_promptly() {
        let cluster = TestCluster::new();
        let node = cluster.spawn_node(6666, MessagingConfig::default()).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            drop(node);
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("facade drop should join its receiver dispatch threads promptly");
    }
}
