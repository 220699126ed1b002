//! Shared in-process "network": a registry of endpoint name to inbox,
//! standing in for the concrete OS transports (POSIX message queues,
//! resource-manager IPC) that are out of scope for the core (spec §1).

use std::{collections::HashMap, sync::Arc, sync::Mutex, sync::mpsc};

use lola_transport::TransportError;
use lola_wire::{MediumFrame, ShortFrame};

/// A frame placed on a node's inbox channel.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NetworkFrame {
    Short(ShortFrame),
    Medium(MediumFrame),
    Stop,
}

/// Process-local stand-in for the network: every endpoint a receiver binds
/// is registered here, and every sender resolves its target endpoint
/// through the same registry. One [`InProcessNetwork`] is shared by every
/// node in a test scenario.
pub struct InProcessNetwork {
    inboxes: Mutex<HashMap<String, mpsc::Sender<NetworkFrame>>>,
}

impl Default for InProcessNetwork {
    fn default() -> Self {
        Self::new_raw()
    }
}

impl InProcessNetwork {
    fn new_raw() -> Self {
        Self { inboxes: Mutex::new(HashMap::new()) }
    }

    /// Construct a fresh, empty network shared by reference.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::new_raw())
    }

    pub(crate) fn bind(&self, endpoint: &str, tx: mpsc::Sender<NetworkFrame>) -> Result<(), TransportError> {
        let mut inboxes = self.inboxes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inboxes.contains_key(endpoint) {
            return Err(TransportError::BindFailed {
                endpoint: endpoint.to_string(),
                reason: "endpoint already bound".to_string(),
            });
        }
        inboxes.insert(endpoint.to_string(), tx);
        Ok(())
    }

    pub(crate) fn unbind(&self, endpoint: &str) {
        self.inboxes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(endpoint);
    }

    pub(crate) fn lookup(&self, endpoint: &str) -> Option<mpsc::Sender<NetworkFrame>> {
        self.inboxes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(endpoint).cloned()
    }
}
