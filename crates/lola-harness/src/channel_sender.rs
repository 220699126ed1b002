//! In-process [`Sender`] backed by [`InProcessNetwork`].

use std::sync::Arc;

use lola_transport::{Sender, SenderFactory, SharedSender, TransportError};
use lola_wire::{MediumFrame, ShortFrame};

use crate::network::{InProcessNetwork, NetworkFrame};

struct ChannelSender {
    network: Arc<InProcessNetwork>,
    endpoint: String,
}

impl Sender for ChannelSender {
    fn try_send_short(&self, frame: ShortFrame) -> Result<(), TransportError> {
        let Some(tx) = self.network.lookup(&self.endpoint) else {
            return Err(TransportError::SendWouldBlock(format!("{} is not yet listening", self.endpoint)));
        };
        tx.send(NetworkFrame::Short(frame)).map_err(|_| TransportError::Closed)
    }

    fn try_send_medium(&self, frame: MediumFrame) -> Result<(), TransportError> {
        let Some(tx) = self.network.lookup(&self.endpoint) else {
            return Err(TransportError::SendWouldBlock(format!("{} is not yet listening", self.endpoint)));
        };
        tx.send(NetworkFrame::Medium(frame)).map_err(|_| TransportError::Closed)
    }

    fn has_nonblocking_guarantee(&self) -> bool {
        // Backed by an unbounded in-memory channel: send() never blocks the
        // caller for an unbounded time.
        true
    }
}

/// Constructs [`ChannelSender`]s resolving targets through a shared
/// [`InProcessNetwork`].
pub struct InProcessSenderFactory {
    network: Arc<InProcessNetwork>,
}

impl InProcessSenderFactory {
    /// Build a factory resolving targets through `network`.
    #[must_use]
    pub fn new(network: Arc<InProcessNetwork>) -> Self {
        Self { network }
    }
}

impl SenderFactory for InProcessSenderFactory {
    fn create_sender(&self, endpoint: &str) -> Result<SharedSender, TransportError> {
        Ok(Arc::new(ChannelSender { network: Arc::clone(&self.network), endpoint: endpoint.to_string() }))
    }
}
