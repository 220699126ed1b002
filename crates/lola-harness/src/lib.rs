//! In-process channel transport and multi-node test cluster for the LoLa
//! control-plane messaging core.
//!
//! Ships the one concrete transport this workspace provides: an in-memory
//! stand-in for the POSIX message queues / resource-manager IPC that a real
//! deployment would use, which are out of scope for the core itself (spec
//! §1). [`TestCluster`] wires several [`lola_messaging::MessagingFacade`]
//! instances to the same network so integration tests can exercise the
//! full stack end to end.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel_receiver;
mod channel_sender;
mod cluster;
mod network;

pub use channel_receiver::{ChannelReceiver, InProcessReceiverFactory};
pub use channel_sender::InProcessSenderFactory;
pub use cluster::TestCluster;
pub use network::InProcessNetwork;
