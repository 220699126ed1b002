//! Wire-level message taxonomy for the LoLa control-plane messaging core.
//!
//! This crate owns everything that is bit-exact and architecture-local: the
//! core identifiers (`PeerId`, `ElementId`, `RegistrationHandle`, `Plane`),
//! the fixed-size short/medium wire frames and their codec, the typed
//! [`Message`] taxonomy built on top of them, and canonical endpoint naming.
//! It has no notion of threads, locks or sockets - see `lola-transport` and
//! `lola-messaging` for those.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod element_id;
mod endpoint;
mod error;
mod frame;
mod ids;
mod message;
mod plane;

pub use element_id::ElementId;
pub use endpoint::endpoint_name;
pub use error::WireError;
pub use frame::{FrameKind, MediumFrame, MEDIUM_FRAME_SIZE, ShortFrame, SHORT_FRAME_SIZE};
pub use ids::{PeerId, RegistrationHandle};
pub use message::Message;
pub use plane::Plane;
