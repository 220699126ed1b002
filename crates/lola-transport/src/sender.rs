//! Abstract transport sender contract (spec §4.2).

use std::sync::Arc;

use lola_wire::{MediumFrame, ShortFrame};

use crate::TransportError;

/// Best-effort, possibly-blocking unicast sender to a named peer endpoint.
///
/// Implementations may block if the underlying transport buffer is full.
/// Errors are recoverable (the caller may retry) unless the endpoint is
/// permanently gone. Implementations must report their non-blocking status
/// truthfully via [`Sender::has_nonblocking_guarantee`].
pub trait Sender: Send + Sync {
    /// Attempt to send a short frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot currently accept
    /// the frame.
    fn try_send_short(&self, frame: ShortFrame) -> Result<(), TransportError>;

    /// Attempt to send a medium frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot currently accept
    /// the frame.
    fn try_send_medium(&self, frame: MediumFrame) -> Result<(), TransportError>;

    /// Whether `try_send_*` is guaranteed to return within bounded time
    /// regardless of peer liveness.
    fn has_nonblocking_guarantee(&self) -> bool;
}

/// Shared handle to a sender.
///
/// Senders are handed out as reference-counted handles so that in-flight
/// sends survive cache eviction: the cache holds one reference, each caller
/// that obtained the sender holds another, and cache removal only drops the
/// cache's own reference (spec §9, "Shared-ownership of senders").
pub type SharedSender = Arc<dyn Sender>;

/// Injection point for constructing a raw transport sender for a given
/// endpoint name.
///
/// Kept swappable so tests can substitute an in-process transport for the
/// concrete OS transports (POSIX message queues, resource-manager IPC) that
/// are out of scope for this crate (spec §1).
pub trait SenderFactory: Send + Sync {
    /// Construct a sender for the given canonical endpoint name.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot produce a usable
    /// sender for this endpoint.
    fn create_sender(&self, endpoint: &str) -> Result<SharedSender, TransportError>;
}
