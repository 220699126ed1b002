//! Abstract transport receiver contract (spec §4.3).

use std::collections::HashSet;

use lola_wire::{FrameKind, MediumFrame, ShortFrame};

use crate::TransportError;

/// Callback invoked when a short frame of a registered kind arrives.
pub type ShortCallback = Box<dyn Fn(ShortFrame) + Send + Sync>;

/// Callback invoked when a medium frame of a registered kind arrives.
pub type MediumCallback = Box<dyn Fn(MediumFrame) + Send + Sync>;

/// Per-plane receiver configuration.
///
/// `queue_size` is the minimum number of in-flight frames the receiver must
/// be able to buffer; `allowed_user_ids` is the peer allowlist - empty means
/// unrestricted (spec §6).
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Minimum number of in-flight frames to buffer.
    pub queue_size: usize,
    /// OS user ids allowed to connect. Empty means unrestricted.
    pub allowed_user_ids: HashSet<u32>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self { queue_size: 16, allowed_user_ids: HashSet::new() }
    }
}

impl ReceiverConfig {
    /// Whether a connecting peer with the given OS user id should be
    /// accepted.
    #[must_use]
    pub fn accepts_user(&self, user_id: u32) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.contains(&user_id)
    }
}

/// Listens on a named endpoint and dispatches received frames to registered
/// callbacks on an internal worker pool.
///
/// Callbacks must be registered before [`Receiver::start_listening`] is
/// called. Worker pool size is at least 1; callbacks for the same frame kind
/// may be invoked concurrently, so registered callbacks must be internally
/// thread-safe (the notification handler achieves this via its own locking).
pub trait Receiver: Send {
    /// Install a handler for short frames of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if called after [`Receiver::start_listening`].
    fn register_short(&mut self, kind: FrameKind, callback: ShortCallback) -> Result<(), TransportError>;

    /// Install a handler for medium frames of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if called after [`Receiver::start_listening`].
    fn register_medium(&mut self, kind: FrameKind, callback: MediumCallback) -> Result<(), TransportError>;

    /// Open the endpoint (subject to the peer allowlist) and begin
    /// dispatching received frames to registered callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the endpoint could not be
    /// opened. The caller treats this as fatal (spec §4.3).
    fn start_listening(&mut self) -> Result<(), TransportError>;

    /// Release any blocked receive loops. Idempotent.
    fn stop(&self);
}

/// Injection point for constructing a receiver bound to a given endpoint
/// name, mirroring [`crate::SenderFactory`] on the receive side.
pub trait ReceiverFactory: Send + Sync {
    /// Construct (but do not start) a receiver for the given canonical
    /// endpoint name.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot produce a usable
    /// receiver for this endpoint.
    fn create_receiver(
        &self,
        endpoint: &str,
        config: ReceiverConfig,
    ) -> Result<Box<dyn Receiver>, TransportError>;
}
