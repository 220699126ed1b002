//! Transport-level errors.

/// Errors raised by a [`crate::Sender`], [`crate::Receiver`] or the
/// non-blocking wrapper.
///
/// These map onto spec §7's "transient transport error" and
/// "invalid-configuration error" categories: everything here is either
/// retryable by the caller (`SendWouldBlock`, `QueueFull`) or fatal at
/// construction time (`BindFailed`, `InvalidConfig`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The underlying transport could not accept the frame right now.
    /// Transient: the caller may retry.
    #[error("send would block or failed transiently: {0}")]
    SendWouldBlock(String),

    /// The non-blocking wrapper's queue is full.
    #[error("non-blocking sender queue is full")]
    QueueFull,

    /// The sender (or its wrapper) has been shut down and no longer accepts
    /// frames.
    #[error("sender is shut down")]
    Closed,

    /// A receiver failed to open its endpoint (e.g. name already bound, or
    /// the peer allowlist configuration was invalid). Fatal: the facade
    /// cannot reliably participate in the control plane without its
    /// receiver (spec §4.3).
    #[error("receiver failed to start listening on {endpoint}: {reason}")]
    BindFailed {
        /// Endpoint name the receiver attempted to open.
        endpoint: String,
        /// Reason reported by the transport.
        reason: String,
    },

    /// An invalid configuration was supplied at construction time (e.g. a
    /// non-blocking queue size above the hard cap).
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}
