//! Wire-level errors.

/// Errors raised while decoding a frame from its wire representation.
///
/// These are always non-fatal from the receiver's point of view: a frame
/// that fails to decode is logged once and discarded (see
/// [`crate`](crate) module docs and spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The byte slice handed to a decoder did not match the expected
    /// fixed size for the frame variant being decoded.
    #[error("invalid frame length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected length for this frame variant.
        expected: usize,
        /// Actual length of the supplied buffer.
        got: usize,
    },

    /// The `kind` byte did not correspond to any known [`crate::FrameKind`].
    #[error("unknown frame kind byte: {0}")]
    UnknownKind(u8),

    /// A short frame was decoded but did not correspond to any known
    /// application [`crate::Message`] variant (e.g. a `Stop` frame, which
    /// carries no application-level message).
    #[error("frame kind {0:?} has no corresponding application message")]
    NotAnApplicationMessage(crate::FrameKind),
}
