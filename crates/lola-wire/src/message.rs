//! Application-level message taxonomy built on top of [`ShortFrame`].
//!
//! The notification handler and its callbacks never touch a [`ShortFrame`]
//! directly - they work with [`Message`], which carries typed,
//! already-unpacked fields. Conversion to/from the wire short frame lives
//! here so the bit layout from spec §3 has exactly one implementation.

use crate::{ElementId, FrameKind, PeerId, ShortFrame, WireError};

/// A decoded application-level control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// A local proxy wants updates for a remotely-provided element.
    RegisterNotifier {
        /// Element being subscribed to.
        element_id: ElementId,
        /// Pid of the subscribing process.
        sender_pid: PeerId,
    },
    /// A local proxy no longer wants updates for a remotely-provided
    /// element.
    UnregisterNotifier {
        /// Element being unsubscribed from.
        element_id: ElementId,
        /// Pid of the unsubscribing process.
        sender_pid: PeerId,
    },
    /// A locally-provided element was updated.
    NotifyUpdate {
        /// Element that changed.
        element_id: ElementId,
        /// Pid of the process that produced the update.
        sender_pid: PeerId,
    },
    /// A peer id is stale and should be purged from subscriber sets.
    OutdatedPeer {
        /// Peer id that is no longer valid.
        outdated_peer_id: PeerId,
        /// Pid of the process reporting the stale peer.
        sender_pid: PeerId,
    },
}

impl Message {
    /// Encode into the short frame that carries this message on the wire.
    #[must_use]
    pub fn to_short_frame(self) -> ShortFrame {
        match self {
            Message::RegisterNotifier { element_id, sender_pid } => {
                ShortFrame { kind: FrameKind::RegisterNotifier, sender_pid, payload: element_id.pack() }
            },
            Message::UnregisterNotifier { element_id, sender_pid } => {
                ShortFrame { kind: FrameKind::UnregisterNotifier, sender_pid, payload: element_id.pack() }
            },
            Message::NotifyUpdate { element_id, sender_pid } => {
                ShortFrame { kind: FrameKind::NotifyUpdate, sender_pid, payload: element_id.pack() }
            },
            Message::OutdatedPeer { outdated_peer_id, sender_pid } => ShortFrame {
                kind: FrameKind::OutdatedPeer,
                sender_pid,
                payload: u64::from(outdated_peer_id as u32),
            },
        }
    }

    /// Decode a short frame back into its application message.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::NotAnApplicationMessage`] for `Stop` frames,
    /// which carry no application-level payload.
    pub fn from_short_frame(frame: ShortFrame) -> Result<Self, WireError> {
        match frame.kind {
            FrameKind::RegisterNotifier => Ok(Message::RegisterNotifier {
                element_id: ElementId::unpack(frame.payload),
                sender_pid: frame.sender_pid,
            }),
            FrameKind::UnregisterNotifier => Ok(Message::UnregisterNotifier {
                element_id: ElementId::unpack(frame.payload),
                sender_pid: frame.sender_pid,
            }),
            FrameKind::NotifyUpdate => Ok(Message::NotifyUpdate {
                element_id: ElementId::unpack(frame.payload),
                sender_pid: frame.sender_pid,
            }),
            FrameKind::OutdatedPeer => Ok(Message::OutdatedPeer {
                outdated_peer_id: (frame.payload as u32) as i32,
                sender_pid: frame.sender_pid,
            }),
            FrameKind::Stop => Err(WireError::NotAnApplicationMessage(FrameKind::Stop)),
        }
    }
}
