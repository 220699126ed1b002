//! Fixed-layout wire frames and their byte-exact codec.
//!
//! Two frame shapes carry all control traffic. Both are fixed-size so
//! buffer sizing at the transport boundary is deterministic:
//!
//! - **Short frame**: `{ kind: i8, sender_pid: i32, payload: u64 }` - 13 bytes.
//! - **Medium frame**: `{ kind: i8, sender_pid: i32, payload: [u8; 16] }` - 21
//!   bytes.
//!
//! Endianness is whatever the host uses for integer memory representation:
//! the transport is local to one machine and is not interoperable across
//! architectures, so encode/decode simply use `to_ne_bytes`/`from_ne_bytes`.

use crate::{WireError, ids::PeerId};

/// Size in bytes of an encoded [`ShortFrame`].
pub const SHORT_FRAME_SIZE: usize = 1 + 4 + 8;

/// Size in bytes of an encoded [`MediumFrame`].
pub const MEDIUM_FRAME_SIZE: usize = 1 + 4 + 16;

/// Discriminator carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum FrameKind {
    /// Transport-internal: releases a blocked receive loop. Never carries an
    /// application [`crate::Message`].
    Stop = 0,
    /// A local proxy wants updates for a remotely-provided element.
    RegisterNotifier = 1,
    /// A local proxy no longer wants updates for a remotely-provided element.
    UnregisterNotifier = 2,
    /// A locally-provided element was updated.
    NotifyUpdate = 3,
    /// A peer id is stale and should be purged from subscriber sets.
    OutdatedPeer = 4,
}

impl FrameKind {
    /// Recover a [`FrameKind`] from its wire byte value.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownKind`] if `byte` does not match any
    /// variant.
    pub fn from_byte(byte: i8) -> Result<Self, WireError> {
        match byte {
            0 => Ok(Self::Stop),
            1 => Ok(Self::RegisterNotifier),
            2 => Ok(Self::UnregisterNotifier),
            3 => Ok(Self::NotifyUpdate),
            4 => Ok(Self::OutdatedPeer),
            other => Err(WireError::UnknownKind(other as u8)),
        }
    }
}

/// A short frame: the workhorse of the control plane. All four application
/// message kinds fit their semantic payload into the 64-bit `payload` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortFrame {
    /// Frame kind discriminator.
    pub kind: FrameKind,
    /// Pid of the process that sent this frame.
    pub sender_pid: PeerId,
    /// Kind-specific payload word.
    pub payload: u64,
}

impl ShortFrame {
    /// Encode into a fixed-size byte buffer.
    #[must_use]
    pub fn encode(&self) -> [u8; SHORT_FRAME_SIZE] {
        let mut buf = [0u8; SHORT_FRAME_SIZE];
        buf[0] = self.kind as i8 as u8;
        buf[1..5].copy_from_slice(&self.sender_pid.to_ne_bytes());
        buf[5..13].copy_from_slice(&self.payload.to_ne_bytes());
        buf
    }

    /// Decode from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidLength`] if `bytes.len() !=
    /// SHORT_FRAME_SIZE`, or [`WireError::UnknownKind`] if the kind byte is
    /// unrecognized.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != SHORT_FRAME_SIZE {
            return Err(WireError::InvalidLength { expected: SHORT_FRAME_SIZE, got: bytes.len() });
        }
        let kind = FrameKind::from_byte(bytes[0] as i8)?;
        let sender_pid = PeerId::from_ne_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let mut payload_bytes = [0u8; 8];
        payload_bytes.copy_from_slice(&bytes[5..13]);
        let payload = u64::from_ne_bytes(payload_bytes);
        Ok(Self { kind, sender_pid, payload })
    }
}

/// A medium frame: provisioned for extensibility. No handler in this crate
/// currently emits one, but the codec supports it and it must round-trip
/// byte-exact (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediumFrame {
    /// Frame kind discriminator.
    pub kind: FrameKind,
    /// Pid of the process that sent this frame.
    pub sender_pid: PeerId,
    /// Kind-specific payload bytes.
    pub payload: [u8; 16],
}

impl MediumFrame {
    /// Encode into a fixed-size byte buffer.
    #[must_use]
    pub fn encode(&self) -> [u8; MEDIUM_FRAME_SIZE] {
        let mut buf = [0u8; MEDIUM_FRAME_SIZE];
        buf[0] = self.kind as i8 as u8;
        buf[1..5].copy_from_slice(&self.sender_pid.to_ne_bytes());
        buf[5..21].copy_from_slice(&self.payload);
        buf
    }

    /// Decode from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidLength`] if `bytes.len() !=
    /// MEDIUM_FRAME_SIZE`, or [`WireError::UnknownKind`] if the kind byte is
    /// unrecognized.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != MEDIUM_FRAME_SIZE {
            return Err(WireError::InvalidLength { expected: MEDIUM_FRAME_SIZE, got: bytes.len() });
        }
        let kind = FrameKind::from_byte(bytes[0] as i8)?;
        let sender_pid = PeerId::from_ne_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let mut payload = [0u8; 16];
        payload.copy_from_slice(&bytes[5..21]);
        Ok(Self { kind, sender_pid, payload })
    }
}
