//! Error types for wire codec operations.

use thiserror::Error;

use crate::packet::MIN_FRAME_LEN;

/// Failures while serializing or parsing a wire frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Input is shorter than the minimum frame (header + checksum).
    #[error("frame too short: {len} bytes, minimum is {MIN_FRAME_LEN}")]
    TooShort { len: usize },

    /// The header's total_len does not match the byte count handed in.
    #[error("length mismatch: header claims {claimed} bytes, received {received}")]
    LengthMismatch { claimed: usize, received: usize },

    /// The trailing checksum byte does not match the computed sum.
    #[error("checksum mismatch: frame carries {carried:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { carried: u8, computed: u8 },

    /// A frame of this size does not fit the negotiated capacity.
    #[error("frame of {total} bytes exceeds capacity {capacity}")]
    FrameTooLarge { total: usize, capacity: usize },

    /// A handshake body shorter than the strategy code it must carry.
    #[error("handshake body too short: {len} bytes")]
    HandshakeTooShort { len: usize },
}
