//! Wire codec for the relayd framed message protocol.
//!
//! Every message on the wire is one *frame*:
//!
//! ```text
//! offset 0..3    total_len  (u32, network byte order, covers all bytes)
//! offset 4..11   target     (8 bytes, zero-padded, not necessarily NUL-terminated)
//! offset 12..    body       (total_len - 13 bytes, optionally ciphered)
//! offset last    checksum   (1 byte, low 8 bits of the unsigned byte sum of [0 .. last-1])
//! ```
//!
//! The minimum frame is 13 bytes (empty body). The checksum always covers
//! the ciphertext: encryption runs before the checksum is appended on the
//! way out, and decryption runs after the checksum is verified on the way
//! in.
//!
//! Body ciphering is a pluggable pair of in-place transforms negotiated by
//! the [`handshake`] frame a server sends immediately after accept. See
//! [`cipher`] for the strategy registry.

pub mod cipher;
pub mod error;
pub mod handshake;
pub mod packet;
pub mod target;

pub use cipher::{xor_default, CipherFn, CipherPair, StrategyCode};
pub use error::WireError;
pub use packet::{
    checksum, frame_len_from_header, parse, serialize_into, Frame, CHECKSUM_LEN,
    DEFAULT_FRAME_CAPACITY, HEADER_LEN, MIN_FRAME_LEN,
};
pub use target::{TargetTag, TARGET_LEN};
