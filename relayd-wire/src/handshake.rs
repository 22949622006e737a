//! Security strategy handshake.
//!
//! The first frame a server writes on every accepted connection carries the
//! reserved target below and a 4-byte big-endian strategy code as its body.
//! The frame itself is always serialized with the plaintext transform so a
//! freshly connected client can parse it before any strategy is applied;
//! the advertised code governs every data frame that follows.

use bytes::{Buf, BufMut};

use crate::cipher::StrategyCode;
use crate::error::WireError;
use crate::target::TargetTag;

/// Reserved target tag of the handshake frame.
pub const HANDSHAKE_TARGET: TargetTag = TargetTag::from_bytes(*b"SEC_ARG\0");

/// Wire size of the strategy body.
pub const STRATEGY_BODY_LEN: usize = 4;

/// Encode a strategy code as a handshake body.
pub fn encode_strategy(code: StrategyCode) -> [u8; STRATEGY_BODY_LEN] {
    let mut body = [0u8; STRATEGY_BODY_LEN];
    (&mut body[..]).put_u32(code.to_wire());
    body
}

/// Decode a handshake body. Trailing bytes beyond the code are tolerated;
/// unknown codes degrade to plaintext inside [`StrategyCode::from_wire`].
pub fn decode_strategy(mut body: &[u8]) -> Result<StrategyCode, WireError> {
    if body.len() < STRATEGY_BODY_LEN {
        return Err(WireError::HandshakeTooShort { len: body.len() });
    }
    Ok(StrategyCode::from_wire(body.get_u32()))
}
