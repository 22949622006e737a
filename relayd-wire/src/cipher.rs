//! Body cipher strategies.
//!
//! A strategy is a pair of in-place byte transforms applied to the frame
//! body only, selected by the numeric code the server advertises in its
//! handshake frame. Both directions of the default XOR transform are the
//! same function; any future cipher that is not self-inverse must be
//! swapped under the owning context's strategy lock, never mid-frame.

/// In-place body transform. `None` in codec signatures means the plaintext
/// (identity) strategy.
pub type CipherFn = fn(&mut [u8]);

const XOR_KEY: u8 = 0x5A;

/// Default XOR transform. Self-inverse: applying it twice restores the
/// input, which is what lets encrypt and decrypt share one function.
pub fn xor_default(data: &mut [u8]) {
    for byte in data.iter_mut() {
        *byte ^= XOR_KEY;
    }
}

/// Numeric cipher selector carried in the handshake body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyCode {
    /// No body transform.
    Plaintext,
    /// XOR with the fixed key 0x5A.
    XorDefault,
}

impl StrategyCode {
    /// Decode a wire code. Unknown codes degrade to plaintext rather than
    /// failing the handshake.
    pub fn from_wire(code: u32) -> Self {
        match code {
            1 => StrategyCode::XorDefault,
            _ => StrategyCode::Plaintext,
        }
    }

    /// The wire representation of this code.
    pub fn to_wire(self) -> u32 {
        match self {
            StrategyCode::Plaintext => 0,
            StrategyCode::XorDefault => 1,
        }
    }
}

/// An (encrypt, decrypt) pair resolved from the strategy registry.
#[derive(Clone, Copy)]
pub struct CipherPair {
    /// Transform applied to outbound bodies before the checksum.
    pub encrypt: Option<CipherFn>,
    /// Transform applied to inbound bodies after checksum verification.
    pub decrypt: Option<CipherFn>,
}

impl CipherPair {
    /// The identity pair.
    pub const PLAINTEXT: CipherPair = CipherPair {
        encrypt: None,
        decrypt: None,
    };

    /// Resolve the pair for a strategy code.
    pub fn for_code(code: StrategyCode) -> Self {
        match code {
            StrategyCode::Plaintext => CipherPair::PLAINTEXT,
            StrategyCode::XorDefault => CipherPair {
                encrypt: Some(xor_default),
                decrypt: Some(xor_default),
            },
        }
    }
}

impl std::fmt::Debug for CipherPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherPair")
            .field("encrypt", &self.encrypt.is_some())
            .field("decrypt", &self.decrypt.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_self_inverse() {
        let mut data: Vec<u8> = (0u8..=255).collect();
        let original = data.clone();
        xor_default(&mut data);
        assert_ne!(data, original);
        xor_default(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn xor_matches_known_bytes() {
        let mut data = *b"hello";
        xor_default(&mut data);
        assert_eq!(data, [0x32, 0x3F, 0x36, 0x36, 0x35]);
    }

    #[test]
    fn unknown_codes_degrade_to_plaintext() {
        assert_eq!(StrategyCode::from_wire(0), StrategyCode::Plaintext);
        assert_eq!(StrategyCode::from_wire(1), StrategyCode::XorDefault);
        assert_eq!(StrategyCode::from_wire(2), StrategyCode::Plaintext);
        assert_eq!(StrategyCode::from_wire(u32::MAX), StrategyCode::Plaintext);
    }

    #[test]
    fn registry_resolves_pairs() {
        let plain = CipherPair::for_code(StrategyCode::Plaintext);
        assert!(plain.encrypt.is_none() && plain.decrypt.is_none());

        let xor = CipherPair::for_code(StrategyCode::XorDefault);
        let (enc, dec) = (xor.encrypt.unwrap(), xor.decrypt.unwrap());
        // Both directions are the same transform for the default cipher.
        assert_eq!(enc as usize, dec as usize);
    }
}
