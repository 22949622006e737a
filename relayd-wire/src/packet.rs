//! Frame serialization and parsing.

use bytes::{BufMut, BytesMut};

use crate::cipher::CipherFn;
use crate::error::WireError;
use crate::target::{TargetTag, TARGET_LEN};

/// Bytes of the fixed header: total_len plus the target tag.
pub const HEADER_LEN: usize = 4 + TARGET_LEN;

/// Bytes of the trailing checksum.
pub const CHECKSUM_LEN: usize = 1;

/// Smallest legal frame: header plus checksum, empty body.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Default per-frame buffer capacity on both sides of a connection.
pub const DEFAULT_FRAME_CAPACITY: usize = 4096;

/// A parsed frame borrowing the (already decrypted) body from the input
/// buffer. Valid only until the buffer is reused.
#[derive(Debug)]
pub struct Frame<'a> {
    pub target: TargetTag,
    pub body: &'a [u8],
}

/// Additive 1-byte checksum: the low 8 bits of the unsigned sum of all
/// input bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Serialize a frame into `out`, replacing its contents.
///
/// The body is copied after the header, transformed in place when `encrypt`
/// is given, and the checksum over header plus ciphertext is appended last.
/// Fails without touching `out` when the frame would exceed `capacity`.
/// Returns the total frame length.
pub fn serialize_into(
    out: &mut BytesMut,
    target: &TargetTag,
    body: &[u8],
    encrypt: Option<CipherFn>,
    capacity: usize,
) -> Result<usize, WireError> {
    let total = HEADER_LEN + body.len() + CHECKSUM_LEN;
    if total > capacity {
        return Err(WireError::FrameTooLarge { total, capacity });
    }

    out.clear();
    out.reserve(total);
    out.put_u32(total as u32);
    out.put_slice(target.as_bytes());
    out.put_slice(body);

    if let Some(encrypt) = encrypt {
        if !body.is_empty() {
            encrypt(&mut out[HEADER_LEN..]);
        }
    }

    let sum = checksum(out);
    out.put_u8(sum);

    Ok(total)
}

/// Parse and verify one complete frame, decrypting the body in place.
///
/// Verification order matters: the length check runs against the header
/// before anything else, and the checksum is verified over the ciphertext
/// before `decrypt` touches the body.
pub fn parse(frame: &mut [u8], decrypt: Option<CipherFn>) -> Result<Frame<'_>, WireError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(WireError::TooShort { len: frame.len() });
    }

    let claimed = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    if claimed != frame.len() {
        return Err(WireError::LengthMismatch {
            claimed,
            received: frame.len(),
        });
    }

    let carried = frame[frame.len() - 1];
    let computed = checksum(&frame[..frame.len() - 1]);
    if carried != computed {
        return Err(WireError::ChecksumMismatch { carried, computed });
    }

    let mut target = [0u8; TARGET_LEN];
    target.copy_from_slice(&frame[4..4 + TARGET_LEN]);

    let body_end = frame.len() - CHECKSUM_LEN;
    if let Some(decrypt) = decrypt {
        if body_end > HEADER_LEN {
            decrypt(&mut frame[HEADER_LEN..body_end]);
        }
    }

    Ok(Frame {
        target: TargetTag::from_bytes(target),
        body: &frame[HEADER_LEN..body_end],
    })
}

/// Read the total frame length out of a header prefix, rejecting anything
/// below the minimum frame size. The caller enforces its own capacity
/// ceiling and must close the connection on either violation.
pub fn frame_len_from_header(header: &[u8]) -> Result<usize, WireError> {
    if header.len() < 4 {
        return Err(WireError::TooShort { len: header.len() });
    }
    let total = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if total < MIN_FRAME_LEN {
        return Err(WireError::TooShort { len: total });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::xor_default;

    fn xor() -> Option<CipherFn> {
        Some(xor_default as CipherFn)
    }

    #[test]
    fn empty_body_round_trip() {
        let mut buf = BytesMut::new();
        let target = TargetTag::new("CHAT");
        let n = serialize_into(&mut buf, &target, &[], xor(), DEFAULT_FRAME_CAPACITY).unwrap();

        assert_eq!(n, 13);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 0x0D]);
        assert_eq!(&buf[4..12], b"CHAT\0\0\0\0");
        assert_eq!(buf[12], checksum(&buf[..12]));

        let mut wire = buf.to_vec();
        let frame = parse(&mut wire, xor()).unwrap();
        assert_eq!(frame.target, target);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn body_is_xored_on_the_wire() {
        let mut buf = BytesMut::new();
        let target = TargetTag::new("LOGIN");
        let n = serialize_into(&mut buf, &target, b"hello", xor(), DEFAULT_FRAME_CAPACITY).unwrap();

        assert_eq!(n, 18);
        assert_eq!(&buf[12..17], &[0x32, 0x3F, 0x36, 0x36, 0x35]);

        let mut wire = buf.to_vec();
        let frame = parse(&mut wire, xor()).unwrap();
        assert_eq!(frame.target, target);
        assert_eq!(frame.body, b"hello");
    }

    #[test]
    fn plaintext_body_passes_through() {
        let mut buf = BytesMut::new();
        let target = TargetTag::new("ECHO");
        serialize_into(&mut buf, &target, b"abc", None, DEFAULT_FRAME_CAPACITY).unwrap();
        assert_eq!(&buf[12..15], b"abc");

        let mut wire = buf.to_vec();
        let frame = parse(&mut wire, None).unwrap();
        assert_eq!(frame.body, b"abc");
    }

    #[test]
    fn checksum_corruption_is_detected() {
        let mut buf = BytesMut::new();
        serialize_into(
            &mut buf,
            &TargetTag::new("LOGIN"),
            b"hello",
            xor(),
            DEFAULT_FRAME_CAPACITY,
        )
        .unwrap();

        let mut wire = buf.to_vec();
        wire[12] ^= 0x01;
        assert!(matches!(
            parse(&mut wire, xor()),
            Err(WireError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_frame_is_a_length_mismatch() {
        let mut buf = BytesMut::new();
        let n = serialize_into(
            &mut buf,
            &TargetTag::new("LOGIN"),
            b"hello",
            xor(),
            DEFAULT_FRAME_CAPACITY,
        )
        .unwrap();
        assert_eq!(n, 18);

        let mut wire = buf.to_vec();
        wire.truncate(17);
        assert!(matches!(
            parse(&mut wire, xor()),
            Err(WireError::LengthMismatch {
                claimed: 18,
                received: 17
            })
        ));
    }

    #[test]
    fn undersized_input_is_too_short() {
        let mut wire = vec![0u8; MIN_FRAME_LEN - 1];
        assert!(matches!(
            parse(&mut wire, None),
            Err(WireError::TooShort { len: 12 })
        ));
    }

    #[test]
    fn oversized_frame_is_rejected_at_serialize() {
        let mut buf = BytesMut::new();
        let body = vec![0u8; 64];
        let err = serialize_into(&mut buf, &TargetTag::new("BIG"), &body, None, 64).unwrap_err();
        assert_eq!(
            err,
            WireError::FrameTooLarge {
                total: 77,
                capacity: 64
            }
        );
    }

    #[test]
    fn header_length_extraction() {
        let mut buf = BytesMut::new();
        serialize_into(&mut buf, &TargetTag::new("PING"), b"xy", None, 4096).unwrap();
        assert_eq!(frame_len_from_header(&buf[..HEADER_LEN]).unwrap(), 15);

        let runt = [0x00, 0x00, 0x00, 0x05];
        assert!(matches!(
            frame_len_from_header(&runt),
            Err(WireError::TooShort { len: 5 })
        ));
    }

    mod properties {
        use super::*;
        use crate::cipher::{CipherPair, StrategyCode};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_recovers_target_and_body(
                name in "[A-Z]{1,8}",
                body in proptest::collection::vec(any::<u8>(), 0..1024),
                code in 0u32..4,
            ) {
                let pair = CipherPair::for_code(StrategyCode::from_wire(code));
                let target = TargetTag::new(&name);

                let mut buf = BytesMut::new();
                let n = serialize_into(&mut buf, &target, &body, pair.encrypt, DEFAULT_FRAME_CAPACITY).unwrap();
                prop_assert_eq!(n, HEADER_LEN + body.len() + CHECKSUM_LEN);

                let mut wire = buf.to_vec();
                prop_assert_eq!(*wire.last().unwrap(), checksum(&wire[..wire.len() - 1]));

                let frame = parse(&mut wire, pair.decrypt).unwrap();
                prop_assert_eq!(frame.target, target);
                prop_assert_eq!(frame.body, &body[..]);
            }

            #[test]
            fn any_single_byte_flip_is_caught(
                body in proptest::collection::vec(any::<u8>(), 0..256),
                flip in any::<usize>(),
                bit in 0u8..8,
            ) {
                let mut buf = BytesMut::new();
                serialize_into(&mut buf, &TargetTag::new("T"), &body, None, DEFAULT_FRAME_CAPACITY).unwrap();
                let mut wire = buf.to_vec();

                // Flipping any bit after the length field must fail the
                // checksum (flips inside total_len fail the length check
                // instead, which is also a rejection).
                let idx = 4 + flip % (wire.len() - 4);
                wire[idx] ^= 1 << bit;
                prop_assert!(parse(&mut wire, None).is_err());
            }
        }
    }
}
