//! Fixed-width target tags.

use std::fmt;

/// Width of the target field on the wire.
pub const TARGET_LEN: usize = 8;

/// 8-byte frame target tag.
///
/// Tags select the application handler for a frame. Shorter logical names
/// are zero-filled; comparison is byte-wise over the full 8 bytes, so
/// `"CHAT"` and `"CHAT\0..."` are the same tag while `"CHATX"` is not.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetTag([u8; TARGET_LEN]);

impl TargetTag {
    /// Build a tag from a logical name, zero-padding and truncating to 8
    /// bytes.
    pub fn new(name: &str) -> Self {
        let mut tag = [0u8; TARGET_LEN];
        let take = name.len().min(TARGET_LEN);
        tag[..take].copy_from_slice(&name.as_bytes()[..take]);
        TargetTag(tag)
    }

    /// Build a tag from its exact wire representation.
    pub const fn from_bytes(bytes: [u8; TARGET_LEN]) -> Self {
        TargetTag(bytes)
    }

    /// The wire representation.
    pub fn as_bytes(&self) -> &[u8; TARGET_LEN] {
        &self.0
    }

    /// The logical name: the bytes up to the first NUL, lossily decoded.
    pub fn name(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(TARGET_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Display for TargetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// Debug prints the logical name so log fields stay readable; the raw bytes
// are recoverable from as_bytes() when they matter.
impl fmt::Debug for TargetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetTag({:?})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_zero_padded() {
        let tag = TargetTag::new("CHAT");
        assert_eq!(tag.as_bytes(), b"CHAT\0\0\0\0");
        assert_eq!(tag, TargetTag::from_bytes(*b"CHAT\0\0\0\0"));
    }

    #[test]
    fn long_names_truncate_at_eight_bytes() {
        let tag = TargetTag::new("LONGTARGET");
        assert_eq!(tag.as_bytes(), b"LONGTARG");
    }

    #[test]
    fn name_stops_at_first_nul() {
        assert_eq!(TargetTag::new("LOGIN").name(), "LOGIN");
        assert_eq!(TargetTag::from_bytes(*b"ABCDEFGH").name(), "ABCDEFGH");
    }
}
