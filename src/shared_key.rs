// MIT License - Copyright (c) 2026 Peter Wright
// Shared key normalization

use std::fmt;

use crate::constants::{SHARED_KEY_LEN, SHARED_KEY_PAD};

/// The 16-byte key the panel transport is encrypted with.
///
/// Users type keys of any length; the panel always uses exactly
/// [`SHARED_KEY_LEN`] bytes, so longer keys are truncated and shorter keys are
/// right-padded with spaces. Persisted hex encoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedKey([u8; SHARED_KEY_LEN]);

impl SharedKey {
    /// Normalize a key as entered by the user.
    pub fn normalize(key: &str) -> Self {
        Self::normalize_bytes(key.as_bytes())
    }

    pub fn normalize_bytes(key: &[u8]) -> Self {
        let mut bytes = [SHARED_KEY_PAD; SHARED_KEY_LEN];
        let len = key.len().min(SHARED_KEY_LEN);
        bytes[..len].copy_from_slice(&key[..len]);
        Self(bytes)
    }

    /// Decode a stored key. Any stored length is normalized again.
    pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
        let raw = hex::decode(encoded.trim())?;
        Ok(Self::normalize_bytes(&raw))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_LEN] {
        &self.0
    }
}

// Never print key material.
impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_is_padded() {
        let key = SharedKey::normalize("abc");
        assert_eq!(key.as_bytes(), b"abc             ");
    }

    #[test]
    fn test_long_key_is_truncated() {
        let key = SharedKey::normalize("mykey1234567890xy");
        assert_eq!(key.as_bytes(), b"mykey1234567890x");
    }

    #[test]
    fn test_always_sixteen_bytes() {
        for input in ["", "a", "0123456789abcdef", "0123456789abcdef0123456789"] {
            assert_eq!(SharedKey::normalize(input).as_bytes().len(), 16);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["", "abc", "mykey1234567890xy", "exactly16bytes!!"] {
            let once = SharedKey::normalize(input);
            let twice = SharedKey::normalize_bytes(once.as_bytes());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_hex_encoding() {
        let key = SharedKey::normalize("abc");
        let encoded = key.to_hex();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded, "61626320202020202020202020202020");
        assert_eq!(SharedKey::from_hex(&encoded).unwrap(), key);
        assert!(SharedKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        assert_eq!(format!("{:?}", SharedKey::normalize("secret")), "SharedKey(..)");
    }
}
