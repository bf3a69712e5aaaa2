//! Content-addressed payload keys.

use sha2::{Digest, Sha512};

/// Length of a content hash in hex characters.
pub const CONTENT_HASH_LEN: usize = 64;

/// Compute the content hash of a raw (uncompressed) payload.
///
/// SHA-512 hex digest truncated to [`CONTENT_HASH_LEN`] characters.
pub fn content_hash(payload: &[u8]) -> String {
    let mut hex = hex::encode(Sha512::digest(payload));
    hex.truncate(CONTENT_HASH_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = content_hash(b"<html>chapter 1</html>");
        let hash2 = content_hash(b"<html>chapter 1</html>");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_payload() {
        assert_ne!(content_hash(b"chapter 1"), content_hash(b"chapter 2"));
    }

    #[test]
    fn test_hash_format() {
        let hash = content_hash(b"");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_sha512_prefix() {
        // sha512("abc")
        let expected = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a";
        assert_eq!(content_hash(b"abc"), expected);
    }
}
