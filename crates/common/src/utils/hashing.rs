//! Stable hashing for deduplication keys.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Idempotency key for a mutation fingerprint such as
/// `DOWNSTREAM:price:{variant}:{price}:{discount}`.
///
/// The same fingerprint always yields the same key, so a retried mutation
/// is recognised by the request audit log.
pub fn idempotency_key(fingerprint: &str) -> String {
    sha256_hex(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        let first = idempotency_key("DOWNSTREAM:price:v-1:1000:-");
        assert_eq!(first, idempotency_key("DOWNSTREAM:price:v-1:1000:-"));
        assert_ne!(first, idempotency_key("DOWNSTREAM:price:v-1:1001:-"));
        assert_eq!(first.len(), 64);
    }
}
