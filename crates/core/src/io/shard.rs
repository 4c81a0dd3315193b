//! Index shard-key derivation
//!
//! Large deployments store index entries under per-prefix shard files
//! (`state/<name>-shards/<hh>.json`) keyed by the first two hex characters
//! of SHA-1(id), instead of one growing monolithic `state/<name>.json`.
//! Readers fall back to the monolithic file when the shard directory is
//! absent (see `store.rs`).

use sha1::{Digest, Sha1};

/// Two-hex-character shard prefix for `id`.
pub fn shard_key(id: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_key_is_two_hex_chars() {
        let key = shard_key("msg_abc123");
        assert_eq!(key.len(), 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn shard_key_is_deterministic() {
        assert_eq!(shard_key("msg_abc123"), shard_key("msg_abc123"));
    }
}
