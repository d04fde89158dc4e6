use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, returning lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// First 16 hex chars of the SHA-256 of `bytes`. Used for dedup keys, where
/// 64 bits of collision resistance per branch is plenty.
pub fn short_digest(bytes: &[u8]) -> String {
    let mut full = sha256_hex(bytes);
    full.truncate(16);
    full
}
