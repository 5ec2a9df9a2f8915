//! BLAKE3-based hashing helpers shared by the [`crate::id`] and
//! [`crate::consensus::engine`] round-seed derivation.

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest as a fixed-size array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeds each part into the hasher sequentially instead of allocating a
/// scratch buffer to concatenate them first. Equivalent to hashing the
/// concatenation.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// Domain separation prevents collisions across unrelated uses of the same
/// input bytes — e.g. a round seed and a test fixture ID built from the
/// same counter should never collide just because the counter repeats.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
