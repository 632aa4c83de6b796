//! SHA-256 helpers shared by the reference tree and the chunk verifier.

use sha2::{Digest, Sha256};

/// A raw 32-byte SHA-256 digest.
pub type Digest32 = [u8; 32];

/// SHA-256 of the empty string, used as the hash of padding leaves beyond
/// `leaf_count` (see spec §3.1 / §3.2).
pub const EMPTY_HASH: Digest32 = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

/// Hashes a single chunk's bytes.
pub fn hash_bytes(bytes: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hashes the concatenation of two child digests, used for internal nodes.
pub fn combine(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Hex-encodes a digest for logging (e.g. root hashes in `tracing` spans).
pub fn to_hex(digest: &Digest32) -> String {
    hex::encode(digest)
}

/// Constant-time comparison of two digests. A timing side-channel here
/// would only leak whether *our own* bytes hash correctly, but we compare
/// this way anyway since it's the standard idiom for hash comparisons.
pub fn digest_eq(a: &Digest32, b: &Digest32) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
