//! `.mrkl` binary layout (spec §6.2).

use crate::error::{Error, Result};
use crate::hash::{hash_bytes, Digest32};
use crate::shape::ceil_div;

const MAGIC: u32 = 0x4D52_4B4C; // "MRKL"
const VERSION: u32 = 1;
const HEADER_LEN: usize = 64;
const FOOTER_LEN: usize = 32;

/// Parsed `.mrkl` contents. `footer_ok` is `false` when the stored footer
/// digest disagrees with the preceding bytes — the crash-safety case in
/// spec §6.2, where the caller must treat the bitset as empty rather than
/// fail outright.
pub struct DecodedState {
    pub root: Digest32,
    pub content_size: u64,
    pub chunk_size: u64,
    pub leaf_count: u64,
    pub bits: Vec<u8>,
    pub footer_ok: bool,
}

/// Encodes a state snapshot into the `.mrkl` byte layout.
pub fn encode(root: &Digest32, content_size: u64, chunk_size: u64, leaf_count: u64, bits: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + bits.len() + FOOTER_LEN);
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(root);
    buf.extend_from_slice(&content_size.to_le_bytes());
    buf.extend_from_slice(&chunk_size.to_le_bytes());
    buf.extend_from_slice(&leaf_count.to_le_bytes());
    buf.extend_from_slice(bits);
    let footer = hash_bytes(&buf);
    buf.extend_from_slice(&footer);
    buf
}

/// Decodes a `.mrkl` buffer. Structural errors (bad magic/version/length)
/// are fatal; a footer digest mismatch is reported via `footer_ok = false`
/// rather than an `Err`, so the caller can fall back to an empty bitset.
pub fn decode(bytes: &[u8]) -> Result<DecodedState> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(Error::Format("truncated .mrkl header".into()));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(Error::Format(format!("bad magic: {magic:#010x}")));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(Error::Format(format!("unsupported .mrkl version {version}")));
    }
    let root: Digest32 = bytes[8..40].try_into().unwrap();
    let content_size = u64::from_le_bytes(bytes[40..48].try_into().unwrap());
    let chunk_size = u64::from_le_bytes(bytes[48..56].try_into().unwrap());
    let leaf_count = u64::from_le_bytes(bytes[56..64].try_into().unwrap());

    let bits_len = ceil_div(leaf_count.max(1), 8) as usize;
    let expected_len = HEADER_LEN + bits_len + FOOTER_LEN;
    if bytes.len() != expected_len {
        return Err(Error::Format(format!(
            "expected {expected_len} bytes, found {}",
            bytes.len()
        )));
    }

    let footer_start = HEADER_LEN + bits_len;
    let computed_footer = hash_bytes(&bytes[..footer_start]);
    let footer_ok = computed_footer.as_slice() == &bytes[footer_start..footer_start + FOOTER_LEN];

    Ok(DecodedState {
        root,
        content_size,
        chunk_size,
        leaf_count,
        bits: bytes[HEADER_LEN..footer_start].to_vec(),
        footer_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let root = [3u8; 32];
        let bits = vec![0b0000_0101u8];
        let bytes = encode(&root, 12345, 1 << 20, 5, &bits);
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.footer_ok);
        assert_eq!(decoded.root, root);
        assert_eq!(decoded.bits, bits);
        assert_eq!(decoded.leaf_count, 5);
    }

    #[test]
    fn footer_mismatch_is_reported_not_fatal() {
        let root = [3u8; 32];
        let bits = vec![0u8];
        let mut bytes = encode(&root, 100, 1 << 20, 1, &bits);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let decoded = decode(&bytes).unwrap();
        assert!(!decoded.footer_ok);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let root = [3u8; 32];
        let bits = vec![0u8];
        let mut bytes = encode(&root, 100, 1 << 20, 1, &bits);
        bytes[0] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }
}
