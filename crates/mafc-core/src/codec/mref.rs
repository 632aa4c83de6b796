//! `.mref` binary layout (spec §6.1).

use crate::error::{Error, Result};
use crate::hash::hash_bytes;
use crate::merkle_ref::MerkleRef;
use crate::shape::{self, MerkleShape};

const MAGIC: u32 = 0x4D52_4546; // "MREF", see spec §6.1 for the byte order note.
const VERSION: u32 = 1;
const HEADER_LEN: usize = 40;
const FOOTER_LEN: usize = 32;

/// Encodes a [`MerkleRef`] into the `.mref` byte layout. Used by test
/// fixtures to write a reference a `load()` call can round-trip; the core
/// does not ship a dataset-publishing entry point (spec §1 Non-goals).
pub fn encode(r: &MerkleRef) -> Vec<u8> {
    let shape = r.shape();
    let mut buf = Vec::with_capacity(HEADER_LEN + r.hashes().len() * 32 + FOOTER_LEN);
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&shape.content_size().to_le_bytes());
    buf.extend_from_slice(&shape.chunk_size().to_le_bytes());
    buf.extend_from_slice(&shape.leaf_count().to_le_bytes());
    buf.extend_from_slice(&shape.total_node_count().to_le_bytes());
    for h in r.hashes() {
        buf.extend_from_slice(h);
    }
    let footer = hash_bytes(&buf);
    buf.extend_from_slice(&footer);
    buf
}

/// Decodes and fully validates a `.mref` buffer: magic, version,
/// self-consistency of the embedded shape, and the footer digest.
pub fn decode(bytes: &[u8]) -> Result<MerkleRef> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(Error::Format("truncated .mref header".into()));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(Error::Format(format!("bad magic: {magic:#010x}")));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(Error::Format(format!("unsupported .mref version {version}")));
    }
    let content_size = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let chunk_size = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
    let leaf_count = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
    let total_node_count = u64::from_le_bytes(bytes[32..40].try_into().unwrap());

    let hashes_len = (total_node_count as usize)
        .checked_mul(32)
        .ok_or_else(|| Error::Format("total_node_count overflow".into()))?;
    let expected_len = HEADER_LEN + hashes_len + FOOTER_LEN;
    if bytes.len() != expected_len {
        return Err(Error::Format(format!(
            "expected {expected_len} bytes, found {}",
            bytes.len()
        )));
    }

    let footer_start = HEADER_LEN + hashes_len;
    let computed_footer = hash_bytes(&bytes[..footer_start]);
    if computed_footer.as_slice() != &bytes[footer_start..footer_start + FOOTER_LEN] {
        return Err(Error::Format("footer digest mismatch".into()));
    }

    if !chunk_size.is_power_of_two()
        || chunk_size < shape::MIN_CHUNK_SIZE
        || chunk_size > shape::MAX_CHUNK_SIZE
    {
        return Err(Error::Format(format!(
            "chunk_size {chunk_size} is not a power of two in [{}, {}]",
            shape::MIN_CHUNK_SIZE,
            shape::MAX_CHUNK_SIZE
        )));
    }
    let expected_leaf_count = shape::ceil_div(content_size.max(1), chunk_size).max(1);
    if leaf_count != expected_leaf_count {
        return Err(Error::Format(format!(
            "leaf_count {leaf_count} disagrees with ceil(content_size/chunk_size) = {expected_leaf_count}"
        )));
    }
    let cap_leaf_count = shape::next_pow2(leaf_count);
    let expected_total = 2 * cap_leaf_count - 1;
    if total_node_count != expected_total {
        return Err(Error::Format(format!(
            "total_node_count {total_node_count} disagrees with derived {expected_total}"
        )));
    }

    let merkle_shape = MerkleShape::with_chunk_size(content_size, chunk_size);

    let mut hashes = Vec::with_capacity(total_node_count as usize);
    for chunk in bytes[HEADER_LEN..footer_start].chunks_exact(32) {
        hashes.push(chunk.try_into().unwrap());
    }

    MerkleRef::from_parts(merkle_shape, hashes)
}
