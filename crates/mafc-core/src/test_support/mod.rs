//! Fixture builders for tests. Not the publication pipeline (spec §1's
//! Non-goals keep that external); just enough to hash a byte buffer into a
//! `MerkleRef` so tests don't need a real dataset publisher.

use crate::hash::{combine, hash_bytes, EMPTY_HASH};
use crate::merkle_ref::MerkleRef;
use crate::shape::MerkleShape;

/// Builds a `MerkleRef` for `content`, forcing `chunk_size` rather than
/// deriving it, so small fixtures in tests can exercise multi-chunk trees
/// without allocating megabytes.
pub fn build_ref(content: &[u8], chunk_size: u64) -> MerkleRef {
    let shape = MerkleShape::with_chunk_size(content.len() as u64, chunk_size);
    let mut hashes = vec![EMPTY_HASH; shape.total_node_count() as usize];

    for i in 0..shape.leaf_count() {
        let (start, end) = shape.chunk_boundary(i).expect("leaf in range");
        let idx = shape.leaf_node_index(i) as usize;
        hashes[idx] = hash_bytes(&content[start as usize..end as usize]);
    }
    // Padding leaves beyond leaf_count already hold EMPTY_HASH.

    for k in (0..shape.internal_node_count()).rev() {
        let left = hashes[shape.left_child(k) as usize];
        let right = hashes[shape.right_child(k) as usize];
        hashes[k as usize] = combine(&left, &right);
    }

    MerkleRef::from_parts(shape, hashes).expect("fixture shape/hash count always agree")
}

/// Builds a ref using the deterministic chunk-size derivation instead of a
/// forced one.
pub fn build_ref_derived(content: &[u8]) -> MerkleRef {
    let shape = MerkleShape::for_content_size(content.len() as u64);
    build_ref(content, shape.chunk_size())
}
