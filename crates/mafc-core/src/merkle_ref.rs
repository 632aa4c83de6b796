//! Immutable reference tree loaded from `.mref` (spec §3.2, §4.2).

use std::path::Path;

use crate::codec::mref;
use crate::error::{Error, Result};
use crate::hash::{combine, digest_eq, hash_bytes, Digest32, EMPTY_HASH};
use crate::shape::MerkleShape;

/// A fully materialized hash tree: leaves are SHA-256 of each chunk, and
/// internal nodes are SHA-256 of the concatenation of their two children.
#[derive(Debug, Clone)]
pub struct MerkleRef {
    shape: MerkleShape,
    hashes: Vec<Digest32>,
}

impl MerkleRef {
    /// Constructs a reference from an already-shaped tree of hashes. Used
    /// by the codec and by test fixtures; not exposed as "the" publish
    /// tool (spec §1 treats publication as an external pipeline).
    pub(crate) fn from_parts(shape: MerkleShape, hashes: Vec<Digest32>) -> Result<Self> {
        if hashes.len() as u64 != shape.total_node_count() {
            return Err(Error::Format(format!(
                "hash count {} does not match total_node_count {}",
                hashes.len(),
                shape.total_node_count()
            )));
        }
        Ok(Self { shape, hashes })
    }

    /// Loads and validates a `.mref` file (spec §6.1). Streams the hash
    /// array as-is; does not recompute internal nodes (`validate()` does
    /// that, for offline tooling).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        mref::decode(&bytes)
    }

    pub fn shape(&self) -> &MerkleShape {
        &self.shape
    }

    /// Leaf hash for chunk `i`.
    pub fn leaf_hash(&self, i: u64) -> Result<Digest32> {
        if i >= self.shape.leaf_count() {
            return Err(Error::OutOfBounds(format!(
                "leaf {i} >= leaf_count {}",
                self.shape.leaf_count()
            )));
        }
        Ok(self.hashes[self.shape.leaf_node_index(i) as usize])
    }

    /// Root digest, uniquely identifying the tree.
    pub fn root_hash(&self) -> Digest32 {
        self.hashes[0]
    }

    /// Raw node hash at tree-array index `k`.
    pub fn node_hash(&self, k: u64) -> Digest32 {
        self.hashes[k as usize]
    }

    pub(crate) fn hashes(&self) -> &[Digest32] {
        &self.hashes
    }

    /// Hashes `bytes` and compares, in constant time, against `leaf_hash(i)`.
    /// `false` implies corrupt transport or wrong data, never a bug here.
    pub fn verify_chunk(&self, i: u64, bytes: &[u8]) -> Result<bool> {
        let expected = self.leaf_hash(i)?;
        Ok(digest_eq(&hash_bytes(bytes), &expected))
    }

    /// Walks the whole tree recomputing every internal node from its
    /// children and checking padding leaves hash to the empty digest.
    /// O(nodes); used only by offline validators, not the fetch path
    /// (spec §9, Open Questions).
    pub fn validate(&self) -> Result<()> {
        for i in self.shape.leaf_count()..self.shape.cap_leaf_count() {
            let k = self.shape.leaf_node_index(i);
            if !digest_eq(&self.hashes[k as usize], &EMPTY_HASH) {
                return Err(Error::Format(format!(
                    "padding leaf {i} does not hash to the empty digest"
                )));
            }
        }
        for k in (0..self.shape.internal_node_count()).rev() {
            let left = self.hashes[self.shape.left_child(k) as usize];
            let right = self.hashes[self.shape.right_child(k) as usize];
            let expected = combine(&left, &right);
            if !digest_eq(&self.hashes[k as usize], &expected) {
                return Err(Error::Format(format!(
                    "internal node {k} does not match hash of its children"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_ref;

    #[test]
    fn verify_chunk_matches_known_good_bytes() {
        let content = vec![7u8; 3000];
        let r = build_ref(&content, crate::shape::MIN_CHUNK_SIZE);
        assert!(r.verify_chunk(0, &content).unwrap());
        let mut tampered = content.clone();
        tampered[0] ^= 0xFF;
        assert!(!r.verify_chunk(0, &tampered).unwrap());
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        let content = vec![1u8; 5 * crate::shape::MIN_CHUNK_SIZE as usize];
        let r = build_ref(&content, crate::shape::MIN_CHUNK_SIZE);
        r.validate().unwrap();
    }

    #[test]
    fn validate_rejects_corrupted_internal_node() {
        let content = vec![1u8; 5 * crate::shape::MIN_CHUNK_SIZE as usize];
        let mut r = build_ref(&content, crate::shape::MIN_CHUNK_SIZE);
        r.hashes[1][0] ^= 0xFF;
        assert!(r.validate().is_err());
    }
}
