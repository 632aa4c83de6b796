//! Mutable, per-cache companion to a [`MerkleRef`] (spec §3.3, §4.3).

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec::mrkl;
use crate::error::{Error, Result};
use crate::hash::Digest32;
use crate::merkle_ref::MerkleRef;
use crate::shape::{ceil_div, MerkleShape};

/// Tracks which leaves of a cache file have been verified against its
/// `MerkleRef`, and persists that bitset to a `.mrkl` sibling after every
/// verified chunk (spec §6.2's persistence protocol).
pub struct MerkleState {
    shape: MerkleShape,
    root: Digest32,
    valid: Vec<u8>,
    path: PathBuf,
}

impl MerkleState {
    /// Opens an existing `.mrkl` file or creates a new, all-zero one.
    /// Fails with [`Error::Mismatch`] if a persisted state's shape or root
    /// disagrees with `reference`.
    pub fn open_or_create(path: impl AsRef<Path>, reference: &MerkleRef) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let shape = *reference.shape();
        let root = reference.root_hash();
        let bits_len = ceil_div(shape.leaf_count(), 8) as usize;

        let valid = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let decoded = mrkl::decode(&bytes)?;
            if decoded.content_size != shape.content_size() || decoded.chunk_size != shape.chunk_size()
            {
                return Err(Error::Mismatch(format!(
                    "persisted shape (content_size={}, chunk_size={}) disagrees with reference \
                     (content_size={}, chunk_size={})",
                    decoded.content_size,
                    decoded.chunk_size,
                    shape.content_size(),
                    shape.chunk_size()
                )));
            }
            if decoded.root != root {
                return Err(Error::Mismatch(
                    "persisted root hash disagrees with reference root".into(),
                ));
            }
            if decoded.footer_ok {
                decoded.bits
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "mrkl footer digest invalid, treating state as empty after crash"
                );
                vec![0u8; bits_len]
            }
        } else {
            vec![0u8; bits_len]
        };

        let state = Self {
            shape,
            root,
            valid,
            path,
        };
        state.persist()?;
        Ok(state)
    }

    pub fn shape(&self) -> &MerkleShape {
        &self.shape
    }

    pub fn root(&self) -> Digest32 {
        self.root
    }

    /// Bit test: has chunk `i`'s bytes been verified against the reference?
    pub fn is_valid(&self, i: u64) -> bool {
        let byte = (i / 8) as usize;
        let bit = (i % 8) as u8;
        self.valid
            .get(byte)
            .map(|b| (b >> bit) & 1 == 1)
            .unwrap_or(false)
    }

    /// Atomically sets bit `i` and durably persists the bitset. Idempotent.
    pub fn mark_valid(&mut self, i: u64) -> Result<()> {
        self.check_index(i)?;
        let byte = (i / 8) as usize;
        let bit = (i % 8) as u8;
        self.valid[byte] |= 1 << bit;
        self.persist()
    }

    /// Clears bit `i`, used when a caller writes fresh bytes into a chunk.
    pub fn invalidate(&mut self, i: u64) -> Result<()> {
        self.check_index(i)?;
        let byte = (i / 8) as usize;
        let bit = (i % 8) as u8;
        self.valid[byte] &= !(1 << bit);
        self.persist()
    }

    /// Flushes pending bits to disk. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.persist()
    }

    fn check_index(&self, i: u64) -> Result<()> {
        if i >= self.shape.leaf_count() {
            return Err(Error::OutOfBounds(format!(
                "chunk index {i} >= leaf_count {}",
                self.shape.leaf_count()
            )));
        }
        Ok(())
    }

    /// Writes the whole `.mrkl` snapshot in place and `fsync`s it. The
    /// encoded buffer is always the same length across calls (the bitset
    /// never resizes after creation), so an in-place overwrite without
    /// truncation is what lets a crash mid-write surface as a footer
    /// digest mismatch rather than a truncated file (spec §6.2).
    fn persist(&self) -> Result<()> {
        let bytes = mrkl::encode(
            &self.root,
            self.shape.content_size(),
            self.shape.chunk_size(),
            self.shape.leaf_count(),
            &self.valid,
        );
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }
}
