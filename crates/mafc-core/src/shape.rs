//! Pure arithmetic over chunk size, leaf count, and internal-node indexing.
//!
//! Every other component delegates chunk/boundary math here so it cannot
//! drift between components (spec §4.1).

use crate::error::{Error, Result};

/// Smallest chunk size considered: 1 MiB.
pub const MIN_CHUNK_SIZE: u64 = 1 << 20;
/// Largest chunk size considered: 64 MiB.
pub const MAX_CHUNK_SIZE: u64 = 1 << 26;
/// Target leaf count the chunk size is derived from.
const TARGET_LEAF_DIVISOR: u64 = 4096;

/// Returns the smallest power of two that is `>= n`. `next_pow2(0) == 1`.
pub fn next_pow2(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    1u64 << (64 - (n - 1).leading_zeros())
}

/// `ceil(a / b)` for nonzero `b`.
pub fn ceil_div(a: u64, b: u64) -> u64 {
    debug_assert!(b > 0);
    a.div_ceil(b)
}

/// Immutable description of how a file of `content_size` bytes is
/// partitioned into power-of-two chunks and laid out as a binary Merkle
/// tree (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleShape {
    content_size: u64,
    chunk_size: u64,
    leaf_count: u64,
    cap_leaf_count: u64,
    internal_node_count: u64,
    total_node_count: u64,
    height: u32,
}

impl MerkleShape {
    /// Derives a shape deterministically from a content length.
    pub fn for_content_size(content_size: u64) -> Self {
        let target_chunks = ceil_div(content_size.max(1), TARGET_LEAF_DIVISOR);
        let chunk_size = next_pow2(target_chunks).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        Self::with_chunk_size(content_size, chunk_size)
    }

    /// Builds a shape from an explicit, already-validated chunk size. Used
    /// when loading a `.mref`/`.mrkl` file whose footer encodes the chunk
    /// size the publisher chose, which takes precedence over the
    /// deterministic derivation (spec §9, Open Questions).
    pub fn with_chunk_size(content_size: u64, chunk_size: u64) -> Self {
        debug_assert!(chunk_size.is_power_of_two());
        let leaf_count = ceil_div(content_size.max(1), chunk_size).max(1);
        let cap_leaf_count = next_pow2(leaf_count);
        let internal_node_count = cap_leaf_count - 1;
        let total_node_count = internal_node_count + cap_leaf_count;
        let height = cap_leaf_count.trailing_zeros();

        Self {
            content_size,
            chunk_size,
            leaf_count,
            cap_leaf_count,
            internal_node_count,
            total_node_count,
            height,
        }
    }

    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    pub fn cap_leaf_count(&self) -> u64 {
        self.cap_leaf_count
    }

    pub fn internal_node_count(&self) -> u64 {
        self.internal_node_count
    }

    pub fn total_node_count(&self) -> u64 {
        self.total_node_count
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Leaf index covering `pos`. Fails if `pos >= content_size`.
    pub fn leaf_index_for_position(&self, pos: u64) -> Result<u64> {
        if pos >= self.content_size {
            return Err(Error::OutOfBounds(format!(
                "position {pos} >= content_size {}",
                self.content_size
            )));
        }
        Ok(pos / self.chunk_size)
    }

    /// Half-open byte range `[start, end)` covered by leaf `i`.
    pub fn chunk_boundary(&self, i: u64) -> Result<(u64, u64)> {
        if i >= self.leaf_count {
            return Err(Error::OutOfBounds(format!(
                "chunk index {i} >= leaf_count {}",
                self.leaf_count
            )));
        }
        let start = i * self.chunk_size;
        let end = (start + self.chunk_size).min(self.content_size);
        Ok((start, end))
    }

    /// Length in bytes of leaf `i`'s chunk (`<= chunk_size`, with equality
    /// for all but possibly the last leaf).
    pub fn chunk_len(&self, i: u64) -> Result<u64> {
        let (start, end) = self.chunk_boundary(i)?;
        Ok(end - start)
    }

    /// Tree-array index of leaf `i` (leaves occupy
    /// `[internal_node_count, total_node_count)`).
    pub fn leaf_node_index(&self, i: u64) -> u64 {
        self.internal_node_count + i
    }

    /// Parent of node `k` in the level-order layout. `None` for the root.
    pub fn parent(&self, k: u64) -> Option<u64> {
        if k == 0 {
            None
        } else {
            Some((k - 1) / 2)
        }
    }

    /// Left child of internal node `k`.
    pub fn left_child(&self, k: u64) -> u64 {
        2 * k + 1
    }

    /// Right child of internal node `k`.
    pub fn right_child(&self, k: u64) -> u64 {
        2 * k + 2
    }

    /// Sibling of node `k`. `None` for the root.
    pub fn sibling(&self, k: u64) -> Option<u64> {
        if k == 0 {
            None
        } else if k % 2 == 1 {
            Some(k + 1)
        } else {
            Some(k - 1)
        }
    }

    /// Half-open leaf index range `[i_lo, i_hi)` intersecting byte range
    /// `[start, end)`. `start <= end <= content_size` is required.
    pub fn leaves_intersecting(&self, start: u64, end: u64) -> Result<(u64, u64)> {
        if start > end || end > self.content_size {
            return Err(Error::OutOfBounds(format!(
                "range [{start}, {end}) outside content_size {}",
                self.content_size
            )));
        }
        if start == end {
            return Ok((0, 0));
        }
        let i_lo = start / self.chunk_size;
        let i_hi = ceil_div(end, self.chunk_size).min(self.leaf_count);
        Ok((i_lo, i_hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_yields_single_leaf() {
        let shape = MerkleShape::for_content_size(1024);
        assert_eq!(shape.leaf_count(), 1);
        assert_eq!(shape.chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(shape.cap_leaf_count(), 1);
        assert_eq!(shape.height(), 0);
    }

    #[test]
    fn chunk_size_is_clamped_into_range() {
        // A huge file would otherwise derive a chunk size above the cap.
        let shape = MerkleShape::for_content_size(200 * (1u64 << 30));
        assert!(shape.chunk_size() <= MAX_CHUNK_SIZE);
        assert!(shape.chunk_size() >= MIN_CHUNK_SIZE);
        assert!(shape.chunk_size().is_power_of_two());
    }

    #[test]
    fn multi_chunk_layout_matches_spec_example() {
        // 5 x 1 MiB file forced to a 1 MiB chunk size (S2 in spec §8).
        let shape = MerkleShape::with_chunk_size(5 * MIN_CHUNK_SIZE, MIN_CHUNK_SIZE);
        assert_eq!(shape.leaf_count(), 5);
        assert_eq!(shape.cap_leaf_count(), 8);
        assert_eq!(shape.internal_node_count(), 7);
        assert_eq!(shape.total_node_count(), 15);
    }

    #[test]
    fn last_chunk_is_short() {
        let chunk = MIN_CHUNK_SIZE;
        let shape = MerkleShape::with_chunk_size(chunk + 100, chunk);
        assert_eq!(shape.leaf_count(), 2);
        assert_eq!(shape.chunk_len(0).unwrap(), chunk);
        assert_eq!(shape.chunk_len(1).unwrap(), 100);
    }

    #[test]
    fn leaves_intersecting_clips_to_eof() {
        let chunk = MIN_CHUNK_SIZE;
        let shape = MerkleShape::with_chunk_size(chunk + 100, chunk);
        let (lo, hi) = shape.leaves_intersecting(0, chunk + 100).unwrap();
        assert_eq!((lo, hi), (0, 2));
    }

    #[test]
    fn out_of_bounds_position_fails() {
        let shape = MerkleShape::for_content_size(1024);
        assert!(shape.leaf_index_for_position(1024).is_err());
        assert!(shape.leaf_index_for_position(1023).is_ok());
    }

    #[test]
    fn heap_arithmetic_round_trips() {
        let shape = MerkleShape::with_chunk_size(5 * MIN_CHUNK_SIZE, MIN_CHUNK_SIZE);
        for k in 1..shape.total_node_count() {
            let parent = shape.parent(k).unwrap();
            assert!(shape.left_child(parent) == k || shape.right_child(parent) == k);
            let sib = shape.sibling(k).unwrap();
            assert_eq!(shape.parent(sib), Some(parent));
        }
        assert_eq!(shape.parent(0), None);
        assert_eq!(shape.sibling(0), None);
    }

    proptest::proptest! {
        #[test]
        fn leaf_coverage_is_disjoint_and_total(content_size in 0u64..(20 * MIN_CHUNK_SIZE)) {
            let shape = MerkleShape::for_content_size(content_size);
            let mut cursor = 0u64;
            for i in 0..shape.leaf_count() {
                let (start, end) = shape.chunk_boundary(i).unwrap();
                prop_assert_eq!(start, cursor);
                prop_assert!(end > start);
                prop_assert!(end - start <= shape.chunk_size());
                cursor = end;
            }
            prop_assert_eq!(cursor, content_size);
        }

        #[test]
        fn chunk_size_always_power_of_two_in_range(content_size in 0u64..(u64::MAX / 2)) {
            let shape = MerkleShape::for_content_size(content_size);
            prop_assert!(shape.chunk_size().is_power_of_two());
            prop_assert!(shape.chunk_size() >= MIN_CHUNK_SIZE);
            prop_assert!(shape.chunk_size() <= MAX_CHUNK_SIZE);
        }

        #[test]
        fn shape_is_deterministic(content_size in 0u64..(20 * MIN_CHUNK_SIZE)) {
            let a = MerkleShape::for_content_size(content_size);
            let b = MerkleShape::for_content_size(content_size);
            prop_assert_eq!(a, b);
        }
    }
}
