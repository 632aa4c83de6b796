//! Decides which chunks a read must wait on, coalescing adjacent misses
//! into runs that can be served by a single HTTP range request.

use mafc_core::{MerkleShape, MerkleState};

use crate::error::Result;

/// A maximal run of contiguous, not-yet-valid chunk indices:
/// `[start, end)`, `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRun {
    pub start: u64,
    pub end: u64,
}

impl ChunkRun {
    pub fn indices(&self) -> impl Iterator<Item = u64> {
        self.start..self.end
    }

    /// The byte extent this run spans, suitable for a single coalesced
    /// `Range:` request; the verifier still hashes and commits per chunk.
    pub fn byte_range(&self, shape: &MerkleShape) -> Result<(u64, u64)> {
        let (start, _) = shape.chunk_boundary(self.start)?;
        let (_, end) = shape.chunk_boundary(self.end - 1)?;
        Ok((start, end))
    }
}

/// Stateless planner: every operation is a pure function of a shape, a
/// state snapshot, and a byte range.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkScheduler;

impl ChunkScheduler {
    /// Runs of missing chunks intersecting `[pos, pos+len)`, in ascending
    /// order. Prefetch beyond the requested range is not attempted.
    pub fn plan(
        &self,
        shape: &MerkleShape,
        state: &MerkleState,
        pos: u64,
        len: u64,
    ) -> Result<Vec<ChunkRun>> {
        let (i_lo, i_hi) = shape.leaves_intersecting(pos, pos + len)?;
        let mut runs = Vec::new();
        let mut run_start: Option<u64> = None;

        for i in i_lo..i_hi {
            if state.is_valid(i) {
                if let Some(start) = run_start.take() {
                    runs.push(ChunkRun { start, end: i });
                }
            } else if run_start.is_none() {
                run_start = Some(i);
            }
        }
        if let Some(start) = run_start {
            runs.push(ChunkRun { start, end: i_hi });
        }
        Ok(runs)
    }
}
