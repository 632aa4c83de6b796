//! Promotes a fetched chunk from "unverified" to "valid" exactly once:
//! size check, hash check, durable cache write, then the state bit flip
//! — in that order, so a crash between the write and the flip always
//! leaves a chunk that re-fetches rather than one that is trusted
//! without ever being verified.

use std::sync::Arc;

use bytes::Bytes;
use mafc_core::MerkleRef;
use tokio::sync::Mutex;

use crate::cache::CacheFile;
use crate::error::{Error, Result};

pub struct ChunkVerifier {
    reference: Arc<MerkleRef>,
    cache: CacheFile,
    state: Arc<Mutex<mafc_core::MerkleState>>,
}

impl ChunkVerifier {
    pub fn new(
        reference: Arc<MerkleRef>,
        cache: CacheFile,
        state: Arc<Mutex<mafc_core::MerkleState>>,
    ) -> Self {
        Self {
            reference,
            cache,
            state,
        }
    }

    pub async fn verify_and_commit(&self, i: u64, bytes: Bytes) -> Result<()> {
        let expected_len = self.reference.shape().chunk_len(i)?;
        if bytes.len() as u64 != expected_len {
            return Err(Error::SizeMismatch {
                index: i,
                expected: expected_len,
                actual: bytes.len() as u64,
            });
        }

        if !self.reference.verify_chunk(i, &bytes)? {
            tracing::warn!(chunk = i, "chunk failed hash verification");
            return Err(Error::HashMismatch { index: i });
        }

        let (offset, _) = self.reference.shape().chunk_boundary(i)?;
        self.cache.write_at(offset, bytes.to_vec()).await?;

        let mut state = self.state.lock().await;
        state.mark_valid(i)?;
        tracing::debug!(chunk = i, "chunk verified and committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mafc_core::test_support::build_ref;
    use mafc_core::MerkleState;

    use super::*;

    fn fixture(n_chunks: u64) -> (tempfile::TempDir, Arc<MerkleRef>) {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![3u8; (n_chunks * mafc_core::shape::MIN_CHUNK_SIZE) as usize];
        let r = Arc::new(build_ref(&content, mafc_core::shape::MIN_CHUNK_SIZE));
        (dir, r)
    }

    #[tokio::test]
    async fn good_chunk_is_written_and_marked_valid() {
        let (dir, r) = fixture(2);
        let cache = CacheFile::open_or_create(dir.path().join("data"), r.shape().content_size()).unwrap();
        let state = Arc::new(Mutex::new(
            MerkleState::open_or_create(dir.path().join("data.mrkl"), &r).unwrap(),
        ));
        let verifier = ChunkVerifier::new(Arc::clone(&r), cache.clone(), Arc::clone(&state));

        let bytes = Bytes::from(vec![3u8; mafc_core::shape::MIN_CHUNK_SIZE as usize]);
        verifier.verify_and_commit(0, bytes).await.unwrap();
        assert!(state.lock().await.is_valid(0));
    }

    #[tokio::test]
    async fn wrong_bytes_fail_hash_check_and_leave_bit_clear() {
        let (dir, r) = fixture(2);
        let cache = CacheFile::open_or_create(dir.path().join("data"), r.shape().content_size()).unwrap();
        let state = Arc::new(Mutex::new(
            MerkleState::open_or_create(dir.path().join("data.mrkl"), &r).unwrap(),
        ));
        let verifier = ChunkVerifier::new(Arc::clone(&r), cache, Arc::clone(&state));

        let bad = Bytes::from(vec![0xFFu8; mafc_core::shape::MIN_CHUNK_SIZE as usize]);
        let err = verifier.verify_and_commit(0, bad).await.unwrap_err();
        assert!(matches!(err, Error::HashMismatch { index: 0 }));
        assert!(!state.lock().await.is_valid(0));
    }

    #[tokio::test]
    async fn short_chunk_fails_size_check_before_hashing() {
        let (dir, r) = fixture(1);
        let cache = CacheFile::open_or_create(dir.path().join("data"), r.shape().content_size()).unwrap();
        let state = Arc::new(Mutex::new(
            MerkleState::open_or_create(dir.path().join("data.mrkl"), &r).unwrap(),
        ));
        let verifier = ChunkVerifier::new(Arc::clone(&r), cache, state);

        let short = Bytes::from(vec![3u8; 10]);
        let err = verifier.verify_and_commit(0, short).await.unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { index: 0, .. }));
    }
}
