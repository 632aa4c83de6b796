//! `MaFileChannel`: the public façade turning byte-range reads and
//! writes into chunk-aligned, deduplicated, verified I/O over a sparse
//! local cache file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mafc_core::{MerkleRef, MerkleShape, MerkleState};
use tokio::sync::Mutex;

use crate::cache::CacheFile;
use crate::error::{Error, Result};
use crate::fetch::{CancelToken, RangeClient, RangeFetcher};
use crate::lock::StateLock;
use crate::policy::FetchPolicy;
use crate::queue::ChunkQueue;
use crate::scheduler::ChunkScheduler;
use crate::verifier::ChunkVerifier;

/// Random-access, size-aware view over a dataset backed by a remote
/// source, a local sparse cache, and a Merkle reference/state pair.
///
/// Safe for concurrent `read`/`write` from multiple tasks: internal
/// serialization is fine-grained (single-flight queue per chunk, one
/// lock on the state bitset), per the concurrency model.
pub struct MaFileChannel<C: RangeClient> {
    reference: Arc<MerkleRef>,
    state: Arc<Mutex<MerkleState>>,
    cache: CacheFile,
    queue: Arc<ChunkQueue>,
    scheduler: ChunkScheduler,
    fetcher: Arc<RangeFetcher<C>>,
    verifier: Arc<ChunkVerifier>,
    cancel: CancelToken,
    _lock: StateLock,
}

impl<C: RangeClient + 'static> MaFileChannel<C> {
    /// Opens a channel: loads the reference tree, opens-or-creates the
    /// cache file and `.mrkl` sibling, and takes the advisory state lock.
    /// Fails with [`Error::Core`] (wrapping a root/shape mismatch) if an
    /// existing `.mrkl` disagrees with the reference, or [`Error::Locked`]
    /// if another process already owns the state file.
    pub async fn open(
        remote_url: impl Into<String>,
        cache_path: impl AsRef<Path>,
        mref_path: impl AsRef<Path>,
        client: Arc<C>,
        policy: FetchPolicy,
    ) -> Result<Self> {
        let cache_path = cache_path.as_ref().to_path_buf();
        let mrkl_path = mrkl_sibling(&cache_path);

        let reference = Arc::new(MerkleRef::load(mref_path.as_ref())?);
        let lock = StateLock::acquire(&mrkl_path)?;
        let state = Arc::new(Mutex::new(MerkleState::open_or_create(
            &mrkl_path,
            &reference,
        )?));
        let cache = CacheFile::open_or_create(&cache_path, reference.shape().content_size())?;

        let fetcher = Arc::new(RangeFetcher::new(
            client,
            remote_url.into(),
            policy,
            reference.shape().leaf_count(),
        ));
        let verifier = Arc::new(ChunkVerifier::new(
            Arc::clone(&reference),
            cache.clone(),
            Arc::clone(&state),
        ));

        Ok(Self {
            reference,
            state,
            cache,
            queue: ChunkQueue::new(),
            scheduler: ChunkScheduler,
            fetcher,
            verifier,
            cancel: CancelToken::new(),
            _lock: lock,
        })
    }

    pub fn size(&self) -> u64 {
        self.reference.shape().content_size()
    }

    fn shape(&self) -> &MerkleShape {
        self.reference.shape()
    }

    /// Ensures every chunk intersecting `[pos, pos+len)` is valid,
    /// fetching and verifying whatever is missing.
    async fn ensure_range_valid(&self, pos: u64, len: u64) -> Result<()> {
        let runs = {
            let state = self.state.lock().await;
            self.scheduler.plan(self.shape(), &state, pos, len)?
        };

        let mut futures = Vec::new();
        for run in &runs {
            for i in run.indices() {
                futures.push(self.ensure_chunk_valid(i));
            }
        }
        for result in futures::future::join_all(futures).await {
            result?;
        }
        Ok(())
    }

    fn ensure_chunk_valid(&self, i: u64) -> crate::queue::ChunkFuture {
        let fetcher = Arc::clone(&self.fetcher);
        let verifier = Arc::clone(&self.verifier);
        let shape = *self.shape();
        let cancel = self.cancel.clone();
        self.queue.submit(i, move || async move {
            let bytes = fetcher.fetch_chunk(&shape, i, &cancel).await?;
            verifier.verify_and_commit(i, bytes).await
        })
    }

    /// Reads `[pos, pos+buf.len())`, clipped to EOF. Returns the number
    /// of bytes actually copied, which is `< buf.len()` only at EOF.
    pub async fn read(&self, pos: u64, buf: &mut [u8]) -> Result<u64> {
        let content_size = self.size();
        if pos >= content_size {
            return Ok(0);
        }
        let len = (buf.len() as u64).min(content_size - pos);
        if len == 0 {
            return Ok(0);
        }

        self.ensure_range_valid(pos, len).await?;

        let bytes = self.cache.read_at(pos, len as usize).await?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len() as u64)
    }

    /// Writes `buf` at `pos`. Partial-chunk writes are read-modify-write;
    /// full-chunk writes replace the chunk outright. Either way the
    /// chunk's SHA-256 is recomputed and compared to the reference: a
    /// match marks it valid, a mismatch leaves the bit clear and surfaces
    /// [`Error::HashMismatch`] (writes cannot reproduce bytes other than
    /// the reference's, since the reference is immutable).
    pub async fn write(&self, pos: u64, buf: &[u8]) -> Result<u64> {
        let content_size = self.size();
        if pos > content_size {
            return Err(Error::OutOfBounds(format!(
                "write position {pos} beyond content_size {content_size}"
            )));
        }
        let len = (buf.len() as u64).min(content_size - pos);
        if len == 0 {
            return Ok(0);
        }

        let (i_lo, i_hi) = self.shape().leaves_intersecting(pos, pos + len)?;
        for i in i_lo..i_hi {
            self.write_chunk(i, pos, &buf[..len as usize]).await?;
        }
        Ok(len)
    }

    /// Serialized through the same single-flight queue fetches use, so a
    /// write and a concurrent read-triggered fetch for the same chunk can
    /// never both run `verify_and_commit` at once (a plain read arriving
    /// mid-write joins this write's future via `submit`'s occupied-entry
    /// branch instead of racing it).
    async fn write_chunk(&self, i: u64, write_pos: u64, write_buf: &[u8]) -> Result<()> {
        let (chunk_start, chunk_end) = self.shape().chunk_boundary(i)?;
        let chunk_len = (chunk_end - chunk_start) as usize;
        let write_end = write_pos + write_buf.len() as u64;
        let is_full_chunk = write_pos <= chunk_start && write_end >= chunk_end;

        let overlap_start = write_pos.max(chunk_start);
        let overlap_end = write_end.min(chunk_end);
        let dst_off = (overlap_start - chunk_start) as usize;
        let src_off = (overlap_start - write_pos) as usize;
        let overlap_len = (overlap_end - overlap_start) as usize;
        let overlap_bytes = write_buf[src_off..src_off + overlap_len].to_vec();

        let cache = self.cache.clone();
        let state = Arc::clone(&self.state);
        let verifier = Arc::clone(&self.verifier);

        self.queue
            .run_exclusive(i, move || async move {
                let mut chunk_bytes = if is_full_chunk {
                    vec![0u8; chunk_len]
                } else {
                    cache.read_at(chunk_start, chunk_len).await?
                };
                chunk_bytes[dst_off..dst_off + overlap_len].copy_from_slice(&overlap_bytes);

                {
                    let mut state = state.lock().await;
                    state.invalidate(i)?;
                }
                verifier.verify_and_commit(i, bytes::Bytes::from(chunk_bytes)).await
            })
            .await
    }

    /// Flushes state, cancels in-flight fetches, releases the state lock.
    /// Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let mut state = self.state.lock().await;
        state.close()?;
        Ok(())
    }
}

fn mrkl_sibling(cache_path: &Path) -> PathBuf {
    let mut name = cache_path.as_os_str().to_owned();
    name.push(".mrkl");
    PathBuf::from(name)
}
