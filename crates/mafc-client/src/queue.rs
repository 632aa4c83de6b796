//! Single-flight deduplication of concurrent fetch requests for the same
//! chunk: at most one physical fetch is in flight per chunk at any time,
//! and every subscriber shares its outcome.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::Result;

/// A chunk fetch's shared completion. Cloning is cheap; every clone
/// observes the same `Ok`/`Err` once the underlying fetch resolves.
pub type ChunkFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Map of `chunk_index -> in-flight future`. Entries are removed as soon
/// as the fetch they represent completes, so a later `submit` for the
/// same chunk starts a fresh fetch rather than replaying a stale result.
pub struct ChunkQueue {
    inflight: DashMap<u64, ChunkFuture>,
}

impl ChunkQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inflight: DashMap::new(),
        })
    }

    /// Joins an in-flight fetch for `i`, or starts one by driving `fetch`
    /// on a detached task so it makes progress even if every subscriber
    /// drops its handle (the chunk may still be useful to the next
    /// reader).
    pub fn submit<F, Fut>(self: &Arc<Self>, i: u64, fetch: F) -> ChunkFuture
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        match self.inflight.entry(i) {
            Entry::Occupied(existing) => {
                tracing::trace!(chunk = i, "joining in-flight fetch");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let queue = Arc::clone(self);
                let shared: ChunkFuture = async move {
                    let result = fetch().await;
                    queue.inflight.remove(&i);
                    result
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                tokio::spawn(shared.clone());
                shared
            }
        }
    }

    /// Runs `op` to completion for chunk `i`, waiting out any fetch or
    /// write already in flight for the same chunk first, then registering
    /// itself as the new in-flight entry so a `submit` arriving while `op`
    /// runs joins its outcome instead of racing it with a fetch of its own.
    /// Unlike `submit`, a caller here always gets its own `op` executed —
    /// it waits out predecessors rather than joining them.
    pub async fn run_exclusive<F, Fut>(self: &Arc<Self>, i: u64, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut op = Some(op);
        loop {
            let claimed = match self.inflight.entry(i) {
                Entry::Occupied(existing) => Err(existing.get().clone()),
                Entry::Vacant(slot) => {
                    let queue = Arc::clone(self);
                    let op = op.take().expect("run_exclusive claims its op exactly once");
                    let shared: ChunkFuture = async move {
                        let result = op().await;
                        queue.inflight.remove(&i);
                        result
                    }
                    .boxed()
                    .shared();
                    slot.insert(shared.clone());
                    tokio::spawn(shared.clone());
                    Ok(shared)
                }
            };
            match claimed {
                Ok(shared) => return shared.await,
                Err(existing) => {
                    tracing::trace!(chunk = i, "write waiting for in-flight entry to clear");
                    let _ = existing.await;
                }
            }
        }
    }

    /// Drops the in-flight registration for `i`. Already-dispatched
    /// subscribers still observe the detached task's eventual result;
    /// this only ensures the *next* `submit` doesn't join a cancelled one.
    pub fn cancel(&self, i: u64) {
        if self.inflight.remove(&i).is_some() {
            tracing::debug!(chunk = i, "cancelled in-flight chunk registration");
        }
    }

    pub fn is_inflight(&self, i: u64) -> bool {
        self.inflight.contains_key(&i)
    }
}
