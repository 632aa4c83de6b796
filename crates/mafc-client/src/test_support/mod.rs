//! A scripted [`RangeClient`] for deterministic tests: each byte offset
//! can be given a queue of canned outcomes (success, corruption, a
//! transient failure, a short read, an artificial delay) so integration
//! tests can drive the exact end-to-end scenarios without a real server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::TransportError;
use crate::fetch::RangeClient;

/// One canned outcome for a single `fetch_range` call.
#[derive(Debug, Clone)]
pub enum ScriptedAction {
    /// Return the requested range, byte-for-byte.
    Succeed,
    /// As `Succeed`, but only after sleeping `Duration` first.
    SucceedAfter(Duration),
    /// Return the requested range with the byte at `offset` (relative to
    /// the start of the range) flipped, simulating transport corruption.
    CorruptByte(usize),
    /// Return fewer bytes than requested, simulating a clipped response.
    PartialResponse(u64),
    /// Fail with a transient transport error (worth retrying).
    FailTransient,
    /// Fail with a terminal transport error (not retried).
    FailTerminal,
}

/// Backs [`RangeClient::fetch_range`] with a fixed "true" content buffer
/// plus an optional queue of scripted actions per range start offset.
/// Offsets with no queued actions fall back to `Succeed`.
pub struct ScriptedRangeClient {
    content: Vec<u8>,
    scripts: DashMap<u64, VecDeque<ScriptedAction>>,
    calls: DashMap<u64, AtomicUsize>,
}

impl ScriptedRangeClient {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            scripts: DashMap::new(),
            calls: DashMap::new(),
        }
    }

    /// Queues `actions` to be consumed in order by successive
    /// `fetch_range` calls whose range starts at `start`.
    pub fn script(&self, start: u64, actions: impl IntoIterator<Item = ScriptedAction>) {
        self.scripts.insert(start, actions.into_iter().collect());
    }

    /// Number of times `fetch_range` has been called for ranges starting
    /// at `start`.
    pub fn call_count(&self, start: u64) -> usize {
        self.calls
            .get(&start)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl RangeClient for ScriptedRangeClient {
    async fn fetch_range(
        &self,
        _url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> std::result::Result<Bytes, TransportError> {
        self.calls
            .entry(start)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);

        let action = self
            .scripts
            .get_mut(&start)
            .and_then(|mut q| q.pop_front())
            .unwrap_or(ScriptedAction::Succeed);

        let full = self.content[start as usize..=end_inclusive as usize].to_vec();

        match action {
            ScriptedAction::Succeed => Ok(Bytes::from(full)),
            ScriptedAction::SucceedAfter(d) => {
                tokio::time::sleep(d).await;
                Ok(Bytes::from(full))
            }
            ScriptedAction::CorruptByte(offset) => {
                let mut bytes = full;
                bytes[offset] ^= 0xFF;
                Ok(Bytes::from(bytes))
            }
            ScriptedAction::PartialResponse(n) => Ok(Bytes::from(full[..n as usize].to_vec())),
            ScriptedAction::FailTransient => {
                Err(TransportError::Transient("scripted transient failure".into()))
            }
            ScriptedAction::FailTerminal => {
                Err(TransportError::Terminal("scripted terminal failure".into()))
            }
        }
    }
}
