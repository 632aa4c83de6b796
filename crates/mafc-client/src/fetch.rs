//! HTTP range-request transport: an injectable client trait, a `reqwest`
//! implementation of it, and the retrying fetcher that sits on top.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mafc_core::MerkleShape;
use tokio::sync::Semaphore;

use crate::error::{Error, Result, TransportError};
use crate::policy::FetchPolicy;

/// Issues a single `Range: bytes=start-end_inclusive` request and returns
/// the body bytes. Implementations classify failures as transient
/// (worth retrying) or terminal via [`TransportError`].
#[async_trait]
pub trait RangeClient: Send + Sync {
    async fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> std::result::Result<Bytes, TransportError>;
}

/// Default transport, backed by a shared `reqwest::Client` (connection
/// pooling is external, per the concurrency model). Carries no timeout of
/// its own — [`RangeFetcher`] applies `FetchPolicy::request_timeout`
/// uniformly across every [`RangeClient`] implementation.
pub struct ReqwestRangeClient {
    http: reqwest::Client,
}

impl ReqwestRangeClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RangeClient for ReqwestRangeClient {
    async fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> std::result::Result<Bytes, TransportError> {
        let range_header = format!("bytes={start}-{end_inclusive}");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::RANGE, range_header)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    TransportError::Transient(e.to_string())
                } else {
                    TransportError::Terminal(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(TransportError::Transient(format!(
                "server returned {status}"
            )));
        }
        if status.is_client_error() {
            return Err(TransportError::Terminal(format!(
                "server returned {status}"
            )));
        }
        if status != reqwest::StatusCode::PARTIAL_CONTENT && status != reqwest::StatusCode::OK {
            return Err(TransportError::Terminal(format!(
                "unexpected status {status}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))
    }
}

/// A cooperative cancellation flag shared between a channel and the
/// fetches it spawned; checked between retry attempts and before issuing
/// a new request.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Retries, backs off, and bounds concurrency for per-chunk range
/// fetches. One `RangeFetcher` is shared by every chunk of a dataset.
pub struct RangeFetcher<C: RangeClient> {
    client: Arc<C>,
    url: String,
    policy: FetchPolicy,
    inflight: Arc<Semaphore>,
}

impl<C: RangeClient> RangeFetcher<C> {
    pub fn new(client: Arc<C>, url: String, policy: FetchPolicy, chunk_count: u64) -> Self {
        let permits = policy.resolved_max_inflight(chunk_count);
        Self {
            client,
            url,
            policy,
            inflight: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Fetches exactly chunk `i`'s byte extent, retrying transient
    /// failures (including short reads) with exponential backoff up to
    /// `policy.max_retries`. Terminal errors and cancellation abort
    /// immediately.
    pub async fn fetch_chunk(&self, shape: &MerkleShape, i: u64, cancel: &CancelToken) -> Result<Bytes> {
        let (start, end) = shape.chunk_boundary(i)?;
        let expected_len = end - start;
        let end_inclusive = end - 1;

        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|_| Error::Cancelled)?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = match tokio::time::timeout(
                self.policy.request_timeout,
                self.client.fetch_range(&self.url, start, end_inclusive),
            )
            .await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(TransportError::Transient(format!(
                    "request timed out after {:?}",
                    self.policy.request_timeout
                ))),
            }
            .and_then(|bytes| {
                if bytes.len() as u64 == expected_len {
                    Ok(bytes)
                } else {
                    Err(TransportError::Partial {
                        requested: expected_len,
                        got: bytes.len() as u64,
                    })
                }
            });

            match outcome {
                Ok(bytes) => return Ok(bytes),
                Err(source) if source.is_transient() && attempt < self.policy.max_retries => {
                    let delay = jittered(self.policy.backoff_for_attempt(attempt));
                    tracing::warn!(
                        chunk = i,
                        attempt,
                        ?delay,
                        error = %source,
                        "transient fetch error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    if !source.is_transient() {
                        tracing::warn!(chunk = i, error = %source, "terminal fetch error");
                    }
                    return Err(Error::FetchFailed {
                        index: i,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

/// Adds up to 25% random jitter to a backoff delay, so a batch of chunks
/// failing at the same instant doesn't retry in lockstep.
fn jittered(delay: Duration) -> Duration {
    use rand::Rng;
    let span = (delay.as_millis() / 4).max(1) as u64;
    let extra = rand::thread_rng().gen_range(0..=span);
    delay + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use mafc_core::MerkleShape;

    use super::*;

    struct FlakyClient {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl RangeClient for FlakyClient {
        async fn fetch_range(
            &self,
            _url: &str,
            start: u64,
            end_inclusive: u64,
        ) -> std::result::Result<Bytes, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(TransportError::Transient("connection reset".into()));
            }
            let len = (end_inclusive - start + 1) as usize;
            Ok(Bytes::from(vec![7u8; len]))
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let shape = MerkleShape::with_chunk_size(mafc_core::shape::MIN_CHUNK_SIZE, mafc_core::shape::MIN_CHUNK_SIZE);
        let client = Arc::new(FlakyClient {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let fetcher = RangeFetcher::new(
            Arc::clone(&client),
            "http://example.invalid/data".into(),
            FetchPolicy {
                backoff_base: Duration::from_millis(1),
                backoff_cap: Duration::from_millis(2),
                ..FetchPolicy::default()
            },
            1,
        );
        let bytes = fetcher
            .fetch_chunk(&shape, 0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(bytes.len(), mafc_core::shape::MIN_CHUNK_SIZE as usize);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_fetch_failed() {
        let shape = MerkleShape::with_chunk_size(mafc_core::shape::MIN_CHUNK_SIZE, mafc_core::shape::MIN_CHUNK_SIZE);
        let client = Arc::new(FlakyClient {
            calls: AtomicUsize::new(0),
            fail_first: 100,
        });
        let fetcher = RangeFetcher::new(
            client,
            "http://example.invalid/data".into(),
            FetchPolicy {
                max_retries: 2,
                backoff_base: Duration::from_millis(1),
                backoff_cap: Duration::from_millis(2),
                ..FetchPolicy::default()
            },
            1,
        );
        let err = fetcher
            .fetch_chunk(&shape, 0, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchFailed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_any_attempt() {
        let shape = MerkleShape::with_chunk_size(mafc_core::shape::MIN_CHUNK_SIZE, mafc_core::shape::MIN_CHUNK_SIZE);
        let client = Arc::new(FlakyClient {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        });
        let fetcher = RangeFetcher::new(
            client,
            "http://example.invalid/data".into(),
            FetchPolicy::default(),
            1,
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = fetcher.fetch_chunk(&shape, 0, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
