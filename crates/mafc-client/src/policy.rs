//! Tunables for retry/backoff and concurrency, shared by the fetcher and
//! the channel that drives it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry and concurrency policy for [`crate::fetch::RangeFetcher`].
///
/// `Default` matches the constants named in the scheduling design: three
/// attempts, 200 ms base backoff capped at 5 s, a 60 s per-request timeout,
/// and bounded in-flight fetches derived from the dataset's chunk count at
/// open time when `max_inflight` is left `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub backoff_base: Duration,
    #[serde(with = "duration_millis")]
    pub backoff_cap: Duration,
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    pub max_inflight: Option<usize>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            max_inflight: None,
        }
    }
}

impl FetchPolicy {
    /// Resolves `max_inflight`, falling back to `min(8, chunk_count)` when
    /// the caller left it unset.
    pub fn resolved_max_inflight(&self, chunk_count: u64) -> usize {
        self.max_inflight
            .unwrap_or_else(|| (chunk_count.min(8)).max(1) as usize)
    }

    /// Exponential backoff delay for a given 1-based attempt number,
    /// clamped at `backoff_cap`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_base.as_millis().saturating_mul(1u128 << attempt.saturating_sub(1));
        let capped = scaled.min(self.backoff_cap.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Parses a `FetchPolicy` from a TOML fragment. Gated behind
    /// `toml-config` for callers that want to externalize tuning rather
    /// than construct the struct in code.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
