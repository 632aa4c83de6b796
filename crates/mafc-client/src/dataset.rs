//! Ergonomic constructor bundling a dataset's remote/cache/reference
//! triple with a fetch policy, for callers above the core (catalog and
//! codec layers) that would otherwise thread four arguments around.

use std::path::PathBuf;
use std::sync::Arc;

use crate::channel::MaFileChannel;
use crate::error::Result;
use crate::fetch::RangeClient;
use crate::policy::FetchPolicy;

/// `(remote_url, cache_path, mref_path, policy)`, with the `.mrkl`
/// sibling path derived the same way [`MaFileChannel::open`] derives it.
/// Adds no behavior beyond what `open` already does.
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    pub remote_url: String,
    pub cache_path: PathBuf,
    pub mref_path: PathBuf,
    pub policy: FetchPolicy,
}

impl DatasetHandle {
    pub fn new(
        remote_url: impl Into<String>,
        cache_path: impl Into<PathBuf>,
        mref_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote_url: remote_url.into(),
            cache_path: cache_path.into(),
            mref_path: mref_path.into(),
            policy: FetchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The `.mrkl` state file this handle's cache would use.
    pub fn mrkl_path(&self) -> PathBuf {
        let mut name = self.cache_path.as_os_str().to_owned();
        name.push(".mrkl");
        PathBuf::from(name)
    }

    pub async fn open<C: RangeClient + 'static>(
        &self,
        client: Arc<C>,
    ) -> Result<MaFileChannel<C>> {
        MaFileChannel::open(
            self.remote_url.clone(),
            &self.cache_path,
            &self.mref_path,
            client,
            self.policy.clone(),
        )
        .await
    }
}
