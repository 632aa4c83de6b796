//! Chunk-aligned, deduplicated, verified downloads over a sparse local
//! cache file: the fetch/verify engine built on top of `mafc-core`'s
//! shape arithmetic and on-disk formats.

mod cache;
pub mod channel;
pub mod dataset;
mod error;
pub mod fetch;
mod lock;
pub mod policy;
mod queue;
mod scheduler;
mod verifier;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use channel::MaFileChannel;
pub use dataset::DatasetHandle;
pub use error::{Error, Result, TransportError};
pub use fetch::{CancelToken, RangeClient, ReqwestRangeClient};
pub use policy::FetchPolicy;
pub use queue::ChunkQueue;
pub use scheduler::{ChunkRun, ChunkScheduler};
