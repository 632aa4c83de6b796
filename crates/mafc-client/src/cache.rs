//! The sparse local cache file: a positional read/write surface shared by
//! every chunk of a dataset, sized to `content_size` up front so reads
//! past the logical end are impossible by construction.

use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Thin wrapper around a `std::fs::File` that performs positional I/O on
/// a blocking thread pool, since overlapping chunk writes are already
/// serialized by [`crate::queue::ChunkQueue`] and don't need a seek cursor.
#[derive(Clone)]
pub struct CacheFile {
    file: Arc<std::fs::File>,
}

impl CacheFile {
    /// Opens or creates the cache file at `path` and sets its logical
    /// length to `content_size`, allocating a sparse file on filesystems
    /// that support it.
    pub fn open_or_create(path: impl AsRef<Path>, content_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(content_size)?;
        Ok(Self {
            file: Arc::new(file),
        })
    }

    /// Writes `bytes` at `offset` and durably flushes before returning, so
    /// a verified chunk's bytes outlive a crash before the state bit is
    /// flipped.
    pub async fn write_at(&self, offset: u64, bytes: Vec<u8>) -> Result<()> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || -> Result<()> {
            file.write_all_at(&bytes, offset)?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Io(e.to_string()))??;
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`. Callers only invoke this
    /// after confirming the covering chunk is valid.
    pub async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = vec![0u8; len];
            file.read_exact_at(&mut buf, offset)?;
            Ok(buf)
        })
        .await
        .map_err(|e| Error::Io(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.fvec");
        let cache = CacheFile::open_or_create(&path, 4096).unwrap();

        cache.write_at(10, vec![9u8; 20]).await.unwrap();
        let back = cache.read_at(10, 20).await.unwrap();
        assert_eq!(back, vec![9u8; 20]);
    }

    #[tokio::test]
    async fn file_is_preallocated_to_content_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.fvec");
        CacheFile::open_or_create(&path, 4096).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }
}
