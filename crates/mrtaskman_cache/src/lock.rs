//! Cross-process exclusive lock on `.cache_info`, the same role
//! `portalocker.lock(self._lock, portalocker.LOCK_EX)` played in the
//! original cache: every control-file mutation (index, copying,
//! downloading) happens while this lock is held.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{CacheError, Result};

pub struct CacheLock {
    file: File,
}

impl CacheLock {
    /// Blocks until the exclusive lock on `cache_info_path` is acquired.
    pub fn acquire(cache_info_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(cache_info_path)
            .map_err(|source| CacheError::Io {
                path: cache_info_path.to_path_buf(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| CacheError::Io {
            path: cache_info_path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
