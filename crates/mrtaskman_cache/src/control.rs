//! On-disk control file formats for the package cache: `.cache_info`,
//! `.index`, `.copying`, `.downloading`. Ported field-for-field from the
//! original cache's JSON control files so an on-disk cache can be inspected
//! with nothing more than `cat` and `jq`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

pub fn seconds_since_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub max_size_bytes: u64,
    pub min_duration_seconds: i64,
    pub low_watermark_percentage: f64,
    pub high_watermark_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub pid: u32,
    pub cache_dir: PathBuf,
    pub timestamp: i64,
    pub size_bytes: u64,
}

/// The `.index` file: per-package cache-directory records plus a running
/// `total_size` tally, stored as sibling keys in the same JSON object (as
/// the original did) so the file's own total can never drift from what a
/// reader computes by summing the records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    #[serde(flatten)]
    pub records: HashMap<String, IndexRecord>,
    #[serde(default)]
    pub total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyingRecord {
    pub pid: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyingFile(pub HashMap<String, Vec<CopyingRecord>>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadingRecord {
    pub pid: u32,
    pub directory: PathBuf,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadingFile(pub HashMap<String, DownloadingRecord>);

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| CacheError::Control {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value).map_err(|source| CacheError::Control {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}
