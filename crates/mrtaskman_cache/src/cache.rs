//! The package cache itself: bootstrap, lookup, and LRU eviction for package
//! directories shared across tasks on one worker host.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mrtaskman_protocol::{defaults, PackageKey};
use tokio::sync::{Mutex, Notify};
use tracing::info;
use walkdir::WalkDir;

use crate::control::{
    read_json, seconds_since_epoch, write_json, CacheInfo, CopyingFile, CopyingRecord,
    DownloadingFile, DownloadingRecord, IndexFile, IndexRecord,
};
use crate::error::{CacheError, Result};
use crate::eviction::select_for_eviction;
use crate::lock::CacheLock;

/// Downloads a package's files into `destination` on a cache miss. Workers
/// implement this against the scheduler's package registry; tests use a
/// stub that just writes a marker file.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    async fn download(&self, package: &PackageKey, destination: &Path) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct PackageCacheConfig {
    pub root_path: PathBuf,
    pub max_size_bytes: u64,
    pub min_duration_seconds: i64,
    pub low_watermark_percentage: f64,
    pub high_watermark_percentage: f64,
}

impl PackageCacheConfig {
    pub fn new(root_path: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            root_path: root_path.into(),
            max_size_bytes,
            min_duration_seconds: 0,
            low_watermark_percentage: defaults::DEFAULT_LOW_WATERMARK,
            high_watermark_percentage: defaults::DEFAULT_HIGH_WATERMARK,
        }
    }
}

pub struct PackageCache {
    config: PackageCacheConfig,
    /// Closes the race the original left open: `_IsAlreadyDownloading`
    /// returned `False` for a second same-process caller racing the first,
    /// because it only ever compared pids. Here a second same-process
    /// caller for the same package waits on this notifier instead of
    /// re-downloading.
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
}

impl PackageCache {
    /// Connects to an existing cache on disk or creates a new one at
    /// `config.root_path`.
    pub fn open(config: PackageCacheConfig) -> Result<Self> {
        assert!(config.low_watermark_percentage >= 0.0);
        assert!(config.high_watermark_percentage > config.low_watermark_percentage);

        let cache = Self {
            config,
            in_flight: Mutex::new(HashMap::new()),
        };
        cache.try_create_cache()?;
        Ok(cache)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.config.root_path.join(name)
    }

    /// Blocks until the cache is created, creating it if necessary. First
    /// process to get here writes the control files; others just connect.
    fn try_create_cache(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.root_path).map_err(|source| CacheError::Io {
            path: self.config.root_path.clone(),
            source,
        })?;

        let bootstrap_path = self.path("bootstrap.lock");
        let bootstrap_file =
            std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&bootstrap_path)
                .map_err(|source| CacheError::Io {
                    path: bootstrap_path.clone(),
                    source,
                })?;
        fs2::FileExt::lock_exclusive(&bootstrap_file).map_err(|source| CacheError::Io {
            path: bootstrap_path.clone(),
            source,
        })?;

        let cache_info_path = self.path(".cache_info");
        if !cache_info_path.exists() {
            info!(root = %self.config.root_path.display(), "creating package cache");
            self.create_cache_files()?;
        } else {
            info!(root = %self.config.root_path.display(), "connecting to established package cache");
        }

        let _ = fs2::FileExt::unlock(&bootstrap_file);
        Ok(())
    }

    fn create_cache_files(&self) -> Result<()> {
        write_json(
            &self.path(".cache_info"),
            &CacheInfo {
                max_size_bytes: self.config.max_size_bytes,
                min_duration_seconds: self.config.min_duration_seconds,
                low_watermark_percentage: self.config.low_watermark_percentage,
                high_watermark_percentage: self.config.high_watermark_percentage,
            },
        )?;
        write_json(&self.path(".index"), &IndexFile::default())?;
        write_json(&self.path(".copying"), &CopyingFile::default())?;
        write_json(&self.path(".downloading"), &DownloadingFile::default())?;
        Ok(())
    }

    fn lock(&self) -> Result<CacheLock> {
        CacheLock::acquire(&self.path(".cache_info"))
    }

    /// Copies `package`'s files into `destination`, downloading into the
    /// cache first if this is the first time this cache has seen it.
    pub async fn copy_to_directory(
        &self,
        package: &PackageKey,
        destination: &Path,
        downloader: &dyn PackageDownloader,
    ) -> Result<()> {
        if !destination.is_dir() {
            return Err(CacheError::DirectoryMissing(destination.to_path_buf()));
        }
        let key = package.as_cache_key();

        loop {
            // A same-process caller may already be downloading this
            // package; wait for it rather than racing the cross-process
            // `.downloading` check below.
            let notify = {
                let in_flight = self.in_flight.lock().await;
                in_flight.get(&key).cloned()
            };
            if let Some(notify) = notify {
                notify.notified().await;
                continue;
            }

            let decision = self.lock_and_decide(&key)?;
            match decision {
                Decision::Hit { cache_dir } => {
                    info!(package = %key, from = %cache_dir.display(), "cache hit");
                    copy_directory(&cache_dir, destination)?;
                    let guard = self.lock()?;
                    remove_from_copying(&self.path(".copying"), &key)?;
                    drop(guard);
                    return Ok(());
                }
                Decision::AlreadyDownloadingElsewhere => {
                    tokio::time::sleep(defaults::DOWNLOAD_WAIT_POLL_INTERVAL).await;
                    continue;
                }
                Decision::Miss { cache_dir } => {
                    let notify = Arc::new(Notify::new());
                    self.in_flight
                        .lock()
                        .await
                        .insert(key.clone(), notify.clone());

                    let result = self
                        .download_and_install(package, &key, &cache_dir, destination, downloader)
                        .await;

                    self.in_flight.lock().await.remove(&key);
                    notify.notify_waiters();
                    return result;
                }
            }
        }
    }

    fn lock_and_decide(&self, key: &str) -> Result<Decision> {
        let guard = self.lock()?;
        let index: IndexFile = read_json(&self.path(".index"))?;
        if let Some(record) = index.records.get(key) {
            let cache_dir = record.cache_dir.clone();
            touch_index_timestamp(&self.path(".index"), key)?;
            add_to_copying(&self.path(".copying"), key)?;
            drop(guard);
            return Ok(Decision::Hit { cache_dir });
        }

        let downloading: DownloadingFile = read_json(&self.path(".downloading"))?;
        if let Some(record) = downloading.0.get(key) {
            let same_process = record.pid == std::process::id();
            let fresh = seconds_since_epoch() - record.timestamp < defaults::DOWNLOAD_RECORD_TTL.as_secs() as i64;
            if !same_process && fresh {
                drop(guard);
                return Ok(Decision::AlreadyDownloadingElsewhere);
            }
        }

        let cache_dir = self.path(&format!("{}-{}", key, seconds_since_epoch()));
        add_to_downloading(&self.path(".downloading"), key, &cache_dir)?;
        drop(guard);
        Ok(Decision::Miss { cache_dir })
    }

    async fn download_and_install(
        &self,
        package: &PackageKey,
        key: &str,
        cache_dir: &Path,
        destination: &Path,
        downloader: &dyn PackageDownloader,
    ) -> Result<()> {
        std::fs::create_dir_all(cache_dir).map_err(|source| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source,
        })?;

        info!(package = %key, cache_dir = %cache_dir.display(), "cache miss, downloading");
        downloader
            .download(package, cache_dir)
            .await
            .map_err(|source| CacheError::Download {
                package: key.to_string(),
                source,
            })?;

        copy_directory(cache_dir, destination)?;

        let guard = self.lock()?;
        self.add_to_index(key, cache_dir)?;
        remove_from_downloading(&self.path(".downloading"), key)?;
        drop(guard);
        Ok(())
    }

    fn add_to_index(&self, key: &str, cache_dir: &Path) -> Result<()> {
        let dir_size = directory_size(cache_dir);
        let index_path = self.path(".index");
        let mut index: IndexFile = read_json(&index_path)?;

        let mut new_total = index.total_size;
        if index.total_size + dir_size > self.config.max_size_bytes {
            let (delete_list, remaining) = select_for_eviction(
                &index,
                seconds_since_epoch(),
                self.config.min_duration_seconds,
                self.config.max_size_bytes,
                self.config.low_watermark_percentage,
            );
            for deleted_key in &delete_list {
                if let Some(record) = index.records.remove(deleted_key) {
                    let _ = std::fs::remove_dir_all(&record.cache_dir);
                }
            }
            info!(freed_bytes = index.total_size.saturating_sub(remaining), "evicted packages from cache");
            new_total = remaining;
        }

        index.records.insert(
            key.to_string(),
            IndexRecord {
                pid: std::process::id(),
                cache_dir: cache_dir.to_path_buf(),
                timestamp: seconds_since_epoch(),
                size_bytes: dir_size,
            },
        );
        index.total_size = new_total + dir_size;
        write_json(&index_path, &index)
    }
}

enum Decision {
    Hit { cache_dir: PathBuf },
    AlreadyDownloadingElsewhere,
    Miss { cache_dir: PathBuf },
}

fn touch_index_timestamp(path: &Path, key: &str) -> Result<()> {
    let mut index: IndexFile = read_json(path)?;
    if let Some(record) = index.records.get_mut(key) {
        record.timestamp = seconds_since_epoch();
    }
    write_json(path, &index)
}

fn add_to_copying(path: &Path, key: &str) -> Result<()> {
    let mut copying: CopyingFile = read_json(path)?;
    copying.0.entry(key.to_string()).or_default().push(CopyingRecord {
        pid: std::process::id(),
        timestamp: seconds_since_epoch(),
    });
    write_json(path, &copying)
}

fn remove_from_copying(path: &Path, key: &str) -> Result<()> {
    let mut copying: CopyingFile = read_json(path)?;
    if let Some(records) = copying.0.get_mut(key) {
        let pid = std::process::id();
        records.retain(|rec| rec.pid != pid);
        if records.is_empty() {
            copying.0.remove(key);
        }
    }
    write_json(path, &copying)
}

fn add_to_downloading(path: &Path, key: &str, cache_dir: &Path) -> Result<()> {
    let mut downloading: DownloadingFile = read_json(path)?;
    downloading.0.insert(
        key.to_string(),
        DownloadingRecord {
            pid: std::process::id(),
            directory: cache_dir.to_path_buf(),
            timestamp: seconds_since_epoch(),
        },
    );
    write_json(path, &downloading)
}

fn remove_from_downloading(path: &Path, key: &str) -> Result<()> {
    let mut downloading: DownloadingFile = read_json(path)?;
    downloading.0.remove(key);
    write_json(path, &downloading)
}

fn copy_directory(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| CacheError::Io {
            path: from.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
        let relative = entry.path().strip_prefix(from).expect("walkdir yields children of `from`");
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|source| CacheError::Io {
                path: target.clone(),
                source,
            })?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            std::fs::copy(entry.path(), &target).map_err(|source| CacheError::Io {
                path: target.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
