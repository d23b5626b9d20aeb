use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mrtaskman_cache::{PackageCache, PackageCacheConfig, PackageDownloader};
use mrtaskman_protocol::PackageKey;

struct CountingDownloader {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl PackageDownloader for CountingDownloader {
    async fn download(&self, package: &PackageKey, destination: &Path) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(destination.join("payload.bin"), package.to_string())?;
        Ok(())
    }
}

#[tokio::test]
async fn second_request_for_same_package_is_a_cache_hit() {
    let root = tempfile::tempdir().unwrap();
    let cache = PackageCache::open(PackageCacheConfig::new(root.path(), 10 * 1024 * 1024)).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let downloader = CountingDownloader {
        calls: calls.clone(),
    };
    let package = PackageKey::new("xcode-tools", 142);

    let dest_a = tempfile::tempdir().unwrap();
    cache
        .copy_to_directory(&package, dest_a.path(), &downloader)
        .await
        .unwrap();
    assert!(dest_a.path().join("payload.bin").exists());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let dest_b = tempfile::tempdir().unwrap();
    cache
        .copy_to_directory(&package, dest_b.path(), &downloader)
        .await
        .unwrap();
    assert!(dest_b.path().join("payload.bin").exists());
    // Second copy is served from the cache; the downloader isn't invoked again.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_requests_in_same_process_download_only_once() {
    let root = tempfile::tempdir().unwrap();
    let cache = Arc::new(
        PackageCache::open(PackageCacheConfig::new(root.path(), 10 * 1024 * 1024)).unwrap(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let package = PackageKey::new("device-firmware", 1);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        let calls = calls.clone();
        let package = package.clone();
        handles.push(tokio::spawn(async move {
            struct SlowDownloader(Arc<AtomicUsize>);
            #[async_trait]
            impl PackageDownloader for SlowDownloader {
                async fn download(&self, _package: &PackageKey, destination: &Path) -> anyhow::Result<()> {
                    self.0.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    std::fs::write(destination.join("payload.bin"), "ok")?;
                    Ok(())
                }
            }
            let dest = tempfile::tempdir().unwrap();
            let downloader = SlowDownloader(calls);
            cache
                .copy_to_directory(&package, dest.path(), &downloader)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn eviction_keeps_cache_under_its_budget() {
    let root = tempfile::tempdir().unwrap();
    // Tiny budget: each package payload is a few hundred bytes, so a
    // handful of distinct packages should force eviction.
    let mut config = PackageCacheConfig::new(root.path(), 2048);
    config.min_duration_seconds = 0;
    let cache = PackageCache::open(config).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let downloader = CountingDownloader { calls };

    for i in 0..10 {
        let package = PackageKey::new(format!("pkg-{i}"), 1);
        let dest = tempfile::tempdir().unwrap();
        cache
            .copy_to_directory(&package, dest.path(), &downloader)
            .await
            .unwrap();
    }

    let index_path = root.path().join(".index");
    let data = std::fs::read_to_string(index_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
    let total_size = parsed["total_size"].as_u64().unwrap();
    assert!(total_size <= 2048, "cache grew past its budget: {total_size}");
}
