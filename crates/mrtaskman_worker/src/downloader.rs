//! Fetches a package's manifest and files over HTTP on a cache miss. This is
//! the worker's implementation of `mrtaskman_cache::PackageDownloader`.

use std::path::Path;

use async_trait::async_trait;
use mrtaskman_cache::PackageDownloader;
use mrtaskman_protocol::PackageKey;

use crate::transport::SchedulerClient;

pub struct HttpPackageDownloader {
    client: SchedulerClient,
}

impl HttpPackageDownloader {
    pub fn new(client: SchedulerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageDownloader for HttpPackageDownloader {
    async fn download(&self, package: &PackageKey, destination: &Path) -> anyhow::Result<()> {
        let manifest = self.client.get_package(&package.name, package.version).await?;
        for file in &manifest.files {
            let Some(url) = &file.download_url else {
                anyhow::bail!(
                    "package file '{}' has no download_url; blob-backed files are not fetchable by this worker",
                    file.destination_path
                );
            };
            let bytes = self.client.fetch_file(url).await?;

            let target = destination.join(&file.destination_path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &bytes).await?;
            set_file_mode(&target, &file.file_mode)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_file_mode(path: &Path, octal_mode: &str) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = u32::from_str_radix(octal_mode, 8)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _octal_mode: &str) -> anyhow::Result<()> {
    Ok(())
}
