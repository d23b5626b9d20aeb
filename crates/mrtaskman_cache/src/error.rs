use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache control file {path}: {source}")]
    Control {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("directory does not exist: {0}")]
    DirectoryMissing(PathBuf),

    #[error("download for {package} failed: {source}")]
    Download {
        package: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, CacheError>;
