#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("scheduler request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("task config invalid: {0}")]
    Config(#[from] mrtaskman_protocol::TaskConfigError),

    #[error("failed to serialize upload body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("package cache error: {0}")]
    Cache(#[from] mrtaskman_cache::CacheError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
