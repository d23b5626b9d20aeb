//! MrTaskman worker: the poll/execute/report loop described in §4.2 -- call
//! `Assign`, run the matched task's command through the package cache and a
//! shell executor, and upload the result.

pub mod capabilities;
pub mod downloader;
pub mod error;
pub mod executor;
pub mod transport;
pub mod worker;

pub use error::WorkerError;
pub use worker::{Worker, WorkerConfig};

#[derive(clap::Parser, Debug)]
#[command(name = "mrtaskman-worker", about = "Worker node for MrTaskman")]
pub struct WorkerArgs {
    /// Scheduler base URL, e.g. http://127.0.0.1:7475
    #[arg(long, default_value_t = format!("http://{}", mrtaskman_protocol::defaults::DEFAULT_SCHEDULER_BIND_ADDR))]
    pub scheduler_url: String,

    /// Worker name, unique per host/slot (auto-generated if not provided).
    #[arg(long)]
    pub worker_name: Option<String>,

    /// Package cache root directory.
    #[arg(long, default_value_os_t = mrtaskman_protocol::paths::default_cache_root())]
    pub cache_root: std::path::PathBuf,

    /// Package cache size budget in bytes.
    #[arg(long, default_value_t = 10 * 1024 * 1024 * 1024)]
    pub cache_max_size_bytes: u64,
}
