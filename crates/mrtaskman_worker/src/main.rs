//! MrTaskman worker binary.
//!
//! Usage:
//!     mrtaskman-worker --scheduler-url http://127.0.0.1:7475 --worker-name w1

use clap::Parser;
use mrtaskman_worker::{Worker, WorkerArgs, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = WorkerArgs::parse();
    mrtaskman_logging::init_logging(mrtaskman_logging::LogConfig {
        app_name: "mrtaskman-worker",
        verbose: false,
        tui_mode: false,
    })?;

    let worker_name = args.worker_name.unwrap_or_else(|| {
        format!("worker-{}", uuid::Uuid::new_v4().to_string().split('-').next().unwrap())
    });
    let hostname = mrtaskman_worker::capabilities::hostname();
    let host_executor_tag = mrtaskman_worker::capabilities::host_executor_tag().to_string();

    tracing::info!(
        scheduler_url = %args.scheduler_url,
        worker_name = %worker_name,
        %hostname,
        host_executor_tag = %host_executor_tag,
        "starting mrtaskman worker"
    );

    let config = WorkerConfig {
        scheduler_url: args.scheduler_url,
        worker_name,
        hostname,
        host_executor_tag,
        cache_root: args.cache_root,
        cache_max_size_bytes: args.cache_max_size_bytes,
    };

    let worker = Worker::new(config)?;
    worker.run().await?;

    Ok(())
}
