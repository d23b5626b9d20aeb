//! MrTaskman CLI binary.
//!
//! Usage:
//!     mrtaskman serve --bind 127.0.0.1:7475
//!     mrtaskman worker --scheduler-url http://127.0.0.1:7475
//!     mrtaskman schedule --name build --executor linux --command "make"
//!     mrtaskman get 1

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use mrtaskman::{run_client_command, Cli, Command};
use mrtaskman_scheduler::db::{ensure_schema, SqliteTaskStore};
use mrtaskman_scheduler::timeout::TokioTimeoutQueue;
use mrtaskman_scheduler::Scheduler;
use mrtaskman_worker::{Worker, WorkerConfig};
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mrtaskman_logging::init_logging(mrtaskman_logging::LogConfig {
        app_name: "mrtaskman",
        verbose: false,
        tui_mode: false,
    })?;

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind, database_url } => serve(bind, database_url).await?,
        Command::Worker {
            scheduler_url,
            worker_name,
            cache_root,
            cache_max_size_bytes,
        } => {
            let worker_name = worker_name.unwrap_or_else(|| {
                format!("worker-{}", uuid::Uuid::new_v4().to_string().split('-').next().unwrap())
            });
            let hostname = mrtaskman_worker::capabilities::hostname();
            let host_executor_tag = mrtaskman_worker::capabilities::host_executor_tag().to_string();

            tracing::info!(%scheduler_url, %worker_name, %hostname, %host_executor_tag, "starting mrtaskman worker");

            let worker = Worker::new(WorkerConfig {
                scheduler_url,
                worker_name,
                hostname,
                host_executor_tag,
                cache_root,
                cache_max_size_bytes,
            })?;
            worker.run().await?;
        }
        command => {
            if let Err(err) = run_client_command(command).await {
                eprintln!("error: {err}");
                std::process::exit(err.exit_code());
            }
        }
    }

    Ok(())
}

/// Runs the scheduler HTTP server until SIGINT/SIGTERM, then lets in-flight
/// requests finish before returning.
async fn serve(bind: String, database_url: String) -> anyhow::Result<()> {
    tracing::info!(%bind, %database_url, "starting mrtaskman scheduler");

    let pool = SqlitePoolOptions::new().max_connections(8).connect(&database_url).await?;
    ensure_schema(&pool).await?;

    let store: Arc<dyn mrtaskman_scheduler::db::TaskStore> = Arc::new(SqliteTaskStore::new(pool));
    let timeouts = Arc::new(TokioTimeoutQueue::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store, timeouts));
    let app = mrtaskman_scheduler::http::router(scheduler);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = shutdown_flag.clone();
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                tracing::info!(signal = sig, "received signal, initiating shutdown");
                shutdown_flag_handler.store(true, Ordering::SeqCst);
            }
        });
    }
    #[cfg(windows)]
    {
        let flag = shutdown_flag_handler.clone();
        ctrlc::set_handler(move || {
            tracing::info!("received Ctrl+C, initiating shutdown");
            flag.store(true, Ordering::SeqCst);
        })?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !shutdown_flag.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        })
        .await?;

    tracing::info!("scheduler shut down cleanly");
    Ok(())
}
