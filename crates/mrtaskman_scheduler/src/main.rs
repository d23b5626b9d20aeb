//! MrTaskman scheduler binary.
//!
//! Usage:
//!     mrtaskman-scheduler --bind 127.0.0.1:7475 --database-url sqlite:///path/to/scheduler.sqlite

use std::sync::Arc;

use clap::Parser;
use mrtaskman_scheduler::db::{ensure_schema, SqliteTaskStore};
use mrtaskman_scheduler::timeout::TokioTimeoutQueue;
use mrtaskman_scheduler::{Scheduler, SchedulerArgs};
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SchedulerArgs::parse();
    mrtaskman_logging::init_logging(mrtaskman_logging::LogConfig {
        app_name: "mrtaskman-scheduler",
        verbose: false,
        tui_mode: false,
    })?;

    tracing::info!(bind = %args.bind, database_url = %args.database_url, "starting mrtaskman scheduler");

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&args.database_url)
        .await?;
    ensure_schema(&pool).await?;

    let store: Arc<dyn mrtaskman_scheduler::db::TaskStore> = Arc::new(SqliteTaskStore::new(pool));
    let timeouts = Arc::new(TokioTimeoutQueue::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store, timeouts));

    let app = mrtaskman_scheduler::http::router(scheduler);
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(bind = %args.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
