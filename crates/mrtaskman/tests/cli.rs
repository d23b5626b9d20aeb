//! End-to-end CLI scenarios: parse argv into `Command`, run it against a real
//! in-process scheduler, and check the exit-code contract for bad input.

use std::sync::Arc;

use clap::Parser;
use mrtaskman::error::CliError;
use mrtaskman::{run_client_command, Cli};
use mrtaskman_scheduler::db::{ensure_schema, SqliteTaskStore};
use mrtaskman_scheduler::timeout::TokioTimeoutQueue;
use mrtaskman_scheduler::Scheduler;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

async fn spawn_scheduler() -> String {
    let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
    ensure_schema(&pool).await.unwrap();
    let store: Arc<dyn mrtaskman_scheduler::db::TaskStore> = Arc::new(SqliteTaskStore::new(pool));
    let timeouts = Arc::new(TokioTimeoutQueue::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store, timeouts));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mrtaskman_scheduler::http::router(scheduler);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn parse(args: &[&str]) -> mrtaskman::Command {
    let mut argv = vec!["mrtaskman"];
    argv.extend_from_slice(args);
    Cli::parse_from(argv).command
}

#[tokio::test]
async fn schedule_then_get_then_delete_round_trips() {
    let base_url = spawn_scheduler().await;

    run_client_command(parse(&[
        "schedule",
        "--name",
        "build",
        "--executor",
        "linux",
        "--command",
        "echo hi",
        "--scheduler-url",
        &base_url,
    ]))
    .await
    .unwrap();

    run_client_command(parse(&["get", "1", "--scheduler-url", &base_url]))
        .await
        .unwrap();

    run_client_command(parse(&["delete", "1", "--scheduler-url", &base_url]))
        .await
        .unwrap();

    let err = run_client_command(parse(&["get", "1", "--scheduler-url", &base_url]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Http { status: 404, .. }));
    assert_eq!(err.exit_code(), 404);
}

#[tokio::test]
async fn schedule_without_config_or_command_is_invalid_argument() {
    let base_url = spawn_scheduler().await;
    let err = run_client_command(parse(&[
        "schedule",
        "--name",
        "build",
        "--executor",
        "linux",
        "--scheduler-url",
        &base_url,
    ]))
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn package_create_with_a_missing_file_is_a_file_open_error() {
    let base_url = spawn_scheduler().await;
    let manifest_dir = tempfile::tempdir().unwrap();
    let manifest_path = manifest_dir.path().join("manifest.json");
    std::fs::write(
        &manifest_path,
        serde_json::json!({
            "name": "tool",
            "version": 1,
            "files": [{"form_name": "bin", "file_destination": "bin/tool", "file_mode": "755"}],
        })
        .to_string(),
    )
    .unwrap();

    let err = run_client_command(parse(&[
        "package",
        "create",
        "--manifest",
        manifest_path.to_str().unwrap(),
        "--file",
        "bin=/no/such/file",
        "--scheduler-url",
        &base_url,
    ]))
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::FileOpen { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn bad_file_argument_shape_is_invalid_argument() {
    let base_url = spawn_scheduler().await;
    let manifest_dir = tempfile::tempdir().unwrap();
    let manifest_path = manifest_dir.path().join("manifest.json");
    std::fs::write(
        &manifest_path,
        serde_json::json!({"name": "tool", "version": 1, "files": []}).to_string(),
    )
    .unwrap();

    let err = run_client_command(parse(&[
        "package",
        "create",
        "--manifest",
        manifest_path.to_str().unwrap(),
        "--file",
        "not-a-pair",
        "--scheduler-url",
        &base_url,
    ]))
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
}
