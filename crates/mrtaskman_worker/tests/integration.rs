//! End-to-end worker scenarios against a real in-process scheduler: assign,
//! run a shell command, upload the result, and confirm the scheduler's view
//! settles on the expected outcome.

use std::sync::Arc;

use mrtaskman_protocol::http::ScheduleRequest;
use mrtaskman_protocol::{TaskOutcome, TaskState};
use mrtaskman_scheduler::db::{ensure_schema, SqliteTaskStore, TaskStore};
use mrtaskman_scheduler::timeout::TokioTimeoutQueue;
use mrtaskman_scheduler::Scheduler;
use mrtaskman_worker::executor::{Executor, ShellExecutor};
use mrtaskman_worker::transport::SchedulerClient;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

async fn spawn_scheduler() -> String {
    let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
    ensure_schema(&pool).await.unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(pool));
    let timeouts = Arc::new(TokioTimeoutQueue::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store, timeouts));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mrtaskman_scheduler::http::router(scheduler);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn schedule_request(name: &str, command: &str, executor: &str) -> ScheduleRequest {
    ScheduleRequest {
        name: name.to_string(),
        config: serde_json::json!({
            "task": {
                "name": name,
                "requirements": {"executor": [executor]},
                "command": command,
            },
        }),
        scheduled_by: None,
        executor_requirements: vec![executor.to_string()],
        priority: 0,
    }
}

#[tokio::test]
async fn worker_runs_assigned_task_and_scheduler_sees_success() {
    let base_url = spawn_scheduler().await;
    let client = reqwest::Client::new();

    let response: serde_json::Value = client
        .post(format!("{base_url}/tasks/schedule"))
        .json(&schedule_request("greet", "echo hello-worker", "linux"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = response["id"].as_i64().unwrap();

    let scheduler_client = SchedulerClient::new(base_url.clone());
    let task = scheduler_client
        .assign("worker-1", "test-host", vec!["linux".to_string()])
        .await
        .unwrap()
        .expect("a matching task should be assigned");
    assert_eq!(task.id.as_i64(), task_id);
    assert_eq!(task.state, TaskState::Assigned);

    let tmp = tempfile::tempdir().unwrap();
    let outcome = ShellExecutor
        .execute(
            "echo hello-worker",
            tmp.path(),
            &Default::default(),
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(outcome.exit_code, 0);

    let report = mrtaskman_worker::transport::ExecutionReport {
        attempt: task.attempts,
        exit_code: outcome.exit_code,
        execution_time: outcome.execution_time,
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        device_serial_number: None,
    };
    scheduler_client.upload_result(&task, report).await.unwrap();

    let fetched: serde_json::Value = client
        .get(format!("{base_url}/tasks/{task_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["state"], "complete");
    assert_eq!(fetched["outcome"], "success");
}

#[tokio::test]
async fn assign_returns_none_when_no_capability_matches() {
    let base_url = spawn_scheduler().await;
    let client = reqwest::Client::new();
    client
        .post(format!("{base_url}/tasks/schedule"))
        .json(&schedule_request("build", "echo hi", "macos"))
        .send()
        .await
        .unwrap();

    let scheduler_client = SchedulerClient::new(base_url);
    let assigned = scheduler_client
        .assign("worker-1", "test-host", vec!["linux".to_string()])
        .await
        .unwrap();
    assert!(assigned.is_none());
}

#[tokio::test]
async fn failed_command_is_reported_as_a_nonzero_exit_without_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let outcome = ShellExecutor
        .execute(
            "exit 3",
            tmp.path(),
            &Default::default(),
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(outcome.exit_code, 3);
    assert!(!outcome.timed_out);
}

#[tokio::test]
async fn outcome_verified_directly_against_the_store() {
    let base_url = spawn_scheduler().await;
    let client = reqwest::Client::new();
    let response: serde_json::Value = client
        .post(format!("{base_url}/tasks/schedule"))
        .json(&schedule_request("t", "echo hi", "linux"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = response["id"].as_i64().unwrap();

    let deleted = client
        .delete(format!("{base_url}/tasks/{task_id}"))
        .send()
        .await
        .unwrap();
    assert!(deleted.status().is_success());

    let missing = client.get(format!("{base_url}/tasks/{task_id}")).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
