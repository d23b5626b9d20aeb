//! The worker's HTTP binding to the scheduler's §6 API: `Assign` polling and
//! the multipart result upload. Shares its DTOs with
//! `mrtaskman_scheduler::http` via `mrtaskman_protocol::http`.

use mrtaskman_protocol::http::{AssignRequest, TaskAssignment, TaskCompleteRequest};
use mrtaskman_protocol::{Package, Task};

use crate::error::Result;

/// What a worker learned about one attempt at running a task.
pub struct ExecutionReport {
    pub attempt: i32,
    pub exit_code: i32,
    pub execution_time: f64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub device_serial_number: Option<String>,
}

#[derive(Clone)]
pub struct SchedulerClient {
    http: reqwest::Client,
    base_url: String,
}

impl SchedulerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `PUT /tasks/assign`. Returns `None` on a null assignment (nothing
    /// scheduled matches the worker's capabilities right now).
    pub async fn assign(&self, worker: &str, hostname: &str, capabilities: Vec<String>) -> Result<Option<Task>> {
        let request = AssignRequest::new(worker, hostname, capabilities);
        let response = self
            .http
            .put(format!("{}/tasks/assign", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let assignment: TaskAssignment = response.json().await?;
        Ok(assignment.tasks.into_iter().next())
    }

    /// `POST {task_complete_url}`: a multipart form with `task_result` (JSON)
    /// plus `STDOUT`/`STDERR` file fields (§6).
    pub async fn upload_result(&self, task: &Task, report: ExecutionReport) -> Result<()> {
        let url = task
            .task_complete_url
            .clone()
            .unwrap_or_else(|| format!("/tasks/{}/complete", task.id));

        let mut body = TaskCompleteRequest::new(
            task.id,
            report.attempt,
            report.exit_code,
            report.execution_time,
        );
        body.device_serial_number = report.device_serial_number;

        let form = reqwest::multipart::Form::new()
            .text("task_result", serde_json::to_string(&body)?)
            .part(
                "STDOUT",
                reqwest::multipart::Part::bytes(report.stdout).file_name("stdout"),
            )
            .part(
                "STDERR",
                reqwest::multipart::Part::bytes(report.stderr).file_name("stderr"),
            );

        self.http
            .post(format!("{}{}", self.base_url, url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `GET /packages/{name}.{version}`: used by the package downloader to
    /// resolve a package's file manifest before fetching each file.
    pub async fn get_package(&self, name: &str, version: i64) -> Result<Package> {
        let response = self
            .http
            .get(format!("{}/packages/{}.{}", self.base_url, name, version))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetches one file's bytes from its `download_url`. Packages whose
    /// files only carry a `blob_ref` (no external URL) cannot be installed by
    /// this worker since the blob store is out of scope (§9 Non-goals).
    pub async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.http.get(url).send().await?.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
