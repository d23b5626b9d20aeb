//! Wire DTOs for the §6 HTTP contract, shared by the `axum` server binding in
//! `mrtaskman_scheduler::http` and the `reqwest` client binding in
//! `mrtaskman_worker::transport`. Keeping both sides on these types is what
//! keeps the wire format from drifting out from under the core logic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::TaskId;
use crate::task::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub name: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub scheduled_by: Option<String>,
    pub executor_requirements: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub id: TaskId,
    pub kind: String,
}

impl ScheduleResponse {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            kind: "mrtaskman#taskid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequestCapabilities {
    pub executor: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub kind: String,
    pub worker: String,
    pub hostname: String,
    pub capabilities: AssignRequestCapabilities,
}

impl AssignRequest {
    pub fn new(worker: impl Into<String>, hostname: impl Into<String>, executor: Vec<String>) -> Self {
        Self {
            kind: "mrtaskman#assign_request".to_string(),
            worker: worker.into(),
            hostname: hostname.into(),
            capabilities: AssignRequestCapabilities { executor },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub kind: String,
    pub tasks: Vec<Task>,
}

impl TaskAssignment {
    /// Stamps `task_complete_url` (`/tasks/{id}/complete`) before wrapping,
    /// since the worker learns where to upload its result only from the
    /// Assign response.
    pub fn new(task: Option<Task>) -> Self {
        Self {
            kind: "TaskAssignment".to_string(),
            tasks: task
                .into_iter()
                .map(|mut task| {
                    task.task_complete_url = Some(format!("/tasks/{}/complete", task.id));
                    task
                })
                .collect(),
        }
    }
}

/// Multipart form field `task_result` for `{task_complete_url}`. The STDOUT /
/// STDERR bodies travel as separate multipart file fields, not in this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteRequest {
    pub kind: String,
    pub task_id: TaskId,
    pub attempt: i32,
    pub exit_code: i32,
    pub execution_time: f64,
    #[serde(default)]
    pub device_serial_number: Option<String>,
    #[serde(default)]
    pub result_metadata: Option<serde_json::Value>,
}

impl TaskCompleteRequest {
    pub fn new(task_id: TaskId, attempt: i32, exit_code: i32, execution_time: f64) -> Self {
        Self {
            kind: "mrtaskman#task_complete_request".to_string(),
            task_id,
            attempt,
            exit_code,
            execution_time,
            device_serial_number: None,
            result_metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageFileManifestEntry {
    pub form_name: String,
    pub file_destination: String,
    pub file_mode: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageCreateManifest {
    pub name: String,
    pub version: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    pub files: Vec<PackageFileManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// `form-urlencoded` webhook body: `task_id=N`.
pub fn webhook_form_body(task_id: TaskId) -> HashMap<&'static str, String> {
    let mut body = HashMap::new();
    body.insert("task_id", task_id.to_string());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_response_kind_matches_contract() {
        let resp = ScheduleResponse::new(TaskId::from(17));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["kind"], "mrtaskman#taskid");
        assert_eq!(json["id"], 17);
    }

    #[test]
    fn task_assignment_empty_when_no_task() {
        let assignment = TaskAssignment::new(None);
        assert!(assignment.tasks.is_empty());
    }

    #[test]
    fn webhook_body_has_task_id_field() {
        let body = webhook_form_body(TaskId::from(42));
        assert_eq!(body.get("task_id"), Some(&"42".to_string()));
    }
}
