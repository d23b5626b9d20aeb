//! Task, TaskResult, and the states/outcomes that drive the scheduler's state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::TaskId;

/// Where a Task sits in its lifecycle: SCHEDULED -> ASSIGNED -> COMPLETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Scheduled,
    Assigned,
    Complete,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Assigned => "assigned",
            TaskState::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

/// How a COMPLETE Task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Failed,
    TimedOut,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Failed => "failed",
            TaskOutcome::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// Default number of times a task may be attempted before it is marked TIMED_OUT.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// MrTaskman's representation of a Task: metadata plus an opaque worker-interpreted
/// `config` blob. The server only ever inspects `config.task.name` and
/// `config.task.requirements.executor`; every other key is the worker's contract
/// (see `mrtaskman_protocol::task_config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Opaque JSON the worker interprets. The server never parses beyond
    /// `task.name` / `task.requirements.executor` at Schedule time.
    pub config: serde_json::Value,
    pub scheduled_by: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub state: TaskState,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Non-empty ordered list of capability tokens a worker must satisfy.
    pub executor_requirements: Vec<String>,
    pub priority: i32,
    pub assigned_time: Option<DateTime<Utc>>,
    pub assigned_worker: Option<String>,
    pub completed_time: Option<DateTime<Utc>>,
    pub outcome: Option<TaskOutcome>,
    pub result: Option<TaskResult>,
    /// Where the worker uploads its result. Computed from `id` at response
    /// time (`/tasks/{id}/complete`); never persisted.
    #[serde(default)]
    pub task_complete_url: Option<String>,
}

impl Task {
    /// A SCHEDULED task has no assigned_worker, no result. Checked in tests and
    /// at construction boundaries -- the scheduler enforces the rest of the
    /// state machine's invariants transactionally.
    pub fn is_freshly_scheduled(&self) -> bool {
        self.state == TaskState::Scheduled
            && self.assigned_worker.is_none()
            && self.result.is_none()
    }
}

/// Result of one attempt at executing a Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub attempt: i32,
    pub exit_code: i32,
    pub execution_time: f64,
    pub stdout_ref: Option<String>,
    pub stderr_ref: Option<String>,
    /// Optional: a worker may omit this if nothing was written to stdout.
    pub stdout_url: Option<String>,
    /// Required: a worker always captures a stderr stream, even if empty.
    /// See DESIGN.md for why this is the opposite of stdout's optionality.
    pub stderr_url: String,
    pub device_serial_number: Option<String>,
    pub result_metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: TaskId::from(1),
            name: "t1".to_string(),
            config: serde_json::json!({}),
            scheduled_by: None,
            scheduled_time: Utc::now(),
            state: TaskState::Scheduled,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            executor_requirements: vec!["macos".to_string()],
            priority: 0,
            assigned_time: None,
            assigned_worker: None,
            completed_time: None,
            outcome: None,
            result: None,
            task_complete_url: None,
        }
    }

    #[test]
    fn freshly_scheduled_has_no_worker_or_result() {
        assert!(sample_task().is_freshly_scheduled());
    }

    #[test]
    fn assigned_task_is_not_freshly_scheduled() {
        let mut task = sample_task();
        task.state = TaskState::Assigned;
        task.assigned_worker = Some("w1".to_string());
        assert!(!task.is_freshly_scheduled());
    }

    #[test]
    fn state_display_matches_wire_format() {
        assert_eq!(TaskState::Scheduled.to_string(), "scheduled");
        assert_eq!(TaskOutcome::TimedOut.to_string(), "timed_out");
    }
}
