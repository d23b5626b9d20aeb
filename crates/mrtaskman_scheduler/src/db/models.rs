//! sqlx row types for the scheduler's SQLite store.
//!
//! The wire-facing [`mrtaskman_protocol::Task`] is the contract every other
//! crate builds against; these `FromRow` structs are the storage-facing
//! shape, with `executor_requirements` and `config` flattened to TEXT
//! columns the way the original kept `config` as an opaque string (§9).

use chrono::{DateTime, Utc};
use mrtaskman_protocol::{Package, PackageFile, Task, TaskId, TaskOutcome, TaskResult, TaskState};
use sqlx::FromRow;

use crate::error::SchedulerError;

#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub name: String,
    pub config: String,
    pub scheduled_by: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub state: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub executor_requirements: String,
    pub priority: i64,
    pub assigned_time: Option<DateTime<Utc>>,
    pub assigned_worker: Option<String>,
    pub completed_time: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
}

impl TaskRow {
    pub fn state(&self) -> Result<TaskState, SchedulerError> {
        parse_state(&self.state)
    }

    pub fn requirements(&self) -> Result<Vec<String>, SchedulerError> {
        serde_json::from_str(&self.executor_requirements)
            .map_err(|source| SchedulerError::CorruptRow {
                reason: format!("executor_requirements for task {}: {source}", self.id),
            })
    }

    pub fn into_task(self, result: Option<TaskResult>) -> Result<Task, SchedulerError> {
        let state = self.state()?;
        let requirements = self.requirements()?;
        let config = serde_json::from_str(&self.config).map_err(|source| SchedulerError::CorruptRow {
            reason: format!("config for task {}: {source}", self.id),
        })?;
        let outcome = self
            .outcome
            .as_deref()
            .map(parse_outcome)
            .transpose()?;
        Ok(Task {
            id: TaskId::new(self.id),
            name: self.name,
            config,
            scheduled_by: self.scheduled_by,
            scheduled_time: self.scheduled_time,
            state,
            attempts: self.attempts as i32,
            max_attempts: self.max_attempts as i32,
            executor_requirements: requirements,
            priority: self.priority as i32,
            assigned_time: self.assigned_time,
            assigned_worker: self.assigned_worker,
            completed_time: self.completed_time,
            outcome,
            result,
            task_complete_url: None,
        })
    }
}

fn parse_state(raw: &str) -> Result<TaskState, SchedulerError> {
    match raw {
        "scheduled" => Ok(TaskState::Scheduled),
        "assigned" => Ok(TaskState::Assigned),
        "complete" => Ok(TaskState::Complete),
        other => Err(SchedulerError::CorruptRow {
            reason: format!("unknown task state {other:?}"),
        }),
    }
}

pub fn state_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Scheduled => "scheduled",
        TaskState::Assigned => "assigned",
        TaskState::Complete => "complete",
    }
}

fn parse_outcome(raw: &str) -> Result<TaskOutcome, SchedulerError> {
    match raw {
        "success" => Ok(TaskOutcome::Success),
        "failed" => Ok(TaskOutcome::Failed),
        "timed_out" => Ok(TaskOutcome::TimedOut),
        other => Err(SchedulerError::CorruptRow {
            reason: format!("unknown task outcome {other:?}"),
        }),
    }
}

pub fn outcome_str(outcome: TaskOutcome) -> &'static str {
    match outcome {
        TaskOutcome::Success => "success",
        TaskOutcome::Failed => "failed",
        TaskOutcome::TimedOut => "timed_out",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskResultRow {
    pub task_id: i64,
    pub attempt: i64,
    pub exit_code: i64,
    pub execution_time: f64,
    pub stdout_ref: Option<String>,
    pub stderr_ref: Option<String>,
    pub stdout_url: Option<String>,
    pub stderr_url: String,
    pub device_serial_number: Option<String>,
    pub result_metadata: Option<String>,
}

impl TaskResultRow {
    pub fn into_result(self) -> Result<TaskResult, SchedulerError> {
        let result_metadata = self
            .result_metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|source| SchedulerError::CorruptRow {
                reason: format!("result_metadata for task {}: {source}", self.task_id),
            })?;
        Ok(TaskResult {
            task_id: TaskId::new(self.task_id),
            attempt: self.attempt as i32,
            exit_code: self.exit_code as i32,
            execution_time: self.execution_time,
            stdout_ref: self.stdout_ref,
            stderr_ref: self.stderr_ref,
            stdout_url: self.stdout_url,
            stderr_url: self.stderr_url,
            device_serial_number: self.device_serial_number,
            result_metadata,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PackageRow {
    pub name: String,
    pub version: i64,
    pub created_by: Option<String>,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PackageFileRow {
    pub name: String,
    pub version: i64,
    pub destination_path: String,
    pub file_mode: String,
    pub download_url: Option<String>,
    pub blob_ref: Option<String>,
}

impl PackageRow {
    pub fn into_package(self, files: Vec<PackageFileRow>) -> Package {
        Package {
            name: self.name,
            version: self.version,
            created_by: self.created_by,
            created_time: self.created_time,
            modified_time: self.modified_time,
            files: files.into_iter().map(PackageFileRow::into_file).collect(),
        }
    }
}

impl PackageFileRow {
    pub fn into_file(self) -> PackageFile {
        PackageFile {
            destination_path: self.destination_path,
            file_mode: self.file_mode,
            download_url: self.download_url,
            blob_ref: self.blob_ref,
        }
    }
}
