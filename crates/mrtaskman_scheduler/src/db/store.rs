//! The scheduler's SQLite-backed task store.
//!
//! Atomic claiming follows the same shape as the original job queue
//! (`SELECT candidate` then `UPDATE ... WHERE id = ? AND state = 'scheduled'`,
//! checking `rows_affected`), generalized from a single FIFO queue to
//! capability-ordered assignment (§4.1).

use async_trait::async_trait;
use chrono::Utc;
use mrtaskman_protocol::{Package, PackageError, Task, TaskId, TaskOutcome, TaskResult, TaskState};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::db::models::{outcome_str, state_str, PackageFileRow, PackageRow, TaskResultRow, TaskRow};
use crate::error::{Result, SchedulerError};

/// What happened to an `UploadResult` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Recorded,
    NotFound,
    TimedOut,
}

/// Abstracts task/package persistence so the HTTP layer and the timeout
/// queue can be tested against a fake without a real database.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn schedule(
        &self,
        name: String,
        config: serde_json::Value,
        scheduled_by: Option<String>,
        requirements: Vec<String>,
        priority: i32,
        max_attempts: i32,
    ) -> Result<TaskId>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>>;
    async fn delete_task(&self, id: TaskId) -> Result<bool>;
    async fn assign(&self, worker: &str, capabilities: &[String]) -> Result<Option<Task>>;

    async fn upload_result(
        &self,
        task_id: TaskId,
        attempt: i32,
        result: TaskResult,
    ) -> Result<UploadOutcome>;

    /// Applies the timeout protocol (§4.1) for `(task_id, attempt)`. A no-op
    /// if the task is gone, its state moved past ASSIGNED, or a newer
    /// attempt is underway.
    async fn apply_timeout(&self, task_id: TaskId, attempt: i32) -> Result<()>;

    /// Deletes up to `limit` SCHEDULED tasks requiring `executor`; returns
    /// how many were deleted.
    async fn delete_scheduled_batch(&self, executor: &str, limit: i64) -> Result<i64>;

    async fn create_package(&self, package: Package) -> Result<()>;
    async fn get_package(&self, name: &str, version: i64) -> Result<Option<Package>>;
    async fn delete_package(&self, name: &str, version: i64) -> Result<bool>;
}

pub struct SqliteTaskStore {
    pool: Pool<Sqlite>,
}

impl SqliteTaskStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn load_result(&self, task_id: i64) -> Result<Option<TaskResult>> {
        let row: Option<TaskResultRow> = sqlx::query_as(
            "SELECT * FROM task_results WHERE task_id = ? ORDER BY attempt DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TaskResultRow::into_result).transpose()
    }

    async fn try_assign_capability(&self, worker: &str, capability: &str) -> Result<Option<Task>> {
        let mut excluded: Vec<i64> = Vec::new();
        loop {
            let mut tx = self.pool.begin().await?;
            let excluded_json = serde_json::to_string(&excluded).expect("Vec<i64> always serializes");

            let candidate: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT t.id FROM tasks t, json_each(t.executor_requirements) je
                WHERE t.state = 'scheduled'
                  AND je.value = ?
                  AND t.id NOT IN (SELECT value FROM json_each(?))
                ORDER BY t.priority DESC, t.id ASC
                LIMIT 1
                "#,
            )
            .bind(capability)
            .bind(&excluded_json)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(task_id) = candidate else {
                tx.commit().await?;
                return Ok(None);
            };

            let now = Utc::now();
            let rows_affected = sqlx::query(
                r#"
                UPDATE tasks
                SET state = 'assigned', assigned_worker = ?, assigned_time = ?, attempts = attempts + 1
                WHERE id = ? AND state = 'scheduled'
                "#,
            )
            .bind(worker)
            .bind(now)
            .bind(task_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                // Lost the race to another Assign; retry against the next candidate.
                tx.commit().await?;
                excluded.push(task_id);
                continue;
            }

            let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
                .bind(task_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(task_id, worker, capability, "assigned task");
            return Ok(Some(row.into_task(None)?));
        }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn schedule(
        &self,
        name: String,
        config: serde_json::Value,
        scheduled_by: Option<String>,
        requirements: Vec<String>,
        priority: i32,
        max_attempts: i32,
    ) -> Result<TaskId> {
        if requirements.is_empty() {
            return Err(SchedulerError::InvalidRequest(
                "requirements must be a non-empty list".to_string(),
            ));
        }
        let config_str = serde_json::to_string(&config).expect("serde_json::Value always serializes");
        let requirements_str = serde_json::to_string(&requirements).expect("Vec<String> always serializes");
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tasks
                (name, config, scheduled_by, scheduled_time, state, attempts, max_attempts, executor_requirements, priority)
            VALUES (?, ?, ?, ?, 'scheduled', 0, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(config_str)
        .bind(scheduled_by)
        .bind(now)
        .bind(max_attempts as i64)
        .bind(requirements_str)
        .bind(priority as i64)
        .fetch_one(&self.pool)
        .await?;

        info!(task_id = id, name = %name, "scheduled task");
        Ok(TaskId::new(id))
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let result = if row.state()? == TaskState::Complete {
            self.load_result(row.id).await?
        } else {
            None
        };
        Ok(Some(row.into_task(result)?))
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let rows_affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }

    async fn assign(&self, worker: &str, capabilities: &[String]) -> Result<Option<Task>> {
        for capability in capabilities {
            if let Some(task) = self.try_assign_capability(worker, capability).await? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    async fn upload_result(
        &self,
        task_id: TaskId,
        attempt: i32,
        result: TaskResult,
    ) -> Result<UploadOutcome> {
        let mut tx = self.pool.begin().await?;

        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(UploadOutcome::NotFound);
        };

        let state = row.state()?;
        if row.attempts != attempt as i64 || !matches!(state, TaskState::Assigned | TaskState::Scheduled) {
            tx.commit().await?;
            return Ok(UploadOutcome::TimedOut);
        }

        let outcome = if result.exit_code == 0 {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed
        };
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO task_results
                (task_id, attempt, exit_code, execution_time, stdout_ref, stderr_ref, stdout_url, stderr_url, device_serial_number, result_metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task_id.as_i64())
        .bind(attempt as i64)
        .bind(result.exit_code as i64)
        .bind(result.execution_time)
        .bind(&result.stdout_ref)
        .bind(&result.stderr_ref)
        .bind(&result.stdout_url)
        .bind(&result.stderr_url)
        .bind(&result.device_serial_number)
        .bind(result.result_metadata.as_ref().map(|v| v.to_string()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE tasks SET state = 'complete', outcome = ?, completed_time = ? WHERE id = ?
            "#,
        )
        .bind(outcome_str(outcome))
        .bind(now)
        .bind(task_id.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(task_id = task_id.as_i64(), attempt, outcome = %outcome, "recorded task result");
        Ok(UploadOutcome::Recorded)
    }

    async fn apply_timeout(&self, task_id: TaskId, attempt: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(());
        };

        if row.state()? != TaskState::Assigned || row.attempts != attempt as i64 {
            tx.commit().await?;
            return Ok(());
        }

        if row.attempts >= row.max_attempts {
            sqlx::query("UPDATE tasks SET state = 'complete', outcome = 'timed_out', completed_time = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(task_id.as_i64())
                .execute(&mut *tx)
                .await?;
            info!(task_id = task_id.as_i64(), attempt, "task timed out, attempts exhausted");
        } else {
            sqlx::query("UPDATE tasks SET state = 'scheduled' WHERE id = ?")
                .bind(task_id.as_i64())
                .execute(&mut *tx)
                .await?;
            info!(task_id = task_id.as_i64(), attempt, "reclaimed timed-out task for reassignment");
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_scheduled_batch(&self, executor: &str, limit: i64) -> Result<i64> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT t.id FROM tasks t, json_each(t.executor_requirements) je
            WHERE t.state = 'scheduled' AND je.value = ?
            LIMIT ?
            "#,
        )
        .bind(executor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if ids.is_empty() {
            return Ok(0);
        }

        let ids_json = serde_json::to_string(&ids).expect("Vec<i64> always serializes");
        let deleted = sqlx::query("DELETE FROM tasks WHERE id IN (SELECT value FROM json_each(?))")
            .bind(ids_json)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted as i64)
    }

    async fn create_package(&self, package: Package) -> Result<()> {
        mrtaskman_protocol::validate_package_identity(&package.name, package.version)?;
        for file in &package.files {
            file.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let existing: Option<i64> = sqlx::query_scalar("SELECT 1 FROM packages WHERE name = ? AND version = ?")
            .bind(&package.name)
            .bind(package.version)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(PackageError::AlreadyExists(package.name, package.version).into());
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO packages (name, version, created_by, created_time, modified_time) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&package.name)
        .bind(package.version)
        .bind(&package.created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for file in &package.files {
            sqlx::query(
                r#"
                INSERT INTO package_files (name, version, destination_path, file_mode, download_url, blob_ref)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&package.name)
            .bind(package.version)
            .bind(&file.destination_path)
            .bind(&file.file_mode)
            .bind(&file.download_url)
            .bind(&file.blob_ref)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_package(&self, name: &str, version: i64) -> Result<Option<Package>> {
        let row: Option<PackageRow> = sqlx::query_as("SELECT * FROM packages WHERE name = ? AND version = ?")
            .bind(name)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let files: Vec<PackageFileRow> =
            sqlx::query_as("SELECT * FROM package_files WHERE name = ? AND version = ?")
                .bind(name)
                .bind(version)
                .fetch_all(&self.pool)
                .await?;
        Ok(Some(row.into_package(files)))
    }

    async fn delete_package(&self, name: &str, version: i64) -> Result<bool> {
        let rows_affected = sqlx::query("DELETE FROM packages WHERE name = ? AND version = ?")
            .bind(name)
            .bind(version)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}
