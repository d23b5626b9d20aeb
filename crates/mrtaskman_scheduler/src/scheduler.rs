//! The public scheduler API (§4.1): orchestrates [`TaskStore`], the timeout
//! queue, and best-effort webhook delivery into the operations the HTTP
//! layer and CLI expose.

use std::sync::Arc;

use mrtaskman_protocol::{
    defaults, duration::parse_duration, http::ScheduleRequest, Package, Task, TaskConfig, TaskId, TaskResult,
    DEFAULT_MAX_ATTEMPTS,
};
use tracing::warn;

use crate::db::{TaskStore, UploadOutcome};
use crate::error::Result;
use crate::timeout::TimeoutScheduler;
use crate::webhook::WebhookClient;

pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    timeouts: Arc<dyn TimeoutScheduler>,
    webhooks: WebhookClient,
}

impl Scheduler {
    pub fn new(store: Arc<dyn TaskStore>, timeouts: Arc<dyn TimeoutScheduler>) -> Self {
        Self {
            store,
            timeouts,
            webhooks: WebhookClient::new(),
        }
    }

    pub async fn schedule(&self, request: ScheduleRequest) -> Result<TaskId> {
        let max_attempts = TaskConfig::parse(&request.config)
            .ok()
            .and_then(|c| c.task.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        self.store
            .schedule(
                request.name,
                request.config,
                request.scheduled_by,
                request.executor_requirements,
                request.priority,
                max_attempts,
            )
            .await
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.store.get_task(id).await
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<bool> {
        self.store.delete_task(id).await
    }

    /// Assigns the next matching task and arms its timeout callback. The
    /// timeout fires at `task.timeout` (default 15m) plus a 3m grace period
    /// (§4.1).
    pub async fn assign(&self, worker: &str, capabilities: &[String]) -> Result<Option<Task>> {
        let Some(task) = self.store.assign(worker, capabilities).await? else {
            return Ok(None);
        };

        let timeout = TaskConfig::parse(&task.config)
            .ok()
            .and_then(|c| c.task.timeout)
            .and_then(|raw| parse_duration(&raw).ok())
            .unwrap_or(defaults::DEFAULT_TASK_TIMEOUT);

        self.timeouts
            .schedule(task.id, task.attempts, timeout + defaults::SCHEDULER_TIMEOUT_GRACE);

        Ok(Some(task))
    }

    /// Records a task result. On success, fires the task's webhook (if
    /// configured) in the background -- delivery never blocks the caller
    /// and never undoes the commit.
    pub async fn upload_result(
        &self,
        task_id: TaskId,
        attempt: i32,
        result: TaskResult,
    ) -> Result<UploadOutcome> {
        let outcome = self.store.upload_result(task_id, attempt, result).await?;

        if outcome == UploadOutcome::Recorded {
            let webhook_url = self
                .store
                .get_task(task_id)
                .await?
                .and_then(|task| TaskConfig::parse(&task.config).ok())
                .and_then(|config| config.task.webhook);

            if let Some(webhook_url) = webhook_url {
                let webhooks = self.webhooks.clone();
                tokio::spawn(async move {
                    webhooks.notify(&webhook_url, task_id).await;
                });
            }
        }

        Ok(outcome)
    }

    /// Deletes up to 1000 SCHEDULED tasks requiring `executor` at a time
    /// until none remain (§4.1's "background sweep").
    pub async fn delete_by_executor(&self, executor: &str) -> Result<i64> {
        let mut total = 0;
        loop {
            let deleted = self.store.delete_scheduled_batch(executor, 1000).await?;
            total += deleted;
            if deleted == 0 {
                break;
            }
        }
        if total > 0 {
            warn!(executor, total, "swept scheduled tasks by executor requirement");
        }
        Ok(total)
    }

    pub async fn create_package(&self, package: Package) -> Result<()> {
        self.store.create_package(package).await
    }

    pub async fn get_package(&self, name: &str, version: i64) -> Result<Option<Package>> {
        self.store.get_package(name, version).await
    }

    pub async fn delete_package(&self, name: &str, version: i64) -> Result<bool> {
        self.store.delete_package(name, version).await
    }
}
