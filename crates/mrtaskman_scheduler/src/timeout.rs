//! The scheduler's delayed-callback timeout protocol (§4.1).
//!
//! A task's timeout fires `task.timeout + SCHEDULER_TIMEOUT_GRACE` after it is
//! assigned. The callback is idempotent: [`TaskStore::apply_timeout`] compares
//! `(state, attempts)` against what it captured at Assign time and is a no-op
//! if the task has since completed or moved to a later attempt.

use std::sync::Arc;
use std::time::Duration;

use mrtaskman_protocol::TaskId;
use tracing::{error, info};

use crate::db::TaskStore;

/// Schedules a one-shot delayed callback per (task, attempt).
pub trait TimeoutScheduler: Send + Sync {
    fn schedule(&self, task_id: TaskId, attempt: i32, after: Duration);
}

/// In-process timeout queue built on `tokio::time::sleep`. Callbacks are lost
/// on process restart -- acceptable for the delayed-callback mechanism the
/// design notes (§9) call out as implementation-defined, since a restarted
/// scheduler re-derives outstanding timeouts from `assigned_time` anyway if
/// a reconciliation pass is added later.
pub struct TokioTimeoutQueue {
    store: Arc<dyn TaskStore>,
}

impl TokioTimeoutQueue {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

impl TimeoutScheduler for TokioTimeoutQueue {
    fn schedule(&self, task_id: TaskId, attempt: i32, after: Duration) {
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(err) = store.apply_timeout(task_id, attempt).await {
                error!(%task_id, attempt, %err, "failed to apply task timeout");
                return;
            }
            info!(%task_id, attempt, "timeout callback fired");
        });
    }
}
