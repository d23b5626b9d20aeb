//! Canonical default values shared across the scheduler and worker.

use std::time::Duration;

/// Default task timeout when `task.timeout` is absent from the config (§4.1).
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default task timeout the worker itself enforces, distinct from the
/// scheduler's default (§4.2 step 4).
pub const DEFAULT_WORKER_TASK_TIMEOUT: Duration = Duration::from_secs(12 * 60);

/// Extra time the scheduler grants beyond `task.timeout` before firing the
/// timeout callback, to cover package install overhead (§4.1).
pub const SCHEDULER_TIMEOUT_GRACE: Duration = Duration::from_secs(3 * 60);

/// How long a worker sleeps between unsuccessful `Assign` polls (§4.2 step 2).
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How long a `.downloading` record is honored before being considered stale (§4.3).
pub const DOWNLOAD_RECORD_TTL: Duration = Duration::from_secs(5 * 60);

/// How long a waiter sleeps before re-checking an in-progress download (§4.3).
pub const DOWNLOAD_WAIT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_SCHEDULER_BIND_ADDR: &str = "127.0.0.1:7475";
pub const DEFAULT_LOW_WATERMARK: f64 = 0.6;
pub const DEFAULT_HIGH_WATERMARK: f64 = 0.8;
