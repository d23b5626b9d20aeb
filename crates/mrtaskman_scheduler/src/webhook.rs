//! Best-effort webhook delivery after a task result commits (§4.1, §9).
//!
//! A webhook failure never rolls back the committed result: the task is
//! already COMPLETE by the time this runs, and the caller (the scheduler's
//! `upload_result` path) only logs the outcome.

use mrtaskman_protocol::{http::webhook_form_body, TaskId};
use tracing::warn;

#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Posts `task_id=N` to `url` and logs, but never returns an error --
    /// callers fire this and move on.
    pub async fn notify(&self, url: &str, task_id: TaskId) {
        let body = webhook_form_body(task_id);
        match self.http.post(url).form(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(%task_id, url, status = %resp.status(), "webhook returned non-success status");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%task_id, url, %err, "webhook delivery failed");
            }
        }
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}
