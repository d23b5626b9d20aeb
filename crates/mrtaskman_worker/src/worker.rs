//! The worker's forever loop (§4.2): poll `Assign`, execute the matched
//! task, upload the result, repeat. A single task's failure never stops the
//! loop -- only a clean SIGINT during the poll/sleep phase does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mrtaskman_protocol::capability::first_matching_capability;
use mrtaskman_protocol::{defaults, duration::parse_duration, Task, TaskConfig};
use tracing::{info, warn};

use crate::downloader::HttpPackageDownloader;
use crate::error::{Result, WorkerError};
use crate::executor::{Executor, ShellExecutor};
use crate::transport::{ExecutionReport, SchedulerClient};
use mrtaskman_cache::{PackageCache, PackageCacheConfig};
use mrtaskman_protocol::PackageKey;

pub struct WorkerConfig {
    pub scheduler_url: String,
    pub worker_name: String,
    pub hostname: String,
    pub host_executor_tag: String,
    pub cache_root: std::path::PathBuf,
    pub cache_max_size_bytes: u64,
}

pub struct Worker {
    config: WorkerConfig,
    capabilities: Vec<String>,
    client: SchedulerClient,
    cache: Arc<PackageCache>,
    downloader: HttpPackageDownloader,
    executor: Arc<dyn Executor>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let client = SchedulerClient::new(config.scheduler_url.clone());
        let cache = PackageCache::open(PackageCacheConfig::new(
            config.cache_root.clone(),
            config.cache_max_size_bytes,
        ))
        .map_err(WorkerError::Cache)?;

        let capabilities = crate::capabilities::advertise(&config.host_executor_tag);
        info!(?capabilities, worker = %config.worker_name, "advertising capabilities");

        Ok(Self {
            downloader: HttpPackageDownloader::new(client.clone()),
            cache: Arc::new(cache),
            client,
            capabilities,
            executor: Arc::new(ShellExecutor),
            config,
        })
    }

    /// Runs until a clean SIGINT arrives during the poll/sleep phase.
    pub async fn run(&self) -> Result<()> {
        info!(worker = %self.config.worker_name, hostname = %self.config.hostname, "entering poll loop");
        loop {
            match self
                .client
                .assign(&self.config.worker_name, &self.config.hostname, self.capabilities.clone())
                .await
            {
                Ok(Some(task)) => self.handle_assignment(task).await,
                Ok(None) => {
                    if self.sleep_or_shutdown(defaults::WORKER_POLL_INTERVAL).await {
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "assign request failed, backing off");
                    if self.sleep_or_shutdown(defaults::WORKER_POLL_INTERVAL).await {
                        break;
                    }
                }
            }
        }
        info!("worker stopped");
        Ok(())
    }

    /// Sleeps for `duration`, returning `true` if a SIGINT arrived first.
    async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(%err, "failed to listen for ctrl-c, continuing");
                    return false;
                }
                info!("received SIGINT, exiting cleanly");
                true
            }
        }
    }

    async fn handle_assignment(&self, task: Task) {
        let config = match TaskConfig::parse(&task.config) {
            Ok(config) => config,
            Err(err) => {
                warn!(task_id = %task.id, %err, "task config failed to parse, dropping");
                return;
            }
        };

        if first_matching_capability(&self.capabilities, &task.executor_requirements).is_none() {
            warn!(task_id = %task.id, "no advertised capability matches this task's requirements, dropping");
            return;
        }

        let report = self.execute(&task, &config).await;
        if let Err(err) = self.client.upload_result(&task, report).await {
            warn!(task_id = %task.id, %err, "failed to upload task result");
        }
    }

    /// Runs step 4 of the poll loop. Any failure along the way -- package
    /// install, tmpdir creation, command spawn -- is captured as a failed
    /// result rather than propagated, per the loop's guarantee that a single
    /// task never brings it down.
    async fn execute(&self, task: &Task, config: &TaskConfig) -> ExecutionReport {
        let attempt = task.attempts;
        let device_serial_number = std::env::var("DEVICE_SN").ok();

        match self.execute_inner(config).await {
            Ok(outcome) => ExecutionReport {
                attempt,
                exit_code: outcome.exit_code,
                execution_time: outcome.execution_time,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                device_serial_number,
            },
            Err(err) => {
                warn!(task_id = %task.id, %err, "task attempt failed before it could run");
                ExecutionReport {
                    attempt,
                    exit_code: -1,
                    execution_time: 0.0,
                    stdout: Vec::new(),
                    stderr: err.to_string().into_bytes(),
                    device_serial_number,
                }
            }
        }
    }

    async fn execute_inner(&self, config: &TaskConfig) -> Result<crate::executor::ExecutionOutcome> {
        let tmpdir = tempfile::tempdir()?;

        for package in &config.packages {
            let key = PackageKey::new(package.name.clone(), package.version);
            self.cache
                .copy_to_directory(&key, tmpdir.path(), &self.downloader)
                .await
                .map_err(WorkerError::Cache)?;
        }

        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.extend(config.task.env.clone());

        let timeout = match config.task.timeout.as_deref().map(parse_duration) {
            Some(Ok(duration)) => duration,
            Some(Err(err)) => {
                warn!(%err, "task.timeout failed to parse, using the worker default");
                defaults::DEFAULT_WORKER_TASK_TIMEOUT
            }
            None => defaults::DEFAULT_WORKER_TASK_TIMEOUT,
        };

        let outcome = self
            .executor
            .execute(&config.task.command, tmpdir.path(), &env, timeout)
            .await?;
        Ok(outcome)
    }
}
