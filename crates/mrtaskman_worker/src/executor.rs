//! Shell command execution (§4.2 step 4): runs `task.command` with its
//! working directory, environment, and timeout, capturing stdout/stderr and
//! the measured wall time.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

/// The outcome of running one task attempt. `exit_code` is synthesized (not
/// a real process exit code) when the command is killed for exceeding its
/// deadline.
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub execution_time: f64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

/// Exit code recorded when a command is killed for exceeding its deadline.
/// The original shell convention for "terminated by signal N" is `128 + N`;
/// SIGKILL is 9.
const TIMEOUT_EXIT_CODE: i32 = 137;

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        env: &std::collections::HashMap<String, String>,
        timeout: Duration,
    ) -> std::io::Result<ExecutionOutcome>;
}

/// Runs `command` via `sh -c` (`cmd /C` on Windows), the way the original
/// worker's task commands are shell strings rather than argv vectors.
pub struct ShellExecutor;

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        env: &std::collections::HashMap<String, String>,
        timeout: Duration,
    ) -> std::io::Result<ExecutionOutcome> {
        let mut cmd = shell_command(command);
        cmd.current_dir(working_dir)
            .envs(env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd.spawn()?;
        let mut stdout_pipe = child.stdout.take().expect("stdout configured as piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr configured as piped");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let run = async {
            let (_, _, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
                child.wait(),
            );
            status
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(status) => {
                let status = status?;
                Ok(ExecutionOutcome {
                    exit_code: status.code().unwrap_or(TIMEOUT_EXIT_CODE),
                    execution_time: start.elapsed().as_secs_f64(),
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(?timeout, "task exceeded its deadline, killing child");
                let _ = child.kill().await;
                Ok(ExecutionOutcome {
                    exit_code: TIMEOUT_EXIT_CODE,
                    execution_time: start.elapsed().as_secs_f64(),
                    stdout,
                    stderr,
                    timed_out: true,
                })
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
