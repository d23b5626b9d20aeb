//! MrTaskman CLI: one binary fronting every role in the system -- the
//! scheduler daemon (`serve`), a worker node (`worker`), and the thin HTTP
//! client commands (`schedule`/`get`/`delete`/`package ...`) described in §6.

pub mod client;
pub mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mrtaskman_protocol::http::{PackageCreateManifest, ScheduleRequest};
use mrtaskman_protocol::TaskId;

use client::CliClient;
use error::{CliError, Result};

#[derive(Parser, Debug)]
#[command(name = "mrtaskman", about = "MrTaskman: schedule, inspect, and run distributed tasks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler HTTP server.
    Serve {
        #[arg(long, default_value_t = mrtaskman_protocol::defaults::DEFAULT_SCHEDULER_BIND_ADDR.to_string())]
        bind: String,
        #[arg(long, default_value_t = sqlite_default_url())]
        database_url: String,
    },
    /// Run a worker node's poll/execute/report loop.
    Worker {
        #[arg(long, default_value_t = format!("http://{}", mrtaskman_protocol::defaults::DEFAULT_SCHEDULER_BIND_ADDR))]
        scheduler_url: String,
        #[arg(long)]
        worker_name: Option<String>,
        #[arg(long, default_value_os_t = mrtaskman_protocol::paths::default_cache_root())]
        cache_root: PathBuf,
        #[arg(long, default_value_t = 10 * 1024 * 1024 * 1024)]
        cache_max_size_bytes: u64,
    },
    /// Schedule a task.
    Schedule {
        #[arg(long)]
        name: String,
        /// Ordered capability tokens a worker must satisfy; at least one is required.
        #[arg(long = "executor")]
        executor: Vec<String>,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Path to a full task config JSON document. Mutually exclusive with `--command`.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Shell command to run; builds a minimal config when `--config` is absent.
        #[arg(long)]
        command: Option<String>,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
    /// Fetch a task by id.
    Get {
        id: i64,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
    /// Delete a task by id.
    Delete {
        id: i64,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
    /// Package registry commands.
    Package {
        #[command(subcommand)]
        command: PackageCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PackageCommand {
    /// Create a package from a manifest JSON file and its referenced files.
    Create {
        /// Manifest JSON: `{name, version, files:[{form_name, file_destination, file_mode, url?}]}`.
        #[arg(long)]
        manifest: PathBuf,
        /// `form_name=path` pairs for every manifest file entry without a `url`.
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
    Get {
        name: String,
        version: i64,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
    Delete {
        name: String,
        version: i64,
        #[arg(long, default_value_t = default_scheduler_url())]
        scheduler_url: String,
    },
}

fn default_scheduler_url() -> String {
    format!("http://{}", mrtaskman_protocol::defaults::DEFAULT_SCHEDULER_BIND_ADDR)
}

fn sqlite_default_url() -> String {
    format!("sqlite://{}", mrtaskman_protocol::paths::default_state_store_path().display())
}

/// Builds the config JSON for `schedule` from either `--config` or the
/// `--name`/`--executor`/`--command` shorthand.
fn resolve_schedule_config(
    name: &str,
    executor: &[String],
    config_path: &Option<PathBuf>,
    command: &Option<String>,
) -> Result<serde_json::Value> {
    match (config_path, command) {
        (Some(_), Some(_)) => Err(CliError::InvalidArgument(
            "--config and --command are mutually exclusive".to_string(),
        )),
        (Some(path), None) => {
            let raw = std::fs::read_to_string(path).map_err(|source| CliError::FileOpen {
                path: path.clone(),
                source,
            })?;
            Ok(serde_json::from_str(&raw)?)
        }
        (None, Some(command)) => {
            if executor.is_empty() {
                return Err(CliError::InvalidArgument(
                    "--executor must be given at least once".to_string(),
                ));
            }
            Ok(serde_json::json!({
                "task": {
                    "name": name,
                    "requirements": {"executor": executor},
                    "command": command,
                },
            }))
        }
        (None, None) => Err(CliError::InvalidArgument(
            "one of --config or --command is required".to_string(),
        )),
    }
}

/// Runs a parsed `Cli` value's client-facing subcommands (everything except
/// `serve`/`worker`, which are long-running daemons handled in `main`).
/// Prints JSON results to stdout; returns the error the caller should map to
/// an exit code.
pub async fn run_client_command(command: Command) -> Result<()> {
    match command {
        Command::Schedule {
            name,
            executor,
            priority,
            config,
            command,
            scheduler_url,
        } => {
            if name.trim().is_empty() {
                return Err(CliError::InvalidArgument("--name must not be empty".to_string()));
            }
            let config_json = resolve_schedule_config(&name, &executor, &config, &command)?;
            let executor_requirements = if executor.is_empty() {
                config_json["task"]["requirements"]["executor"]
                    .as_array()
                    .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default()
            } else {
                executor
            };
            if executor_requirements.is_empty() {
                return Err(CliError::InvalidArgument(
                    "task.requirements.executor must be non-empty".to_string(),
                ));
            }

            let client = CliClient::new(scheduler_url);
            let response = client
                .schedule(&ScheduleRequest {
                    name,
                    config: config_json,
                    scheduled_by: None,
                    executor_requirements,
                    priority,
                })
                .await?;
            print_json(&response);
        }
        Command::Get { id, scheduler_url } => {
            let client = CliClient::new(scheduler_url);
            let task = client.get_task(TaskId::new(id)).await?;
            print_json(&task);
        }
        Command::Delete { id, scheduler_url } => {
            let client = CliClient::new(scheduler_url);
            client.delete_task(TaskId::new(id)).await?;
            println!("deleted task {id}");
        }
        Command::Package { command } => run_package_command(command).await?,
        Command::Serve { .. } | Command::Worker { .. } => {
            unreachable!("serve/worker are dispatched directly by main, not run_client_command")
        }
    }
    Ok(())
}

async fn run_package_command(command: PackageCommand) -> Result<()> {
    match command {
        PackageCommand::Create {
            manifest,
            files,
            scheduler_url,
        } => {
            let raw = std::fs::read_to_string(&manifest).map_err(|source| CliError::FileOpen {
                path: manifest.clone(),
                source,
            })?;
            let manifest: PackageCreateManifest = serde_json::from_str(&raw)?;

            let mut file_paths = Vec::new();
            for entry in &files {
                let Some((form_name, path)) = entry.split_once('=') else {
                    return Err(CliError::InvalidArgument(format!(
                        "--file must be `form_name=path`, got '{entry}'"
                    )));
                };
                file_paths.push((form_name.to_string(), PathBuf::from(path)));
            }

            let client = CliClient::new(scheduler_url);
            let response = client.create_package(manifest, &file_paths).await?;
            print_json(&response);
        }
        PackageCommand::Get {
            name,
            version,
            scheduler_url,
        } => {
            let client = CliClient::new(scheduler_url);
            let package = client.get_package(&name, version).await?;
            print_json(&package);
        }
        PackageCommand::Delete {
            name,
            version,
            scheduler_url,
        } => {
            let client = CliClient::new(scheduler_url);
            client.delete_package(&name, version).await?;
            println!("deleted package {name}.{version}");
        }
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to format response as JSON: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_shorthand_builds_a_minimal_config() {
        let config = resolve_schedule_config(
            "build",
            &["macos".to_string()],
            &None,
            &Some("echo hi".to_string()),
        )
        .unwrap();
        assert_eq!(config["task"]["name"], "build");
        assert_eq!(config["task"]["command"], "echo hi");
    }

    #[test]
    fn config_and_command_together_is_rejected() {
        let err = resolve_schedule_config(
            "build",
            &["macos".to_string()],
            &Some(PathBuf::from("/dev/null")),
            &Some("echo hi".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn neither_config_nor_command_is_rejected() {
        let err = resolve_schedule_config("build", &[], &None, &None).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn command_shorthand_requires_an_executor() {
        let err = resolve_schedule_config("build", &[], &None, &Some("echo hi".to_string())).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
