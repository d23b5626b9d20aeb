//! The worker-side contract embedded in `Task::config`.
//!
//! The server only ever looks at `task.name` and `task.requirements.executor`
//! (see §9 of the design notes: "the server must not add schema coupling to
//! worker-only knobs like `env` or `webhook`"). Everything else here is parsed
//! exclusively by `mrtaskman_worker`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequirements {
    /// Non-empty, ordered: the worker picks the first tag it implements.
    pub executor: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub requirements: TaskRequirements,
    pub command: String,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub webhook: Option<String>,
    /// Overrides `DEFAULT_MAX_ATTEMPTS` at Schedule time; absent means the default.
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task: TaskSpec,
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    #[serde(default)]
    pub files: Vec<StagedFile>,
}

#[derive(Debug, Error)]
pub enum TaskConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task.name is required")]
    MissingName,
    #[error("task.requirements.executor must be a non-empty list")]
    EmptyExecutorRequirements,
}

impl TaskConfig {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, TaskConfigError> {
        let config: TaskConfig = serde_json::from_value(raw.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TaskConfigError> {
        if self.task.name.trim().is_empty() {
            return Err(TaskConfigError::MissingName);
        }
        if self.task.requirements.executor.is_empty() {
            return Err(TaskConfigError::EmptyExecutorRequirements);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config_json() -> serde_json::Value {
        serde_json::json!({
            "task": {
                "name": "build",
                "requirements": { "executor": ["macos"] },
                "command": "echo hi",
                "timeout": "12m",
            },
            "packages": [{"name": "xcodetools", "version": 4}],
        })
    }

    #[test]
    fn parses_minimal_valid_config() {
        let config = TaskConfig::parse(&valid_config_json()).unwrap();
        assert_eq!(config.task.name, "build");
        assert_eq!(config.packages.len(), 1);
    }

    #[test]
    fn rejects_empty_executor_requirements() {
        let mut json = valid_config_json();
        json["task"]["requirements"]["executor"] = serde_json::json!([]);
        assert!(matches!(
            TaskConfig::parse(&json),
            Err(TaskConfigError::EmptyExecutorRequirements)
        ));
    }

    #[test]
    fn rejects_missing_name() {
        let mut json = valid_config_json();
        json["task"]["name"] = serde_json::json!("");
        assert!(matches!(
            TaskConfig::parse(&json),
            Err(TaskConfigError::MissingName)
        ));
    }
}
