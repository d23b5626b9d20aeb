//! Canonical identifiers shared across every MrTaskman crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server-assigned, monotonically increasing Task identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for i64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| TaskIdError::Parse(s.to_string()))?;
        if value < 0 {
            return Err(TaskIdError::Negative(value));
        }
        Ok(TaskId(value))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskIdError {
    #[error("task id cannot be negative: {0}")]
    Negative(i64),
    #[error("invalid task id: {0}")]
    Parse(String),
}

/// Identifies a Package by its (name, version) pair, e.g. `"xcodetools^^^4"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: i64,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: i64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The on-disk / index key format: `"{name}^^^{version}"`.
    pub fn as_cache_key(&self) -> String {
        format!("{}^^^{}", self.name, self.version)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}
