//! CLI error taxonomy and the exit codes the client contract promises (§6).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("missing or invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to open '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("server returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request to scheduler failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CliError {
    /// The process exit code this error maps to. Clap's own usage/parse
    /// errors already exit with 2 before any of this runs.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 3,
            CliError::FileOpen { .. } => 4,
            CliError::JsonParse(_) => 5,
            CliError::Http { status, .. } => i32::from(*status),
            CliError::Transport(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
