use mrtaskman_protocol::PackageError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("task {task_id} attempt mismatch or state moved on")]
    TimedOut { task_id: i64 },

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("corrupt row: {reason}")]
    CorruptRow { reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
