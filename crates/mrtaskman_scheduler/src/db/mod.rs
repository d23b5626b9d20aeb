//! Database layer for the scheduler.

pub mod models;
pub mod schema;
pub mod store;

pub use schema::ensure_schema;
pub use store::{SqliteTaskStore, TaskStore, UploadOutcome};
