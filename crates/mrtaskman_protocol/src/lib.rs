//! Shared types for MrTaskman: the Task/TaskResult/Package data model, the
//! worker-side task config contract, capability matching, duration parsing,
//! and the §6 HTTP DTOs. Every other MrTaskman crate depends on this one so
//! the wire format and the core domain types never drift apart.

pub mod capability;
pub mod defaults;
pub mod duration;
pub mod http;
pub mod ids;
pub mod package;
pub mod paths;
pub mod task;
pub mod task_config;

pub use ids::{PackageKey, TaskId, TaskIdError};
pub use package::{validate_package_identity, Package, PackageError, PackageFile};
pub use task::{Task, TaskOutcome, TaskResult, TaskState, DEFAULT_MAX_ATTEMPTS};
pub use task_config::{TaskConfig, TaskConfigError};
