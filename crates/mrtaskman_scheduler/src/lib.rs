//! MrTaskman scheduler library: the server-side task/package state machine
//! and its HTTP binding.

pub mod db;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod timeout;
pub mod webhook;

pub use error::SchedulerError;
pub use scheduler::Scheduler;

#[derive(clap::Parser, Debug)]
#[command(name = "mrtaskman-scheduler", about = "Task scheduler for MrTaskman")]
pub struct SchedulerArgs {
    /// SQLite database URL, e.g. `sqlite:///path/to/scheduler.sqlite`.
    #[arg(long, default_value_t = sqlite_default_url())]
    pub database_url: String,

    /// HTTP bind address for the §6 API.
    #[arg(
        long,
        default_value_t = mrtaskman_protocol::defaults::DEFAULT_SCHEDULER_BIND_ADDR.to_string()
    )]
    pub bind: String,
}

fn sqlite_default_url() -> String {
    format!("sqlite://{}", mrtaskman_protocol::paths::default_state_store_path().display())
}
