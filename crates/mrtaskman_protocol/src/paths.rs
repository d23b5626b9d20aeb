//! Shared filesystem location conventions.

use std::path::PathBuf;

/// Resolve the MrTaskman home directory.
///
/// Priority: `MRTASKMAN_HOME`, then `HOME`/`USERPROFILE`, then `./.mrtaskman`.
pub fn mrtaskman_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("MRTASKMAN_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".mrtaskman");
    }
    PathBuf::from(".").join(".mrtaskman")
}

/// Default scheduler SQLite database path: `~/.mrtaskman/scheduler.sqlite`.
pub fn default_state_store_path() -> PathBuf {
    mrtaskman_home().join("scheduler.sqlite")
}

/// Default per-host package cache root: `~/.mrtaskman/package_cache`.
pub fn default_cache_root() -> PathBuf {
    mrtaskman_home().join("package_cache")
}

/// Default logs directory: `~/.mrtaskman/logs`.
pub fn default_logs_dir() -> PathBuf {
    mrtaskman_home().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honors_override_env_var_and_derives_paths_under_it() {
        // Single test: MRTASKMAN_HOME is process-global state, and cargo runs
        // tests in this file on multiple threads by default.
        std::env::set_var("MRTASKMAN_HOME", "/tmp/mrtaskman-test-home");
        assert_eq!(mrtaskman_home(), PathBuf::from("/tmp/mrtaskman-test-home"));
        assert_eq!(
            default_cache_root(),
            PathBuf::from("/tmp/mrtaskman-test-home/package_cache")
        );
        std::env::remove_var("MRTASKMAN_HOME");
    }
}
