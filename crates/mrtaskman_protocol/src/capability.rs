//! Capability token matching.
//!
//! Capabilities are plain string tokens with no hierarchy (§9): device identity,
//! OS, and family can all appear as distinct tokens on the same worker. A worker
//! advertises an ordered list (most specific first); a task requires a set. A
//! match is plain membership.

/// Returns true if `requirements` contains `capability` (exact string match).
pub fn satisfies(requirements: &[String], capability: &str) -> bool {
    requirements.iter().any(|req| req == capability)
}

/// Picks the first capability token in `worker_capabilities` that appears in
/// `task_requirements`, preserving the worker's preference order.
pub fn first_matching_capability<'a>(
    worker_capabilities: &'a [String],
    task_requirements: &[String],
) -> Option<&'a str> {
    worker_capabilities
        .iter()
        .find(|cap| satisfies(task_requirements, cap))
        .map(|s| s.as_str())
}
