//! LRU eviction over the `.index` file.
//!
//! Ported from the original cache's `_GetDeleteList`: candidates are records
//! old enough to evict (`age >= min_duration_seconds`), sorted oldest first,
//! and removed one at a time until the remaining total would drop below
//! `low_watermark * max_size_bytes`. At least one candidate is always
//! removed once eviction is triggered, even if that alone clears the
//! watermark.

use crate::control::IndexFile;

/// Returns the package keys to delete and the total cache size after doing so.
pub fn select_for_eviction(
    index: &IndexFile,
    now: i64,
    min_duration_seconds: i64,
    max_size_bytes: u64,
    low_watermark_percentage: f64,
) -> (Vec<String>, u64) {
    let mut candidates: Vec<(&str, i64, u64)> = index
        .records
        .iter()
        .filter(|(_, record)| now - record.timestamp >= min_duration_seconds)
        .map(|(key, record)| (key.as_str(), record.timestamp, record.size_bytes))
        .collect();
    candidates.sort_by_key(|(_, timestamp, _)| *timestamp);

    let low_watermark = (low_watermark_percentage * max_size_bytes as f64) as u64;
    let mut remaining = index.total_size;
    let mut delete_list = Vec::new();

    for (key, _, size_bytes) in candidates {
        delete_list.push(key.to_string());
        remaining = remaining.saturating_sub(size_bytes);
        if remaining < low_watermark {
            break;
        }
    }

    (delete_list, remaining)
}
