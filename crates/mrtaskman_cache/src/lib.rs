//! The worker-side package cache: downloads packages into a shared,
//! cross-process-locked directory at most once per host, evicting the
//! least-recently-used entries once the cache passes its size budget.

mod cache;
mod control;
mod error;
mod eviction;
mod lock;

pub use cache::{PackageCache, PackageCacheConfig, PackageDownloader};
pub use error::{CacheError, Result};
