//! Batched, cached Git history extraction for Tempo.
//!
//! Locates the most recent semantic-version release tag and computes the full
//! change-set (commits plus added/modified/deleted files) between a reference
//! and `HEAD`, while minimizing repeated `git` invocations on large
//! histories:
//!
//! - Commits are paginated with `--skip`/`--max-count` batches to bound
//!   memory and single-invocation output size
//! - Endpoint resolution, commit pagination, and the file diff run
//!   concurrently
//! - Results are memoized in expiring validation caches; cache hits report
//!   zero-duration metrics with a `cache_hit` flag
//!
//! A failing `git` invocation always surfaces as a typed error naming the
//! failed command. An incorrect release boundary would silently corrupt
//! downstream versioning decisions, so there is no fallback.

pub mod command;
pub mod optimizer;
pub mod types;

pub use optimizer::{GitCacheStats, GitConfig, GitHistoryOptimizer};
pub use types::{GitChanges, GitCommit, GitOperation, GitTag, OperationMetrics, TimeRange};
