//! Incremental document parsing cache for Tempo.
//!
//! Parses completion documents once and serves repeat requests from an
//! in-memory cache keyed by file path. An entry stays valid only while the
//! file's modification time is unchanged and, when content hashing is
//! enabled, its blake3 digest still matches. Staleness is never an error; it
//! simply triggers a fresh parse.
//!
//! - Mtime + content-hash freshness checks, conservative on filesystem errors
//! - LRU batch eviction (oldest 25%) when the cache reaches capacity
//! - Parallel batch parsing through the bounded task processor
//! - Lifetime hit/miss statistics derived from atomic counters

pub mod cache;
pub mod extract;

pub use cache::{CacheStats, DocumentCache, ParseOutcome, ParseProgress, ParsingConfig};
