//! Bounded-concurrency task processing for Tempo.
//!
//! This crate provides a generic concurrency-limited executor with:
//! - Fixed-size batches processed sequentially, tasks within a batch gated by
//!   a counting semaphore
//! - Per-task retry with linear backoff
//! - Rate-limited progress snapshots delivered to an observer callback
//! - Cooperative cancellation at task boundaries
//! - Cumulative processing statistics
//!
//! Individual task failures never abort the batch or the run: every submitted
//! task yields exactly one [`ProcessingResult`], successful or not. The only
//! error the processor itself raises is a malformed submission (duplicate
//! task ids), which is a caller contract violation.
//!
//! # Examples
//!
//! ```no_run
//! use tempo_processor::{ParallelProcessor, ProcessingTask, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> tempo_core::Result<()> {
//!     let processor: ParallelProcessor<u64, u64> =
//!         ParallelProcessor::new(ProcessorConfig::default());
//!
//!     let tasks = (0..100u64)
//!         .map(|n| ProcessingTask::new(format!("task-{n}"), n, |n| async move { Ok(n * 2) }))
//!         .collect();
//!
//!     let results = processor.process_tasks(tasks).await?;
//!     assert_eq!(results.len(), 100);
//!     Ok(())
//! }
//! ```

pub mod processor;
pub mod progress;
pub mod task;

pub use processor::{ParallelProcessor, ProcessorConfig};
pub use progress::{ProcessingStats, ProcessorProgress};
pub use task::{BatchResult, ProcessingResult, ProcessingTask};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::processor::{ParallelProcessor, ProcessorConfig};
    pub use crate::progress::{ProcessingStats, ProcessorProgress};
    pub use crate::task::{BatchResult, ProcessingResult, ProcessingTask};
}
