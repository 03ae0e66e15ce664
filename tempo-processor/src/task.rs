//! Task and result types for the parallel processor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::Result;

/// Boxed future returned by a task's processing function.
pub type TaskFuture<R> = Pin<Box<dyn Future<Output = Result<R>> + Send>>;

/// Shared async processing function for a task.
pub type TaskFn<I, R> = Arc<dyn Fn(I) -> TaskFuture<R> + Send + Sync>;

/// A unit of work submitted to the processor.
///
/// Immutable once submitted. The `id` must be unique within a single
/// submission; duplicate ids are rejected before any task starts.
pub struct ProcessingTask<I, R> {
    /// Identifier, unique within a batch run
    pub id: String,

    /// Input handed to the processing function on every attempt
    pub input: I,

    /// The processing function itself
    pub processor: TaskFn<I, R>,

    /// Higher-priority tasks run first. Unset tasks sort as priority 0.
    pub priority: Option<i32>,

    /// Per-task retry override; falls back to the processor config.
    pub retries: Option<u32>,
}

impl<I, R> ProcessingTask<I, R> {
    /// Create a task from an async processing function.
    pub fn new<F, Fut>(id: impl Into<String>, input: I, processor: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            id: id.into(),
            input,
            processor: Arc::new(move |input| Box::pin(processor(input))),
            priority: None,
            retries: None,
        }
    }

    /// Set the scheduling priority (higher first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Override the retry count for this task only.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

impl<I: Clone, R> Clone for ProcessingTask<I, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            input: self.input.clone(),
            processor: Arc::clone(&self.processor),
            priority: self.priority,
            retries: self.retries,
        }
    }
}

impl<I, R> std::fmt::Debug for ProcessingTask<I, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Outcome of a single task, produced exactly once per submitted task.
#[derive(Debug, Clone)]
pub struct ProcessingResult<R> {
    pub id: String,
    pub success: bool,
    pub result: Option<R>,

    /// Message from the last failed attempt, when `success` is false.
    pub error: Option<String>,

    /// Wall time from first attempt to final outcome, backoff included.
    pub processing_time: Duration,

    /// Retries actually consumed (0 when the first attempt succeeded).
    pub retry_count: u32,
}

impl<R> ProcessingResult<R> {
    pub(crate) fn failed(id: String, error: String, elapsed: Duration, retry_count: u32) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error),
            processing_time: elapsed,
            retry_count,
        }
    }
}

/// A contiguous slice of tasks processed together.
///
/// Internal accounting type: batches are aggregated into the overall result
/// list as soon as they complete.
#[derive(Debug)]
pub struct BatchResult<R> {
    pub batch_index: usize,
    pub total_batches: usize,
    pub results: Vec<ProcessingResult<R>>,
    pub duration: Duration,
    pub success_count: usize,
    pub error_count: usize,
}
