//! Concurrency-limited batch executor.

use crate::progress::{ProcessingStats, ProcessorProgress, StatsCounters};
use crate::task::{BatchResult, ProcessingResult, ProcessingTask};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_core::{Result, TempoError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Error message recorded for tasks skipped or abandoned by cancellation.
pub const CANCELLED: &str = "cancelled";

/// Processor configuration, injected by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Upper bound on tasks in flight at once.
    pub max_concurrency: usize,

    /// Tasks per batch; batches run sequentially, never overlapping.
    pub batch_size: usize,

    /// Default retry budget for tasks without a per-task override.
    pub max_retries: u32,

    /// Base backoff; attempt `n` waits `retry_delay * n` before retrying.
    pub retry_delay: Duration,

    /// Minimum spacing between progress snapshots.
    pub progress_update_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            batch_size: 10,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            progress_update_interval: Duration::from_secs(1),
        }
    }
}

/// Generic concurrency-limited executor.
///
/// Tasks are optionally sorted by descending priority, split into fixed-size
/// batches, and processed batch by batch; within a batch tasks run
/// concurrently subject to a counting semaphore. An individual task failure
/// never aborts anything else; it is retried with linear backoff and finally
/// recorded in its [`ProcessingResult`].
pub struct ParallelProcessor<I, R> {
    config: ProcessorConfig,
    cancel: CancellationToken,
    stats: StatsCounters,
    _marker: std::marker::PhantomData<fn(I) -> R>,
}

impl<I, R> ParallelProcessor<I, R>
where
    I: Clone + Send + 'static,
    R: Send + 'static,
{
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            stats: StatsCounters::default(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Token that aborts this processor's runs when cancelled.
    ///
    /// Cancellation is cooperative: running attempts finish, but no further
    /// retries happen and not-yet-started tasks complete immediately with a
    /// `cancelled` error. A cancelled processor stays cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process every task, returning exactly one result per task id in
    /// completion order.
    pub async fn process_tasks(
        &self,
        tasks: Vec<ProcessingTask<I, R>>,
    ) -> Result<Vec<ProcessingResult<R>>> {
        self.process_tasks_with_progress(tasks, |_| {}).await
    }

    /// Same as [`process_tasks`](Self::process_tasks), delivering rate-limited
    /// progress snapshots to `on_progress`. A final 100% snapshot with an
    /// empty `current_batch` marker is always emitted.
    pub async fn process_tasks_with_progress<F>(
        &self,
        mut tasks: Vec<ProcessingTask<I, R>>,
        mut on_progress: F,
    ) -> Result<Vec<ProcessingResult<R>>>
    where
        F: FnMut(ProcessorProgress) + Send,
    {
        validate_submission(&tasks)?;

        if tasks.iter().any(|t| t.priority.is_some()) {
            tasks.sort_by_key(|t| std::cmp::Reverse(t.priority.unwrap_or(0)));
        }

        let total = tasks.len();
        let batches = into_batches(tasks, self.config.batch_size);
        let total_batches = batches.len();

        let started = Instant::now();
        let mut last_emit = Instant::now();
        let mut results = Vec::with_capacity(total);
        let mut errors = 0usize;
        let mut retries = 0usize;

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let mut completed_before = results.len();
            let batch_result = self
                .run_batch(batch, batch_index, total_batches, &mut |result| {
                    if !result.success {
                        errors += 1;
                    }
                    retries += result.retry_count as usize;
                    self.stats
                        .record(result.success, result.retry_count, result.processing_time);

                    completed_before += 1;
                    if last_emit.elapsed() >= self.config.progress_update_interval {
                        last_emit = Instant::now();
                        on_progress(snapshot(
                            completed_before,
                            total,
                            format!("{}/{}", batch_index + 1, total_batches),
                            result.id.clone(),
                            started,
                            errors,
                            retries,
                        ));
                    }
                })
                .await;

            debug!(
                batch = batch_index + 1,
                total_batches,
                successes = batch_result.success_count,
                errors = batch_result.error_count,
                duration_ms = batch_result.duration.as_millis() as u64,
                "batch complete"
            );
            results.extend(batch_result.results);
        }

        on_progress(snapshot(
            results.len(),
            total,
            String::new(),
            String::new(),
            started,
            errors,
            retries,
        ));

        Ok(results)
    }

    /// Run one batch to completion. Each result is announced through
    /// `on_result` as it arrives (completion order within the batch is
    /// unspecified), then collected into the returned [`BatchResult`].
    async fn run_batch(
        &self,
        batch: Vec<ProcessingTask<I, R>>,
        batch_index: usize,
        total_batches: usize,
        on_result: &mut (dyn FnMut(&ProcessingResult<R>) + Send),
    ) -> BatchResult<R> {
        let batch_started = Instant::now();
        let batch_len = batch.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for task in batch {
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let max_retries = task.retries.unwrap_or(self.config.max_retries);
            let retry_delay = self.config.retry_delay;

            join_set.spawn(async move {
                // The permit guard spans the whole attempt loop so a failing
                // task cannot leak its concurrency slot.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                run_task(task, max_retries, retry_delay, cancel).await
            });
        }

        let mut results = Vec::with_capacity(batch_len);
        let mut success_count = 0usize;
        let mut error_count = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    if result.success {
                        success_count += 1;
                    } else {
                        error_count += 1;
                    }
                    on_result(&result);
                    results.push(result);
                }
                Err(join_error) => {
                    // A panicking task function loses its slot in the result
                    // list; surface it loudly instead of inventing an id.
                    error!(%join_error, "task panicked inside batch");
                    error_count += 1;
                }
            }
        }

        BatchResult {
            batch_index,
            total_batches,
            results,
            duration: batch_started.elapsed(),
            success_count,
            error_count,
        }
    }

    /// Cumulative statistics since construction or the last reset.
    pub fn stats(&self) -> ProcessingStats {
        self.stats.snapshot()
    }

    /// Zero the cumulative statistics.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }
}

/// Execute one task's attempt loop: initial attempt plus up to `max_retries`
/// retries with linear backoff.
async fn run_task<I, R>(
    task: ProcessingTask<I, R>,
    max_retries: u32,
    retry_delay: Duration,
    cancel: CancellationToken,
) -> ProcessingResult<R>
where
    I: Clone + Send + 'static,
    R: Send + 'static,
{
    let started = Instant::now();

    if cancel.is_cancelled() {
        return ProcessingResult::failed(task.id, CANCELLED.to_string(), started.elapsed(), 0);
    }

    let mut attempt = 0u32;
    loop {
        match (task.processor)(task.input.clone()).await {
            Ok(value) => {
                return ProcessingResult {
                    id: task.id,
                    success: true,
                    result: Some(value),
                    error: None,
                    processing_time: started.elapsed(),
                    retry_count: attempt,
                };
            }
            Err(err) => {
                if attempt >= max_retries || cancel.is_cancelled() {
                    return ProcessingResult::failed(
                        task.id,
                        err.to_string(),
                        started.elapsed(),
                        attempt,
                    );
                }
                attempt += 1;
                tokio::time::sleep(retry_delay * attempt).await;
            }
        }
    }
}

fn validate_submission<I, R>(tasks: &[ProcessingTask<I, R>]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(TempoError::invalid_input(format!(
                "duplicate task id in submission: {}",
                task.id
            )));
        }
    }
    Ok(())
}

/// Split tasks into `batch_size` chunks, preserving order.
fn into_batches<T>(tasks: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(tasks.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for task in tasks {
        current.push(task);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn snapshot(
    completed: usize,
    total: usize,
    current_batch: String,
    current_task: String,
    started: Instant,
    errors: usize,
    retries: usize,
) -> ProcessorProgress {
    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        completed as f64 / elapsed
    } else {
        0.0
    };
    let remaining = total.saturating_sub(completed);
    let estimated_remaining = if rate > 0.0 {
        Duration::from_secs_f64(remaining as f64 / rate)
    } else {
        Duration::ZERO
    };
    let percentage = if total == 0 {
        100.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    ProcessorProgress {
        completed,
        total,
        percentage,
        current_batch,
        current_task,
        processing_rate: rate,
        estimated_remaining,
        errors,
        retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn quick_config() -> ProcessorConfig {
        ProcessorConfig {
            retry_delay: Duration::from_millis(5),
            progress_update_interval: Duration::from_millis(0),
            ..ProcessorConfig::default()
        }
    }

    fn doubling_tasks(n: u64) -> Vec<ProcessingTask<u64, u64>> {
        (0..n)
            .map(|i| ProcessingTask::new(format!("task-{i}"), i, |i| async move { Ok(i * 2) }))
            .collect()
    }

    #[tokio::test]
    async fn one_result_per_task() {
        let processor = ParallelProcessor::new(quick_config());
        let results = processor.process_tasks(doubling_tasks(23)).await.unwrap();

        assert_eq!(results.len(), 23);
        let mut ids: Vec<_> = results.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 23);
        assert!(results.iter().all(|r| r.success));

        for result in &results {
            let n: u64 = result.id.strip_prefix("task-").unwrap().parse().unwrap();
            assert_eq!(result.result, Some(n * 2));
        }
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<ProcessingTask<u64, u64>> = (0..20u64)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let max_observed = Arc::clone(&max_observed);
                ProcessingTask::new(format!("task-{i}"), i, move |i| {
                    let in_flight = Arc::clone(&in_flight);
                    let max_observed = Arc::clone(&max_observed);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_observed.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(i)
                    }
                })
            })
            .collect();

        let processor = ParallelProcessor::new(ProcessorConfig {
            max_concurrency: 3,
            batch_size: 20,
            ..quick_config()
        });
        processor.process_tasks(tasks).await.unwrap();

        assert!(max_observed.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retry_exhaustion_attempts_and_flags() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let task = ProcessingTask::new("doomed", (), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TempoError::task("boom"))
            }
        })
        .with_retries(2);

        let processor = ParallelProcessor::new(quick_config());
        let results = processor.process_tasks(vec![task]).await.unwrap();

        // 1 initial attempt + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].retry_count, 2);
        assert!(results[0].error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let task = ProcessingTask::new("flaky", 7u64, move |n| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TempoError::task("transient"))
                } else {
                    Ok(n)
                }
            }
        });

        let processor = ParallelProcessor::new(quick_config());
        let results = processor.process_tasks(vec![task]).await.unwrap();

        assert!(results[0].success);
        assert_eq!(results[0].retry_count, 2);
        assert_eq!(results[0].result, Some(7));
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let mut tasks = doubling_tasks(9);
        tasks.push(ProcessingTask::new("bad", 0, |_| async {
            Err::<u64, _>(TempoError::task("nope"))
        })
        .with_retries(0));

        let processor = ParallelProcessor::new(quick_config());
        let results = processor.process_tasks(tasks).await.unwrap();

        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| r.success).count(), 9);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let tasks = vec![
            ProcessingTask::new("same", 1u64, |n| async move { Ok(n) }),
            ProcessingTask::new("same", 2u64, |n| async move { Ok(n) }),
        ];

        let processor = ParallelProcessor::new(quick_config());
        let err = processor.process_tasks(tasks).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn priority_orders_execution() {
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for (id, priority) in [("low", 1), ("high", 5), ("mid", 3)] {
            let order = Arc::clone(&order);
            tasks.push(
                ProcessingTask::new(id, id.to_string(), move |id: String| {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().await.push(id);
                        Ok(())
                    }
                })
                .with_priority(priority),
            );
        }

        let processor = ParallelProcessor::new(ProcessorConfig {
            max_concurrency: 1,
            ..quick_config()
        });
        processor.process_tasks(tasks).await.unwrap();

        assert_eq!(*order.lock().await, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn final_progress_snapshot_is_always_emitted() {
        let processor = ParallelProcessor::new(ProcessorConfig {
            // An interval long enough that only the final snapshot fires.
            progress_update_interval: Duration::from_secs(3600),
            ..quick_config()
        });

        let mut snapshots = Vec::new();
        processor
            .process_tasks_with_progress(doubling_tasks(5), |p| snapshots.push(p))
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 1);
        let last = snapshots.last().unwrap();
        assert_eq!(last.completed, 5);
        assert_eq!(last.total, 5);
        assert_eq!(last.percentage, 100.0);
        assert!(last.current_batch.is_empty());
    }

    #[tokio::test]
    async fn interval_snapshots_carry_batch_and_task_markers() {
        let processor = ParallelProcessor::new(ProcessorConfig {
            batch_size: 2,
            progress_update_interval: Duration::from_millis(0),
            ..quick_config()
        });

        let mut snapshots = Vec::new();
        processor
            .process_tasks_with_progress(doubling_tasks(4), |p| snapshots.push(p))
            .await
            .unwrap();

        // 4 per-completion snapshots plus the final one.
        assert_eq!(snapshots.len(), 5);
        let first = &snapshots[0];
        assert_eq!(first.current_batch, "1/2");
        assert!(first.current_task.starts_with("task-"));
        assert!(first.processing_rate >= 0.0);
    }

    #[tokio::test]
    async fn cancellation_fails_remaining_tasks() {
        let processor: ParallelProcessor<u64, u64> = ParallelProcessor::new(quick_config());
        processor.cancel_token().cancel();

        let results = processor.process_tasks(doubling_tasks(6)).await.unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| r.error.as_deref() == Some(CANCELLED)));
    }

    #[tokio::test]
    async fn stats_accumulate_until_reset() {
        let processor = ParallelProcessor::new(quick_config());
        processor.process_tasks(doubling_tasks(8)).await.unwrap();

        let mut tasks = doubling_tasks(2);
        tasks.push(ProcessingTask::new("bad", 0, |_| async {
            Err::<u64, _>(TempoError::task("nope"))
        })
        .with_retries(0));
        processor.process_tasks(tasks).await.unwrap();

        let stats = processor.stats();
        assert_eq!(stats.total_processed, 11);
        assert_eq!(stats.successes, 10);
        assert_eq!(stats.failures, 1);
        assert!((stats.success_rate - 10.0 / 11.0).abs() < 1e-9);

        processor.reset_stats();
        assert_eq!(processor.stats().total_processed, 0);
    }

    #[tokio::test]
    async fn empty_submission_completes_with_final_snapshot() {
        let processor: ParallelProcessor<u64, u64> = ParallelProcessor::new(quick_config());
        let mut snapshots = Vec::new();
        let results = processor
            .process_tasks_with_progress(Vec::new(), |p| snapshots.push(p))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].percentage, 100.0);
    }

    #[test]
    fn batch_sizing_splits_as_specified() {
        let batches = into_batches((0..23).collect::<Vec<_>>(), 10);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    mod batching_props {
        use super::into_batches;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn batches_partition_the_input(n in 0usize..500, batch_size in 1usize..64) {
                let batches = into_batches((0..n).collect::<Vec<_>>(), batch_size);

                let total: usize = batches.iter().map(Vec::len).sum();
                prop_assert_eq!(total, n);
                prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
                // Only the final batch may be short.
                if let Some((_last, rest)) = batches.split_last() {
                    prop_assert!(rest.iter().all(|b| b.len() == batch_size));
                }

                let flattened: Vec<usize> = batches.into_iter().flatten().collect();
                prop_assert_eq!(flattened, (0..n).collect::<Vec<_>>());
            }
        }
    }
}
