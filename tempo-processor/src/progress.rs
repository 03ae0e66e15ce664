//! Progress snapshots and cumulative processing statistics.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A point-in-time view of a processing run.
///
/// Snapshots are emitted to the observer callback at most once per configured
/// interval, plus a final 100% snapshot whose `current_batch` is the empty
/// string.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,

    /// `"<batch>/<total batches>"` while running; empty in the final snapshot.
    pub current_batch: String,

    /// Id of the most recently completed task; empty in the final snapshot.
    pub current_task: String,

    /// Observed completions per second since the run started.
    pub processing_rate: f64,

    /// Remaining work divided by the observed rate.
    pub estimated_remaining: Duration,

    pub errors: usize,
    pub retries: usize,
}

/// Cumulative statistics across every run since construction or `reset`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessingStats {
    pub total_processed: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub success_rate: f64,
    pub average_processing_time: Duration,
    pub total_processing_time: Duration,
}

/// Atomic counters backing [`ProcessingStats`].
#[derive(Clone, Default)]
pub(crate) struct StatsCounters {
    total_processed: Arc<AtomicU64>,
    successes: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    retries: Arc<AtomicU64>,
    processing_time_micros: Arc<AtomicU64>,
}

impl StatsCounters {
    pub(crate) fn record(&self, success: bool, retries: u32, elapsed: Duration) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.retries.fetch_add(retries as u64, Ordering::Relaxed);
        self.processing_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.total_processed.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.processing_time_micros.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProcessingStats {
        let total = self.total_processed.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let micros = self.processing_time_micros.load(Ordering::Relaxed);

        let success_rate = if total > 0 {
            successes as f64 / total as f64
        } else {
            0.0
        };
        let average = if total > 0 {
            Duration::from_micros(micros / total)
        } else {
            Duration::ZERO
        };

        ProcessingStats {
            total_processed: total,
            successes,
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            success_rate,
            average_processing_time: average,
            total_processing_time: Duration::from_micros(micros),
        }
    }
}
