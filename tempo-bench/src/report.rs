//! Benchmark report schema.
//!
//! Everything here is serialized into the timestamped result files and the
//! rolling baseline consumed by reporting collaborators and by regression
//! detection on later runs.

use crate::stats::BenchmarkStatistics;
use crate::suite::{BenchmarkTestConfig, SuiteConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host environment captured once per suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub runtime_version: String,
    pub os: String,
    pub arch: String,
    pub cpu_count: usize,
    pub total_memory_bytes: u64,
}

impl EnvironmentInfo {
    pub fn capture() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        Self {
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: num_cpus::get(),
            total_memory_bytes: system.total_memory(),
        }
    }
}

/// One measured pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationSample {
    pub execution_time_ms: f64,
    pub memory_peak_bytes: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub initial_bytes: u64,
    pub peak_bytes: u64,
    pub final_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    pub documents_per_second: f64,
    pub bytes_per_second: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Hit rate averaged across measured iterations.
    pub hit_rate: f64,
    pub total_requests: u64,
    pub cached_documents: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParallelMetrics {
    /// Theoretical-ideal parallel time over measured wall time, averaged
    /// across iterations.
    pub efficiency: f64,
    pub configured_concurrency: usize,
    /// Processor success rate averaged across iterations.
    pub success_rate: f64,
}

/// Aggregated metrics for one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub execution_time_ms: f64,
    pub memory: MemoryMetrics,
    pub throughput: ThroughputMetrics,
    pub cache: CacheMetrics,
    pub parallel: ParallelMetrics,
}

/// Result of one test config: immutable once produced, persisted as part of
/// the suite result and potentially as the next baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkExecutionResult {
    pub config: BenchmarkTestConfig,
    pub metrics: BenchmarkMetrics,
    pub iterations: Vec<IterationSample>,
    pub statistics: BenchmarkStatistics,
}

/// A test whose mean exceeded the baseline by more than the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regression {
    pub test_name: String,
    pub regression_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_execution_time_ms: u64,
    pub average_performance_ms: f64,
    pub regressions: Vec<Regression>,
}

/// Full output of one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuiteResult {
    pub timestamp: DateTime<Utc>,
    pub environment: EnvironmentInfo,
    pub config: SuiteConfig,
    pub results: Vec<BenchmarkExecutionResult>,
    pub summary: SuiteSummary,
}
