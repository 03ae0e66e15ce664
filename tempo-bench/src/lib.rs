//! Statistical benchmark harness for the Tempo pipeline.
//!
//! Runs a suite of named test configurations, each exercising the document
//! cache and the bounded task processor against synthetically generated
//! completion documents:
//!
//! - Warmup passes are discarded, measured passes collect per-iteration wall
//!   time and peak process memory
//! - Iteration timings become mean/median/stddev/min/max/p95/p99 statistics
//! - Results are compared against a stored `baseline.json`; a mean more than
//!   10% above the baseline flags a regression
//! - Every suite run writes a timestamped JSON report and refreshes the
//!   rolling baseline
//!
//! Regression-infrastructure failures (missing or corrupt baseline) degrade
//! to "no regressions reported"; a test whose every iteration fails is a hard
//! suite failure.

pub mod report;
pub mod runner;
pub mod stats;
pub mod suite;
pub mod synthetic;

pub use report::{
    BenchmarkExecutionResult, BenchmarkMetrics, BenchmarkSuiteResult, EnvironmentInfo,
    IterationSample, Regression, SuiteSummary,
};
pub use runner::BenchmarkRunner;
pub use stats::BenchmarkStatistics;
pub use suite::{default_suite, BenchmarkTestConfig, SuiteConfig};
