//! Suite and per-test configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempo_core::PerformanceTargets;

/// Suite-level configuration, injected by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Where result files and the rolling baseline are written.
    pub output_dir: PathBuf,

    /// Measured passes per test.
    pub iterations: usize,

    /// Discarded passes per test, run before measurement.
    pub warmup_iterations: usize,

    pub save_results: bool,
    pub compare_with_baseline: bool,

    /// Explicit baseline file; defaults to `baseline.json` in `output_dir`.
    pub baseline_file: Option<PathBuf>,

    /// Advisory targets; violations are logged, not failed.
    pub targets: PerformanceTargets,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("benchmark-results"),
            iterations: 5,
            warmup_iterations: 2,
            save_results: true,
            compare_with_baseline: true,
            baseline_file: None,
            targets: PerformanceTargets::default(),
        }
    }
}

/// One named benchmark test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkTestConfig {
    pub name: String,
    pub description: String,
    pub document_count: usize,

    /// Exact size of each synthetic document, in bytes.
    pub document_size: usize,

    pub concurrency: usize,
    pub enable_optimizations: bool,

    /// Advisory budget, passed through to downstream analyzers; the
    /// processor itself never kills a running task.
    pub timeout_ms: u64,
}

/// The canonical suite: repository-scale sweeps plus concurrency, baseline,
/// and memory stress variants.
pub fn default_suite() -> Vec<BenchmarkTestConfig> {
    vec![
        BenchmarkTestConfig {
            name: "small-repository".to_string(),
            description: "Small repository with 10 documents".to_string(),
            document_count: 10,
            document_size: 1024,
            concurrency: 2,
            enable_optimizations: true,
            timeout_ms: 30_000,
        },
        BenchmarkTestConfig {
            name: "medium-repository".to_string(),
            description: "Medium repository with 50 documents".to_string(),
            document_count: 50,
            document_size: 2048,
            concurrency: 4,
            enable_optimizations: true,
            timeout_ms: 60_000,
        },
        BenchmarkTestConfig {
            name: "large-repository".to_string(),
            description: "Large repository with 100 documents".to_string(),
            document_count: 100,
            document_size: 4096,
            concurrency: 4,
            enable_optimizations: true,
            timeout_ms: 120_000,
        },
        BenchmarkTestConfig {
            name: "xlarge-repository".to_string(),
            description: "Extra large repository with 250 documents".to_string(),
            document_count: 250,
            document_size: 4096,
            concurrency: 6,
            enable_optimizations: true,
            timeout_ms: 300_000,
        },
        BenchmarkTestConfig {
            name: "high-concurrency".to_string(),
            description: "High concurrency test with 50 documents".to_string(),
            document_count: 50,
            document_size: 2048,
            concurrency: 8,
            enable_optimizations: true,
            timeout_ms: 60_000,
        },
        BenchmarkTestConfig {
            name: "no-optimizations".to_string(),
            description: "Medium repository without optimizations".to_string(),
            document_count: 50,
            document_size: 2048,
            concurrency: 4,
            enable_optimizations: false,
            timeout_ms: 120_000,
        },
        BenchmarkTestConfig {
            name: "memory-stress".to_string(),
            description: "Memory stress test with large documents".to_string(),
            document_count: 30,
            document_size: 16_384,
            concurrency: 2,
            enable_optimizations: true,
            timeout_ms: 90_000,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_suite_names_are_unique() {
        let suite = default_suite();
        let mut names: Vec<_> = suite.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), suite.len());
        assert_eq!(suite.len(), 7);
    }
}
