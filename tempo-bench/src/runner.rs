//! Suite orchestration, iteration execution, and regression detection.

use crate::report::{
    BenchmarkExecutionResult, BenchmarkMetrics, BenchmarkSuiteResult, CacheMetrics,
    EnvironmentInfo, IterationSample, MemoryMetrics, ParallelMetrics, Regression, SuiteSummary,
    ThroughputMetrics,
};
use crate::stats::BenchmarkStatistics;
use crate::suite::{default_suite, BenchmarkTestConfig, SuiteConfig};
use crate::synthetic::{self, DocumentSets};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tempo_cache::{DocumentCache, ParseOutcome, ParsingConfig};
use tempo_core::{Result, TempoError};
use tempo_processor::{ParallelProcessor, ProcessingTask, ProcessorConfig};
use tracing::{debug, error, info, warn};

/// A test regresses when its mean exceeds the baseline mean by more than this.
const REGRESSION_THRESHOLD_PERCENT: f64 = 10.0;

/// Process-memory polling cadence while an iteration runs.
const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

struct IterationMeasurement {
    wall_time_ms: f64,
    memory_peak_bytes: u64,
}

/// Executes benchmark suites against the cache/processor machinery.
pub struct BenchmarkRunner {
    working_dir: PathBuf,
    config: SuiteConfig,
    documents: DocumentSets,
}

impl BenchmarkRunner {
    pub fn new(working_dir: impl Into<PathBuf>, config: SuiteConfig) -> Self {
        Self {
            working_dir: working_dir.into(),
            config,
            documents: DocumentSets::new(),
        }
    }

    /// Run the canonical suite.
    pub async fn run_suite(&self) -> Result<BenchmarkSuiteResult> {
        self.run_suite_with(default_suite()).await
    }

    /// Run a caller-supplied suite of test configurations.
    pub async fn run_suite_with(
        &self,
        tests: Vec<BenchmarkTestConfig>,
    ) -> Result<BenchmarkSuiteResult> {
        let suite_started = Instant::now();
        info!(
            tests = tests.len(),
            iterations = self.config.iterations,
            warmup = self.config.warmup_iterations,
            "starting benchmark suite"
        );

        let mut results = Vec::new();
        let mut failed_tests = 0usize;
        for test in &tests {
            info!(name = %test.name, description = %test.description, "running benchmark");
            match self.run_test(test).await {
                Ok(result) => {
                    info!(
                        name = %test.name,
                        mean_ms = result.statistics.mean,
                        stddev_ms = result.statistics.standard_deviation,
                        docs_per_sec = result.metrics.throughput.documents_per_second,
                        cache_hit_rate = result.metrics.cache.hit_rate,
                        "benchmark complete"
                    );
                    results.push(result);
                }
                Err(err) => {
                    failed_tests += 1;
                    error!(name = %test.name, error = %err, "benchmark test failed");
                }
            }
        }

        let average_performance_ms = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.statistics.mean).sum::<f64>() / results.len() as f64
        };
        let regressions = if self.config.compare_with_baseline {
            self.detect_regressions(&results)
        } else {
            Vec::new()
        };
        if !regressions.is_empty() {
            for regression in &regressions {
                warn!(
                    test = %regression.test_name,
                    percent = regression.regression_percent,
                    "performance regression detected"
                );
            }
        }

        let suite_result = BenchmarkSuiteResult {
            timestamp: Utc::now(),
            environment: EnvironmentInfo::capture(),
            config: self.config.clone(),
            summary: SuiteSummary {
                total_tests: tests.len(),
                passed_tests: results.len(),
                failed_tests,
                total_execution_time_ms: suite_started.elapsed().as_millis() as u64,
                average_performance_ms,
                regressions,
            },
            results,
        };

        if self.config.save_results {
            self.save_results(&suite_result)?;
        }
        Ok(suite_result)
    }

    /// Run one test config: warmups, measured iterations, statistics.
    pub async fn run_test(&self, test: &BenchmarkTestConfig) -> Result<BenchmarkExecutionResult> {
        let documents =
            self.documents
                .get_or_generate(&test.name, test.document_count, test.document_size);
        synthetic::materialize(&self.working_dir, &documents).await?;
        let paths: Vec<PathBuf> = documents.iter().map(|d| d.relative_path.clone()).collect();

        let cache = DocumentCache::new(
            self.working_dir.clone(),
            ParsingConfig {
                enable_cache: test.enable_optimizations,
                enable_parallel: test.enable_optimizations,
                max_concurrent_parsing: test.concurrency,
                ..ParsingConfig::default()
            },
        );
        let processor: ParallelProcessor<PathBuf, ParseOutcome> =
            ParallelProcessor::new(ProcessorConfig {
                max_concurrency: test.concurrency,
                batch_size: test
                    .document_count
                    .div_ceil(test.concurrency.max(1))
                    .max(1),
                ..ProcessorConfig::default()
            });

        for _ in 0..self.config.warmup_iterations {
            if let Err(err) = self.execute_iteration(&cache, &processor, &paths).await {
                debug!(name = %test.name, error = %err, "warmup iteration failed");
            }
            cache.clear();
            processor.reset_stats();
        }

        let initial_memory = current_process_memory();
        let mut iterations = Vec::with_capacity(self.config.iterations);
        let mut times = Vec::new();
        let mut peaks: Vec<u64> = Vec::new();
        let mut hit_rate_sum = 0.0;
        let mut success_rate_sum = 0.0;
        let mut efficiency_sum = 0.0;
        let mut total_requests = 0u64;
        let mut last_cached_documents = 0usize;
        let mut measured = 0usize;

        for _ in 0..self.config.iterations {
            match self.execute_iteration(&cache, &processor, &paths).await {
                Ok(measurement) => {
                    let cache_stats = cache.stats();
                    let processor_stats = processor.stats();

                    hit_rate_sum += cache_stats.cache_hit_rate;
                    total_requests += cache_stats.total_requests;
                    last_cached_documents = cache_stats.cached_documents;
                    success_rate_sum += processor_stats.success_rate;

                    // Efficiency: ideal parallel time (measured per-task cost
                    // spread over the configured concurrency) vs wall time.
                    let ideal_ms = processor_stats.total_processing_time.as_secs_f64() * 1000.0
                        / test.concurrency.max(1) as f64;
                    if measurement.wall_time_ms > 0.0 {
                        efficiency_sum += ideal_ms / measurement.wall_time_ms;
                    }

                    times.push(measurement.wall_time_ms);
                    peaks.push(measurement.memory_peak_bytes);
                    iterations.push(IterationSample {
                        execution_time_ms: measurement.wall_time_ms,
                        memory_peak_bytes: measurement.memory_peak_bytes,
                        success: true,
                        error: None,
                    });
                    measured += 1;

                    cache.clear();
                    processor.reset_stats();
                }
                Err(err) => {
                    iterations.push(IterationSample {
                        execution_time_ms: 0.0,
                        memory_peak_bytes: 0,
                        success: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        if times.is_empty() {
            return Err(TempoError::benchmark(format!(
                "all benchmark iterations failed for {}",
                test.name
            )));
        }

        let statistics = BenchmarkStatistics::from_samples(&times);
        let mean_secs = statistics.mean / 1000.0;
        let total_bytes = (test.document_count * test.document_size) as f64;
        let divisor = measured.max(1) as f64;

        let metrics = BenchmarkMetrics {
            execution_time_ms: statistics.mean,
            memory: MemoryMetrics {
                initial_bytes: initial_memory,
                peak_bytes: peaks.iter().copied().max().unwrap_or(0),
                final_bytes: current_process_memory(),
            },
            throughput: ThroughputMetrics {
                documents_per_second: test.document_count as f64 / mean_secs,
                bytes_per_second: total_bytes / mean_secs,
            },
            cache: CacheMetrics {
                hit_rate: hit_rate_sum / divisor,
                total_requests,
                cached_documents: last_cached_documents,
            },
            parallel: ParallelMetrics {
                efficiency: efficiency_sum / divisor,
                configured_concurrency: test.concurrency,
                success_rate: success_rate_sum / divisor,
            },
        };

        self.check_targets(test, &metrics);

        Ok(BenchmarkExecutionResult {
            config: test.clone(),
            metrics,
            iterations,
            statistics,
        })
    }

    /// Log advisory performance-target violations; targets never fail a test.
    fn check_targets(&self, test: &BenchmarkTestConfig, metrics: &BenchmarkMetrics) {
        let targets = &self.config.targets;
        if metrics.execution_time_ms > targets.max_analysis_time_ms as f64 {
            warn!(
                name = %test.name,
                mean_ms = metrics.execution_time_ms,
                target_ms = targets.max_analysis_time_ms,
                "mean execution time exceeds target"
            );
        }
        let peak_mb = metrics.memory.peak_bytes / (1024 * 1024);
        if peak_mb > targets.max_memory_mb {
            warn!(
                name = %test.name,
                peak_mb,
                target_mb = targets.max_memory_mb,
                "peak memory exceeds target"
            );
        }
        if test.enable_optimizations && metrics.cache.hit_rate < targets.min_cache_hit_rate {
            warn!(
                name = %test.name,
                hit_rate = metrics.cache.hit_rate,
                target = targets.min_cache_hit_rate,
                "cache hit rate below target"
            );
        }
    }

    /// One pass: submit one parse task per document through the processor,
    /// sampling process memory for the iteration's peak.
    async fn execute_iteration(
        &self,
        cache: &DocumentCache,
        processor: &ParallelProcessor<PathBuf, ParseOutcome>,
        paths: &[PathBuf],
    ) -> Result<IterationMeasurement> {
        let peak = Arc::new(AtomicU64::new(current_process_memory()));
        let sampler_peak = Arc::clone(&peak);
        let sampler = tokio::spawn(async move {
            let Ok(pid) = sysinfo::get_current_pid() else {
                return;
            };
            let mut system = sysinfo::System::new();
            let mut interval = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);
            loop {
                interval.tick().await;
                system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
                if let Some(process) = system.process(pid) {
                    sampler_peak.fetch_max(process.memory(), Ordering::Relaxed);
                }
            }
        });

        let started = Instant::now();
        let tasks = paths
            .iter()
            .map(|path| {
                let cache = cache.clone();
                ProcessingTask::new(path.display().to_string(), path.clone(), move |path: PathBuf| {
                    let cache = cache.clone();
                    async move { cache.parse_incremental(&path).await }
                })
            })
            .collect();
        let run = processor.process_tasks(tasks).await;
        let wall_time = started.elapsed();
        sampler.abort();

        let results = run?;
        if !results.is_empty() && results.iter().all(|r| !r.success) {
            return Err(TempoError::benchmark("every parse task in the iteration failed"));
        }

        Ok(IterationMeasurement {
            wall_time_ms: wall_time.as_secs_f64() * 1000.0,
            memory_peak_bytes: peak.load(Ordering::Relaxed),
        })
    }

    /// Compare results against the stored baseline. Missing or corrupt
    /// baselines degrade to "no regressions reported".
    fn detect_regressions(&self, results: &[BenchmarkExecutionResult]) -> Vec<Regression> {
        let baseline_path = self
            .config
            .baseline_file
            .clone()
            .unwrap_or_else(|| self.config.output_dir.join("baseline.json"));

        let raw = match std::fs::read_to_string(&baseline_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    path = %baseline_path.display(),
                    error = %err,
                    "no baseline available, skipping regression detection"
                );
                return Vec::new();
            }
        };
        let baseline: BenchmarkSuiteResult = match serde_json::from_str(&raw) {
            Ok(baseline) => baseline,
            Err(err) => {
                warn!(
                    path = %baseline_path.display(),
                    error = %err,
                    "unreadable baseline, skipping regression detection"
                );
                return Vec::new();
            }
        };

        let mut regressions = Vec::new();
        for result in results {
            let Some(base) = baseline
                .results
                .iter()
                .find(|b| b.config.name == result.config.name)
            else {
                continue;
            };
            if base.statistics.mean <= 0.0 {
                continue;
            }
            let percent =
                (result.statistics.mean - base.statistics.mean) / base.statistics.mean * 100.0;
            if percent > REGRESSION_THRESHOLD_PERCENT {
                regressions.push(Regression {
                    test_name: result.config.name.clone(),
                    regression_percent: percent,
                });
            }
        }
        regressions
    }

    /// Write the timestamped result file and refresh the rolling baseline.
    fn save_results(&self, suite_result: &BenchmarkSuiteResult) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let json = serde_json::to_string_pretty(suite_result)?;

        let timestamp = suite_result.timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let result_path = self
            .config
            .output_dir
            .join(format!("benchmark-results-{timestamp}.json"));
        std::fs::write(&result_path, &json)?;

        let baseline_path = self.config.output_dir.join("baseline.json");
        std::fs::write(&baseline_path, &json)?;

        info!(
            results = %result_path.display(),
            baseline = %baseline_path.display(),
            "saved benchmark results"
        );
        Ok(())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }
}

/// Current resident memory of this process, best-effort.
fn current_process_memory() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = sysinfo::System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result_with_mean(name: &str, mean: f64) -> BenchmarkExecutionResult {
        BenchmarkExecutionResult {
            config: BenchmarkTestConfig {
                name: name.to_string(),
                description: String::new(),
                document_count: 10,
                document_size: 1024,
                concurrency: 2,
                enable_optimizations: true,
                timeout_ms: 30_000,
            },
            metrics: BenchmarkMetrics {
                execution_time_ms: mean,
                memory: MemoryMetrics {
                    initial_bytes: 0,
                    peak_bytes: 0,
                    final_bytes: 0,
                },
                throughput: ThroughputMetrics {
                    documents_per_second: 0.0,
                    bytes_per_second: 0.0,
                },
                cache: CacheMetrics {
                    hit_rate: 0.0,
                    total_requests: 0,
                    cached_documents: 0,
                },
                parallel: ParallelMetrics {
                    efficiency: 0.0,
                    configured_concurrency: 2,
                    success_rate: 1.0,
                },
            },
            iterations: Vec::new(),
            statistics: BenchmarkStatistics::from_samples(&[mean]),
        }
    }

    fn suite_with(results: Vec<BenchmarkExecutionResult>) -> BenchmarkSuiteResult {
        BenchmarkSuiteResult {
            timestamp: Utc::now(),
            environment: EnvironmentInfo::capture(),
            config: SuiteConfig::default(),
            summary: SuiteSummary {
                total_tests: results.len(),
                passed_tests: results.len(),
                failed_tests: 0,
                total_execution_time_ms: 0,
                average_performance_ms: 0.0,
                regressions: Vec::new(),
            },
            results,
        }
    }

    fn runner_in(dir: &TempDir) -> BenchmarkRunner {
        BenchmarkRunner::new(
            dir.path(),
            SuiteConfig {
                output_dir: dir.path().join("benchmark-results"),
                ..SuiteConfig::default()
            },
        )
    }

    #[test]
    fn regression_flagged_above_threshold_only() {
        let dir = TempDir::new().unwrap();
        let runner = runner_in(&dir);

        let baseline = suite_with(vec![
            result_with_mean("steady", 100.0),
            result_with_mean("slower", 100.0),
        ]);
        std::fs::create_dir_all(runner.config().output_dir.clone()).unwrap();
        std::fs::write(
            runner.config().output_dir.join("baseline.json"),
            serde_json::to_string_pretty(&baseline).unwrap(),
        )
        .unwrap();

        let current = vec![
            result_with_mean("steady", 105.0),
            result_with_mean("slower", 125.0),
            result_with_mean("brand-new", 50.0),
        ];
        let regressions = runner.detect_regressions(&current);

        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].test_name, "slower");
        assert!((regressions[0].regression_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn missing_baseline_degrades_to_no_regressions() {
        let dir = TempDir::new().unwrap();
        let runner = runner_in(&dir);
        let regressions = runner.detect_regressions(&[result_with_mean("any", 100.0)]);
        assert!(regressions.is_empty());
    }

    #[test]
    fn corrupt_baseline_degrades_to_no_regressions() {
        let dir = TempDir::new().unwrap();
        let runner = runner_in(&dir);
        std::fs::create_dir_all(runner.config().output_dir.clone()).unwrap();
        std::fs::write(
            runner.config().output_dir.join("baseline.json"),
            "{ not json",
        )
        .unwrap();

        let regressions = runner.detect_regressions(&[result_with_mean("any", 100.0)]);
        assert!(regressions.is_empty());
    }

    #[test]
    fn save_results_writes_timestamped_file_and_baseline() {
        let dir = TempDir::new().unwrap();
        let runner = runner_in(&dir);
        let suite_result = suite_with(vec![result_with_mean("only", 42.0)]);

        runner.save_results(&suite_result).unwrap();

        let output_dir = runner.config().output_dir.clone();
        assert!(output_dir.join("baseline.json").exists());
        let timestamped = std::fs::read_dir(&output_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("benchmark-results-")
            })
            .count();
        assert_eq!(timestamped, 1);

        let reloaded: BenchmarkSuiteResult = serde_json::from_str(
            &std::fs::read_to_string(output_dir.join("baseline.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(reloaded.results.len(), 1);
        assert_eq!(reloaded.results[0].config.name, "only");
    }
}
