//! Tempo benchmark CLI.
//!
//! Runs the benchmark suite against a working directory and writes JSON
//! results plus a rolling baseline:
//!
//! ```bash
//! # Run the canonical suite in the current directory
//! tempo-bench
//!
//! # More iterations, explicit output location
//! tempo-bench --iterations 10 --output-dir target/benchmarks
//!
//! # Compare against a specific baseline file
//! tempo-bench --baseline old-results/baseline.json
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tempo_bench::{BenchmarkRunner, SuiteConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo-bench")]
#[command(about = "Benchmark the Tempo document-analysis pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory the synthetic documents are written under
    #[arg(short, long, default_value = ".")]
    working_dir: PathBuf,

    /// Directory for result files and the rolling baseline
    #[arg(short, long, default_value = "benchmark-results")]
    output_dir: PathBuf,

    /// Measured iterations per test
    #[arg(long, default_value_t = 5)]
    iterations: usize,

    /// Warmup iterations per test (discarded)
    #[arg(long, default_value_t = 2)]
    warmup: usize,

    /// Baseline file to compare against (defaults to <output-dir>/baseline.json)
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Skip writing result files
    #[arg(long)]
    no_save: bool,

    /// Skip regression comparison
    #[arg(long)]
    no_compare: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = SuiteConfig {
        output_dir: cli.output_dir,
        iterations: cli.iterations.max(1),
        warmup_iterations: cli.warmup,
        save_results: !cli.no_save,
        compare_with_baseline: !cli.no_compare,
        baseline_file: cli.baseline,
        ..SuiteConfig::default()
    };

    let runner = BenchmarkRunner::new(&cli.working_dir, config);
    let suite_result = match runner.run_suite().await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "benchmark suite failed");
            process::exit(1);
        }
    };

    let summary = &suite_result.summary;
    info!(
        passed = summary.passed_tests,
        failed = summary.failed_tests,
        total_ms = summary.total_execution_time_ms,
        average_ms = summary.average_performance_ms,
        regressions = summary.regressions.len(),
        "benchmark suite finished"
    );

    if summary.failed_tests > 0 || !summary.regressions.is_empty() {
        process::exit(1);
    }
    Ok(())
}
