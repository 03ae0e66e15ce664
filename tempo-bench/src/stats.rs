//! Statistics over iteration timings.

use serde::{Deserialize, Serialize};

/// Derived statistics for one test's successful iteration timings, in
/// milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub mean: f64,
    pub median: f64,
    pub standard_deviation: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_95: f64,
    pub percentile_99: f64,
}

impl BenchmarkStatistics {
    /// Compute statistics over a non-empty sample.
    ///
    /// Median uses the midpoint average for even counts, the standard
    /// deviation is the population form, and percentiles are nearest-rank on
    /// the sorted sample.
    pub fn from_samples(values: &[f64]) -> Self {
        assert!(!values.is_empty(), "statistics require at least one sample");

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("timings are finite"));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            mean,
            median,
            standard_deviation: variance.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
            percentile_95: nearest_rank(&sorted, 0.95),
            percentile_99: nearest_rank(&sorted, 0.99),
        }
    }
}

fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let index = ((sorted.len() as f64 * percentile) as usize).min(sorted.len() - 1);
    sorted[index]
}
