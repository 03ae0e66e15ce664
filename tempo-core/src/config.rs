//! Shared configuration objects.
//!
//! Tempo components are configured by plain structs built by the caller and
//! passed into each constructor. Nothing here loads files or environment
//! variables; an external collaborator owns configuration sources and hands
//! the finished objects down. Component-specific knobs (processor, cache,
//! git, benchmark) live next to their components; this module only carries
//! the targets shared across them.

use serde::{Deserialize, Serialize};

/// Performance targets the benchmark suite validates against.
///
/// Targets are advisory for the processing components themselves: the task
/// processor never kills a running task, and `max_analysis_time_ms` is passed
/// through to downstream analyzers rather than enforced here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceTargets {
    /// Maximum acceptable wall time for a full analysis pass, in milliseconds.
    pub max_analysis_time_ms: u64,

    /// Maximum acceptable peak process memory, in megabytes.
    pub max_memory_mb: u64,

    /// Minimum acceptable document-cache hit rate (0.0..=1.0).
    pub min_cache_hit_rate: f64,
}

impl Default for PerformanceTargets {
    fn default() -> Self {
        Self {
            max_analysis_time_ms: 30_000,
            max_memory_mb: 512,
            min_cache_hit_rate: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_are_sane() {
        let targets = PerformanceTargets::default();
        assert!(targets.max_analysis_time_ms > 0);
        assert!(targets.min_cache_hit_rate > 0.0 && targets.min_cache_hit_rate < 1.0);
    }

    #[test]
    fn targets_round_trip_through_json() {
        let targets = PerformanceTargets::default();
        let json = serde_json::to_string(&targets).unwrap();
        let back: PerformanceTargets = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_memory_mb, targets.max_memory_mb);
    }
}
