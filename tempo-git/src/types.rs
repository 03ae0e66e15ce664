//! Read-only value objects describing Git history.
//!
//! These are reconstructed on every query unless served from the validation
//! cache; they have no lifecycle beyond a single analysis run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A release point: an annotated or lightweight tag resolved to its commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitTag {
    pub name: String,
    pub commit: String,
    pub date: DateTime<Utc>,
    /// Annotation message for annotated tags; `None` for lightweight ones.
    pub message: Option<String>,
}

/// One commit with the file paths it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitCommit {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub files: Vec<String>,
}

/// Time span covered by a change-set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// The full delta between a reference and `HEAD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitChanges {
    pub commits: Vec<GitCommit>,
    pub added_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub time_range: TimeRange,
}

/// How a query was answered: real work or memoized replay.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub cache_hit: bool,
    pub batch_count: usize,
    pub processed_items: usize,
}

/// A query result together with its performance metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitOperation<T> {
    pub data: T,
    pub metrics: OperationMetrics,
}

impl<T> GitOperation<T> {
    /// Wrap a memoized value: zero duration, zero processed items.
    pub(crate) fn cached(data: T) -> Self {
        Self {
            data,
            metrics: OperationMetrics {
                cache_hit: true,
                ..OperationMetrics::default()
            },
        }
    }
}
