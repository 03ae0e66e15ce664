//! Batched, cached Git history queries.

use crate::command::run_git;
use crate::types::{GitChanges, GitCommit, GitOperation, GitTag, OperationMetrics, TimeRange};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempo_core::{Result, TempoError, ValidationCache};
use tracing::{debug, warn};

/// Tag names that identify a release: `v?MAJOR.MINOR.PATCH(-prerelease)?`.
static RELEASE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?$").unwrap());

const LAST_RELEASE_KEY: &str = "last-release-tag";

/// Diffs longer than this many lines are classified in concurrent chunks.
const PARALLEL_CLASSIFY_THRESHOLD: usize = 100;
const CLASSIFY_CHUNK: usize = 50;

/// Git optimizer configuration, injected by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Commits fetched per `--skip`/`--max-count` page.
    pub max_commits_per_batch: usize,

    /// Restrict tag lookup to ancestors of `HEAD`.
    pub shallow_tag_lookup: bool,

    /// Memoize query results in the validation caches.
    pub use_cache: bool,

    /// Classify large diffs in concurrent chunks.
    pub parallel_file_classification: bool,

    pub cache_expiration: Duration,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            max_commits_per_batch: 100,
            shallow_tag_lookup: false,
            use_cache: true,
            parallel_file_classification: true,
            cache_expiration: Duration::from_secs(30 * 60),
        }
    }
}

/// Entry counts of the optimizer's validation caches.
#[derive(Debug, Clone, Copy)]
pub struct GitCacheStats {
    pub release_lookups: usize,
    pub tag_infos: usize,
    pub change_sets: usize,
}

#[derive(Default)]
struct FileBuckets {
    added: Vec<String>,
    modified: Vec<String>,
    deleted: Vec<String>,
}

impl FileBuckets {
    fn merge(&mut self, other: FileBuckets) {
        self.added.extend(other.added);
        self.modified.extend(other.modified);
        self.deleted.extend(other.deleted);
    }
}

/// Batched, cached Git history extraction rooted at one working directory.
pub struct GitHistoryOptimizer {
    working_dir: PathBuf,
    config: GitConfig,
    last_release_cache: ValidationCache<Option<GitTag>>,
    tag_info_cache: ValidationCache<GitTag>,
    changes_cache: ValidationCache<GitChanges>,
}

impl GitHistoryOptimizer {
    pub fn new(working_dir: impl Into<PathBuf>, config: GitConfig) -> Self {
        let expiration = config.cache_expiration;
        Self {
            working_dir: working_dir.into(),
            config,
            last_release_cache: ValidationCache::new(expiration),
            tag_info_cache: ValidationCache::new(expiration),
            changes_cache: ValidationCache::new(expiration),
        }
    }

    /// Find the most recent semantic-version release tag, if any.
    ///
    /// Tags are listed version-descending by git itself; the first name
    /// matching the release pattern wins. Non-release tags (`feature-x`,
    /// `nightly`) are ignored.
    pub async fn find_last_release(&self) -> Result<GitOperation<Option<GitTag>>> {
        let started = Instant::now();
        if self.config.use_cache {
            if let Some(cached) = self.last_release_cache.get(LAST_RELEASE_KEY) {
                return Ok(GitOperation::cached(cached));
            }
        }

        let mut args = vec!["tag", "-l", "--sort=-version:refname"];
        if self.config.shallow_tag_lookup {
            args.extend(["--merged", "HEAD"]);
        }
        let output = run_git(&self.working_dir, &args).await?;
        let tags: Vec<&str> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let batch_size = self.config.max_commits_per_batch.clamp(1, 50);
        let batch_count = tags.len().div_ceil(batch_size);

        for batch in tags.chunks(batch_size) {
            for name in batch {
                if !RELEASE_TAG_RE.is_match(name) {
                    continue;
                }
                let tag = self.tag_info(name).await?;
                if self.config.use_cache {
                    self.last_release_cache
                        .put(LAST_RELEASE_KEY, Some(tag.clone()));
                }
                return Ok(GitOperation {
                    data: Some(tag),
                    metrics: OperationMetrics {
                        duration: started.elapsed(),
                        cache_hit: false,
                        batch_count,
                        processed_items: tags.len(),
                    },
                });
            }
        }

        if self.config.use_cache {
            self.last_release_cache.put(LAST_RELEASE_KEY, None);
        }
        Ok(GitOperation {
            data: None,
            metrics: OperationMetrics {
                duration: started.elapsed(),
                cache_hit: false,
                batch_count,
                processed_items: tags.len(),
            },
        })
    }

    /// Compute the full change-set between `reference` and `HEAD`.
    ///
    /// Endpoint resolution, commit pagination, the file diff, and the
    /// starting date are queried concurrently.
    pub async fn changes_since(&self, reference: &str) -> Result<GitOperation<GitChanges>> {
        let started = Instant::now();
        let key = format!("changes-since-{reference}");
        if self.config.use_cache {
            if let Some(cached) = self.changes_cache.get(&key) {
                return Ok(GitOperation::cached(cached));
            }
        }

        let range = format!("{reference}..HEAD");
        let (to_commit, from_commit, commits, files, from_date) = tokio::try_join!(
            self.rev_parse("HEAD"),
            self.rev_parse(reference),
            self.commits_since(&range),
            self.file_changes_since(&range),
            self.commit_date(reference),
        )?;
        let (commits, commit_batches, total_commits) = commits;
        let (buckets, file_batches, line_count) = files;

        debug!(
            from = %from_commit,
            to = %to_commit,
            commits = commits.len(),
            "computed change-set"
        );

        let changes = GitChanges {
            commits,
            added_files: buckets.added,
            modified_files: buckets.modified,
            deleted_files: buckets.deleted,
            time_range: TimeRange {
                from: from_date,
                to: Utc::now(),
            },
        };
        if self.config.use_cache {
            self.changes_cache.put(key, changes.clone());
        }

        Ok(GitOperation {
            data: changes,
            metrics: OperationMetrics {
                duration: started.elapsed(),
                cache_hit: false,
                batch_count: commit_batches + file_batches,
                processed_items: total_commits + line_count,
            },
        })
    }

    /// Resolve a tag to its commit, date, and annotation message.
    async fn tag_info(&self, name: &str) -> Result<GitTag> {
        let key = format!("tag-info-{name}");
        if self.config.use_cache {
            if let Some(cached) = self.tag_info_cache.get(&key) {
                return Ok(cached);
            }
        }

        let commit = run_git(&self.working_dir, &["rev-list", "-n", "1", name])
            .await?
            .trim()
            .to_string();
        let date = self.commit_date(&commit).await?;
        // Lightweight tags have no contents; annotated ones carry a message.
        let message = match run_git(
            &self.working_dir,
            &["tag", "-l", "--format=%(contents)", name],
        )
        .await
        {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(_) => None,
        };

        let tag = GitTag {
            name: name.to_string(),
            commit,
            date,
            message,
        };
        if self.config.use_cache {
            self.tag_info_cache.put(key, tag.clone());
        }
        Ok(tag)
    }

    /// Fetch commits for `range` in `--skip`/`--max-count` pages.
    async fn commits_since(&self, range: &str) -> Result<(Vec<GitCommit>, usize, usize)> {
        let count_output = run_git(&self.working_dir, &["rev-list", "--count", range]).await?;
        let total: usize = count_output.trim().parse().unwrap_or(0);
        if total == 0 {
            return Ok((Vec::new(), 0, 0));
        }

        let batch_size = self.config.max_commits_per_batch.max(1);
        let batch_count = total.div_ceil(batch_size);
        let mut commits = Vec::with_capacity(total);

        for index in 0..batch_count {
            let skip_arg = format!("--skip={}", index * batch_size);
            let count_arg = format!("--max-count={batch_size}");
            let output = run_git(
                &self.working_dir,
                &[
                    "log",
                    range,
                    "--format=%H|%h|%an|%ci|%s",
                    "--name-only",
                    &skip_arg,
                    &count_arg,
                ],
            )
            .await?;

            let mut errors = Vec::new();
            commits.extend(parse_commit_sections(&output, &mut errors));
            if !errors.is_empty() {
                warn!(
                    batch = index,
                    skipped = errors.len(),
                    first = %errors[0],
                    "skipped malformed commit records"
                );
            }
        }

        Ok((commits, batch_count, total))
    }

    /// Classify the `--name-status` diff into added/modified/deleted sets.
    async fn file_changes_since(&self, range: &str) -> Result<(FileBuckets, usize, usize)> {
        let output = run_git(&self.working_dir, &["diff", "--name-status", range]).await?;
        let lines: Vec<String> = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        let line_count = lines.len();

        if self.config.parallel_file_classification && line_count > PARALLEL_CLASSIFY_THRESHOLD {
            let chunks: Vec<Vec<String>> =
                lines.chunks(CLASSIFY_CHUNK).map(<[String]>::to_vec).collect();
            let batch_count = chunks.len();

            let mut handles = Vec::with_capacity(batch_count);
            for chunk in chunks {
                handles.push(tokio::task::spawn_blocking(move || {
                    classify_status_lines(&chunk)
                }));
            }
            let mut buckets = FileBuckets::default();
            for handle in handles {
                let part = handle.await.map_err(|err| {
                    TempoError::task(format!("file classification worker failed: {err}"))
                })?;
                buckets.merge(part);
            }
            Ok((buckets, batch_count, line_count))
        } else {
            let batch_count = usize::from(line_count > 0);
            Ok((classify_status_lines(&lines), batch_count, line_count))
        }
    }

    async fn rev_parse(&self, reference: &str) -> Result<String> {
        Ok(run_git(&self.working_dir, &["rev-parse", reference])
            .await?
            .trim()
            .to_string())
    }

    async fn commit_date(&self, reference: &str) -> Result<DateTime<Utc>> {
        let output = run_git(&self.working_dir, &["log", "-1", "--format=%ci", reference]).await?;
        Ok(parse_git_date(output.trim()).unwrap_or_else(|| {
            warn!(reference, "unparseable commit date, substituting now");
            Utc::now()
        }))
    }

    /// Entry counts of the validation caches.
    pub fn cache_stats(&self) -> GitCacheStats {
        GitCacheStats {
            release_lookups: self.last_release_cache.len(),
            tag_infos: self.tag_info_cache.len(),
            change_sets: self.changes_cache.len(),
        }
    }

    /// Drop every memoized result.
    pub fn reset(&self) {
        self.last_release_cache.invalidate_all();
        self.tag_info_cache.invalidate_all();
        self.changes_cache.invalidate_all();
    }

    /// Drop memoized results older than the configured expiration, returning
    /// how many were removed.
    pub fn prune_caches(&self) -> usize {
        let max_age = self.config.cache_expiration;
        self.last_release_cache.prune_older_than(max_age)
            + self.tag_info_cache.prune_older_than(max_age)
            + self.changes_cache.prune_older_than(max_age)
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }
}

/// Parse `git log --format=%H|%h|%an|%ci|%s --name-only` output: records are
/// separated by blank lines, each a header line followed by touched paths.
/// Malformed records are skipped and reported through `errors`.
fn parse_commit_sections(output: &str, errors: &mut Vec<String>) -> Vec<GitCommit> {
    let mut commits = Vec::new();
    for section in output.split("\n\n") {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }
        let mut lines = section.lines();
        let Some(header) = lines.next() else {
            continue;
        };
        if !header.contains('|') {
            continue;
        }

        let parts: Vec<&str> = header.splitn(5, '|').collect();
        if parts.len() < 5 {
            errors.push(format!("malformed commit record: {header}"));
            continue;
        }
        let Some(date) = parse_git_date(parts[3].trim()) else {
            errors.push(format!("unparseable commit date: {}", parts[3]));
            continue;
        };

        let files = lines
            .filter(|line| !line.trim().is_empty() && !line.contains('|'))
            .map(|line| line.trim().to_string())
            .collect();

        commits.push(GitCommit {
            hash: parts[0].trim().to_string(),
            short_hash: parts[1].trim().to_string(),
            author: parts[2].trim().to_string(),
            date,
            subject: parts[4].trim().to_string(),
            files,
        });
    }
    commits
}

/// Classify `--name-status` lines. Renames and copies count as modifications
/// of the listed path.
fn classify_status_lines(lines: &[String]) -> FileBuckets {
    let mut buckets = FileBuckets::default();
    for line in lines {
        let mut parts = line.split('\t');
        let Some(status) = parts.next() else {
            continue;
        };
        let path = parts.collect::<Vec<_>>().join("\t");
        if path.is_empty() {
            continue;
        }
        match status.chars().next() {
            Some('A') => buckets.added.push(path),
            Some('M') => buckets.modified.push(path),
            Some('D') => buckets.deleted.push(path),
            Some('R') | Some('C') => buckets.modified.push(path),
            _ => {}
        }
    }
    buckets
}

/// Parse git's `%ci` date format, e.g. `2023-10-20 14:33:05 +0200`.
fn parse_git_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_tag_pattern_accepts_semver_only() {
        for tag in ["v1.0.0", "1.2.3", "v10.20.30", "v1.0.0-rc.1", "2.0.0-beta"] {
            assert!(RELEASE_TAG_RE.is_match(tag), "{tag} should match");
        }
        for tag in ["feature-x", "v1.0", "release", "v1.0.0.0", "1.0.0 "] {
            assert!(!RELEASE_TAG_RE.is_match(tag), "{tag} should not match");
        }
    }

    #[test]
    fn classify_handles_all_statuses() {
        let lines: Vec<String> = [
            "A\tsrc/new.rs",
            "M\tsrc/lib.rs",
            "D\tsrc/old.rs",
            "R100\tsrc/before.rs\tsrc/after.rs",
            "C75\tsrc/base.rs\tsrc/copy.rs",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let buckets = classify_status_lines(&lines);
        assert_eq!(buckets.added, vec!["src/new.rs"]);
        assert_eq!(buckets.deleted, vec!["src/old.rs"]);
        assert_eq!(buckets.modified.len(), 3);
    }

    #[test]
    fn commit_sections_parse_and_skip_malformed() {
        let output = "\
abc123|abc|Alice|2023-10-20 14:33:05 +0200|feat: add parser\n\
src/parser.rs\n\
src/lib.rs\n\
\n\
broken-record-without-pipes\n\
\n\
def456|def|Bob|not-a-date|fix: typo\n\
\n\
fed789|fed|Carol|2023-10-21 09:00:00 +0000|chore: bump|with pipe\n\
README.md\n";

        let mut errors = Vec::new();
        let commits = parse_commit_sections(output, &mut errors);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc123");
        assert_eq!(commits[0].author, "Alice");
        assert_eq!(commits[0].files, vec!["src/parser.rs", "src/lib.rs"]);
        assert_eq!(commits[1].subject, "chore: bump|with pipe");
        assert_eq!(commits[1].files, vec!["README.md"]);
        // The unparseable date is reported, the pipe-free line is ignored.
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn git_dates_parse_with_offset() {
        let parsed = parse_git_date("2023-10-20 14:33:05 +0200").unwrap();
        assert_eq!(parsed.timezone(), Utc);
        assert!(parse_git_date("garbage").is_none());
    }
}
