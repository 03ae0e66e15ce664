//! Incremental parsing cache with LRU batch eviction.

use crate::extract;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tempo_core::{CompletionDocument, Result, TempoError};
use tempo_processor::{ParallelProcessor, ProcessingTask, ProcessorConfig};
use tracing::{debug, info, warn};

/// Parsing cache configuration, injected by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    pub enable_cache: bool,

    /// Entry capacity; reaching it evicts the least-recently-accessed 25%.
    pub max_cache_size: usize,

    /// Entries unread for longer than this are stale.
    pub max_cache_age: Duration,

    /// When false, every request parses fresh.
    pub enable_incremental: bool,

    /// Verify a blake3 digest of current file bytes on every hit, catching
    /// rewrites that keep the modification time.
    pub enable_content_hashing: bool,

    pub enable_parallel: bool,
    pub max_concurrent_parsing: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            max_cache_size: 1000,
            max_cache_age: Duration::from_secs(60 * 60),
            enable_incremental: true,
            enable_content_hashing: true,
            enable_parallel: true,
            max_concurrent_parsing: 4,
        }
    }
}

/// One cached parse.
struct CacheEntry {
    document: CompletionDocument,
    /// Empty when content hashing is disabled.
    content_hash: String,
    file_size: u64,
    modified: SystemTime,
    parse_time: Duration,
    access_count: u64,
    last_accessed: Instant,
}

/// Result of an incremental parse request.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub document: CompletionDocument,
    pub from_cache: bool,
    pub cache_hit: bool,
    pub content_changed: bool,
    pub parse_time: Duration,
}

/// Progress snapshot for batch parsing.
#[derive(Debug, Clone, Serialize)]
pub struct ParseProgress {
    pub completed: usize,
    pub total: usize,
    pub current_file: String,
}

/// Point-in-time cache statistics.
///
/// Hit rate and totals cover the cache's lifetime; size and access ages are
/// derived from the live entry set on demand.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_documents: u64,
    pub cached_documents: usize,
    pub total_requests: u64,
    pub cache_hit_rate: f64,
    pub total_parse_time: Duration,
    pub average_parse_time: Duration,
    pub cache_size_bytes: u64,
    pub oldest_access: Option<Instant>,
    pub newest_access: Option<Instant>,
}

#[derive(Default)]
struct CacheCounters {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    parse_time_micros: AtomicU64,
    documents_processed: AtomicU64,
}

/// Thread-safe incremental document parsing cache.
///
/// The entry map is a `DashMap`: whichever concurrent parse completes first
/// populates the entry, and later completions simply overwrite it with an
/// equally fresh value. Clones share the same underlying cache state, so a
/// clone can be handed to spawned parse tasks.
pub struct DocumentCache {
    working_dir: Arc<PathBuf>,
    config: ParsingConfig,
    entries: Arc<DashMap<PathBuf, CacheEntry>>,
    counters: Arc<CacheCounters>,
}

impl Clone for DocumentCache {
    fn clone(&self) -> Self {
        Self {
            working_dir: Arc::clone(&self.working_dir),
            config: self.config.clone(),
            entries: Arc::clone(&self.entries),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl DocumentCache {
    pub fn new(working_dir: impl Into<PathBuf>, config: ParsingConfig) -> Self {
        Self {
            working_dir: Arc::new(working_dir.into()),
            config,
            entries: Arc::new(DashMap::new()),
            counters: Arc::new(CacheCounters::default()),
        }
    }

    /// Parse a document, serving it from cache when still fresh.
    ///
    /// Unreadable paths are an error here; batch parsing recovers per path
    /// instead.
    pub async fn parse_incremental(&self, path: &Path) -> Result<ParseOutcome> {
        let started = Instant::now();
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let full_path = self.working_dir.join(path);
        let meta = tokio::fs::metadata(&full_path).await.map_err(|err| {
            TempoError::parse(format!("failed to parse document {}: {err}", path.display()))
        })?;

        if self.config.enable_cache && self.config.enable_incremental {
            if let Some(document) = self.cached_document(path, &full_path, &meta).await {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(ParseOutcome {
                    document,
                    from_cache: true,
                    cache_hit: true,
                    content_changed: false,
                    parse_time: started.elapsed(),
                });
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let (document, file_size, modified) = self.parse_fresh(path, &full_path, &meta).await?;
        let parse_time = started.elapsed();
        self.counters
            .parse_time_micros
            .fetch_add(parse_time.as_micros() as u64, Ordering::Relaxed);
        self.counters
            .documents_processed
            .fetch_add(1, Ordering::Relaxed);

        if self.config.enable_cache {
            self.admit(path, document.clone(), file_size, modified, parse_time);
        }

        Ok(ParseOutcome {
            document,
            from_cache: false,
            cache_hit: false,
            content_changed: true,
            parse_time,
        })
    }

    /// Would a request for `path` parse fresh right now?
    ///
    /// Any filesystem error during the check is conservatively "yes".
    pub async fn needs_reparsing(&self, path: &Path) -> bool {
        if !self.config.enable_cache || !self.config.enable_incremental {
            return true;
        }

        let full_path = self.working_dir.join(path);
        let Ok(meta) = tokio::fs::metadata(&full_path).await else {
            return true;
        };
        let Some((stored_modified, age, stored_hash)) = self
            .entries
            .get(path)
            .map(|e| (e.modified, e.last_accessed.elapsed(), e.content_hash.clone()))
        else {
            return true;
        };
        let Ok(fs_modified) = meta.modified() else {
            return true;
        };

        if fs_modified != stored_modified || age > self.config.max_cache_age {
            return true;
        }
        if self.config.enable_content_hashing {
            match tokio::fs::read_to_string(&full_path).await {
                Ok(content) => {
                    if extract::content_hash(&content) != stored_hash {
                        return true;
                    }
                }
                Err(_) => return true,
            }
        }
        false
    }

    /// Parse many documents, delegating to the bounded task processor when
    /// the path count exceeds the configured parsing concurrency. Per-path
    /// failures are logged and excluded rather than aborting the batch.
    pub async fn parse_documents_parallel<F>(
        &self,
        paths: &[PathBuf],
        mut on_progress: F,
    ) -> Vec<ParseOutcome>
    where
        F: FnMut(ParseProgress) + Send,
    {
        let total = paths.len();
        let mut outcomes = Vec::with_capacity(total);

        if !self.config.enable_parallel || total <= self.config.max_concurrent_parsing {
            for (index, path) in paths.iter().enumerate() {
                on_progress(ParseProgress {
                    completed: index,
                    total,
                    current_file: path.display().to_string(),
                });
                match self.parse_incremental(path).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to parse document");
                    }
                }
            }
            on_progress(ParseProgress {
                completed: total,
                total,
                current_file: String::new(),
            });
            return outcomes;
        }

        let processor = ParallelProcessor::new(ProcessorConfig {
            max_concurrency: self.config.max_concurrent_parsing,
            batch_size: self.config.max_concurrent_parsing.max(1),
            // Filesystem parse failures are not transient; no retry budget.
            max_retries: 0,
            ..ProcessorConfig::default()
        });

        let tasks = paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let cache = self.clone();
                ProcessingTask::new(
                    format!("{index}#{}", path.display()),
                    path.clone(),
                    move |path: PathBuf| {
                        let cache = cache.clone();
                        async move { cache.parse_incremental(&path).await }
                    },
                )
            })
            .collect();

        let run = processor
            .process_tasks_with_progress(tasks, |progress| {
                let current_file = progress
                    .current_task
                    .splitn(2, '#')
                    .nth(1)
                    .unwrap_or(&progress.current_task)
                    .to_string();
                on_progress(ParseProgress {
                    completed: progress.completed,
                    total,
                    current_file,
                });
            })
            .await;

        match run {
            Ok(results) => {
                for result in results {
                    match (result.success, result.result) {
                        (true, Some(outcome)) => outcomes.push(outcome),
                        _ => {
                            warn!(
                                task = %result.id,
                                error = result.error.as_deref().unwrap_or("unknown"),
                                "failed to parse document"
                            );
                        }
                    }
                }
            }
            Err(err) => warn!(error = %err, "parallel parse submission rejected"),
        }

        outcomes
    }

    /// Warm the cache for `paths`; results are discarded.
    pub async fn preload(&self, paths: &[PathBuf]) {
        let loaded = self.parse_documents_parallel(paths, |_| {}).await;
        info!(preloaded = loaded.len(), "preloaded documents into cache");
    }

    async fn cached_document(
        &self,
        path: &Path,
        full_path: &Path,
        meta: &std::fs::Metadata,
    ) -> Option<CompletionDocument> {
        let (stored_modified, age, stored_hash) = self
            .entries
            .get(path)
            .map(|e| (e.modified, e.last_accessed.elapsed(), e.content_hash.clone()))?;

        let Ok(fs_modified) = meta.modified() else {
            self.entries.remove(path);
            return None;
        };
        if fs_modified != stored_modified || age > self.config.max_cache_age {
            self.entries.remove(path);
            return None;
        }
        if self.config.enable_content_hashing {
            let content = match tokio::fs::read_to_string(full_path).await {
                Ok(content) => content,
                Err(_) => {
                    self.entries.remove(path);
                    return None;
                }
            };
            if extract::content_hash(&content) != stored_hash {
                self.entries.remove(path);
                return None;
            }
        }

        let mut entry = self.entries.get_mut(path)?;
        entry.access_count += 1;
        entry.last_accessed = Instant::now();
        Some(entry.document.clone())
    }

    async fn parse_fresh(
        &self,
        path: &Path,
        full_path: &Path,
        meta: &std::fs::Metadata,
    ) -> Result<(CompletionDocument, u64, SystemTime)> {
        let content = tokio::fs::read_to_string(full_path).await.map_err(|err| {
            TempoError::parse(format!("failed to parse document {}: {err}", path.display()))
        })?;
        let modified = meta.modified().map_err(|err| {
            TempoError::parse(format!(
                "failed to stat document {}: {err}",
                path.display()
            ))
        })?;

        let metadata = extract::extract_metadata(&content, path);
        let git_commit = file_last_commit(&self.working_dir, path).await;

        let document = CompletionDocument {
            path: path.to_path_buf(),
            content,
            modified: modified.into(),
            git_commit,
            metadata,
        };
        Ok((document, meta.len(), modified))
    }

    fn admit(
        &self,
        path: &Path,
        document: CompletionDocument,
        file_size: u64,
        modified: SystemTime,
        parse_time: Duration,
    ) {
        if self.entries.len() >= self.config.max_cache_size {
            self.evict_lru();
        }

        let content_hash = if self.config.enable_content_hashing {
            extract::content_hash(&document.content)
        } else {
            String::new()
        };

        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                document,
                content_hash,
                file_size,
                modified,
                parse_time,
                access_count: 1,
                last_accessed: Instant::now(),
            },
        );
    }

    /// Remove the least-recently-accessed 25% of entries in one pass,
    /// amortizing eviction cost over many insertions.
    fn evict_lru(&self) {
        let mut by_age: Vec<(PathBuf, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.last_accessed))
            .collect();
        by_age.sort_by_key(|(_, accessed)| *accessed);

        let to_remove = by_age.len().div_ceil(4);
        for (path, _) in by_age.into_iter().take(to_remove) {
            self.entries.remove(&path);
        }
        debug!(evicted = to_remove, remaining = self.entries.len(), "evicted LRU cache entries");
    }

    /// Lifetime and live-set statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;

        let mut cache_size_bytes = 0u64;
        let mut entry_parse_micros = 0u64;
        let mut oldest_access: Option<Instant> = None;
        let mut newest_access: Option<Instant> = None;
        let mut live = 0usize;
        for entry in self.entries.iter() {
            live += 1;
            cache_size_bytes += entry.file_size;
            entry_parse_micros += entry.parse_time.as_micros() as u64;
            let accessed = entry.last_accessed;
            oldest_access = Some(oldest_access.map_or(accessed, |o| o.min(accessed)));
            newest_access = Some(newest_access.map_or(accessed, |n| n.max(accessed)));
        }

        CacheStats {
            total_documents: self.counters.documents_processed.load(Ordering::Relaxed),
            cached_documents: live,
            total_requests,
            cache_hit_rate: if total_requests > 0 {
                hits as f64 / total_requests as f64
            } else {
                0.0
            },
            total_parse_time: Duration::from_micros(
                self.counters.parse_time_micros.load(Ordering::Relaxed),
            ),
            average_parse_time: if live > 0 {
                Duration::from_micros(entry_parse_micros / live as u64)
            } else {
                Duration::ZERO
            },
            cache_size_bytes,
            oldest_access,
            newest_access,
        }
    }

    /// Drop every entry and reset lifetime statistics.
    pub fn clear(&self) {
        self.entries.clear();
        self.counters.requests.store(0, Ordering::Relaxed);
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.parse_time_micros.store(0, Ordering::Relaxed);
        self.counters.documents_processed.store(0, Ordering::Relaxed);
    }

    /// Drop entries unread for longer than the configured age, returning how
    /// many were removed.
    pub fn prune_old_entries(&self) -> usize {
        let before = self.entries.len();
        let max_age = self.config.max_cache_age;
        self.entries.retain(|_, entry| entry.last_accessed.elapsed() <= max_age);
        before - self.entries.len()
    }

    /// The most frequently accessed cached documents, descending.
    pub fn most_accessed(&self, limit: usize) -> Vec<(PathBuf, u64, Duration)> {
        let mut all: Vec<(PathBuf, u64, Duration)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.access_count, e.parse_time))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all.truncate(limit);
        all
    }

    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }
}

/// Hash of the most recent commit touching `path`, best-effort: any failure
/// (no git, untracked file, not a repository) yields an empty string.
async fn file_last_commit(working_dir: &Path, path: &Path) -> String {
    let output = tokio::process::Command::new("git")
        .args(["log", "-1", "--format=%H", "--"])
        .arg(path)
        .current_dir(working_dir)
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => String::new(),
    }
}
