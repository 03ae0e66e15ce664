//! Benchmarks for the document parsing cache hit and miss paths.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tempo_cache::{DocumentCache, ParsingConfig};
use tokio::runtime::Runtime;

fn setup(count: usize) -> (TempDir, DocumentCache, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let mut paths = Vec::with_capacity(count);
    for i in 0..count {
        let rel = format!("specs/task-{i}-completion.md");
        let full = dir.path().join(&rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(
            &full,
            format!(
                "# Task {i} Completion\n\n**Date**: 2023-10-20\n**Status**: Complete\n\nBody {i}.\n"
            ),
        )
        .unwrap();
        paths.push(PathBuf::from(rel));
    }
    let cache = DocumentCache::new(dir.path(), ParsingConfig::default());
    (dir, cache, paths)
}

fn bench_cache_hit_path(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_dir, cache, paths) = setup(1);

    rt.block_on(async { cache.parse_incremental(&paths[0]).await.unwrap() });

    c.bench_function("cache_hit_single_document", |b| {
        b.iter(|| rt.block_on(async { cache.parse_incremental(&paths[0]).await.unwrap() }))
    });
}

fn bench_parallel_warm_parse(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_dir, cache, paths) = setup(50);

    rt.block_on(async { cache.parse_documents_parallel(&paths, |_| {}).await });

    let mut group = c.benchmark_group("cache");
    group.throughput(Throughput::Elements(50));
    group.bench_function("parallel_parse_50_warm", |b| {
        b.iter(|| rt.block_on(async { cache.parse_documents_parallel(&paths, |_| {}).await }))
    });
    group.finish();
}

criterion_group!(benches, bench_cache_hit_path, bench_parallel_warm_parse);
criterion_main!(benches);
