//! Throughput benchmarks for the bounded task processor.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use tempo_processor::{ParallelProcessor, ProcessingTask, ProcessorConfig};
use tokio::runtime::Runtime;

fn tasks(n: u64) -> Vec<ProcessingTask<u64, u64>> {
    (0..n)
        .map(|i| ProcessingTask::new(format!("task-{i}"), i, |i| async move { Ok(black_box(i) * 2) }))
        .collect()
}

fn bench_process_tasks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("processor");

    for concurrency in [1usize, 4, 8] {
        let processor: ParallelProcessor<u64, u64> = ParallelProcessor::new(ProcessorConfig {
            max_concurrency: concurrency,
            batch_size: 32,
            retry_delay: Duration::from_millis(1),
            ..ProcessorConfig::default()
        });

        group.throughput(Throughput::Elements(256));
        group.bench_with_input(
            BenchmarkId::new("process_256_tasks", concurrency),
            &concurrency,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async { processor.process_tasks(tasks(256)).await.unwrap() })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_process_tasks);
criterion_main!(benches);
