use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use idlink_contacts::IdentifyRequest;
use idlink_infra::{IdentityResolver, InMemoryContactStore, MergeStrategy};
use tokio::runtime::Runtime;

type Resolver = IdentityResolver<Arc<InMemoryContactStore>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn request(email: Option<String>, phone: Option<String>) -> IdentifyRequest {
    IdentifyRequest::new(email, phone)
}

/// One primary on `primary@example.com` with `size - 1` secondaries, each
/// adding a new phone number.
fn cluster_of(rt: &Runtime, strategy: MergeStrategy, size: usize) -> Resolver {
    let resolver = IdentityResolver::new(Arc::new(InMemoryContactStore::new()))
        .with_merge_strategy(strategy);
    rt.block_on(async {
        for i in 0..size {
            resolver
                .resolve(&request(
                    Some("primary@example.com".to_string()),
                    Some(format!("555{i:05}")),
                ))
                .await
                .unwrap();
        }
    });
    resolver
}

fn bench_resolution_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("resolution_latency");
    group.sample_size(1000);

    // Every iteration sees a fresh value pair: always a primary creation.
    group.bench_function("create_primary", |b| {
        let resolver = cluster_of(&rt, MergeStrategy::Reparent, 0);
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let req = request(Some(format!("user{n}@example.com")), Some(format!("{n}")));
            black_box(rt.block_on(resolver.resolve(&req)).unwrap());
        });
    });

    // Known pair: no writes, only the lookup and the cluster read.
    group.bench_function("exact_match", |b| {
        let resolver = cluster_of(&rt, MergeStrategy::Reparent, 1);
        let req = request(
            Some("primary@example.com".to_string()),
            Some("55500000".to_string()),
        );
        b.iter(|| black_box(rt.block_on(resolver.resolve(black_box(&req))).unwrap()));
    });

    group.finish();
}

fn bench_cluster_read_by_size(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("cluster_read_by_size");

    for size in [1usize, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("email_only", size), size, |b, &size| {
            let resolver = cluster_of(&rt, MergeStrategy::Reparent, size);
            let req = request(Some("primary@example.com".to_string()), None);
            b.iter(|| black_box(rt.block_on(resolver.resolve(&req)).unwrap()));
        });
    }

    group.finish();
}

fn bench_merge_strategies(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("merge_two_clusters");

    for strategy in [MergeStrategy::Reparent, MergeStrategy::FlipOnly] {
        for size in [10usize, 100].iter() {
            group.bench_with_input(
                BenchmarkId::new(strategy.as_str(), size),
                size,
                |b, &size| {
                    b.iter_batched(
                        || {
                            let resolver = cluster_of(&rt, strategy, size);
                            // Second cluster, created later, so it is the one demoted.
                            rt.block_on(async {
                                for i in 0..size {
                                    resolver
                                        .resolve(&request(
                                            Some("late@example.com".to_string()),
                                            Some(format!("777{i:05}")),
                                        ))
                                        .await
                                        .unwrap();
                                }
                            });
                            resolver
                        },
                        |resolver| {
                            let req = request(
                                Some("primary@example.com".to_string()),
                                Some("77700000".to_string()),
                            );
                            black_box(rt.block_on(resolver.resolve(&req)).unwrap());
                        },
                        BatchSize::SmallInput,
                    );
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolution_latency,
    bench_cluster_read_by_size,
    bench_merge_strategies
);
criterion_main!(benches);
