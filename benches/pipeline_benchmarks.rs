use channelweld::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

fn double() -> Pipeline<i64, i64> {
    map(|_, item: Item<i64>| async move { Ok(black_box(item? * 2)) }, Options::new())
}

fn bench_basic_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_pipeline");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("passthrough", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let p = from_seq(0..size, Options::new());
                    black_box(collect(p.generate(Context::new())).await);
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("map", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let p = from_seq(0..size, Options::new()).pipe(double());
                    black_box(collect(p.generate(Context::new())).await);
                })
            });
        });
    }

    group.finish();
}

fn bench_pool_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_size");
    group.throughput(Throughput::Elements(10000));

    for pool_size in [1, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("map", pool_size), pool_size, |b, &pool_size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let p = from_seq(0..10000i64, Options::new()).pipe(map(
                        |_, item: Item<i64>| async move { Ok(black_box(item? + 1)) },
                        Options::new().pool_size(pool_size).buffer_size(64),
                    ));
                    black_box(collect(p.generate(Context::new())).await);
                })
            });
        });
    }

    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinators");

    group.bench_function("filter_map_flatten", |b| {
        b.iter(|| {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let p = pipe4(
                    from_seq(0..10000i64, Options::new()),
                    filter(|_, item: &Item<i64>| Ok(matches!(item, Ok(x) if x % 2 == 0)), Options::new()),
                    map(|_, item: Item<i64>| async move { Ok(vec![item?; 2]) }, Options::new()),
                    flatten(Options::new()),
                );
                black_box(collect(p.generate(Context::new())).await);
            })
        });
    });

    group.bench_function("tee_merge", |b| {
        b.iter(|| {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let ctx = Context::new();
                let input = from_seq(0..10000i64, Options::new()).generate(ctx.clone());
                let branches = tee_n(ctx.clone(), input, 4);
                black_box(collect(merge(ctx, branches)).await);
            })
        });
    });

    group.finish();
}

fn bench_batch_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_processing");

    for batch_size in [10, 50, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("batch_size", batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    tokio::runtime::Runtime::new().unwrap().block_on(async {
                        let p = from_seq(0..10000i64, Options::new())
                            .pipe(batch(batch_size, Duration::from_secs(1), Options::new()));
                        black_box(collect(p.generate(Context::new())).await);
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_basic_pipeline,
    bench_pool_size,
    bench_combinators,
    bench_batch_processing
);
criterion_main!(benches);
