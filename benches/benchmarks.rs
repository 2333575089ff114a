//! Benchmarks for inckmeans operations.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use inckmeans::kernel::{Aggregator, PartialAggregate, Point, PointCodec};
use inckmeans::model::ClusterModel;
use inckmeans::{EngineConfig, IncKMeans};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const DIMENSIONS: usize = 16;
const CLUSTERS: usize = 32;

fn random_point(rng: &mut ChaCha8Rng) -> Vec<f64> {
    (0..DIMENSIONS).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

fn seeds(rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    (0..CLUSTERS).map(|_| random_point(rng)).collect()
}

fn records(rng: &mut ChaCha8Rng, n: usize) -> Vec<String> {
    (0..n)
        .map(|_| {
            random_point(rng)
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect()
}

fn benchmark_nearest_cluster(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let model = ClusterModel::new(
        DIMENSIONS,
        seeds(&mut rng).into_iter().map(Point::from_data).collect(),
        1,
    )
    .unwrap();
    let probe = Point::from_data(random_point(&mut rng));

    c.bench_function("nearest_cluster_32x16", |b| {
        b.iter(|| model.nearest_cluster(black_box(&probe)).id())
    });
}

fn benchmark_combine(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let a = PartialAggregate::observation(&Point::from_data(random_point(&mut rng)), 10);
    let b = PartialAggregate::observation(&Point::from_data(random_point(&mut rng)), 20);

    c.bench_function("aggregate_combine", |bench| {
        bench.iter(|| Aggregator::combine(black_box(&a), black_box(&b)))
    });
}

fn benchmark_codec(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let record = records(&mut rng, 1).remove(0);
    let aggregate = PartialAggregate::observation(&Point::from_data(random_point(&mut rng)), 42);
    let wire = PointCodec::encode_aggregate(&aggregate);

    let mut group = c.benchmark_group("codec");

    group.bench_function("parse_point", |b| {
        b.iter(|| PointCodec::parse_point(black_box(&record)))
    });

    group.bench_function("decode_aggregate", |b| {
        b.iter(|| PointCodec::decode_aggregate(black_box(&wire)))
    });

    group.finish();
}

fn benchmark_process_batch(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let config = EngineConfig::new(DIMENSIONS, seeds(&mut rng)).with_training_threshold(u64::MAX);
    let batch = records(&mut rng, 10_000);

    c.bench_function("process_batch_10k", |b| {
        b.iter_batched(
            || IncKMeans::new(config.clone()).unwrap(),
            |engine| engine.process_batch(black_box(&batch)),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    benchmark_nearest_cluster,
    benchmark_combine,
    benchmark_codec,
    benchmark_process_batch,
);

criterion_main!(benches);
