use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};
use single_mds::dimred::mds::{IterativeMds, PivotMds};
use single_mds::distance::EuclideanDistance;
use single_mds::monitor::NoopMonitor;
use std::time::Duration;

#[derive(Clone)]
pub struct MdsBenchConfig {
    seed: u64,
    // (points, input dimensions)
    data_sizes: Vec<(usize, usize)>,
    pivot_counts: Vec<usize>,
    target_dim: usize,
    epochs: usize,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for MdsBenchConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            data_sizes: vec![(100, 10), (1000, 10), (1000, 100), (5000, 50)],
            pivot_counts: vec![10, 50, 100],
            target_dim: 2,
            epochs: 5,
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

/// `rows × dims` matrix of uniform values in `[0, 1)`.
fn create_test_data(rows: usize, dims: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value_dist = Uniform::try_from(0.0..1.0).unwrap();
    Array2::from_shape_fn((rows, dims), |_| value_dist.sample(&mut rng))
}

fn configure_group<'a, M: Measurement>(
    c: &'a mut Criterion<M>,
    name: &str,
    config: &MdsBenchConfig,
) -> BenchmarkGroup<'a, M> {
    let mut group = c.benchmark_group(name);
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);
    group
}

pub fn bench_pivot_mds(c: &mut Criterion) {
    let config = MdsBenchConfig::default();
    let mut group = configure_group(c, "Pivot_MDS", &config);

    for &(rows, dims) in config.data_sizes.iter() {
        let data = create_test_data(rows, dims, config.seed + (rows * dims) as u64);
        for &pivots in config.pivot_counts.iter().filter(|&&k| k <= rows) {
            group.bench_with_input(
                BenchmarkId::new("embed", format!("{}x{}_k{}", rows, dims, pivots)),
                &(rows, dims, pivots),
                |b, _| {
                    b.iter(|| {
                        let mut out = Array2::zeros((config.target_dim, rows));
                        PivotMds::new()
                            .embed(data.t(), pivots, out.view_mut(), &NoopMonitor)
                            .unwrap()
                    });
                },
            );
        }
    }
    group.finish();
}

pub fn bench_iterative_mds(c: &mut Criterion) {
    let config = MdsBenchConfig::default();
    let mut group = configure_group(c, "Iterative_MDS", &config);

    // one sweep is quadratic in the number of points
    for &(rows, dims) in config.data_sizes.iter().filter(|&&(rows, _)| rows <= 1000) {
        let data = create_test_data(rows, dims, config.seed + (rows * dims) as u64);
        group.bench_with_input(
            BenchmarkId::new("train", format!("{}x{}_e{}", rows, dims, config.epochs)),
            &(rows, dims),
            |b, _| {
                b.iter(|| {
                    let mut engine =
                        IterativeMds::new((0..rows).collect::<Vec<usize>>(), data.clone(), config.target_dim)
                            .unwrap();
                    engine.initialize(config.seed).unwrap();
                    engine
                        .train(
                            config.epochs,
                            1.0,
                            &EuclideanDistance,
                            &EuclideanDistance,
                            &NoopMonitor,
                        )
                        .unwrap()
                        .len()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(mds_benches, bench_pivot_mds, bench_iterative_mds);
criterion_main!(mds_benches);
