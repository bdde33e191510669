use cnn1d_core::cnn::{
    dense, dense_tiled, CnnConfig, CnnNetwork, CnnWeights, Strategy, FLATTEN_SIZE, HIDDEN_SIZE,
    IN_SIZE, OUT_SIZE,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::hint::black_box;

fn random_vec(rng: &mut Xoshiro256PlusPlus, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

pub fn bench_forward(c: &mut Criterion) {
    let mut g = c.benchmark_group("cnn1d_forward");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xC0FFEE);
    let input = random_vec(&mut rng, IN_SIZE);

    for strategy in Strategy::ALL {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let weights = CnnWeights::random(CnnConfig::STANDARD, &mut rng, 0.2).unwrap();
        let net = CnnNetwork::new(weights, strategy).unwrap();
        let mut scratch = net.scratch();
        let mut output = vec![0.0f32; OUT_SIZE];

        g.bench_function(BenchmarkId::new("forward", strategy), |b| {
            b.iter(|| {
                net.forward(black_box(&input), &mut scratch, &mut output).unwrap();
                black_box(&output);
            });
        });
    }
    g.finish();
}

pub fn bench_dense(c: &mut Criterion) {
    let mut g = c.benchmark_group("cnn1d_dense");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

    // FC1 (640→128), FC2 (128→1000)
    for (n_in, n_out) in [(FLATTEN_SIZE, HIDDEN_SIZE), (HIDDEN_SIZE, OUT_SIZE)] {
        let input = random_vec(&mut rng, n_in);
        let weight = random_vec(&mut rng, n_in * n_out);
        let bias = random_vec(&mut rng, n_out);
        let mut output = vec![0.0f32; n_out];
        let label = format!("{n_in}x{n_out}");

        g.bench_function(BenchmarkId::new("scalar", &label), |b| {
            b.iter(|| dense(black_box(&input), &weight, &bias, &mut output));
        });
        g.bench_function(BenchmarkId::new("tiled", &label), |b| {
            b.iter(|| dense_tiled(black_box(&input), &weight, &bias, &mut output));
        });
    }
    g.finish();
}

criterion_group!(benches, bench_forward, bench_dense);
criterion_main!(benches);
