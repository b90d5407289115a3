use bayes_binning::{BinData, Binning, BinningOptions, UtilityKind};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_data(len: usize) -> BinData {
    let mut rng = StdRng::seed_from_u64(21);
    let mut observations = vec![vec![0.0; len]; 2];
    for t in 0..len {
        let p = if (t / 10) % 2 == 0 { 0.7 } else { 0.3 };
        for _ in 0..5 {
            observations[usize::from(rng.gen::<f64>() >= p)][t] += 1.0;
        }
    }
    BinData::from_observations(&observations, &vec![vec![1.0; len]; 2], vec![1.0; len]).unwrap()
}

fn bench_queries(c: &mut Criterion) {
    let data = random_data(60);
    let mut group = c.benchmark_group("queries_len_60");
    group.sample_size(10);
    for threads in [1usize, 4] {
        group.bench_function(format!("moments_breaks_threads_{threads}"), |b| {
            b.iter_batched(
                || {
                    BinningOptions::builder()
                        .with_threads(threads)
                        .with_moments(2)
                        .with_break_probabilities()
                        .build()
                        .unwrap()
                },
                |opts| Binning::new(&data, opts).unwrap().run().unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.bench_function("kl_utility_threads_4", |b| {
        b.iter_batched(
            || {
                BinningOptions::builder()
                    .with_threads(4)
                    .with_utility(UtilityKind::Kl)
                    .build()
                    .unwrap()
            },
            |opts| Binning::new(&data, opts).unwrap().run().unwrap(),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("hmm_moments", |b| {
        b.iter_batched(
            || BinningOptions::builder().with_hmm(0.95).with_moments(2).build().unwrap(),
            |opts| Binning::new(&data, opts).unwrap().run().unwrap(),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("sampler_breaks", |b| {
        b.iter_batched(
            || {
                BinningOptions::builder()
                    .with_samples(100, 2_000)
                    .with_break_probabilities()
                    .build()
                    .unwrap()
            },
            |opts| Binning::new(&data, opts).unwrap().run().unwrap(),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
