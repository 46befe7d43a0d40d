use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stable_tree::config::StableTreeConfig;
use stable_tree::ml::stable::StableDecisionTree;

const SAMPLE_COUNTS: [usize; 2] = [200, 1_000];

fn dataset(rows: usize) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(17);
    let x = Array2::from_shape_fn((rows, 6), |_| rng.random::<f64>());
    let y = x
        .rows()
        .into_iter()
        .map(|row| usize::from(row[0] + row[2] > 1.0))
        .collect();
    (x, y)
}

fn config() -> StableTreeConfig {
    StableTreeConfig {
        lambda_stability: 0.1,
        max_depth: Some(5),
        random_state: Some(42),
    }
}

fn bench_fit_with_reference(c: &mut Criterion) {
    for rows in SAMPLE_COUNTS {
        let (x, y) = dataset(rows);
        let mut initial = StableDecisionTree::new(config());
        initial.fit(x.view(), &y, None).expect("initial fit");
        let reference = initial.stable_tree().expect("reference").clone();

        c.bench_with_input(
            BenchmarkId::new("fit_with_reference", rows),
            &(x, y),
            |b, (x, y)| {
                let mut model = StableDecisionTree::new(config());
                b.iter(|| {
                    model
                        .fit(black_box(x.view()), black_box(y), Some(&reference))
                        .expect("fit");
                });
            },
        );
    }
}

criterion_group!(benches, bench_fit_with_reference);
criterion_main!(benches);
