use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// `rows x cols` uniform features with binary labels from `x0 + x1 > 1`.
pub fn binary_dataset(rows: usize, cols: usize, seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((rows, cols), |_| rng.random::<f64>());
    let y = x
        .rows()
        .into_iter()
        .map(|row| usize::from(row[0] + row[1] > 1.0))
        .collect();
    (x, y)
}

/// Same rows and labels in a seeded random order.
pub fn shuffled(x: &Array2<f64>, y: &[usize], seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..y.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let x_shuffled = x.select(Axis(0), &order);
    let y_shuffled = order.iter().map(|&i| y[i]).collect();
    (x_shuffled, y_shuffled)
}
