//! Gaussian perturbation of a feature matrix, used to simulate "new data" for
//! refit cycles.

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use thiserror::Error;

/// Standard deviation used when callers do not pick one.
pub const DEFAULT_NOISE_STD: f64 = 0.05;

/// Errors returned by [`perturb_dataset`].
#[derive(Debug, Error)]
pub enum PerturbError {
    /// The noise distribution rejected its parameters. A negative standard
    /// deviation is reported as [`NormalError::BadVariance`].
    #[error("invalid noise distribution: {0}")]
    Noise(#[from] NormalError),
}

/// Add `N(0, noise_std²)` noise to every element of `x`, drawing from the
/// thread-local generator.
///
/// `y` is handed back as-is.
pub fn perturb_dataset<Y>(
    x: ArrayView2<'_, f64>,
    y: Y,
    noise_std: f64,
) -> Result<(Array2<f64>, Y), PerturbError> {
    perturb_dataset_with_rng(x, y, noise_std, &mut rand::rng())
}

/// Seeded variant of [`perturb_dataset`].
pub fn perturb_dataset_with_rng<Y, R>(
    x: ArrayView2<'_, f64>,
    y: Y,
    noise_std: f64,
    rng: &mut R,
) -> Result<(Array2<f64>, Y), PerturbError>
where
    R: Rng + ?Sized,
{
    // `Normal::new` only rejects non-finite deviations
    if noise_std < 0.0 {
        return Err(PerturbError::Noise(NormalError::BadVariance));
    }
    let noise = Normal::new(0.0, noise_std)?;
    let perturbed = x.mapv(|v| v + noise.sample(rng));
    Ok((perturbed, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid() -> Array2<f64> {
        Array2::from_shape_fn((100, 4), |(i, j)| (i * 4 + j) as f64 * 0.1)
    }

    #[test]
    fn zero_noise_keeps_values_and_labels() {
        let x = grid();
        let y: Vec<usize> = (0..100).map(|i| i % 2).collect();
        let (perturbed, labels) = perturb_dataset(x.view(), y.as_slice(), 0.0).unwrap();
        assert_eq!(perturbed, x);
        assert!(std::ptr::eq(labels, y.as_slice()));
    }

    #[test]
    fn noise_preserves_shape_and_moves_values() {
        let x = grid();
        let mut rng = StdRng::seed_from_u64(11);
        let (perturbed, _) = perturb_dataset_with_rng(x.view(), (), 0.5, &mut rng).unwrap();
        assert_eq!(perturbed.dim(), x.dim());
        assert_ne!(perturbed, x);

        let diffs = &perturbed - &x;
        let mean = diffs.mean().unwrap();
        let var = diffs.mapv(|d| (d - mean) * (d - mean)).mean().unwrap();
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.1, "std {}", var.sqrt());
    }

    #[test]
    fn same_seed_reproduces_noise() {
        let x = grid();
        let a = perturb_dataset_with_rng(x.view(), (), 0.05, &mut StdRng::seed_from_u64(3))
            .unwrap()
            .0;
        let b = perturb_dataset_with_rng(x.view(), (), 0.05, &mut StdRng::seed_from_u64(3))
            .unwrap()
            .0;
        assert_eq!(a, b);
    }

    #[test]
    fn negative_std_is_rejected() {
        let x = grid();
        assert!(matches!(
            perturb_dataset(x.view(), (), -1.0),
            Err(PerturbError::Noise(NormalError::BadVariance))
        ));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            perturb_dataset_with_rng(x.view(), (), -1e-9, &mut rng),
            Err(PerturbError::Noise(_))
        ));
    }

    #[test]
    fn non_finite_std_is_rejected() {
        let x = grid();
        assert!(matches!(
            perturb_dataset(x.view(), (), f64::NAN),
            Err(PerturbError::Noise(NormalError::BadVariance))
        ));
        assert!(perturb_dataset(x.view(), (), f64::INFINITY).is_err());
    }
}
