//! Structural distance between two fitted trees.
//!
//! Trees are compared as flat sequences of split features in the backend's node
//! layout rather than as aligned graphs. Positions past the shorter sequence are
//! not compared directly; they count through the normalization by the longer
//! length instead.

use std::borrow::Cow;

use thiserror::Error;

use super::tree::{FittedTree, TreeError};

/// Errors raised while measuring tree distance.
#[derive(Debug, Error)]
pub enum DistanceError {
    /// A tree handle carried no split structure.
    #[error("tree is not a fitted classification tree")]
    StructureExtraction,
    /// Any other failure while reading tree structure.
    #[error("error calculating tree distance: {0}")]
    Computation(#[source] TreeError),
}

/// Read the split-feature sequence of `tree`.
pub fn extract_split_features<T>(tree: &T) -> Result<Cow<'_, [i64]>, DistanceError>
where
    T: FittedTree + ?Sized,
{
    tree.split_features().map_err(|err| match err {
        TreeError::NotFitted => DistanceError::StructureExtraction,
        other => DistanceError::Computation(other),
    })
}

/// Fraction of node positions whose split feature differs, in `[0, 1]`.
///
/// `mismatches(common prefix) / max(len_a, len_b, 1)`.
pub fn tree_distance<A, B>(tree_a: &A, tree_b: &B) -> Result<f64, DistanceError>
where
    A: FittedTree + ?Sized,
    B: FittedTree + ?Sized,
{
    let features_a = extract_split_features(tree_a)?;
    let features_b = extract_split_features(tree_b)?;
    Ok(split_sequence_distance(&features_a, &features_b))
}

/// Distance between two raw split-feature sequences.
pub fn split_sequence_distance(features_a: &[i64], features_b: &[i64]) -> f64 {
    let mismatches = features_a
        .iter()
        .zip(features_b)
        .filter(|(a, b)| a != b)
        .count();
    let longest = features_a.len().max(features_b.len()).max(1);
    mismatches as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::cart::{CartOptions, train_cart};
    use ndarray::{Array2, ArrayView2};

    enum FixedTree {
        Features(Vec<i64>),
        Unfitted,
        Broken,
    }

    impl FittedTree for FixedTree {
        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, TreeError> {
            Ok(vec![0; x.nrows()])
        }

        fn split_features(&self) -> Result<Cow<'_, [i64]>, TreeError> {
            match self {
                FixedTree::Features(features) => Ok(Cow::Borrowed(features.as_slice())),
                FixedTree::Unfitted => Err(TreeError::NotFitted),
                FixedTree::Broken => Err(TreeError::Backend("structure unreadable".into())),
            }
        }
    }

    fn features(values: &[i64]) -> FixedTree {
        FixedTree::Features(values.to_vec())
    }

    #[test]
    fn identical_trees_have_zero_distance() {
        let x = Array2::from_shape_fn((50, 3), |(i, j)| ((i * 13 + j * 5) % 17) as f64);
        let y: Vec<usize> = (0..50).map(|i| i % 3).collect();
        let options = CartOptions {
            random_state: Some(3),
            ..CartOptions::default()
        };
        let tree = train_cart(x.view(), &y, &options).unwrap();
        assert_eq!(tree_distance(&tree, &tree).unwrap(), 0.0);
    }

    #[test]
    fn counts_mismatches_on_common_prefix() {
        let a = features(&[0, 1, -2, -2, 2]);
        let b = features(&[0, 2, -2, -2, 1]);
        assert!((tree_distance(&a, &b).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn longer_tree_inflates_denominator() {
        let a = features(&[0, -2, -2]);
        let b = features(&[0, -2, -2, 3, 3, -2]);
        assert_eq!(tree_distance(&a, &b).unwrap(), 0.0);
        let c = features(&[1, -2, -2, 3, 3, -2]);
        assert!((tree_distance(&a, &c).unwrap() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn empty_sequences_do_not_divide_by_zero() {
        assert_eq!(split_sequence_distance(&[], &[]), 0.0);
        assert_eq!(split_sequence_distance(&[], &[1, 2]), 0.0);
    }

    #[test]
    fn distance_is_bounded() {
        let cases: [(&[i64], &[i64]); 4] = [
            (&[0, 1, 2], &[3, 4, 5]),
            (&[0], &[1, 2, 3, 4]),
            (&[-2], &[0, -2, -2]),
            (&[5, 5, 5, 5], &[5, 5]),
        ];
        for (a, b) in cases {
            let d = split_sequence_distance(a, b);
            assert!((0.0..=1.0).contains(&d), "{d} out of range");
            assert_eq!(d, split_sequence_distance(b, a));
        }
    }

    #[test]
    fn unfitted_tree_fails_extraction() {
        let good = features(&[0, -2, -2]);
        let unfitted = FixedTree::Unfitted;
        assert!(matches!(
            tree_distance(&good, &unfitted),
            Err(DistanceError::StructureExtraction)
        ));
    }

    #[test]
    fn backend_failures_are_wrapped() {
        let good = features(&[0, -2, -2]);
        let broken = FixedTree::Broken;
        let err = tree_distance(&broken, &good).unwrap_err();
        assert!(matches!(err, DistanceError::Computation(TreeError::Backend(_))));
        assert!(std::error::Error::source(&err).is_some());
    }
}
