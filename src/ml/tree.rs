//! Capabilities a decision-tree backend must expose to the selector and the
//! distance metric.
//!
//! The selector never looks inside a tree. It trains through [`TreeTrainer`] and
//! queries the result through [`FittedTree`], so any learner that can report its
//! split layout can be stabilized.

use std::borrow::Cow;

use ndarray::ArrayView2;
use thiserror::Error;

use super::metrics::accuracy_score;

/// Errors reported by a tree backend.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The handle does not wrap a fitted classification tree.
    #[error("tree is not a fitted classification tree")]
    NotFitted,
    /// Training data was rejected by the learner.
    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),
    /// The prediction matrix does not have the columns the tree was fit on.
    #[error("expected {expected} feature columns, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
    /// Label and prediction counts differ while scoring.
    #[error("expected {expected} labels, got {got}")]
    LabelCountMismatch { expected: usize, got: usize },
    /// Backend-specific failure.
    #[error("tree backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A trained classification tree.
pub trait FittedTree {
    /// Predict one class index per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, TreeError>;

    /// Node-indexed split feature ids in the backend's node layout.
    ///
    /// Leaf nodes carry the backend's sentinel value. Returns
    /// [`TreeError::NotFitted`] when the handle has no tree structure.
    fn split_features(&self) -> Result<Cow<'_, [i64]>, TreeError>;

    /// Fraction of rows in `x` whose prediction matches `y`.
    fn accuracy(&self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<f64, TreeError> {
        let predicted = self.predict(x)?;
        if predicted.len() != y.len() {
            return Err(TreeError::LabelCountMismatch {
                expected: predicted.len(),
                got: y.len(),
            });
        }
        Ok(accuracy_score(y, &predicted))
    }
}

impl<T: FittedTree + ?Sized> FittedTree for &T {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, TreeError> {
        (**self).predict(x)
    }

    fn split_features(&self) -> Result<Cow<'_, [i64]>, TreeError> {
        (**self).split_features()
    }

    fn accuracy(&self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<f64, TreeError> {
        (**self).accuracy(x, y)
    }
}

/// Something that can train classification trees.
pub trait TreeTrainer {
    /// Tree type produced by [`TreeTrainer::train`].
    type Tree: FittedTree;

    /// Fit a tree on `(x, y)`.
    ///
    /// `max_depth = None` grows until leaves are pure. `random_state = None`
    /// lets the backend pick its own entropy.
    fn train(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        max_depth: Option<usize>,
        random_state: Option<u64>,
    ) -> Result<Self::Tree, TreeError>;
}
