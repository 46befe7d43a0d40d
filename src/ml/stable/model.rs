use std::fmt;

use ndarray::ArrayView2;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::select::{
    CANDIDATE_COUNT, CandidateContext, CandidateReport, CandidateScore, Winner, select_best,
};
use crate::config::StableTreeConfig;
use crate::ml::cart::CartTrainer;
use crate::ml::tree::{FittedTree, TreeError, TreeTrainer};

/// Rejected `fit` inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// `x` has no rows or `y` has no labels.
    #[error("X and y cannot be empty")]
    Empty,
    /// Row and label counts differ.
    #[error("X and y must have the same number of samples")]
    LengthMismatch { n_rows: usize, n_labels: usize },
}

/// Errors returned by [`StableDecisionTree`].
#[derive(Debug, Error)]
pub enum StableTreeError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// `predict` was called before a successful `fit`.
    #[error("model must be fitted before making predictions")]
    NotFitted,
    /// The backend could not train the base tree.
    #[error("failed to train base tree: {0}")]
    Training(#[source] TreeError),
    /// The selected tree rejected the prediction input.
    #[error("prediction failed: {0}")]
    Prediction(#[source] TreeError),
}

/// Check `fit` inputs: emptiness first, then row/label agreement.
pub fn validate_training_data(x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), InvalidInput> {
    if x.nrows() == 0 || y.is_empty() {
        return Err(InvalidInput::Empty);
    }
    if x.nrows() != y.len() {
        return Err(InvalidInput::LengthMismatch {
            n_rows: x.nrows(),
            n_labels: y.len(),
        });
    }
    Ok(())
}

enum Selection<M> {
    Base,
    Candidate {
        seed: u64,
        tree: M,
        score: CandidateScore,
    },
}

struct Fitted<M> {
    base_tree: M,
    selection: Selection<M>,
    candidates: Vec<CandidateReport>,
}

impl<M> Fitted<M> {
    fn stable_tree(&self) -> &M {
        match &self.selection {
            Selection::Base => &self.base_tree,
            Selection::Candidate { tree, .. } => tree,
        }
    }
}

enum FitState<M> {
    Unfitted,
    Fitted(Fitted<M>),
}

/// Decision tree classifier that trades accuracy for structural continuity
/// with a reference tree.
///
/// Every [`fit`](Self::fit) trains an unregularized base tree. With a reference
/// tree it also trains [`CANDIDATE_COUNT`] candidates seeded
/// `random_state + 0..CANDIDATE_COUNT` (or `0..CANDIDATE_COUNT` without a
/// random state) and keeps the lowest-scoring one; the earliest seed wins
/// ties. When no candidate can be scored the base tree is used.
pub struct StableDecisionTree<T: TreeTrainer = CartTrainer> {
    config: StableTreeConfig,
    trainer: T,
    state: FitState<T::Tree>,
}

impl<T: TreeTrainer> fmt::Debug for StableDecisionTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableDecisionTree")
            .field("config", &self.config)
            .field("fitted", &self.is_fitted())
            .field("selected_seed", &self.selected_seed())
            .finish_non_exhaustive()
    }
}

impl StableDecisionTree<CartTrainer> {
    /// Selector backed by the bundled CART learner.
    pub fn new(config: StableTreeConfig) -> Self {
        Self::with_trainer(config, CartTrainer::default())
    }
}

impl Default for StableDecisionTree<CartTrainer> {
    fn default() -> Self {
        Self::new(StableTreeConfig::default())
    }
}

impl<T: TreeTrainer> StableDecisionTree<T> {
    /// Selector training its trees with `trainer`.
    pub fn with_trainer(config: StableTreeConfig, trainer: T) -> Self {
        Self {
            config,
            trainer,
            state: FitState::Unfitted,
        }
    }

    /// Hyperparameters the model was built with.
    pub fn config(&self) -> &StableTreeConfig {
        &self.config
    }

    /// Whether a fit has completed.
    pub fn is_fitted(&self) -> bool {
        matches!(self.state, FitState::Fitted(_))
    }

    /// Unregularized tree from the last successful fit.
    pub fn base_tree(&self) -> Option<&T::Tree> {
        match &self.state {
            FitState::Fitted(fitted) => Some(&fitted.base_tree),
            FitState::Unfitted => None,
        }
    }

    /// Tree used for prediction: the selected candidate, or the base tree
    /// itself when no candidate was selected.
    pub fn stable_tree(&self) -> Option<&T::Tree> {
        match &self.state {
            FitState::Fitted(fitted) => Some(fitted.stable_tree()),
            FitState::Unfitted => None,
        }
    }

    /// Seed offset of the selected candidate, `None` when the base tree is in
    /// use.
    pub fn selected_seed(&self) -> Option<u64> {
        match &self.state {
            FitState::Fitted(Fitted {
                selection: Selection::Candidate { seed, .. },
                ..
            }) => Some(*seed),
            _ => None,
        }
    }

    /// Score of the selected candidate, `None` when the base tree is in use.
    pub fn selected_score(&self) -> Option<CandidateScore> {
        match &self.state {
            FitState::Fitted(Fitted {
                selection: Selection::Candidate { score, .. },
                ..
            }) => Some(*score),
            _ => None,
        }
    }

    /// Per-candidate outcomes of the last fit, in seed order. Empty when the
    /// last fit had no reference tree.
    pub fn candidate_reports(&self) -> &[CandidateReport] {
        match &self.state {
            FitState::Fitted(fitted) => &fitted.candidates,
            FitState::Unfitted => &[],
        }
    }

    /// Train on `(x, y)`, optionally regularized toward `reference_tree`.
    ///
    /// Inputs are validated before anything is trained, and the previous fit
    /// is only replaced once the new one has completed, so an error leaves
    /// the model as it was.
    pub fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        reference_tree: Option<&dyn FittedTree>,
    ) -> Result<&mut Self, StableTreeError> {
        validate_training_data(x, y)?;

        let base_tree = self
            .trainer
            .train(x, y, self.config.max_depth, self.config.random_state)
            .map_err(StableTreeError::Training)?;

        let Some(reference) = reference_tree else {
            debug!("No reference tree supplied; using base tree");
            self.state = FitState::Fitted(Fitted {
                base_tree,
                selection: Selection::Base,
                candidates: Vec::new(),
            });
            return Ok(self);
        };

        let context = CandidateContext {
            reference,
            x: x.view(),
            y,
            max_depth: self.config.max_depth,
            base_random_state: self.config.random_state,
            lambda_stability: self.config.lambda_stability,
        };
        let candidates = (0..CANDIDATE_COUNT)
            .map(|seed| context.evaluate(&self.trainer, seed))
            .collect();
        let (winner, candidates) = select_best(candidates);

        let selection = match winner {
            Some(Winner { seed, tree, score }) => {
                info!(
                    seed,
                    loss = score.loss,
                    distance = score.distance,
                    score = score.score,
                    "Selected stable candidate tree"
                );
                Selection::Candidate { seed, tree, score }
            }
            None => {
                warn!("No valid candidate tree found, using base tree");
                Selection::Base
            }
        };
        self.state = FitState::Fitted(Fitted {
            base_tree,
            selection,
            candidates,
        });
        Ok(self)
    }

    /// Predict one class index per row with the stable tree.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, StableTreeError> {
        let tree = self.stable_tree().ok_or(StableTreeError::NotFitted)?;
        tree.predict(x).map_err(StableTreeError::Prediction)
    }
}
