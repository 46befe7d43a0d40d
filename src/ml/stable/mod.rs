//! Stability-regularized decision-tree selection.
//!
//! Given a reference tree from a previous training run, [`StableDecisionTree`]
//! trains several seeded candidates and keeps the one minimizing
//! `(1 - accuracy) + lambda_stability * tree_distance(candidate, reference)`, so
//! retraining on shifted data keeps the tree structure close to what came
//! before.

mod model;
mod select;

pub use model::{InvalidInput, StableDecisionTree, StableTreeError, validate_training_data};
pub use select::{
    CANDIDATE_COUNT, CandidateError, CandidateReport, CandidateScore, candidate_random_state,
    score_candidate,
};
