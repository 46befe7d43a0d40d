use ndarray::ArrayView2;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ml::distance::{DistanceError, tree_distance};
use crate::ml::tree::{FittedTree, TreeError, TreeTrainer};

/// Number of seeded candidates trained when a reference tree is supplied.
pub const CANDIDATE_COUNT: u64 = 5;

/// Composite objective of one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    /// `1 - accuracy` on the training data.
    pub loss: f64,
    /// Structural distance to the reference tree.
    pub distance: f64,
    /// `loss + lambda_stability * distance`.
    pub score: f64,
}

/// Why a candidate was left out of selection.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// The backend could not train the candidate.
    #[error("training failed: {0}")]
    Training(#[source] TreeError),
    /// The candidate could not be scored on the training data.
    #[error("accuracy scoring failed: {0}")]
    Accuracy(#[source] TreeError),
    /// Distance to the reference tree could not be computed.
    #[error(transparent)]
    Distance(#[from] DistanceError),
    /// Loss and distance combined into NaN or infinity.
    #[error("score is not finite (loss {loss}, distance {distance})")]
    NonFiniteScore { loss: f64, distance: f64 },
}

/// Outcome of one candidate evaluation, kept after `fit` for inspection.
#[derive(Debug)]
pub struct CandidateReport {
    /// Offset in `0..CANDIDATE_COUNT`.
    pub seed: u64,
    /// Random state the candidate was trained with.
    pub random_state: u64,
    /// Score, or the reason the candidate was skipped.
    pub outcome: Result<CandidateScore, CandidateError>,
}

pub(crate) struct Candidate<M> {
    pub seed: u64,
    pub random_state: u64,
    pub outcome: Result<(M, CandidateScore), CandidateError>,
}

/// The winning candidate of a selection round.
pub(crate) struct Winner<M> {
    pub seed: u64,
    pub tree: M,
    pub score: CandidateScore,
}

/// Random state for candidate `seed`: offset from the configured base state,
/// or the bare seed when none is configured.
pub fn candidate_random_state(base: Option<u64>, seed: u64) -> u64 {
    match base {
        Some(base) => base.wrapping_add(seed),
        None => seed,
    }
}

/// Score a fitted candidate against `reference`.
pub fn score_candidate<C, R>(
    candidate: &C,
    reference: &R,
    x: ArrayView2<'_, f64>,
    y: &[usize],
    lambda_stability: f64,
) -> Result<CandidateScore, CandidateError>
where
    C: FittedTree + ?Sized,
    R: FittedTree + ?Sized,
{
    let distance = tree_distance(candidate, reference)?;
    let accuracy = candidate
        .accuracy(x, y)
        .map_err(CandidateError::Accuracy)?;
    let loss = 1.0 - accuracy;
    let score = loss + lambda_stability * distance;
    if !score.is_finite() {
        return Err(CandidateError::NonFiniteScore { loss, distance });
    }
    Ok(CandidateScore {
        loss,
        distance,
        score,
    })
}

/// Shared, read-only inputs of one selection round.
pub(crate) struct CandidateContext<'a> {
    pub reference: &'a dyn FittedTree,
    pub x: ArrayView2<'a, f64>,
    pub y: &'a [usize],
    pub max_depth: Option<usize>,
    pub base_random_state: Option<u64>,
    pub lambda_stability: f64,
}

impl CandidateContext<'_> {
    /// Train and score candidate `seed`. Failures are logged and kept in the
    /// returned outcome.
    pub fn evaluate<T>(&self, trainer: &T, seed: u64) -> Candidate<T::Tree>
    where
        T: TreeTrainer + ?Sized,
    {
        let random_state = candidate_random_state(self.base_random_state, seed);
        let outcome = trainer
            .train(self.x, self.y, self.max_depth, Some(random_state))
            .map_err(CandidateError::Training)
            .and_then(|tree| {
                let score = score_candidate(
                    &tree,
                    self.reference,
                    self.x,
                    self.y,
                    self.lambda_stability,
                )?;
                Ok((tree, score))
            });
        match &outcome {
            Ok((_, score)) => debug!(
                seed,
                random_state,
                loss = score.loss,
                distance = score.distance,
                score = score.score,
                "Scored candidate tree"
            ),
            Err(err) => warn!(seed, random_state, "Skipping candidate tree: {err}"),
        }
        Candidate {
            seed,
            random_state,
            outcome,
        }
    }
}

/// Pick the lowest-scoring usable candidate; on equal scores the earliest seed
/// wins. Candidates must arrive in seed order.
pub(crate) fn select_best<M>(
    candidates: Vec<Candidate<M>>,
) -> (Option<Winner<M>>, Vec<CandidateReport>) {
    let mut best: Option<Winner<M>> = None;
    let mut reports = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let outcome = match candidate.outcome {
            Ok((tree, score)) => {
                if best.as_ref().is_none_or(|b| score.score < b.score.score) {
                    best = Some(Winner {
                        seed: candidate.seed,
                        tree,
                        score,
                    });
                }
                Ok(score)
            }
            Err(err) => Err(err),
        };
        reports.push(CandidateReport {
            seed: candidate.seed,
            random_state: candidate.random_state,
            outcome,
        });
    }
    (best, reports)
}
