//! Evaluation metrics for classification trees.

use std::collections::BTreeMap;

/// Precision and recall of one label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub label: usize,
    /// Share of rows predicted as `label` that carry it.
    pub precision: f64,
    /// Share of rows carrying `label` that were predicted as it.
    pub recall: f64,
    /// Rows carrying `label`.
    pub support: usize,
}

/// Fraction of positions where `predicted` matches `truth`.
///
/// Only the common prefix is compared; an empty input scores `0.0`.
pub fn accuracy_score(truth: &[usize], predicted: &[usize]) -> f64 {
    let total = truth.len().min(predicted.len());
    if total == 0 {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / total as f64
}

/// Per-label precision and recall over the common prefix, ordered by label.
///
/// Every label appearing in either sequence gets an entry; a ratio with an
/// empty denominator is `0.0`.
pub fn class_stats(truth: &[usize], predicted: &[usize]) -> Vec<ClassStats> {
    #[derive(Default)]
    struct Tally {
        hits: usize,
        predicted: usize,
        actual: usize,
    }

    let mut tallies: BTreeMap<usize, Tally> = BTreeMap::new();
    for (&t, &p) in truth.iter().zip(predicted) {
        tallies.entry(t).or_default().actual += 1;
        let tally = tallies.entry(p).or_default();
        tally.predicted += 1;
        if t == p {
            tally.hits += 1;
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    tallies
        .into_iter()
        .map(|(label, tally)| ClassStats {
            label,
            precision: ratio(tally.hits, tally.predicted),
            recall: ratio(tally.hits, tally.actual),
            support: tally.actual,
        })
        .collect()
}
