use ndarray::ArrayView2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::model::CartTree;
use crate::ml::tree::{TreeError, TreeTrainer};

/// Training hyperparameters for a CART tree.
#[derive(Debug, Clone)]
pub struct CartOptions {
    /// Maximum depth in edges; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Seed for the per-node feature order; `None` draws from the OS.
    pub random_state: Option<u64>,
    /// Nodes with fewer samples than this become leaves.
    pub min_samples_split: usize,
}

impl Default for CartOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            random_state: None,
            min_samples_split: 2,
        }
    }
}

/// [`TreeTrainer`] backed by [`train_cart`].
#[derive(Debug, Clone, Copy)]
pub struct CartTrainer {
    /// Nodes with fewer samples than this become leaves.
    pub min_samples_split: usize,
}

impl Default for CartTrainer {
    fn default() -> Self {
        Self {
            min_samples_split: 2,
        }
    }
}

impl TreeTrainer for CartTrainer {
    type Tree = CartTree;

    fn train(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        max_depth: Option<usize>,
        random_state: Option<u64>,
    ) -> Result<CartTree, TreeError> {
        let options = CartOptions {
            max_depth,
            random_state,
            min_samples_split: self.min_samples_split,
        };
        train_cart(x, y, &options)
    }
}

/// Train a CART classification tree on `(x, y)`.
pub fn train_cart(
    x: ArrayView2<'_, f64>,
    y: &[usize],
    options: &CartOptions,
) -> Result<CartTree, TreeError> {
    if x.nrows() != y.len() {
        return Err(TreeError::InvalidTrainingData(format!(
            "{} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(TreeError::InvalidTrainingData("empty dataset".to_string()));
    }
    if x.ncols() == 0 {
        return Err(TreeError::InvalidTrainingData(
            "dataset has no feature columns".to_string(),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(TreeError::InvalidTrainingData(
            "feature matrix contains non-finite values".to_string(),
        ));
    }

    let (labels, encoded) = encode_labels(y);
    let rng = match options.random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut builder = Builder {
        x: x.view(),
        y: &encoded,
        n_classes: labels.len(),
        max_depth: options.max_depth,
        min_samples_split: options.min_samples_split.max(2),
        feature_order: (0..x.ncols()).collect(),
        rng,
        tree: CartTree::with_shape(x.ncols(), labels),
    };
    let mut indices: Vec<usize> = (0..y.len()).collect();
    builder.build(&mut indices);
    Ok(builder.tree)
}

/// Sorted distinct labels, and `y` rewritten as positions in that list.
fn encode_labels(y: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut labels = y.to_vec();
    labels.sort_unstable();
    labels.dedup();
    let encoded = y
        .iter()
        .map(|label| labels.binary_search(label).unwrap_or_else(|pos| pos))
        .collect();
    (labels, encoded)
}

/// Computes the Gini impurity `1 - Σ (c_k / n)²` of a node from its class
/// counts. Returns `0.0` for an empty node.
pub fn gini_from_counts(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }

    let n_f = n as f64;
    let mut sum_sq = 0.0;

    for &c in counts {
        let p = c as f64 / n_f;
        sum_sq += p * p;
    }

    1.0 - sum_sq
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    impurity: f64,
    feature_index: usize,
    threshold: f64,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Node waiting to be built from `indices[start..end]`.
struct Pending {
    start: usize,
    end: usize,
    depth: usize,
    parent: Option<(usize, Side)>,
}

struct Builder<'a> {
    x: ArrayView2<'a, f64>,
    /// Labels encoded as positions in `tree.labels`.
    y: &'a [usize],
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    feature_order: Vec<usize>,
    rng: StdRng,
    tree: CartTree,
}

impl Builder<'_> {
    /// Depth-first growth on an explicit stack. The left child is popped
    /// before the right one, so node ids come out in pre-order.
    fn build(&mut self, indices: &mut [usize]) {
        let mut stack = vec![Pending {
            start: 0,
            end: indices.len(),
            depth: 0,
            parent: None,
        }];
        while let Some(Pending {
            start,
            end,
            depth,
            parent,
        }) = stack.pop()
        {
            let rows = &mut indices[start..end];
            let counts = self.class_counts(rows);
            let label = self.tree.labels[majority_class(&counts)];
            let node = self.tree.push_leaf(label);
            match parent {
                Some((parent, Side::Left)) => self.tree.set_left(parent, node),
                Some((parent, Side::Right)) => self.tree.set_right(parent, node),
                None => {}
            }

            let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
            let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            if depth_reached || pure || rows.len() < self.min_samples_split {
                continue;
            }
            let Some(split) = self.best_split(rows, &counts) else {
                continue;
            };
            self.tree
                .set_split(node, split.feature_index, split.threshold);

            let x = self.x;
            let mid = start
                + partition(rows, |row| {
                    x[[row, split.feature_index]] <= split.threshold
                });
            stack.push(Pending {
                start: mid,
                end,
                depth: depth + 1,
                parent: Some((node, Side::Right)),
            });
            stack.push(Pending {
                start,
                end: mid,
                depth: depth + 1,
                parent: Some((node, Side::Left)),
            });
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &row in indices {
            counts[self.y[row]] += 1;
        }
        counts
    }

    fn best_split(&mut self, indices: &[usize], total_counts: &[usize]) -> Option<BestSplit> {
        self.feature_order.shuffle(&mut self.rng);
        let n = indices.len();
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();
        let mut left_counts = vec![0usize; self.n_classes];
        let mut right_counts = vec![0usize; self.n_classes];

        for &feature in &self.feature_order {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            left_counts.iter_mut().for_each(|c| *c = 0);

            for pos in 0..n - 1 {
                left_counts[self.y[sorted[pos]]] += 1;
                let current = self.x[[sorted[pos], feature]];
                let next = self.x[[sorted[pos + 1], feature]];
                if current >= next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n - n_left;
                for ((right, &total), &left) in
                    right_counts.iter_mut().zip(total_counts).zip(&left_counts)
                {
                    *right = total - left;
                }
                let impurity = (n_left as f64 * gini_from_counts(&left_counts, n_left)
                    + n_right as f64 * gini_from_counts(&right_counts, n_right))
                    / n as f64;
                if best.is_none_or(|b| impurity < b.impurity) {
                    best = Some(BestSplit {
                        impurity,
                        feature_index: feature,
                        threshold: midpoint(current, next),
                    });
                }
            }
        }
        best
    }
}

fn majority_class(counts: &[usize]) -> usize {
    let mut best_idx = 0usize;
    let mut best_count = 0usize;
    for (idx, &count) in counts.iter().enumerate() {
        // ties keep the smaller label
        if count > best_count {
            best_count = count;
            best_idx = idx;
        }
    }
    best_idx
}

fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    // rounding can land on `high`, which would send it left
    if mid >= high { low } else { mid }
}

/// Moves rows matching `goes_left` to the front; returns the boundary.
fn partition(indices: &mut [usize], mut goes_left: impl FnMut(usize) -> bool) -> usize {
    let mut boundary = 0;
    for i in 0..indices.len() {
        if goes_left(indices[i]) {
            indices.swap(i, boundary);
            boundary += 1;
        }
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::cart::{LEAF_CHILD, LEAF_FEATURE};
    use crate::ml::tree::FittedTree;
    use ndarray::{Array2, array};

    #[test]
    fn gini_matches_hand_computed_values() {
        assert!((gini_from_counts(&[3, 1], 4) - 0.375).abs() < 1e-12);
        assert_eq!(gini_from_counts(&[4, 0], 4), 0.0);
        assert_eq!(gini_from_counts(&[], 0), 0.0);
    }

    #[test]
    fn separable_data_is_fit_perfectly() {
        let x = array![[0.0, 5.0], [1.0, 4.0], [2.0, 3.0], [10.0, 2.0], [11.0, 1.0], [12.0, 0.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let tree = train_cart(x.view(), &y, &CartOptions::default()).unwrap();
        assert_eq!(tree.predict(x.view()).unwrap(), y.to_vec());
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.left, vec![1, LEAF_CHILD, LEAF_CHILD]);
        assert_eq!(tree.right, vec![2, LEAF_CHILD, LEAF_CHILD]);
    }

    #[test]
    fn nodes_are_numbered_in_pre_order() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = [0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1];
        let options = CartOptions {
            random_state: Some(5),
            ..CartOptions::default()
        };
        let tree = train_cart(x.view(), &y, &options).unwrap();
        assert_eq!(tree.predict(x.view()).unwrap(), y.to_vec());
        for node in 0..tree.node_count() {
            if tree.left[node] != LEAF_CHILD {
                assert_eq!(tree.left[node], node as i64 + 1);
                assert!(tree.right[node] > tree.left[node]);
            }
        }
    }

    #[test]
    fn deep_trees_build_on_a_small_stack() {
        // alternating labels on one ordered feature grow a chain about as deep as the data
        let n = 3_000;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let handle = std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(move || {
                let options = CartOptions {
                    random_state: Some(0),
                    ..CartOptions::default()
                };
                let tree = train_cart(x.view(), &y, &options).unwrap();
                (tree.depth(), tree.predict(x.view()).unwrap() == y)
            })
            .unwrap();
        let (depth, exact) = handle.join().unwrap();
        assert!(depth > 1_000, "depth {depth}");
        assert!(exact);
    }

    #[test]
    fn labels_keep_their_original_values() {
        let x = array![[0.0], [1.0]];
        let tree = train_cart(x.view(), &[0, usize::MAX], &CartOptions::default()).unwrap();
        assert_eq!(tree.labels, vec![0, usize::MAX]);
        assert_eq!(tree.predict(x.view()).unwrap(), vec![0, usize::MAX]);

        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [1_000_000_000, 3, 1_000_000_000, 3];
        let tree = train_cart(x.view(), &y, &CartOptions::default()).unwrap();
        assert_eq!(tree.n_classes(), 2);
        assert_eq!(tree.predict(x.view()).unwrap(), y.to_vec());
    }

    #[test]
    fn max_depth_limits_growth() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y: Vec<usize> = (0..40).map(|i| (i * 5 % 3) % 2).collect();
        let options = CartOptions {
            max_depth: Some(2),
            random_state: Some(1),
            ..CartOptions::default()
        };
        let tree = train_cart(x.view(), &y, &options).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn max_depth_zero_yields_single_leaf() {
        let x = array![[0.0], [1.0]];
        let tree = train_cart(
            x.view(),
            &[0, 1],
            &CartOptions {
                max_depth: Some(0),
                ..CartOptions::default()
            },
        )
        .unwrap();
        assert_eq!(tree.features, vec![LEAF_FEATURE]);
    }

    #[test]
    fn same_seed_reproduces_tree() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i + j) % 4) as f64);
        let y: Vec<usize> = (0..30).map(|i| i % 2).collect();
        let options = CartOptions {
            random_state: Some(7),
            ..CartOptions::default()
        };
        let a = train_cart(x.view(), &y, &options).unwrap();
        let b = train_cart(x.view(), &y, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seed_breaks_ties_between_identical_columns() {
        // both columns carry the same signal, so the root feature depends on the seed
        let x = Array2::from_shape_fn((20, 2), |(i, _)| i as f64);
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let roots: std::collections::BTreeSet<i64> = (0..32)
            .map(|seed| {
                let options = CartOptions {
                    random_state: Some(seed),
                    ..CartOptions::default()
                };
                train_cart(x.view(), &y, &options).unwrap().features[0]
            })
            .collect();
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn rejects_bad_training_data() {
        let x = array![[0.0], [1.0]];
        assert!(matches!(
            train_cart(x.view(), &[0], &CartOptions::default()),
            Err(TreeError::InvalidTrainingData(_))
        ));
        let x = array![[f64::NAN], [1.0]];
        assert!(matches!(
            train_cart(x.view(), &[0, 1], &CartOptions::default()),
            Err(TreeError::InvalidTrainingData(_))
        ));
    }
}
