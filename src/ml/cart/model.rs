use std::borrow::Cow;

use ndarray::ArrayView2;

use crate::ml::tree::{FittedTree, TreeError};

/// Feature id stored on leaf nodes.
pub const LEAF_FEATURE: i64 = -2;
/// Child id stored on leaf nodes.
pub const LEAF_CHILD: i64 = -1;

/// Fitted CART tree stored as a structure of arrays in pre-order.
///
/// Node `0` is the root. For an internal node `i`, rows with
/// `x[feature] <= thresholds[i]` go to `left[i]`, the rest to `right[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartTree {
    /// Number of feature columns seen during training.
    pub n_features: usize,
    /// Distinct training labels in ascending order.
    pub labels: Vec<usize>,
    /// Split feature per node, [`LEAF_FEATURE`] on leaves.
    pub features: Vec<i64>,
    /// Split threshold per node, unused on leaves.
    pub thresholds: Vec<f64>,
    /// Left child per node, [`LEAF_CHILD`] on leaves.
    pub left: Vec<i64>,
    /// Right child per node, [`LEAF_CHILD`] on leaves.
    pub right: Vec<i64>,
    /// Majority label per node.
    pub classes: Vec<usize>,
}

impl CartTree {
    pub(crate) fn with_shape(n_features: usize, labels: Vec<usize>) -> Self {
        Self {
            n_features,
            labels,
            features: Vec::new(),
            thresholds: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub(crate) fn push_leaf(&mut self, class: usize) -> usize {
        self.features.push(LEAF_FEATURE);
        self.thresholds.push(0.0);
        self.left.push(LEAF_CHILD);
        self.right.push(LEAF_CHILD);
        self.classes.push(class);
        self.features.len() - 1
    }

    pub(crate) fn set_split(&mut self, node: usize, feature: usize, threshold: f64) {
        self.features[node] = feature as i64;
        self.thresholds[node] = threshold;
    }

    pub(crate) fn set_left(&mut self, node: usize, child: usize) {
        self.left[node] = child as i64;
    }

    pub(crate) fn set_right(&mut self, node: usize, child: usize) {
        self.right[node] = child as i64;
    }

    /// Number of distinct labels seen during training.
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.features.len()
    }

    /// Number of leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.left.iter().filter(|&&child| child == LEAF_CHILD).count()
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        if self.features.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if self.left[node] != LEAF_CHILD {
                stack.push((self.left[node] as usize, depth + 1));
                stack.push((self.right[node] as usize, depth + 1));
            }
        }
        deepest
    }

    /// Predict the class of a single row.
    pub fn predict_row(&self, row: &[f64]) -> usize {
        let mut node = 0usize;
        while self.left[node] != LEAF_CHILD {
            let feature = self.features[node] as usize;
            let value = row.get(feature).copied().unwrap_or(0.0);
            node = if value <= self.thresholds[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.classes[node]
    }
}

impl FittedTree for CartTree {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, TreeError> {
        if self.features.is_empty() {
            return Err(TreeError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TreeError::FeatureMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        let mut row_buf = vec![0.0f64; self.n_features];
        let mut out = Vec::with_capacity(x.nrows());
        for row in x.rows() {
            for (slot, &v) in row_buf.iter_mut().zip(row.iter()) {
                *slot = v;
            }
            out.push(self.predict_row(&row_buf));
        }
        Ok(out)
    }

    fn split_features(&self) -> Result<Cow<'_, [i64]>, TreeError> {
        if self.features.is_empty() {
            return Err(TreeError::NotFitted);
        }
        Ok(Cow::Borrowed(self.features.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_level_tree() -> CartTree {
        // root splits on feature 1 at 0.5, right child splits on feature 0 at 2.0
        let mut tree = CartTree::with_shape(2, vec![0, 1, 2]);
        let root = tree.push_leaf(0);
        tree.set_split(root, 1, 0.5);
        let left = tree.push_leaf(0);
        let right = tree.push_leaf(1);
        tree.set_split(right, 0, 2.0);
        let right_left = tree.push_leaf(1);
        let right_right = tree.push_leaf(2);
        tree.set_left(right, right_left);
        tree.set_right(right, right_right);
        tree.set_left(root, left);
        tree.set_right(root, right);
        tree
    }

    #[test]
    fn predict_follows_thresholds() {
        let tree = two_level_tree();
        let x = array![[0.0, 0.0], [0.0, 0.5], [1.0, 1.0], [3.0, 1.0]];
        assert_eq!(tree.predict(x.view()).unwrap(), vec![0, 0, 1, 2]);
    }

    #[test]
    fn shape_helpers_report_layout() {
        let tree = two_level_tree();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_classes(), 3);
        assert_eq!(
            tree.split_features().unwrap().as_ref(),
            &[1, LEAF_FEATURE, 0, LEAF_FEATURE, LEAF_FEATURE]
        );
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let tree = two_level_tree();
        let x = array![[0.0, 0.0, 0.0]];
        assert!(matches!(
            tree.predict(x.view()),
            Err(TreeError::FeatureMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn empty_tree_is_not_fitted() {
        let tree = CartTree::with_shape(2, vec![0, 1]);
        assert!(matches!(tree.split_features(), Err(TreeError::NotFitted)));
    }
}
