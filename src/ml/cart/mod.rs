//! Seeded CART classification tree.
//!
//! This is the bundled learner behind [`crate::ml::stable::StableDecisionTree`]:
//! - Gini impurity splits on numeric features.
//! - Per-node feature order shuffled by `random_state`, so equal-quality splits
//!   are resolved by the seed.
//! - Pre-order node arrays with scikit-learn style leaf sentinels.

mod model;
mod train;

pub use model::{CartTree, LEAF_CHILD, LEAF_FEATURE};
pub use train::{CartOptions, CartTrainer, gini_from_counts, train_cart};
