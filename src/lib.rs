//! Stability-regularized decision-tree selection.
//!
//! Retraining a decision tree on slightly different data can produce a very
//! different tree. [`ml::stable::StableDecisionTree`] trains several seeded
//! candidates and keeps the one that best balances training accuracy against
//! structural distance to a previously trained reference tree.

/// TOML configuration.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Tree learners, distance metric, perturbation and the stable selector.
pub mod ml;
