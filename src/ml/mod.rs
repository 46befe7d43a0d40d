//! Machine learning building blocks for stable tree selection.
//!
//! The selector talks to learners through the [`tree`] traits; [`cart`] is the
//! bundled implementation.

pub mod cart;
pub mod distance;
pub mod metrics;
pub mod perturbation;
pub mod stable;
pub mod tree;
