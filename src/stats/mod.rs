//! Statistics for comparing measured populations.

pub mod ttest;

pub use ttest::*;
