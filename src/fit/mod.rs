//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate the data and initial guess before optimizing
//! - run Levenberg–Marquardt with out-of-domain penalties
//! - turn the optimum into parameters, covariance and quality diagnostics

pub mod fitter;

pub use fitter::*;
