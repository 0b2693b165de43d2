//! Synthetic titrations for demos and recovery checks.
//!
//! A titration is generated from a binding model at known `(Kd, scale)` and
//! then perturbed by proportional Gaussian noise:
//!
//! ```text
//! y_i = model(c_i) · (1 + noise · z_i),   z_i ~ N(0, 1)
//! ```
//!
//! The RNG is seeded so a given seed always yields the same series.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{FitParams, TitrationPoint, TitrationSeries};
use crate::error::AppError;
use crate::models::BindingModel;

/// `n` concentrations evenly spaced in log10 between `lo` and `hi` (inclusive).
pub fn log_spaced(lo: f64, hi: f64, n: usize) -> Result<Vec<f64>, AppError> {
    if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && hi > lo) {
        return Err(AppError::new(
            2,
            format!("Concentration range must satisfy 0 < min < max (got {lo}..{hi})."),
        ));
    }
    match n {
        0 => Err(AppError::new(2, "Need at least one concentration.")),
        1 => Ok(vec![lo]),
        _ => {
            let (a, b) = (lo.log10(), hi.log10());
            let step = (b - a) / (n - 1) as f64;
            Ok((0..n)
                .map(|i| if i == n - 1 { hi } else { 10f64.powf(a + step * i as f64) })
                .collect())
        }
    }
}

/// Evaluate `model` at `params` and add seeded proportional noise.
pub fn simulate_titration(
    model: &dyn BindingModel,
    concentrations: &[f64],
    params: FitParams,
    noise: f64,
    seed: u64,
) -> Result<TitrationSeries, AppError> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(AppError::new(2, format!("Noise level must be >= 0 (got {noise}).")));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut points = Vec::with_capacity(concentrations.len());
    for &concentration in concentrations {
        let clean = model.predict(concentration, &params)?;
        let z: f64 = normal.sample(&mut rng);
        points.push(TitrationPoint {
            concentration,
            signal: clean * (1.0 + noise * z),
        });
    }

    Ok(TitrationSeries::new(points))
}
