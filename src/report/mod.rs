//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitParams, PointResidual, TitrationSeries};
use crate::error::AppError;
use crate::models::BindingModel;

/// Compute fitted values, residuals and bound fractions for each point.
pub fn compute_residuals(
    series: &TitrationSeries,
    model: &dyn BindingModel,
    params: &FitParams,
) -> Result<Vec<PointResidual>, AppError> {
    let mut out = Vec::with_capacity(series.len());
    for p in &series.points {
        let fitted = model.predict(p.concentration, params)?;
        let bound_fraction = model.bound_fraction(p.concentration, params.kd)?;
        out.push(PointResidual {
            point: *p,
            fitted,
            residual: p.signal - fitted,
            bound_fraction,
        });
    }
    Ok(out)
}
