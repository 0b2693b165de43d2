//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of a fit:
//! - model kind, assay constants and signal bounds
//! - fitted parameters, covariance, standard errors and quality
//! - the observations and a precomputed fitted grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{BoundsSource, FitFile, FitGrid, FitParams, FitResult, TitrationSeries};
use crate::error::AppError;
use crate::models::{AnyBinding, BindingModel};

/// Points on the saved fitted curve.
pub const GRID_POINTS: usize = 121;

/// Assemble the JSON document for a finished fit.
pub fn build_fit_file(
    model: &AnyBinding,
    bounds_source: BoundsSource,
    fit: &FitResult,
    series: &TitrationSeries,
    data_file: Option<&Path>,
) -> FitFile {
    let (c_min, c_max) = series
        .positive_concentration_range()
        .unwrap_or((1e-3, 1e3));
    FitFile {
        tool: "fa".to_string(),
        generated: Utc::now(),
        data_file: data_file.map(|p| p.display().to_string()),
        assay: model.assay(),
        bounds: model.blend().bounds(),
        bounds_source,
        fit: fit.clone(),
        std_errors: fit.std_errors(),
        observations: series.points.clone(),
        grid: build_grid(model, &fit.params, c_min, c_max, GRID_POINTS),
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, fit_file: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fit_file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit_file: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(fit_file)
}

/// Sample the fitted curve on a log-spaced grid.
///
/// Points where the model cannot be evaluated are left out.
pub fn build_grid(
    model: &dyn BindingModel,
    params: &FitParams,
    c_min: f64,
    c_max: f64,
    n: usize,
) -> FitGrid {
    let n = n.max(2);
    let (mut lo, mut hi) = (c_min, c_max);
    if !(lo.is_finite() && hi.is_finite() && lo > 0.0) || hi <= lo {
        lo = 1e-3;
        hi = 1e3;
    }
    let (a, b) = (lo.log10(), hi.log10());

    let mut concentration = Vec::with_capacity(n);
    let mut signal = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let c = 10f64.powf(a + u * (b - a));
        if let Ok(y) = model.predict(c, params) {
            concentration.push(c);
            signal.push(y);
        }
    }

    FitGrid {
        concentration,
        signal,
    }
}
