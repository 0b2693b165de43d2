//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BindingError;

/// One titration measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TitrationPoint {
    /// Titrant concentration (µM). Macromolecule for direct binding,
    /// competitor for competition assays.
    pub concentration: f64,
    /// Observed anisotropy (or polarization-derived) signal.
    pub signal: f64,
}

/// An ordered titration, in the order the measurements were taken.
///
/// Order is irrelevant to fitting and only matters for plotting/export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitrationSeries {
    pub points: Vec<TitrationPoint>,
}

impl TitrationSeries {
    pub fn new(points: Vec<TitrationPoint>) -> Self {
        Self { points }
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(concentration, signal)| TitrationPoint { concentration, signal })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn concentrations(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.concentration).collect()
    }

    pub fn signals(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.signal).collect()
    }

    /// `(min, max)` of the observed signal, ignoring non-finite values.
    pub fn signal_range(&self) -> Option<(f64, f64)> {
        finite_range(self.points.iter().map(|p| p.signal))
    }

    /// `(min, max)` of the strictly positive concentrations (log-axis range).
    pub fn positive_concentration_range(&self) -> Option<(f64, f64)> {
        finite_range(
            self.points
                .iter()
                .map(|p| p.concentration)
                .filter(|c| *c > 0.0),
        )
    }
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

/// Summary stats about the points actually used for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_points: usize,
    pub conc_min: f64,
    pub conc_max: f64,
    pub signal_min: f64,
    pub signal_max: f64,
}

impl DatasetStats {
    pub fn from_series(series: &TitrationSeries) -> Option<Self> {
        let (conc_min, conc_max) = finite_range(series.points.iter().map(|p| p.concentration))?;
        let (signal_min, signal_max) = series.signal_range()?;
        Some(Self {
            n_points: series.len(),
            conc_min,
            conc_max,
            signal_min,
            signal_max,
        })
    }
}

/// Reference signals for the fully-free and fully-bound probe.
///
/// Computed once before a fit and then captured by the model, so every
/// evaluation during one optimization run sees the same values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBounds {
    pub free: f64,
    pub bound: f64,
}

impl SignalBounds {
    /// Explicit bounds (e.g. from free-probe and saturated control wells).
    pub fn new(free: f64, bound: f64) -> Result<Self, BindingError> {
        if !(free.is_finite() && bound.is_finite()) {
            return Err(BindingError::invalid(format!(
                "signal bounds must be finite (free={free}, bound={bound})"
            )));
        }
        if free == bound {
            return Err(BindingError::invalid(format!(
                "free and bound signals are identical ({free}); the model would be flat"
            )));
        }
        Ok(Self { free, bound })
    }

    /// Minimum and maximum observed signal, used as proxies for the
    /// fully-free and fully-bound states.
    pub fn from_series(series: &TitrationSeries) -> Result<Self, BindingError> {
        let (min, max) = series
            .signal_range()
            .ok_or_else(|| BindingError::invalid("titration has no finite signal values"))?;
        Self::new(min, max)
    }
}

/// Where the signal bounds come from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "source")]
pub enum BoundsSource {
    /// Min/max of the titration being fitted.
    Observed,
    /// Caller-supplied control values.
    Explicit { free: f64, bound: f64 },
}

impl BoundsSource {
    pub fn resolve(self, series: &TitrationSeries) -> Result<SignalBounds, BindingError> {
        match self {
            BoundsSource::Observed => SignalBounds::from_series(series),
            BoundsSource::Explicit { free, bound } => SignalBounds::new(free, bound),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BoundsSource::Observed => "observed min/max",
            BoundsSource::Explicit { .. } => "explicit",
        }
    }
}

/// Fixed constants of a direct-binding titration (probe held constant,
/// macromolecule titrated).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectAssay {
    /// Total fluorescent probe concentration (µM).
    pub probe_total: f64,
    /// Bound/free quantum yield ratio.
    pub quantum_yield: f64,
}

impl DirectAssay {
    pub fn validate(&self) -> Result<(), BindingError> {
        require_positive("probe concentration", self.probe_total)?;
        require_positive("quantum yield", self.quantum_yield)
    }
}

/// Fixed constants of a competition titration (macromolecule and probe held
/// constant, unlabeled competitor titrated).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompetitionAssay {
    /// Total macromolecule concentration (µM).
    pub macromolecule_total: f64,
    /// Total fluorescent probe concentration (µM).
    pub probe_total: f64,
    /// Probe/macromolecule Kd measured in a direct assay (µM).
    pub reference_kd: f64,
    /// Bound/free quantum yield ratio.
    pub quantum_yield: f64,
}

impl CompetitionAssay {
    pub fn validate(&self) -> Result<(), BindingError> {
        require_positive("macromolecule concentration", self.macromolecule_total)?;
        require_positive("probe concentration", self.probe_total)?;
        require_positive("reference Kd", self.reference_kd)?;
        require_positive("quantum yield", self.quantum_yield)
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), BindingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BindingError::invalid(format!("{name} must be finite and > 0 (got {value})")))
    }
}

/// Experiment description: which model and its fixed constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "model")]
pub enum Assay {
    Direct(DirectAssay),
    Competitive(CompetitionAssay),
}

impl Assay {
    pub fn kind(&self) -> ModelKind {
        match self {
            Assay::Direct(_) => ModelKind::Direct,
            Assay::Competitive(_) => ModelKind::Competitive,
        }
    }

    /// Named constants for reports and exports.
    pub fn constants(&self) -> Vec<(&'static str, f64)> {
        match self {
            Assay::Direct(a) => vec![
                ("probe_total_uM", a.probe_total),
                ("quantum_yield", a.quantum_yield),
            ],
            Assay::Competitive(a) => vec![
                ("macromolecule_total_uM", a.macromolecule_total),
                ("probe_total_uM", a.probe_total),
                ("reference_kd_uM", a.reference_kd),
                ("quantum_yield", a.quantum_yield),
            ],
        }
    }
}

/// Concrete binding model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Direct,
    Competitive,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Direct => "direct binding",
            ModelKind::Competitive => "competitive binding",
        }
    }

    /// Label of the fitted dissociation constant.
    pub fn kd_label(self) -> &'static str {
        match self {
            ModelKind::Direct => "Kd",
            ModelKind::Competitive => "Kd2",
        }
    }

    /// What the x-axis concentration refers to.
    pub fn titrant_label(self) -> &'static str {
        match self {
            ModelKind::Direct => "macromolecule",
            ModelKind::Competitive => "competitor",
        }
    }

    /// Number of free parameters (Kd and scale).
    pub fn param_count(self) -> usize {
        2
    }
}

/// The free parameters estimated by the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    /// Dissociation constant being fitted (µM).
    pub kd: f64,
    /// Linear scaling factor (instrument/fluorophore amplitude).
    pub scale: f64,
}

impl FitParams {
    pub fn new(kd: f64, scale: f64) -> Self {
        Self { kd, scale }
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.kd, self.scale]
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            kd: values.first().copied().unwrap_or(f64::NAN),
            scale: values.get(1).copied().unwrap_or(f64::NAN),
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    pub iterations: usize,
    pub evaluations: usize,
}

/// Output of a single fit. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: FitParams,
    /// Estimated covariance of `(kd, scale)`.
    pub covariance: [[f64; 2]; 2],
    pub quality: FitQuality,
}

impl FitResult {
    /// One-sigma standard errors from the covariance diagonal.
    pub fn std_errors(&self) -> FitParams {
        FitParams {
            kd: self.covariance[0][0].max(0.0).sqrt(),
            scale: self.covariance[1][1].max(0.0).sqrt(),
        }
    }

    /// Dissociation constant rounded to two decimals for display.
    pub fn rounded_kd(&self) -> f64 {
        (self.params.kd * 100.0).round() / 100.0
    }
}

/// A per-point fitted result (used for tables, plots and exports).
#[derive(Debug, Clone, PartialEq)]
pub struct PointResidual {
    pub point: TitrationPoint,
    pub fitted: f64,
    pub residual: f64,
    pub bound_fraction: f64,
}

/// A full fit run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub data_path: PathBuf,
    pub assay: Assay,
    pub bounds: BoundsSource,
    pub guess: FitParams,
    pub max_iterations: usize,
    /// Prediction substituted when the model leaves its domain mid-fit.
    pub penalty: f64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
}

/// Configuration of a two-population significance comparison.
#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub first_path: PathBuf,
    pub second_path: PathBuf,
    pub first_label: String,
    pub second_label: String,
}

/// Configuration of a synthetic titration.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub out_path: PathBuf,
    pub assay: Assay,
    pub bounds: SignalBounds,
    pub params: FitParams,
    /// Relative (proportional) Gaussian noise level, e.g. `0.01` for 1%.
    pub noise: f64,
    pub seed: u64,
    pub points: usize,
    pub conc_min: f64,
    pub conc_max: f64,
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub data_file: Option<String>,
    pub assay: Assay,
    pub bounds: SignalBounds,
    pub bounds_source: BoundsSource,
    pub fit: FitResult,
    pub std_errors: FitParams,
    pub observations: Vec<TitrationPoint>,
    pub grid: FitGrid,
}

/// Fitted curve sampled on a log-spaced concentration grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitGrid {
    pub concentration: Vec<f64>,
    pub signal: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_from_series_use_min_and_max() {
        let series = TitrationSeries::from_pairs(&[(0.0, 130.0), (1.0, 150.5), (10.0, 118.25)]);
        let bounds = SignalBounds::from_series(&series).unwrap();
        assert_eq!(bounds.free, 118.25);
        assert_eq!(bounds.bound, 150.5);
    }

    #[test]
    fn flat_series_cannot_provide_bounds() {
        let series = TitrationSeries::from_pairs(&[(0.1, 42.0), (1.0, 42.0)]);
        let err = SignalBounds::from_series(&series).unwrap_err();
        assert!(matches!(err, BindingError::InvalidModelInput(_)));
    }

    #[test]
    fn assay_validation_rejects_non_positive_constants() {
        let direct = DirectAssay { probe_total: 0.0, quantum_yield: 1.0 };
        assert!(direct.validate().is_err());

        let competition = CompetitionAssay {
            macromolecule_total: 6.0,
            probe_total: 0.04,
            reference_kd: -2.55,
            quantum_yield: 3.0,
        };
        let err = competition.validate().unwrap_err();
        assert!(err.to_string().contains("reference Kd"));
    }

    #[test]
    fn rounded_kd_keeps_two_decimals() {
        let fit = FitResult {
            model: ModelKind::Competitive,
            params: FitParams::new(9.876_54, 1.0),
            covariance: [[0.04, 0.0], [0.0, 1e-4]],
            quality: FitQuality { sse: 0.0, rmse: 0.0, n: 8, iterations: 3, evaluations: 12 },
        };
        assert_eq!(fit.rounded_kd(), 9.88);
        assert!((fit.std_errors().kd - 0.2).abs() < 1e-12);
    }
}
