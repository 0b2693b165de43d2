//! Shared "fit pipeline" logic used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load titration -> resolve signal bounds -> build model -> fit -> residuals
//!
//! The command handlers can then focus on presentation (printing, plots, exports).

use tracing::info;

use crate::data::{log_spaced, simulate_titration};
use crate::domain::{CompareConfig, FitConfig, FitResult, PointResidual, SimulateConfig, TitrationSeries};
use crate::error::AppError;
use crate::fit::{fit_binding, FitOptions};
use crate::io::ingest::{load_samples, load_titration, IngestedTitration};
use crate::models::AnyBinding;
use crate::stats::{students_t_test, TTestResult};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedTitration,
    pub model: AnyBinding,
    pub fit: FitResult,
    pub residuals: Vec<PointResidual>,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_titration(&config.data_path)?;
    run_fit_with_ingest(config, ingest)
}

/// Execute the fitting pipeline on an already-loaded titration.
pub fn run_fit_with_ingest(config: &FitConfig, ingest: IngestedTitration) -> Result<RunOutput, AppError> {
    // Bounds are fixed here, once, before any model evaluation.
    let bounds = config.bounds.resolve(&ingest.series)?;
    let model = AnyBinding::from_assay(config.assay, bounds)?;
    info!(
        model = config.assay.kind().display_name(),
        free = bounds.free,
        bound = bounds.bound,
        source = config.bounds.display_name(),
        "signal bounds resolved"
    );

    let opts = FitOptions {
        max_iterations: config.max_iterations,
        penalty: config.penalty,
        ..FitOptions::default()
    };
    let fit = fit_binding(&model, &ingest.series, config.guess, &opts)?;
    let residuals = crate::report::compute_residuals(&ingest.series, &model, &fit.params)?;

    Ok(RunOutput {
        ingest,
        model,
        fit,
        residuals,
    })
}

/// Load both sample files and run the t-test.
pub fn run_compare(config: &CompareConfig) -> Result<TTestResult, AppError> {
    let first = load_samples(&config.first_path)?;
    let second = load_samples(&config.second_path)?;
    students_t_test(&first.values, &second.values)
}

/// Generate a synthetic titration (not written to disk).
pub fn run_simulate(config: &SimulateConfig) -> Result<TitrationSeries, AppError> {
    let model = AnyBinding::from_assay(config.assay, config.bounds)?;
    let concentrations = log_spaced(config.conc_min, config.conc_max, config.points)?;
    simulate_titration(&model, &concentrations, config.params, config.noise, config.seed)
}
