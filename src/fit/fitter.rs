//! Nonlinear fit of `(Kd, scale)` for a single binding model.
//!
//! Given:
//! - a titration `(c_i, y_i)`
//! - a model with its constants and signal bounds already captured
//! - an initial guess
//!
//! we minimize `Σ (y_i − model(c_i; Kd, scale))²` with Levenberg–Marquardt.
//!
//! Trial parameters that push a model outside its valid domain are not
//! errors: the prediction is replaced by a large penalty so the optimizer
//! rejects the step. Only the final optimum is required to be penalty-free.

use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::domain::{FitParams, FitQuality, FitResult, TitrationSeries};
use crate::error::BindingError;
use crate::math::{levenberg_marquardt, normal_inverse, LmOptions};
use crate::models::BindingModel;

/// Default prediction substituted for out-of-domain evaluations.
pub const DEFAULT_PENALTY: f64 = 1e6;

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Gradient tolerance.
    pub gtol: f64,
    pub penalty: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        let lm = LmOptions::default();
        Self {
            max_iterations: lm.max_iterations,
            ftol: lm.ftol,
            xtol: lm.xtol,
            gtol: lm.gtol,
            penalty: DEFAULT_PENALTY,
        }
    }
}

impl FitOptions {
    fn lm_options(&self) -> LmOptions {
        LmOptions {
            max_iterations: self.max_iterations,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            ..LmOptions::default()
        }
    }
}

/// Fit `(Kd, scale)` of `model` to `series`, starting from `guess`.
pub fn fit_binding<M>(
    model: &M,
    series: &TitrationSeries,
    guess: FitParams,
    opts: &FitOptions,
) -> Result<FitResult, BindingError>
where
    M: BindingModel + ?Sized,
{
    validate_setup(model, series, guess, opts)?;

    let n = series.len();
    let kind = model.kind();
    info!(model = kind.display_name(), n, kd0 = guess.kd, scale0 = guess.scale, "fitting");

    let residuals = |p: &DVector<f64>| {
        let params = FitParams::new(p[0], p[1]);
        DVector::from_iterator(
            n,
            series.points.iter().map(|pt| {
                pt.signal - model.predict_or_penalty(pt.concentration, &params, opts.penalty)
            }),
        )
    };

    let initial = DVector::from_vec(guess.to_vec());
    let report = levenberg_marquardt(residuals, initial, &opts.lm_options()).map_err(|stall| {
        let last = FitParams::from_slice(stall.params.as_slice());
        warn!(reason = %stall.reason, iterations = stall.iterations, "fit stalled");
        BindingError::FitDidNotConverge {
            reason: stall.reason.to_string(),
            last,
            iterations: stall.iterations,
        }
    })?;

    let params = FitParams::from_slice(report.params.as_slice());
    let not_converged = |reason: &str| BindingError::FitDidNotConverge {
        reason: reason.to_string(),
        last: params,
        iterations: report.iterations,
    };

    if !(params.kd.is_finite() && params.scale.is_finite()) {
        return Err(not_converged("optimum is not finite"));
    }
    if params.kd <= 0.0 {
        return Err(not_converged("optimum has a non-positive dissociation constant"));
    }
    // A penalized point at the optimum means the cost is not a real SSE.
    if series
        .points
        .iter()
        .any(|pt| model.predict(pt.concentration, &params).is_err())
    {
        return Err(not_converged("optimum lies outside the model's valid domain"));
    }

    let unscaled = normal_inverse(&report.jacobian)
        .ok_or_else(|| not_converged("singular Jacobian at the optimum"))?;
    let sse = report.cost;
    let dof = (n - kind.param_count()) as f64;
    let s2 = sse / dof;
    let covariance = [
        [s2 * unscaled[(0, 0)], s2 * unscaled[(0, 1)]],
        [s2 * unscaled[(1, 0)], s2 * unscaled[(1, 1)]],
    ];

    debug!(
        kd = params.kd,
        scale = params.scale,
        sse,
        iterations = report.iterations,
        termination = ?report.termination,
        "fit converged"
    );

    Ok(FitResult {
        model: kind,
        params,
        covariance,
        quality: FitQuality {
            sse,
            rmse: (sse / n as f64).sqrt(),
            n,
            iterations: report.iterations,
            evaluations: report.evaluations,
        },
    })
}

fn validate_setup<M>(
    model: &M,
    series: &TitrationSeries,
    guess: FitParams,
    opts: &FitOptions,
) -> Result<(), BindingError>
where
    M: BindingModel + ?Sized,
{
    let p = model.kind().param_count();
    if series.len() <= p {
        return Err(BindingError::invalid(format!(
            "need more than {p} points to fit {p} parameters (got {})",
            series.len()
        )));
    }
    if let Some(bad) = series
        .points
        .iter()
        .find(|pt| !(pt.concentration.is_finite() && pt.concentration >= 0.0 && pt.signal.is_finite()))
    {
        return Err(BindingError::invalid(format!(
            "titration point ({}, {}) is not a finite, non-negative measurement",
            bad.concentration, bad.signal
        )));
    }
    if !(guess.kd.is_finite() && guess.kd > 0.0) {
        return Err(BindingError::invalid(format!(
            "initial Kd guess must be finite and > 0 (got {})",
            guess.kd
        )));
    }
    if !guess.scale.is_finite() || guess.scale == 0.0 {
        return Err(BindingError::invalid(format!(
            "initial scale guess must be finite and non-zero (got {})",
            guess.scale
        )));
    }
    if opts.max_iterations == 0 || !opts.penalty.is_finite() {
        return Err(BindingError::invalid(
            "max iterations must be >= 1 and the penalty finite",
        ));
    }
    for pt in &series.points {
        model.predict(pt.concentration, &guess).map_err(|e| {
            BindingError::invalid(format!(
                "model cannot be evaluated at the initial guess for concentration {}: {e}",
                pt.concentration
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompetitionAssay, DirectAssay, SignalBounds, TitrationPoint};
    use crate::models::{CompetitiveBinding, DirectBinding};
    use proptest::prelude::*;

    const BOUNDS: SignalBounds = SignalBounds {
        free: 20.0,
        bound: 200.0,
    };

    const COMPETITION: CompetitionAssay = CompetitionAssay {
        macromolecule_total: 6.0,
        probe_total: 0.04,
        reference_kd: 2.55,
        quantum_yield: 3.0,
    };

    const COMPETITOR: [f64; 8] = [0.01, 0.1, 1.0, 3.0, 10.0, 30.0, 100.0, 1000.0];

    fn synthesize(model: &dyn BindingModel, conc: &[f64], truth: FitParams, noise: &[f64]) -> TitrationSeries {
        TitrationSeries::new(
            conc.iter()
                .enumerate()
                .map(|(i, &c)| TitrationPoint {
                    concentration: c,
                    signal: model.predict(c, &truth).unwrap() * (1.0 + noise.get(i).copied().unwrap_or(0.0)),
                })
                .collect(),
        )
    }

    fn direct_model() -> DirectBinding {
        DirectBinding::new(DirectAssay { probe_total: 0.01, quantum_yield: 1.0 }, BOUNDS).unwrap()
    }

    fn direct_titration() -> Vec<f64> {
        std::iter::once(0.0)
            .chain((0..11).map(|i| 10f64.powf(-3.0 + 7.0 * i as f64 / 10.0)))
            .collect()
    }

    #[test]
    fn recovers_direct_kd_without_noise() {
        let model = direct_model();
        let series = synthesize(&model, &direct_titration(), FitParams::new(1.0, 1.0), &[]);
        let fit = fit_binding(&model, &series, FitParams::new(1.0, 8.0), &FitOptions::default()).unwrap();
        assert!((fit.params.kd - 1.0).abs() < 1e-3);
        assert!((fit.params.scale - 1.0).abs() < 1e-3);
        assert_eq!(fit.quality.n, 12);
        assert!(fit.quality.sse < 1e-12);
    }

    #[test]
    fn recovers_competitive_kd_without_noise() {
        let model = CompetitiveBinding::new(COMPETITION, BOUNDS).unwrap();
        let series = synthesize(&model, &COMPETITOR, FitParams::new(10.0, 1.2), &[]);
        let fit = fit_binding(&model, &series, FitParams::new(25.0, 1.0), &FitOptions::default()).unwrap();
        assert!((fit.params.kd - 10.0).abs() / 10.0 < 1e-3);
        assert!((fit.params.scale - 1.2).abs() / 1.2 < 1e-3);
    }

    #[test]
    fn noisy_competition_lands_near_truth_with_error_bars() {
        let model = CompetitiveBinding::new(COMPETITION, BOUNDS).unwrap();
        let noise = [0.006, -0.009, 0.004, 0.010, -0.005, -0.008, 0.007, -0.003];
        let series = synthesize(&model, &COMPETITOR, FitParams::new(10.0, 1.0), &noise);

        let fit = fit_binding(&model, &series, FitParams::new(8.0, 1.0), &FitOptions::default()).unwrap();

        assert!((fit.params.kd - 10.0).abs() / 10.0 < 0.05, "kd = {}", fit.params.kd);
        assert!((fit.params.scale - 1.0).abs() < 0.01);
        let se = fit.std_errors();
        assert!(se.kd > 0.0 && se.kd < 1.0, "se(kd) = {}", se.kd);
        assert!(se.scale > 0.0 && se.scale < 0.05);
        let off = fit.covariance[0][1];
        assert!((off - fit.covariance[1][0]).abs() <= 1e-12 * off.abs().max(1e-300));
        assert!(fit.quality.rmse > 0.0);
    }

    #[test]
    fn iteration_limit_surfaces_last_iterate() {
        let model = CompetitiveBinding::new(COMPETITION, BOUNDS).unwrap();
        let noise = [0.006, -0.009, 0.004, 0.010, -0.005, -0.008, 0.007, -0.003];
        let series = synthesize(&model, &COMPETITOR, FitParams::new(10.0, 1.0), &noise);
        let opts = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };

        let err = fit_binding(&model, &series, FitParams::new(8.0, 1.0), &opts).unwrap_err();
        match err {
            BindingError::FitDidNotConverge { last, iterations, .. } => {
                assert_eq!(iterations, 1);
                assert!(last.kd.is_finite() && last.scale.is_finite());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn too_few_points_is_invalid_input() {
        let model = direct_model();
        let series = TitrationSeries::from_pairs(&[(0.1, 30.0), (1.0, 100.0)]);
        let err = fit_binding(&model, &series, FitParams::new(1.0, 1.0), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, BindingError::InvalidModelInput(_)));
    }

    #[test]
    fn non_positive_guess_is_invalid_input() {
        let model = direct_model();
        let series = synthesize(&model, &direct_titration(), FitParams::new(1.0, 1.0), &[]);
        for guess in [FitParams::new(0.0, 1.0), FitParams::new(-1.0, 1.0), FitParams::new(1.0, 0.0)] {
            let err = fit_binding(&model, &series, guess, &FitOptions::default()).unwrap_err();
            assert!(matches!(err, BindingError::InvalidModelInput(_)), "{guess:?}");
        }
    }

    #[test]
    fn negative_concentration_is_invalid_input() {
        let model = direct_model();
        let series = TitrationSeries::from_pairs(&[(-0.1, 30.0), (1.0, 100.0), (10.0, 180.0)]);
        let err = fit_binding(&model, &series, FitParams::new(1.0, 1.0), &FitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("-0.1"));
    }

    #[test]
    fn concentration_free_titration_has_singular_jacobian() {
        // With every concentration at zero the prediction ignores Kd.
        let model = direct_model();
        let series = TitrationSeries::from_pairs(&[(0.0, 20.0), (0.0, 21.0), (0.0, 19.5), (0.0, 20.2)]);
        let err = fit_binding(&model, &series, FitParams::new(1.0, 1.0), &FitOptions::default()).unwrap_err();
        match err {
            BindingError::FitDidNotConverge { reason, last, .. } => {
                assert_eq!(reason, "singular Jacobian at the optimum");
                assert!((last.kd - 1.0).abs() < 1e-12, "kd = {}", last.kd);
                assert!((last.scale - 1.00875).abs() < 1e-6, "scale = {}", last.scale);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn competitive_fit_recovers_truth_from_guess_within_2x(
            log_kd in -1.0f64..1.69,
            scale in 0.8f64..1.25,
            log_ratio in -1.0f64..1.0,
        ) {
            let kd = 10f64.powf(log_kd);
            let model = CompetitiveBinding::new(COMPETITION, BOUNDS).unwrap();
            let series = synthesize(&model, &COMPETITOR, FitParams::new(kd, scale), &[]);
            let guess = FitParams::new(kd * 2f64.powf(log_ratio), 1.0);

            let fit = fit_binding(&model, &series, guess, &FitOptions::default()).unwrap();
            prop_assert!((fit.params.kd - kd).abs() / kd < 0.05, "kd {} vs truth {}", fit.params.kd, kd);
            prop_assert!((fit.params.scale - scale).abs() / scale < 0.05);
        }
    }
}
