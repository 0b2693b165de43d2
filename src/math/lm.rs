//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `‖r(p)‖²` for a residual function `r: Rⁿ → Rᵐ` (`m ≥ n`):
//!
//! - Jacobian by forward differences.
//! - Marquardt scaling: the damping term uses `D = diag(JᵀJ)`, taking the
//!   running maximum over iterations so a parameter cannot lose its damping.
//! - Each damped step solves the augmented system `[J; √λ·√D]·δ = [−r; 0]`
//!   with the SVD solver from [`crate::math::ols`].
//!
//! The solver is generic over the residual function and knows nothing about
//! binding models.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::{debug, trace};

use crate::math::solve_least_squares;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

#[derive(Debug, Clone, PartialEq)]
pub struct LmOptions {
    /// Maximum number of accepted-or-rejected outer iterations.
    pub max_iterations: usize,
    /// Stop when the relative cost reduction of an accepted step is below this.
    pub ftol: f64,
    /// Stop when the step length is below `xtol·(‖p‖ + xtol)`.
    pub xtol: f64,
    /// Stop when `‖Jᵀr‖∞` is below this.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

/// Why the solver stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostReduction,
    StepSize,
    Gradient,
    ExactFit,
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Jacobian evaluated at `params`.
    pub jacobian: DMatrix<f64>,
    /// `‖r‖²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StallReason {
    #[error("iteration limit reached")]
    IterationLimit,
    #[error("residuals are not finite at the starting point")]
    NonFiniteStart,
    #[error("damping grew without finding a better step")]
    DampingExhausted,
}

/// Failure with the last accepted iterate, for diagnostics.
#[derive(Debug, Clone)]
pub struct LmStall {
    pub reason: StallReason,
    pub params: DVector<f64>,
    pub iterations: usize,
}

/// Forward-difference Jacobian of `f` at `p`, given `r = f(p)`.
pub fn forward_jacobian<F>(f: &mut F, p: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(r.len(), p.len());
    for j in 0..p.len() {
        let h = if p[j] == 0.0 { sqrt_eps } else { sqrt_eps * p[j].abs() };
        let mut shifted = p.clone();
        shifted[j] += h;
        // Use the representable step actually taken.
        let h = shifted[j] - p[j];
        let column = (f(&shifted) - r) / h;
        jac.set_column(j, &column);
    }
    jac
}

pub fn levenberg_marquardt<F>(
    mut f: F,
    initial: DVector<f64>,
    opts: &LmOptions,
) -> Result<LmReport, LmStall>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let n = initial.len();
    let mut p = initial;
    let mut r = f(&p);
    let mut evaluations = 1;
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(LmStall {
            reason: StallReason::NonFiniteStart,
            params: p,
            iterations: 0,
        });
    }

    let mut lambda = opts.initial_lambda;
    let mut scale = DVector::<f64>::zeros(n);

    for iteration in 1..=opts.max_iterations {
        if cost == 0.0 {
            return finish(&mut f, p, r, cost, iteration - 1, evaluations, Termination::ExactFit);
        }

        let jac = forward_jacobian(&mut f, &p, &r);
        evaluations += n;

        let gradient = jac.transpose() * &r;
        if gradient.amax() <= opts.gtol {
            return finish(&mut f, p, r, cost, iteration - 1, evaluations, Termination::Gradient);
        }

        for j in 0..n {
            scale[j] = scale[j].max(jac.column(j).norm_squared());
        }

        loop {
            if lambda > LAMBDA_MAX {
                return Err(LmStall {
                    reason: StallReason::DampingExhausted,
                    params: p,
                    iterations: iteration,
                });
            }

            let Some(step) = damped_step(&jac, &r, &scale, lambda) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = &p + &step;
            let r_new = f(&candidate);
            evaluations += 1;
            let cost_new = r_new.norm_squared();
            let step_small = step.norm() <= opts.xtol * (p.norm() + opts.xtol);

            if cost_new.is_finite() && cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                trace!(iteration, cost = cost_new, lambda, "step accepted");
                p = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if reduction <= opts.ftol {
                    return finish(&mut f, p, r, cost, iteration, evaluations, Termination::CostReduction);
                }
                if step_small {
                    return finish(&mut f, p, r, cost, iteration, evaluations, Termination::StepSize);
                }
                break;
            }

            // No improvement possible at this resolution.
            if step_small {
                return finish(&mut f, p, r, cost, iteration, evaluations, Termination::StepSize);
            }
            trace!(iteration, cost_new, lambda, "step rejected");
            lambda *= 10.0;
        }
    }

    Err(LmStall {
        reason: StallReason::IterationLimit,
        params: p,
        iterations: opts.max_iterations,
    })
}

fn finish<F>(
    f: &mut F,
    params: DVector<f64>,
    residuals: DVector<f64>,
    cost: f64,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
) -> Result<LmReport, LmStall>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let jacobian = forward_jacobian(f, &params, &residuals);
    debug!(iterations, cost, ?termination, "levenberg-marquardt finished");
    Ok(LmReport {
        evaluations: evaluations + params.len(),
        params,
        residuals,
        jacobian,
        cost,
        iterations,
        termination,
    })
}

/// Solve `[J; √λ·diag(√D)]·δ = [−r; 0]` in the least-squares sense.
fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jac);
    for j in 0..n {
        a[(m + j, j)] = (lambda * scale[j]).sqrt();
    }
    let mut b = DVector::<f64>::zeros(m + n);
    b.rows_mut(0, m).copy_from(&(-r));
    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exponential decay `y = a·exp(−k·t)` sampled without noise.
    fn decay_residuals(p: &DVector<f64>) -> DVector<f64> {
        let t: [f64; 7] = [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0];
        DVector::from_iterator(
            t.len(),
            t.iter().map(|&t| 2.5 * (-1.3 * t).exp() - p[0] * (-p[1] * t).exp()),
        )
    }

    #[test]
    fn recovers_exponential_decay() {
        let report = levenberg_marquardt(
            decay_residuals,
            DVector::from_row_slice(&[1.0, 0.5]),
            &LmOptions::default(),
        )
        .unwrap();
        assert!((report.params[0] - 2.5).abs() < 1e-8);
        assert!((report.params[1] - 1.3).abs() < 1e-8);
        assert!(report.cost < 1e-16);
        assert_eq!(report.jacobian.shape(), (7, 2));
    }

    #[test]
    fn linear_problem_matches_least_squares() {
        // y = 2 + 3x with a perturbation; optimum is the OLS solution.
        let xs: [f64; 4] = [0.0, 1.0, 2.0, 3.0];
        let ys: [f64; 4] = [2.1, 4.9, 8.2, 10.9];
        let residuals = |p: &DVector<f64>| {
            DVector::from_iterator(4, xs.iter().zip(ys).map(|(x, y)| y - (p[0] + p[1] * x)))
        };
        let report =
            levenberg_marquardt(residuals, DVector::from_row_slice(&[0.0, 0.0]), &LmOptions::default())
                .unwrap();
        // Normal equations: slope = Sxy/Sxx = 14.85/5, intercept = ȳ − slope·x̄.
        assert!((report.params[1] - 2.97).abs() < 1e-6);
        assert!((report.params[0] - 2.07).abs() < 1e-6);
    }

    #[test]
    fn kink_with_no_descent_exhausts_damping() {
        // Every step away from p = 1 raises the cost, but the slope is too
        // small for the step-size test to stop first.
        let residuals = |p: &DVector<f64>| DVector::from_element(1, 1.0 + 1e-7 * (p[0] - 1.0).abs());
        let stall = levenberg_marquardt(residuals, DVector::from_element(1, 1.0), &LmOptions::default())
            .unwrap_err();
        assert_eq!(stall.reason, StallReason::DampingExhausted);
        assert_eq!(stall.params[0], 1.0);
        assert_eq!(stall.iterations, 1);
    }

    #[test]
    fn iteration_limit_is_reported_with_last_iterate() {
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(decay_residuals, DVector::from_row_slice(&[0.1, 3.0]), &opts)
            .unwrap_err();
        assert_eq!(err.reason, StallReason::IterationLimit);
        assert_eq!(err.iterations, 1);
        assert!(err.params.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn non_finite_start_is_a_stall() {
        let err = levenberg_marquardt(
            |p: &DVector<f64>| DVector::from_element(3, p[0].ln()),
            DVector::from_row_slice(&[-1.0]),
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.reason, StallReason::NonFiniteStart);
    }
}
