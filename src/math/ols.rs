//! Linear least squares and covariance helpers.
//!
//! The damped Gauss-Newton steps in [`crate::math::lm`] are posed as small
//! overdetermined systems
//!
//! ```text
//! minimize ‖A·δ − b‖²
//! ```
//!
//! Implementation choices:
//! - We use SVD so tall (more rows than columns) and rank-deficient systems
//!   are handled without special cases.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Singular values are cut off relative to the largest one, so the
//!   result does not depend on the units of the signal.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cut-off below which a direction is treated as null.
const RELATIVE_RANK_TOL: f64 = 1e-12;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let largest = svd.singular_values.max();
    if !(largest.is_finite() && largest > 0.0) {
        return None;
    }

    // Try progressively looser tolerances if strict solve fails.
    for &rel in &[RELATIVE_RANK_TOL, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, rel * largest) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Unscaled parameter covariance `(JᵀJ)⁻¹` from a Jacobian.
///
/// Returns `None` when `J` is rank deficient (some parameter direction leaves
/// the residuals unchanged), because the inverse then does not exist.
pub fn normal_inverse(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if jacobian.nrows() < jacobian.ncols() {
        return None;
    }
    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t.as_ref()?;
    let largest = svd.singular_values.max();
    if !(largest.is_finite() && largest > 0.0) {
        return None;
    }
    if svd.singular_values.iter().any(|s| *s <= RELATIVE_RANK_TOL * largest) {
        return None;
    }

    // J = U Σ Vᵀ  =>  (JᵀJ)⁻¹ = V Σ⁻² Vᵀ
    let inv_sq = DMatrix::from_diagonal(&svd.singular_values.map(|s| 1.0 / (s * s)));
    let inv = v_t.transpose() * inv_sq * v_t;
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn normal_inverse_matches_closed_form() {
        // JᵀJ = [[3, 3], [3, 5]], det = 6
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let inv = normal_inverse(&j).unwrap();
        assert!((inv[(0, 0)] - 5.0 / 6.0).abs() < 1e-12);
        assert!((inv[(0, 1)] + 0.5).abs() < 1e-12);
        assert!((inv[(1, 1)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn normal_inverse_rejects_collinear_columns() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(normal_inverse(&j).is_none());
    }
}
