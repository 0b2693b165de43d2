//! Two-sample Student's t-test (pooled variance, two-tailed).
//!
//! Used to compare two per-cell intensity populations. The p-value comes
//! from the t distribution via `statrs`.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::AppError;

/// Mean and sample standard deviation of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSummary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl SampleSummary {
    fn of(values: &[f64]) -> Self {
        let n = values.len();
        let n_f = n as f64;
        let mean = values.iter().sum::<f64>() / n_f;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n_f - 1.0);
        Self {
            n,
            mean,
            std_dev: variance.sqrt(),
        }
    }

    fn sum_of_squares(&self) -> f64 {
        self.std_dev.powi(2) * (self.n as f64 - 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TTestResult {
    pub first: SampleSummary,
    pub second: SampleSummary,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

impl TTestResult {
    pub fn label(&self) -> SignificanceLabel {
        SignificanceLabel::from_p(self.p_value)
    }
}

/// Coarse significance bucket, as annotated on comparison plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignificanceLabel {
    NotSignificant,
    Below05,
    Below01,
    Below001,
    Below0001,
}

impl SignificanceLabel {
    pub fn from_p(p: f64) -> Self {
        if p > 0.05 {
            SignificanceLabel::NotSignificant
        } else if p > 0.01 {
            SignificanceLabel::Below05
        } else if p > 0.001 {
            SignificanceLabel::Below01
        } else if p > 0.0001 {
            SignificanceLabel::Below001
        } else {
            SignificanceLabel::Below0001
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignificanceLabel::NotSignificant => "no significance",
            SignificanceLabel::Below05 => "p < 0.05",
            SignificanceLabel::Below01 => "p < 0.01",
            SignificanceLabel::Below001 => "p < 0.001",
            SignificanceLabel::Below0001 => "p < 0.0001",
        }
    }
}

impl std::fmt::Display for SignificanceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent two-sample t-test assuming equal variances.
pub fn students_t_test(first: &[f64], second: &[f64]) -> Result<TTestResult, AppError> {
    if first.len() < 2 || second.len() < 2 {
        return Err(AppError::new(
            3,
            format!(
                "Each group needs at least 2 values (got {} and {}).",
                first.len(),
                second.len()
            ),
        ));
    }
    if first.iter().chain(second).any(|v| !v.is_finite()) {
        return Err(AppError::new(2, "Sample values must be finite."));
    }

    let a = SampleSummary::of(first);
    let b = SampleSummary::of(second);
    let df = (a.n + b.n - 2) as f64;
    let pooled = (a.sum_of_squares() + b.sum_of_squares()) / df;
    if !(pooled > 0.0) {
        return Err(AppError::new(
            4,
            "Both groups have zero variance; the t statistic is undefined.",
        ));
    }

    let standard_error = (pooled * (1.0 / a.n as f64 + 1.0 / b.n as f64)).sqrt();
    let t = (a.mean - b.mean) / standard_error;

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AppError::new(4, format!("Invalid t distribution (df={df}): {e}")))?;
    let p_value = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);

    Ok(TTestResult {
        first: a,
        second: b,
        t_statistic: t,
        degrees_of_freedom: df,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_groups_are_significant() {
        let r = students_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        assert!((r.t_statistic + 5.0).abs() < 1e-12);
        assert_eq!(r.degrees_of_freedom, 8.0);
        assert!((r.p_value - 0.001_052_825_793_5).abs() < 1e-9, "p = {}", r.p_value);
        assert_eq!(r.label(), SignificanceLabel::Below01);
    }

    #[test]
    fn unequal_group_sizes_use_pooled_variance() {
        let r = students_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0]).unwrap();
        assert!((r.t_statistic + 2.215_646_837_627_989).abs() < 1e-9);
        assert!((r.p_value - 0.053_945_920_522).abs() < 1e-8, "p = {}", r.p_value);
        assert_eq!(r.label().as_str(), "no significance");
    }

    #[test]
    fn label_ladder_boundaries() {
        assert_eq!(SignificanceLabel::from_p(0.2), SignificanceLabel::NotSignificant);
        assert_eq!(SignificanceLabel::from_p(0.05), SignificanceLabel::Below05);
        assert_eq!(SignificanceLabel::from_p(0.01), SignificanceLabel::Below01);
        assert_eq!(SignificanceLabel::from_p(0.001), SignificanceLabel::Below001);
        assert_eq!(SignificanceLabel::from_p(0.0001), SignificanceLabel::Below0001);
        assert_eq!(SignificanceLabel::from_p(1e-9).to_string(), "p < 0.0001");
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert_eq!(students_t_test(&[1.0], &[2.0, 3.0]).unwrap_err().exit_code(), 3);
        assert_eq!(students_t_test(&[1.0, 1.0], &[1.0, 1.0]).unwrap_err().exit_code(), 4);
    }
}
