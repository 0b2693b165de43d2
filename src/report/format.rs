//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{BoundsSource, FitConfig, FitResult, ModelKind, PointResidual};
use crate::io::ingest::IngestedTitration;
use crate::models::{AnyBinding, BindingModel};
use crate::stats::TTestResult;

/// Rows listed individually before the skipped-row summary is truncated.
const MAX_LISTED_ROW_ERRORS: usize = 10;

/// Format the full run summary (dataset stats + assay + fitted parameters).
pub fn format_fit_summary(
    ingest: &IngestedTitration,
    model: &AnyBinding,
    fit: &FitResult,
    config: &FitConfig,
) -> String {
    let kind = model.kind();
    let mut out = String::new();

    out.push_str(&format!("=== fa - {} fit ===\n", capitalize(kind.display_name())));
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.stats.n_points,
        ingest.row_errors.len()
    ));
    for e in ingest.row_errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > MAX_LISTED_ROW_ERRORS {
        out.push_str(&format!(
            "  ... {} more\n",
            ingest.row_errors.len() - MAX_LISTED_ROW_ERRORS
        ));
    }
    out.push_str(&format!(
        "Points: n={} | {}=[{:.3}, {:.3}] uM | signal=[{:.2}, {:.2}]\n",
        ingest.stats.n_points,
        kind.titrant_label(),
        ingest.stats.conc_min,
        ingest.stats.conc_max,
        ingest.stats.signal_min,
        ingest.stats.signal_max
    ));

    out.push_str("\nAssay:\n");
    for (name, value) in model.assay().constants() {
        out.push_str(&format!("- {name:<24} {value:.4}\n"));
    }
    let bounds = model.blend().bounds();
    out.push_str(&format!(
        "- {:<24} free={:.3} bound={:.3} ({})\n",
        "signal_bounds",
        bounds.free,
        bounds.bound,
        config.bounds.display_name()
    ));
    if config.bounds == BoundsSource::Observed && kind == ModelKind::Competitive {
        out.push_str("  note: observed bounds assume the titration reaches both plateaus\n");
    }

    out.push_str("\nFit:\n");
    out.push_str(&format_params(fit));
    out.push_str(&format!(
        "- SSE={:.4} RMSE={:.4} | iterations={} evaluations={}\n",
        fit.quality.sse, fit.quality.rmse, fit.quality.iterations, fit.quality.evaluations
    ));
    out.push('\n');

    out
}

/// Fitted parameters with one-sigma errors. Kd is shown to two decimals.
pub fn format_params(fit: &FitResult) -> String {
    let se = fit.std_errors();
    format!(
        "- {:<5} = {:.2} uM (± {:.2})\n- {:<5} = {:.6} (± {:.6})\n",
        fit.model.kd_label(),
        fit.rounded_kd(),
        se.kd,
        "scale",
        fit.params.scale,
        se.scale
    )
}

/// Per-point table of observed vs fitted values.
pub fn format_residual_table(residuals: &[PointResidual], kind: ModelKind) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>14} {:>12} {:>12} {:>10} {:>8}\n",
            format!("{}_uM", kind.titrant_label()),
            "observed",
            "fitted",
            "residual",
            "FB"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<14} {:-<12} {:-<12} {:-<10} {:-<8}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in residuals {
        out.push_str(
            format!(
                "{:>14.4} {:>12.3} {:>12.3} {:>10.3} {:>8.4}\n",
                r.point.concentration, r.point.signal, r.fitted, r.residual, r.bound_fraction
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Summary of a two-population comparison.
pub fn format_comparison(first_label: &str, second_label: &str, result: &TTestResult) -> String {
    let mut out = String::new();
    out.push_str("=== fa - Two-sample comparison ===\n");
    for (label, s) in [(first_label, &result.first), (second_label, &result.second)] {
        out.push_str(&format!(
            "{:<24} n={:<4} mean={:.3} sd={:.3}\n",
            truncate(label, 24),
            s.n,
            s.mean,
            s.std_dev
        ));
    }
    out.push_str(&format!(
        "Student's t-test (pooled, two-tailed): t={:.4} df={} p={:.4e}\n",
        result.t_statistic, result.degrees_of_freedom, result.p_value
    ));
    out.push_str(&format!("Significance: {}\n", result.label()));
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitParams, FitQuality, TitrationPoint};
    use crate::stats::students_t_test;

    fn fit() -> FitResult {
        FitResult {
            model: ModelKind::Competitive,
            params: FitParams::new(9.919_855, 1.000_997),
            covariance: [[0.078_88, 0.0], [0.0, 1.119e-5]],
            quality: FitQuality { sse: 9.37, rmse: 1.08, n: 8, iterations: 4, evaluations: 23 },
        }
    }

    #[test]
    fn params_show_rounded_kd_and_errors() {
        let txt = format_params(&fit());
        assert!(txt.contains("Kd2   = 9.92 uM (± 0.28)"), "{txt}");
        assert!(txt.contains("scale = 1.000997 (± 0.003345)"), "{txt}");
    }

    #[test]
    fn residual_table_has_one_line_per_point() {
        let rows = vec![PointResidual {
            point: TitrationPoint { concentration: 0.01, signal: 178.626 },
            fitted: 177.5,
            residual: 1.126,
            bound_fraction: 0.7006,
        }];
        let txt = format_residual_table(&rows, ModelKind::Competitive);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("competitor_uM"));
        assert_eq!(lines[2], "        0.0100      178.626      177.500      1.126   0.7006");
    }

    #[test]
    fn comparison_reports_label() {
        let r = students_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        let txt = format_comparison("speckled", "diffuse", &r);
        assert!(txt.contains("speckled"));
        assert!(txt.contains("t=-5.0000 df=8"));
        assert!(txt.ends_with("Significance: p < 0.01\n"));
    }
}
