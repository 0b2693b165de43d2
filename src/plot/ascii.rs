//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Titrations span several decades, so the x axis is log10(concentration).
//! Zero-concentration points are pinned to the left edge.
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line

use crate::domain::{FitFile, FitParams, ModelKind, PointResidual, TitrationPoint};
use crate::io::build_grid;
use crate::models::BindingModel;

/// Render a plot for an in-memory fit result.
pub fn render_fit_plot(
    residuals: &[PointResidual],
    model: &dyn BindingModel,
    params: &FitParams,
    width: usize,
    height: usize,
) -> String {
    let points: Vec<TitrationPoint> = residuals.iter().map(|r| r.point).collect();
    let (c_min, c_max) = log_range(points.iter().map(|p| p.concentration)).unwrap_or((1e-3, 1e3));
    let grid = build_grid(model, params, c_min, c_max, width.max(2) * 2);
    let curve: Vec<(f64, f64)> = grid
        .concentration
        .iter()
        .zip(grid.signal.iter())
        .map(|(&c, &y)| (c, y))
        .collect();
    render_plot(&points, Some(&curve), c_min, c_max, width, height, model.kind())
}

/// Render a plot from a saved fit JSON file (observations + fitted grid).
pub fn render_fit_file_plot(fit_file: &FitFile, width: usize, height: usize) -> String {
    let curve: Vec<(f64, f64)> = fit_file
        .grid
        .concentration
        .iter()
        .zip(fit_file.grid.signal.iter())
        .map(|(&c, &y)| (c, y))
        .collect();
    let (c_min, c_max) = log_range(
        fit_file
            .observations
            .iter()
            .map(|p| p.concentration)
            .chain(curve.iter().map(|&(c, _)| c)),
    )
    .unwrap_or((1e-3, 1e3));

    render_plot(
        &fit_file.observations,
        Some(&curve),
        c_min,
        c_max,
        width,
        height,
        fit_file.fit.model,
    )
}

fn render_plot(
    points: &[TitrationPoint],
    curve_points: Option<&[(f64, f64)]>,
    c_min: f64,
    c_max: f64,
    width: usize,
    height: usize,
    kind: ModelKind,
) -> String {
    let (y_min, y_max) = y_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
    let axes = Axes {
        log_lo: c_min.log10(),
        log_hi: c_max.log10(),
        y_min,
        y_max,
        width: width.max(10),
        height: height.max(5),
    };

    let mut canvas = Canvas::new(axes);
    // Curve first so observations overlay it.
    if let Some(curve) = curve_points {
        canvas.trace(curve, '-');
    }
    for p in points {
        canvas.mark(p.concentration, p.signal, 'o');
    }

    let mut out = format!(
        "Plot: {}=[{c_min:.3}, {c_max:.3}] uM (log) | signal=[{y_min:.2}, {y_max:.2}]\n",
        kind.titrant_label()
    );
    out.push_str(&canvas.render());
    out
}

/// Log10 concentration on x, linear signal on y.
#[derive(Debug, Clone, Copy)]
struct Axes {
    log_lo: f64,
    log_hi: f64,
    y_min: f64,
    y_max: f64,
    width: usize,
    height: usize,
}

impl Axes {
    /// Column for a concentration. Non-positive concentrations sit in column 0.
    fn column(&self, c: f64) -> usize {
        if !(c > 0.0) {
            return 0;
        }
        let span = self.log_hi - self.log_lo;
        let u = if span > 0.0 {
            ((c.log10() - self.log_lo) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (u * (self.width - 1) as f64).round() as usize
    }

    /// Row for a signal; row 0 is the top.
    fn row(&self, y: f64) -> usize {
        let u = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        ((1.0 - u) * (self.height - 1) as f64).round() as usize
    }
}

struct Canvas {
    axes: Axes,
    cells: Vec<Vec<char>>,
}

impl Canvas {
    fn new(axes: Axes) -> Self {
        Self {
            axes,
            cells: vec![vec![' '; axes.width]; axes.height],
        }
    }

    fn mark(&mut self, c: f64, y: f64, ch: char) {
        let (col, row) = (self.axes.column(c), self.axes.row(y));
        self.cells[row][col] = ch;
    }

    /// Fill only blank cells.
    fn fill(&mut self, col: usize, row: usize, ch: char) {
        if self.cells[row][col] == ' ' {
            self.cells[row][col] = ch;
        }
    }

    /// Connect consecutive curve samples column by column, bridging vertical
    /// jumps so steep transitions stay continuous.
    fn trace(&mut self, curve: &[(f64, f64)], ch: char) {
        let cells: Vec<(usize, usize)> = curve
            .iter()
            .filter(|(c, y)| c.is_finite() && y.is_finite())
            .map(|&(c, y)| (self.axes.column(c), self.axes.row(y)))
            .collect();
        let Some(&(first_col, first_row)) = cells.first() else {
            return;
        };
        self.fill(first_col, first_row, ch);

        let mut last_row = first_row;
        for pair in cells.windows(2) {
            let ((c0, r0), (c1, r1)) = (pair[0], pair[1]);
            let (lo, hi) = (c0.min(c1), c0.max(c1));
            for col in lo..=hi {
                let t = if hi == lo { 1.0 } else { (col - lo) as f64 / (hi - lo) as f64 };
                let t = if c0 <= c1 { t } else { 1.0 - t };
                let row = (r0 as f64 + t * (r1 as f64 - r0 as f64)).round() as usize;
                for r in row.min(last_row)..=row.max(last_row) {
                    self.fill(col, r, ch);
                }
                last_row = row;
            }
        }
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity((self.axes.width + 1) * self.axes.height);
        for row in &self.cells {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }
}

/// Range of the positive concentrations, widened by a decade each way if degenerate.
fn log_range(concentrations: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = concentrations
        .filter(|c| c.is_finite() && *c > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c), hi.max(c)));
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    Some(if hi > lo { (lo, hi) } else { (lo / 10.0, hi * 10.0) })
}

fn y_range(points: &[TitrationPoint], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let (lo, hi) = points
        .iter()
        .map(|p| p.signal)
        .chain(curve.unwrap_or(&[]).iter().map(|&(_, y)| y))
        .filter(|y| y.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    (lo.is_finite() && hi > lo).then_some((lo, hi))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}
