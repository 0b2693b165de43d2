//! Competitive binding: macromolecule `M` and probe `P` held constant,
//! unlabeled competitor `C` titrated.
//!
//! Two coupled equilibria (`P + M ⇌ PM` with `Kd1`, `C + M ⇌ CM` with `Kd2`)
//! reduce to a cubic in free macromolecule `x`:
//!
//! ```text
//! x³ + d·x² + e·x + f = 0
//! d = Kd1 + Kd2 + Pt + [C] − Mt
//! e = ([C] − Mt)·Kd1 + (Pt − Mt)·Kd2 + Kd1·Kd2
//! f = −Kd1·Kd2·Mt
//! ```
//!
//! The physical root is the trigonometric (Viète) root
//!
//! ```text
//! p  = d² − 3e
//! θ  = arccos((−2d³ + 9de − 27f) / (2·sqrt(p³)))
//! x  = (2·sqrt(p)·cos(θ/3) − d) / 3
//! FB = x / (Kd1 + x)
//! ```
//!
//! For `d > 0` the direct form cancels badly. The most negative root is then
//! free of cancellation, so the cubic is deflated by it and `x` is taken as
//! the larger root of the remaining quadratic, solved in cancellation-free form.

use std::f64::consts::PI;

use crate::domain::{CompetitionAssay, ModelKind, SignalBounds};
use crate::error::BindingError;
use crate::models::{BindingModel, SignalBlend};

/// Rounding slack tolerated on the arccos argument before it is clamped.
pub const ARCCOS_SLACK: f64 = 1e-9;

/// Cubic coefficients `(d, e, f)` of the monic free-macromolecule cubic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicCoefficients {
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

/// Competition model with its constants captured at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetitiveBinding {
    assay: CompetitionAssay,
    blend: SignalBlend,
}

impl CompetitiveBinding {
    pub fn new(assay: CompetitionAssay, bounds: SignalBounds) -> Result<Self, BindingError> {
        assay.validate()?;
        let bounds = SignalBounds::new(bounds.free, bounds.bound)?;
        Ok(Self {
            assay,
            blend: SignalBlend::new(bounds, assay.quantum_yield),
        })
    }

    pub fn assay(&self) -> &CompetitionAssay {
        &self.assay
    }

    pub fn cubic(&self, competitor: f64, kd2: f64) -> CubicCoefficients {
        let CompetitionAssay {
            macromolecule_total: mt,
            probe_total: pt,
            reference_kd: kd1,
            ..
        } = self.assay;
        CubicCoefficients {
            d: kd1 + kd2 + pt + competitor - mt,
            e: (competitor - mt) * kd1 + (pt - mt) * kd2 + kd1 * kd2,
            f: -kd1 * kd2 * mt,
        }
    }

    /// Free macromolecule concentration at the given competitor level.
    pub fn free_macromolecule(&self, competitor: f64, kd2: f64) -> Result<f64, BindingError> {
        viete_root(self.cubic(competitor, kd2))
    }
}

impl BindingModel for CompetitiveBinding {
    fn kind(&self) -> ModelKind {
        ModelKind::Competitive
    }

    fn blend(&self) -> &SignalBlend {
        &self.blend
    }

    // Kd2 is deliberately unchecked: trial values proposed by the optimizer
    // are screened by the domain checks below.
    fn bound_fraction(&self, concentration: f64, kd: f64) -> Result<f64, BindingError> {
        let x = self.free_macromolecule(concentration, kd)?;
        let fb = x / (self.assay.reference_kd + x);
        if (0.0..=1.0).contains(&fb) {
            Ok(fb)
        } else {
            Err(BindingError::OutOfDomain {
                quantity: "bound fraction",
                argument: fb,
            })
        }
    }
}

fn viete_root(CubicCoefficients { d, e, f }: CubicCoefficients) -> Result<f64, BindingError> {
    let p = d * d - 3.0 * e;
    if !(p > 0.0) {
        return Err(BindingError::OutOfDomain {
            quantity: "square root",
            argument: p,
        });
    }
    let sqrt_p = p.sqrt();
    let ratio = (-2.0 * d * d * d + 9.0 * d * e - 27.0 * f) / (2.0 * p * sqrt_p);
    let theta = arccos_checked(ratio)?;
    let root = |k: f64| (2.0 * sqrt_p * ((theta + 2.0 * PI * k) / 3.0).cos() - d) / 3.0;

    if d > 0.0 {
        // root(1) is the smallest root and, with d > 0, a sum of two negative terms.
        let low = root(1.0);
        return larger_quadratic_root(d + low, -f / low);
    }
    Ok(root(0.0))
}

/// Larger root of `x² + b·x + c`.
fn larger_quadratic_root(b: f64, c: f64) -> Result<f64, BindingError> {
    let disc = b * b - 4.0 * c;
    if !(disc >= 0.0) {
        return Err(BindingError::OutOfDomain {
            quantity: "square root",
            argument: disc,
        });
    }
    let q = -0.5 * (b + disc.sqrt().copysign(b));
    if q == 0.0 {
        return Ok(0.0);
    }
    Ok(q.max(c / q))
}

fn arccos_checked(ratio: f64) -> Result<f64, BindingError> {
    if ratio.abs() <= 1.0 {
        Ok(ratio.acos())
    } else if ratio.abs() <= 1.0 + ARCCOS_SLACK {
        Ok(ratio.clamp(-1.0, 1.0).acos())
    } else {
        Err(BindingError::OutOfDomain {
            quantity: "arccos",
            argument: ratio,
        })
    }
}
