//! Direct binding: probe `P` held constant, macromolecule `M` titrated.
//!
//! Mass balance for `P + M ⇌ PM` gives a quadratic in the bound probe.
//! The physically meaningful root is evaluated in the cancellation-free form
//!
//! ```text
//! b  = Kd + [M] + Pt
//! FB = 2·[M] / (b + sqrt(b² − 4·[M]·Pt))
//! ```
//!
//! which is algebraically equal to `(b − sqrt(b² − 4·[M]·Pt)) / (2·Pt)`.

use crate::domain::{DirectAssay, ModelKind, SignalBounds};
use crate::error::BindingError;
use crate::models::{BindingModel, SignalBlend};

/// Direct-binding model with its constants captured at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectBinding {
    assay: DirectAssay,
    blend: SignalBlend,
}

impl DirectBinding {
    pub fn new(assay: DirectAssay, bounds: SignalBounds) -> Result<Self, BindingError> {
        assay.validate()?;
        let bounds = SignalBounds::new(bounds.free, bounds.bound)?;
        Ok(Self {
            assay,
            blend: SignalBlend::new(bounds, assay.quantum_yield),
        })
    }

    pub fn assay(&self) -> &DirectAssay {
        &self.assay
    }
}

impl BindingModel for DirectBinding {
    fn kind(&self) -> ModelKind {
        ModelKind::Direct
    }

    fn blend(&self) -> &SignalBlend {
        &self.blend
    }

    fn bound_fraction(&self, concentration: f64, kd: f64) -> Result<f64, BindingError> {
        let pt = self.assay.probe_total;
        let b = kd + concentration + pt;
        let disc = b * b - 4.0 * concentration * pt;
        // `!(x >= 0)` also catches NaN.
        if !(disc >= 0.0) {
            return Err(BindingError::invalid(format!(
                "negative discriminant {disc:e} at [M]={concentration}, Kd={kd}"
            )));
        }
        let denom = b + disc.sqrt();
        if !(denom > 0.0) {
            return Err(BindingError::invalid(format!(
                "non-physical binding quadratic at [M]={concentration}, Kd={kd}"
            )));
        }
        Ok(2.0 * concentration / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitParams;
    use proptest::prelude::*;

    fn model(probe_total: f64, quantum_yield: f64) -> DirectBinding {
        DirectBinding::new(
            DirectAssay {
                probe_total,
                quantum_yield,
            },
            SignalBounds { free: 20.0, bound: 200.0 },
        )
        .unwrap()
    }

    #[test]
    fn no_macromolecule_means_nothing_bound() {
        let m = model(0.01, 1.0);
        assert_eq!(m.bound_fraction(0.0, 1.0).unwrap(), 0.0);
        let y = m.predict(0.0, &FitParams::new(1.0, 1.0)).unwrap();
        assert!((y - 20.0).abs() < 1e-12);
    }

    #[test]
    fn half_bound_at_kd_when_probe_is_trace() {
        // With Pt << Kd, FB ≈ [M] / (Kd + [M]).
        let m = model(1e-6, 1.0);
        let fb = m.bound_fraction(2.0, 2.0).unwrap();
        assert!((fb - 0.5).abs() < 1e-6);
    }

    #[test]
    fn matches_textbook_root() {
        let m = model(0.5, 1.0);
        let (c, kd) = (0.8, 0.3);
        let b = kd + c + 0.5;
        let textbook = (b - (b * b - 4.0 * c * 0.5_f64).sqrt()) / (2.0 * 0.5);
        assert!((m.bound_fraction(c, kd).unwrap() - textbook).abs() < 1e-12);
    }

    #[test]
    fn negative_discriminant_is_invalid_input() {
        // b = -1.5 + 1 + 1 = 0.5, disc = 0.25 - 4 < 0
        let m = model(1.0, 1.0);
        let err = m.bound_fraction(1.0, -1.5).unwrap_err();
        assert!(matches!(err, BindingError::InvalidModelInput(_)));
        assert_eq!(m.predict_or_penalty(1.0, &FitParams::new(-1.5, 1.0), 1e6), 1e6);
    }

    #[test]
    fn rejects_non_positive_constants() {
        let bounds = SignalBounds { free: 1.0, bound: 2.0 };
        let err = DirectBinding::new(
            DirectAssay {
                probe_total: -0.01,
                quantum_yield: 1.0,
            },
            bounds,
        )
        .unwrap_err();
        assert!(matches!(err, BindingError::InvalidModelInput(_)));
    }

    proptest! {
        #[test]
        fn bound_fraction_stays_in_unit_interval(
            pt in 0.001f64..1.0,
            kd in 0.01f64..1000.0,
            c in 0.0f64..1.0e4,
        ) {
            let fb = model(pt, 1.0).bound_fraction(c, kd).unwrap();
            prop_assert!((0.0..=1.0).contains(&fb));
        }

        #[test]
        fn bound_fraction_increases_with_titrant(
            pt in 0.001f64..1.0,
            kd in 0.01f64..1000.0,
            c in 0.0f64..1.0e4,
        ) {
            let m = model(pt, 1.0);
            let lo = m.bound_fraction(c, kd).unwrap();
            let hi = m.bound_fraction(c * 1.5 + 0.01, kd).unwrap();
            prop_assert!(hi >= lo - 1e-12);
        }
    }
}
