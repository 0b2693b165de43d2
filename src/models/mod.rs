//! Binding model implementations.
//!
//! Every model maps `(titrant concentration, Kd, scale)` to an anisotropy
//! signal through two steps: a bound probe fraction from mass balance, then a
//! quantum-yield-weighted blend of the free/bound reference signals. Constants
//! are captured at construction and never change afterwards.

pub mod competitive;
pub mod direct;
pub mod signal;

pub use competitive::*;
pub use direct::*;
pub use signal::*;

use crate::domain::{Assay, FitParams, ModelKind, SignalBounds};
use crate::error::BindingError;

/// A binding model the fit engine can evaluate.
pub trait BindingModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn blend(&self) -> &SignalBlend;

    /// Fraction of probe bound to the macromolecule, in `[0, 1]` for
    /// physical inputs.
    fn bound_fraction(&self, concentration: f64, kd: f64) -> Result<f64, BindingError>;

    /// Predicted signal `scale · S(FB)`.
    fn predict(&self, concentration: f64, params: &FitParams) -> Result<f64, BindingError> {
        let fb = self.bound_fraction(concentration, params.kd)?;
        let y = params.scale * self.blend().at(fb);
        if y.is_finite() {
            Ok(y)
        } else {
            Err(BindingError::OutOfDomain {
                quantity: "signal",
                argument: y,
            })
        }
    }

    /// Prediction for use inside an objective: any model failure becomes `penalty`,
    /// which yields a large residual the optimizer steers away from.
    fn predict_or_penalty(&self, concentration: f64, params: &FitParams, penalty: f64) -> f64 {
        self.predict(concentration, params).unwrap_or(penalty)
    }
}

/// Either supported model, selected at runtime from an [`Assay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyBinding {
    Direct(DirectBinding),
    Competitive(CompetitiveBinding),
}

impl AnyBinding {
    pub fn from_assay(assay: Assay, bounds: SignalBounds) -> Result<Self, BindingError> {
        Ok(match assay {
            Assay::Direct(a) => AnyBinding::Direct(DirectBinding::new(a, bounds)?),
            Assay::Competitive(a) => AnyBinding::Competitive(CompetitiveBinding::new(a, bounds)?),
        })
    }

    pub fn assay(&self) -> Assay {
        match self {
            AnyBinding::Direct(m) => Assay::Direct(*m.assay()),
            AnyBinding::Competitive(m) => Assay::Competitive(*m.assay()),
        }
    }

    fn inner(&self) -> &dyn BindingModel {
        match self {
            AnyBinding::Direct(m) => m,
            AnyBinding::Competitive(m) => m,
        }
    }
}

impl BindingModel for AnyBinding {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn blend(&self) -> &SignalBlend {
        self.inner().blend()
    }

    fn bound_fraction(&self, concentration: f64, kd: f64) -> Result<f64, BindingError> {
        self.inner().bound_fraction(concentration, kd)
    }
}
