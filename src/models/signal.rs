//! Observed signal as a quantum-yield-weighted blend of free and bound states.

use crate::domain::SignalBounds;

/// Maps a bound fraction to an (unscaled) anisotropy signal.
///
/// ```text
/// S(FB) = (Q·FB·Ab + Af·(1 − FB)) / (1 − FB·(1 − Q))
/// ```
///
/// With `Q = 1` this reduces to a linear interpolation between `Af` and `Ab`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalBlend {
    bounds: SignalBounds,
    quantum_yield: f64,
}

impl SignalBlend {
    pub(crate) fn new(bounds: SignalBounds, quantum_yield: f64) -> Self {
        Self {
            bounds,
            quantum_yield,
        }
    }

    pub fn bounds(&self) -> SignalBounds {
        self.bounds
    }

    pub fn quantum_yield(&self) -> f64 {
        self.quantum_yield
    }

    /// Signal at bound fraction `fb`. May be non-finite for non-physical `fb`.
    pub fn at(&self, fb: f64) -> f64 {
        let q = self.quantum_yield;
        let SignalBounds { free, bound } = self.bounds;
        (q * fb * bound + free * (1.0 - fb)) / (1.0 - fb * (1.0 - q))
    }
}
