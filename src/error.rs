//! Error types.
//!
//! Two layers:
//!
//! - [`BindingError`]: the model/fit taxonomy returned by the library core
//!   (`models`, `fit`). Callers can match on it.
//! - [`AppError`]: what the binary reports. It carries a process exit code:
//!   `2` bad input or configuration, `3` no usable data, `4` numerical/fit failure.

use thiserror::Error;

use crate::domain::FitParams;

/// Failures raised by the binding models and the fit engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// Non-physical or degenerate inputs (constants, data, initial guess).
    ///
    /// Raised before any fit is attempted.
    #[error("invalid model input: {0}")]
    InvalidModelInput(String),

    /// An intermediate square-root or arccos argument left its valid range.
    ///
    /// Recoverable inside the fit objective (replaced by a penalty).
    #[error("{quantity} argument {argument:e} is outside its valid domain")]
    OutOfDomain { quantity: &'static str, argument: f64 },

    /// The optimizer stopped without reaching a usable optimum.
    #[error(
        "fit did not converge after {iterations} iterations ({reason}); last iterate kd={:.6}, scale={:.6}",
        last.kd,
        last.scale
    )]
    FitDidNotConverge {
        reason: String,
        last: FitParams,
        iterations: usize,
    },
}

impl BindingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidModelInput(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<BindingError> for AppError {
    fn from(err: BindingError) -> Self {
        let exit_code = match err {
            BindingError::InvalidModelInput(_) => 2,
            BindingError::OutOfDomain { .. } | BindingError::FitDidNotConverge { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}
