//! Unified error surface for the log-likelihood optimizer.
//!
//! [`OptError`] collects configuration mistakes (tolerances, line search,
//! L-BFGS memory), numerical failures in the objective or gradient, wrapped
//! argmin backend errors, and model-side failures raised while a Hawkes
//! log-likelihood is evaluated inside the solver loop.
use argmin::core::{ArgminError, Error};

use crate::hawkes::errors::{HawkesError, ParamError};

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Signals that the adapter should fall back to finite differences.
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite.
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad { tol: f64, reason: &'static str },

    /// Cost change tolerance needs to be positive and finite.
    InvalidTolCost { tol: f64, reason: &'static str },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// At least one tolerance must be provided.
    NoTolerancesProvided,

    /// Invalid line searcher name.
    InvalidLineSearch { name: String, reason: &'static str },

    /// lbfgs_mem needs to be at least 1.
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Cost function ----
    /// Cost function returned a non-finite value.
    NonFiniteCost { value: f64 },

    // ---- Optimizer outcome ----
    /// Estimated parameters must be finite.
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    /// Theta hat is missing.
    MissingThetaHat,

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter { text: String },
    /// Wrapper for argmin::NotImplemented
    NotImplemented { text: String },
    /// Wrapper for argmin::NotInitialized
    NotInitialized { text: String },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated { text: String },
    /// Wrapper for argmin::CheckPointNotFound
    CheckPointNotFound { text: String },
    /// Wrapper for argmin::PotentialBug
    PotentialBug { text: String },
    /// Wrapper for argmin::ImpossibleError
    ImpossibleError { text: String },
    /// Wrapper for other argmin::Error types
    BackendError { text: String },

    // ---- Hawkes parameter errors ----
    /// Unconstrained vector length does not match the fit layout.
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Unconstrained optimization input must have finite values.
    InvalidThetaInput { index: usize, value: f64 },

    /// Excitation scale produced by the transform is invalid.
    InvalidAlpha { value: f64 },

    /// Decay produced by the transform is invalid.
    InvalidBeta { value: f64 },

    /// Baseline rate produced by the transform is invalid.
    InvalidMu { index: usize, value: f64 },

    /// NB2 dispersion produced by the transform is invalid.
    InvalidDispersion { value: f64 },

    // ---- Hawkes model errors ----
    /// Any other model-side failure, carried as its rendered message.
    InvalidModelInput { text: String },

    // ---- Fallback ----
    UnknownError,
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientNotImplemented => {
                write!(f, "Gradient optimization not implemented")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- MLEOptions ----
            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidTolCost { tol, reason } => {
                write!(f, "Invalid cost function change tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::NoTolerancesProvided => {
                write!(f, "No tolerances provided")
            }
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidLBFGSMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }

            // ---- Cost function ----
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite cost value: {value}")
            }

            // ---- Optimizer outcome ----
            OptError::InvalidThetaHat { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            OptError::MissingThetaHat => {
                write!(f, "Missing estimated parameters (theta hat)")
            }

            // ---- Argmin ----
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::CheckPointNotFound { text } => {
                write!(f, "Checkpoint not found: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::ImpossibleError { text } => {
                write!(f, "Impossible error: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }

            // ---- Hawkes parameter errors ----
            OptError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, actual {actual}")
            }
            OptError::InvalidThetaInput { index, value } => {
                write!(f, "Invalid theta input at index {index}: {value}, must be finite")
            }
            OptError::InvalidAlpha { value } => {
                write!(f, "Invalid alpha: {value}, must be finite and non-negative")
            }
            OptError::InvalidBeta { value } => {
                write!(f, "Invalid beta: {value}, must be finite and > 0")
            }
            OptError::InvalidMu { index, value } => {
                write!(f, "Invalid mu at index {index}: {value}, must be finite and non-negative")
            }
            OptError::InvalidDispersion { value } => {
                write!(f, "Invalid dispersion: {value}, must be finite and > 0")
            }

            // ---- Hawkes model errors ----
            OptError::InvalidModelInput { text } => {
                write!(f, "Invalid model input: {text}")
            }

            // ---- Fallback ----
            OptError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        match original_err.downcast() {
            Ok(opt_err) => match opt_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<ParamError> for OptError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::ThetaLengthMismatch { expected, actual } => {
                OptError::ThetaLengthMismatch { expected, actual }
            }
            ParamError::InvalidThetaInput { index, value } => {
                OptError::InvalidThetaInput { index, value }
            }
            ParamError::InvalidAlpha { value } => OptError::InvalidAlpha { value },
            ParamError::InvalidBeta { value } => OptError::InvalidBeta { value },
            ParamError::InvalidMu { index, value } => OptError::InvalidMu { index, value },
            ParamError::InvalidDispersion { value } => OptError::InvalidDispersion { value },
            other => OptError::InvalidModelInput { text: other.to_string() },
        }
    }
}

impl From<HawkesError> for OptError {
    fn from(err: HawkesError) -> Self {
        match err {
            HawkesError::Param(param_err) => param_err.into(),
            HawkesError::InvalidDecay { value, .. } => OptError::InvalidBeta { value },
            other => OptError::InvalidModelInput { text: other.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Conversions from Hawkes model/parameter errors into OptError.
    // - Downcasting of argmin errors.
    //
    // They intentionally DO NOT cover:
    // - Display texts for every variant.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that parameter errors nested inside `HawkesError::Param` map to
    // their dedicated `OptError` variants.
    //
    // Given
    // -----
    // - `HawkesError::Param(ParamError::InvalidAlpha { value: -1.0 })`.
    //
    // Expect
    // ------
    // - `OptError::InvalidAlpha { value: -1.0 }`.
    fn nested_param_error_maps_to_specific_variant() {
        // Arrange
        let err = HawkesError::Param(ParamError::InvalidAlpha { value: -1.0 });

        // Act
        let opt: OptError = err.into();

        // Assert
        assert_eq!(opt, OptError::InvalidAlpha { value: -1.0 });
    }

    #[test]
    // Purpose
    // -------
    // Ensure model errors without a dedicated variant keep their message.
    //
    // Given
    // -----
    // - `HawkesError::CellCountMismatch { expected: 3, found: 2 }`.
    //
    // Expect
    // ------
    // - `OptError::InvalidModelInput` whose text mentions the mismatch.
    fn generic_model_error_keeps_message() {
        // Arrange
        let err = HawkesError::CellCountMismatch { expected: 3, found: 2 };

        // Act
        let opt: OptError = err.into();

        // Assert
        match opt {
            OptError::InvalidModelInput { text } => assert!(text.contains("expected 3")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Check that argmin's own error kinds are unwrapped by downcast.
    //
    // Given
    // -----
    // - An `argmin::core::Error` built from `ArgminError::NotInitialized`.
    //
    // Expect
    // ------
    // - `OptError::NotInitialized` with the same text.
    fn argmin_error_is_downcast() {
        // Arrange
        let err: Error = ArgminError::NotInitialized { text: "no param".to_string() }.into();

        // Act
        let opt: OptError = err.into();

        // Assert
        assert_eq!(opt, OptError::NotInitialized { text: "no param".to_string() });
    }
}
