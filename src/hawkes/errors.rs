//! Errors for road-constrained Hawkes models (count-series validation,
//! kernel and travel-time checks, simulation/forecast configuration, and
//! fitting failures).
//!
//! This module defines a model error type, [`HawkesError`], and a parameter
//! error type, [`ParamError`], used across the Rust core and (optionally) the
//! Python-facing API. Both implement `Display`/`Error`; with the
//! `python-bindings` feature they also convert to `PyErr`.
//!
//! ## Conventions
//! - **Indices are 0-based** (match Rust/NumPy). Count series are laid out as
//!   `(n_cells, n_steps)`.
//! - Travel times are in **seconds** and must be finite and non-negative.
//! - Every contract violation is reported at the point of first violation;
//!   nothing is silently clipped or coerced.
//! - Optimizer/backend errors are normalized to
//!   [`HawkesError::OptimizationFailed`] with a human-readable status.
#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};
use rand_distr::{BinomialError, GammaError, PoissonError};

use crate::optimization::errors::OptError;

/// Crate-wide result alias for Hawkes operations that may produce [`HawkesError`].
pub type HawkesResult<T> = Result<T, HawkesError>;

/// Result alias for parameter-construction/validation paths that may produce
/// [`ParamError`].
pub type ParamResult<T> = Result<T, ParamError>;

/// Unified error type for road-constrained Hawkes modeling.
///
/// Covers input/data validation, temporal and spatial kernel checks,
/// simulation and forecast configuration, and estimation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum HawkesError {
    // ---- Input/data validation ----
    /// Count series has no cells.
    EmptySeries,

    /// Count series or history has the wrong number of cells.
    CellCountMismatch { expected: usize, found: usize },

    /// Two arrays that must agree elementwise have different shapes.
    ShapeMismatch { left: (usize, usize), right: (usize, usize) },

    /// Requested convolution time lies past the end of the history.
    TimeOutOfRange { t: usize, len: usize },

    /// Number of simulated/training steps is invalid.
    InvalidSteps { n_steps: usize, reason: &'static str },

    // ---- Temporal kernel ----
    /// Temporal kernel needs at least one lag.
    InvalidLagCount { n_lags: usize },

    /// Decay rates must be finite and > 0.
    InvalidDecay { param: &'static str, value: f64 },

    /// Temporal kernel weights must be finite and >= 0.
    InvalidKernelWeight { index: usize, value: f64 },

    // ---- Travel-time matrix / spatial kernel ----
    /// CSR travel-time matrix must be square.
    NonSquareMatrix { rows: usize, cols: usize },

    /// CSR arrays are structurally inconsistent.
    InvalidCsr { reason: &'static str },

    /// Stored travel times must be finite and >= 0.
    InvalidTravelTime { row: usize, col: usize, value: f64 },

    /// A pluggable spatial kernel produced unusable output.
    InvalidSpatialKernel { name: String, reason: String },

    /// Kernel length-scale must be finite and > 0.
    InvalidLengthscale { value: f64 },

    // ---- Simulation / forecasting ----
    /// Forecast horizon must be >= 1.
    InvalidHorizon { horizon: usize },

    /// Number of Monte-Carlo paths must be >= 1.
    InvalidPathCount { n_paths: usize },

    /// Quantile levels must lie in [0, 1].
    InvalidQuantile { value: f64 },

    /// Sampling distribution rejected its parameters.
    InvalidDistribution { text: String },

    // ---- Workflows ----
    /// Parameter-recovery harness needs at least one seed.
    EmptySeeds,

    /// Evaluation configuration is inconsistent.
    InvalidConfig { field: &'static str, reason: &'static str },

    /// JSON (de)serialization failed.
    Serialization { text: String },

    // ---- Estimation / optimizer ----
    /// Spatial decay is not identifiable when a custom spatial kernel is used.
    UnidentifiableBeta,

    /// Optimizer failed; include a human-readable status/reason.
    OptimizationFailed { status: String },

    /// Prediction requested before a successful fit.
    ModelNotFitted,

    /// Parameter validation failed.
    Param(ParamError),
}

impl std::error::Error for HawkesError {}

impl std::fmt::Display for HawkesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Input/data validation ----
            HawkesError::EmptySeries => {
                write!(f, "Count series must have at least one cell.")
            }
            HawkesError::CellCountMismatch { expected, found } => {
                write!(f, "Cell count mismatch: expected {expected}, found {found}")
            }
            HawkesError::ShapeMismatch { left, right } => {
                write!(f, "Arrays must have the same shape; got {left:?} and {right:?}")
            }
            HawkesError::TimeOutOfRange { t, len } => {
                write!(f, "Time index {t} exceeds history length {len}.")
            }
            HawkesError::InvalidSteps { n_steps, reason } => {
                write!(f, "Invalid number of steps {n_steps}: {reason}")
            }
            // ---- Temporal kernel ----
            HawkesError::InvalidLagCount { n_lags } => {
                write!(f, "n_lags must be positive; got {n_lags}")
            }
            HawkesError::InvalidDecay { param, value } => {
                write!(f, "{param} must be finite and positive; got {value}")
            }
            HawkesError::InvalidKernelWeight { index, value } => {
                write!(f, "Kernel weight at lag index {index} must be finite and >= 0; got {value}")
            }
            // ---- Travel-time matrix / spatial kernel ----
            HawkesError::NonSquareMatrix { rows, cols } => {
                write!(f, "Travel-time matrix must be square; got ({rows}, {cols})")
            }
            HawkesError::InvalidCsr { reason } => {
                write!(f, "Invalid CSR matrix: {reason}")
            }
            HawkesError::InvalidTravelTime { row, col, value } => {
                write!(f, "Travel time at ({row}, {col}) must be finite and >= 0; got {value}")
            }
            HawkesError::InvalidSpatialKernel { name, reason } => {
                write!(f, "Spatial kernel '{name}' is invalid: {reason}")
            }
            HawkesError::InvalidLengthscale { value } => {
                write!(f, "lengthscale must be finite and positive; got {value}")
            }
            // ---- Simulation / forecasting ----
            HawkesError::InvalidHorizon { horizon } => {
                write!(f, "horizon must be >= 1; got {horizon}")
            }
            HawkesError::InvalidPathCount { n_paths } => {
                write!(f, "n_paths must be >= 1; got {n_paths}")
            }
            HawkesError::InvalidQuantile { value } => {
                write!(f, "Quantile levels must lie in [0, 1]; got {value}")
            }
            HawkesError::InvalidDistribution { text } => {
                write!(f, "Sampling distribution rejected its parameters: {text}")
            }
            // ---- Workflows ----
            HawkesError::EmptySeeds => {
                write!(f, "seeds must be non-empty.")
            }
            HawkesError::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration field '{field}': {reason}")
            }
            HawkesError::Serialization { text } => {
                write!(f, "JSON serialization failed: {text}")
            }
            // ---- Estimation / optimizer ----
            HawkesError::UnidentifiableBeta => {
                write!(
                    f,
                    "Spatial decay beta cannot be fitted when a custom spatial kernel is used."
                )
            }
            HawkesError::OptimizationFailed { status } => {
                write!(f, "Optimizer failed with status: {status}")
            }
            HawkesError::ModelNotFitted => {
                write!(f, "Model must be fitted before prediction.")
            }
            HawkesError::Param(err) => {
                write!(f, "{err}")
            }
        }
    }
}

/// Errors specific to parameter construction and validation.
///
/// Typical causes include negative rates, out-of-range probabilities, and
/// length mismatches between the baseline vector and the substrate.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    /// Baseline vector length must match the number of cells.
    MuLengthMismatch { expected: usize, actual: usize },

    /// Baseline rates must be finite and >= 0.
    InvalidMu { index: usize, value: f64 },

    /// Excitation scale must be finite and >= 0.
    InvalidAlpha { value: f64 },

    /// Spatial decay must be finite and > 0.
    InvalidBeta { value: f64 },

    /// Detection probability must lie in (0, 1].
    InvalidPDetect { value: f64 },

    /// Clutter rate must be finite and >= 0.
    InvalidFalseRate { value: f64 },

    /// NB2 dispersion must be finite and > 0.
    InvalidDispersion { value: f64 },

    /// Unconstrained optimizer vector has the wrong length.
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Unconstrained optimization input must have finite values.
    InvalidThetaInput { index: usize, value: f64 },
}

impl std::error::Error for ParamError {}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::MuLengthMismatch { expected, actual } => {
                write!(f, "mu length mismatch: expected {expected} cells, got {actual}")
            }
            ParamError::InvalidMu { index, value } => {
                write!(f, "mu at index {index} must be finite and >= 0, got {value}")
            }
            ParamError::InvalidAlpha { value } => {
                write!(f, "alpha must be finite and non-negative, got {value}")
            }
            ParamError::InvalidBeta { value } => {
                write!(f, "beta must be finite and positive, got {value}")
            }
            ParamError::InvalidPDetect { value } => {
                write!(f, "p_detect must be in (0, 1], got {value}")
            }
            ParamError::InvalidFalseRate { value } => {
                write!(f, "false_rate must be finite and non-negative, got {value}")
            }
            ParamError::InvalidDispersion { value } => {
                write!(f, "dispersion must be finite and positive, got {value}")
            }
            ParamError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, got {actual}")
            }
            ParamError::InvalidThetaInput { index, value } => {
                write!(f, "Theta input at index {index} must be finite, got {value}")
            }
        }
    }
}

impl From<ParamError> for HawkesError {
    fn from(err: ParamError) -> HawkesError {
        HawkesError::Param(err)
    }
}

impl From<OptError> for HawkesError {
    fn from(err: OptError) -> HawkesError {
        match err {
            OptError::InvalidModelInput { text } => {
                HawkesError::OptimizationFailed { status: text }
            }
            other => HawkesError::OptimizationFailed { status: other.to_string() },
        }
    }
}

impl From<PoissonError> for HawkesError {
    fn from(err: PoissonError) -> HawkesError {
        HawkesError::InvalidDistribution { text: format!("Poisson: {err}") }
    }
}

impl From<BinomialError> for HawkesError {
    fn from(err: BinomialError) -> HawkesError {
        HawkesError::InvalidDistribution { text: format!("Binomial: {err}") }
    }
}

impl From<GammaError> for HawkesError {
    fn from(err: GammaError) -> HawkesError {
        HawkesError::InvalidDistribution { text: format!("Gamma: {err}") }
    }
}

impl From<serde_json::Error> for HawkesError {
    fn from(err: serde_json::Error) -> HawkesError {
        HawkesError::Serialization { text: err.to_string() }
    }
}

/// Convert a [`HawkesError`] into a Python `ValueError` with the error message.
///
/// This is used at the Rust↔Python boundary to surface domain errors cleanly.
#[cfg(feature = "python-bindings")]
impl From<HawkesError> for PyErr {
    fn from(err: HawkesError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Convert a [`ParamError`] into a Python `ValueError` with the error message.
#[cfg(feature = "python-bindings")]
impl From<ParamError> for PyErr {
    fn from(err: ParamError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Display messages carrying the keywords callers match on.
    // - Conversions from parameter and optimizer errors into HawkesError.
    //
    // They intentionally DO NOT cover:
    // - Python conversions (feature-gated and exercised from Python).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure spatial-kernel errors keep the caller-supplied reason verbatim
    // so keyword checks ("nonnegative", "same shape") work on messages.
    //
    // Given
    // -----
    // - An `InvalidSpatialKernel` error with a "nonnegative" reason.
    //
    // Expect
    // ------
    // - The rendered message contains both the kernel name and the reason.
    fn invalid_spatial_kernel_message_contains_reason() {
        // Arrange
        let err = HawkesError::InvalidSpatialKernel {
            name: "bad_kernel".to_string(),
            reason: "weights must be nonnegative".to_string(),
        };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("bad_kernel"));
        assert!(msg.contains("nonnegative"));
    }

    #[test]
    // Purpose
    // -------
    // Verify that `ParamError` values wrap into `HawkesError::Param` and
    // keep their message.
    //
    // Given
    // -----
    // - `ParamError::InvalidPDetect { value: 1.5 }`.
    //
    // Expect
    // ------
    // - Conversion yields `HawkesError::Param(..)` with the same Display text.
    fn param_error_wraps_into_hawkes_error() {
        // Arrange
        let param_err = ParamError::InvalidPDetect { value: 1.5 };
        let expected = param_err.to_string();

        // Act
        let err: HawkesError = param_err.clone().into();

        // Assert
        assert_eq!(err, HawkesError::Param(param_err));
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    // Purpose
    // -------
    // Check that optimizer errors surface as `OptimizationFailed`.
    //
    // Given
    // -----
    // - `OptError::MissingThetaHat`.
    //
    // Expect
    // ------
    // - `HawkesError::OptimizationFailed` whose status mentions theta hat.
    fn opt_error_maps_to_optimization_failed() {
        // Arrange
        let opt_err = OptError::MissingThetaHat;

        // Act
        let err: HawkesError = opt_err.into();

        // Assert
        match err {
            HawkesError::OptimizationFailed { status } => assert!(status.contains("theta hat")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
