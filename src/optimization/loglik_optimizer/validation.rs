//! loglik_optimizer::validation — guards around solver inputs and outputs.
//!
//! Tolerances are checked when options are built; gradients are checked on
//! every evaluation before they reach Argmin; θ̂ and ℓ(θ̂) are checked once
//! the executor returns. Each guard reports the first offending value.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta},
};

/// Accept `None`, or a finite tolerance strictly above zero.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] otherwise.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

/// Same rule as [`verify_tol_grad`] for the cost-change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`].
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

/// Check that a gradient has length `dim` and only finite entries.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] on a length mismatch.
/// - [`OptError::InvalidGradient`] for the first non-finite entry.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "Gradient elements must be finite.",
        }),
        None => Ok(()),
    }
}

/// Unwrap the executor's best parameter, rejecting a missing or non-finite θ̂.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] when Argmin recorded no best parameter.
/// - [`OptError::InvalidThetaHat`] for the first non-finite entry.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some(index) = theta.iter().position(|v| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value: theta[index],
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(theta)
}

/// A log-likelihood may be any finite number, negative included.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] for `NaN` or `±∞`.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Acceptance and rejection rules of each guard.
    // - Reporting of the first offending index.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Tolerance guards accept `None` and positive values only.
    //
    // Given
    // -----
    // - None, 1e-6, 0.0, -1.0, NaN.
    //
    // Expect
    // ------
    // - Ok, Ok, then `InvalidTolGrad` / `InvalidTolCost` for the rest.
    fn tolerance_guards_reject_non_positive_and_non_finite() {
        // Arrange / Act / Assert
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_cost(Some(1e-6)).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(verify_tol_cost(Some(-1.0)), Err(OptError::InvalidTolCost { .. })));
        assert!(matches!(verify_tol_grad(Some(f64::NAN)), Err(OptError::InvalidTolGrad { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Gradient and θ̂ guards point at the first bad entry.
    //
    // Given
    // -----
    // - A length-3 gradient checked against dim 2.
    // - Vectors with a non-finite entry at index 1.
    //
    // Expect
    // ------
    // - `GradientDimMismatch`, `InvalidGradient { index: 1 }`,
    //   `InvalidThetaHat { index: 1 }`, and `MissingThetaHat` for `None`.
    fn vector_guards_report_first_offender() {
        // Arrange
        let short = array![0.1, 0.2, 0.3];
        let bad = array![0.1, f64::INFINITY, f64::NAN];

        // Act / Assert
        assert!(matches!(
            validate_grad(&short, 2),
            Err(OptError::GradientDimMismatch { expected: 2, found: 3 })
        ));
        assert!(matches!(validate_grad(&bad, 3), Err(OptError::InvalidGradient { index: 1, .. })));
        assert!(matches!(
            validate_theta_hat(Some(bad.clone())),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert!(matches!(validate_theta_hat(None), Err(OptError::MissingThetaHat)));
        assert!(validate_value(-1234.5).is_ok());
        assert!(matches!(validate_value(f64::NEG_INFINITY), Err(OptError::NonFiniteCost { .. })));
    }
}
