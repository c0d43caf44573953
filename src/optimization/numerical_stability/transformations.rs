//! Numerical stability utilities.
//!
//! Scalar transforms between the unconstrained optimizer space and the
//! positive or unit-interval parameters of the Hawkes models. Each guard
//! uses an explicit cutoff (`x > 20.0`) so `f64` arithmetic never overflows
//! in `exp`.
//!
//! # Provided items
//! - [`safe_softplus`]: `ln(1 + exp(x))`, mapping ℝ → (0, ∞).
//! - [`safe_softplus_inv`]: exact inverse of softplus on (0, ∞).
//! - [`shifted_softplus_inv`]: `ln(expm1(x) + 1e-6)`, the starting-value
//!   map used by every fit. The shift keeps `x ≈ 0` starts finite.
//! - [`safe_logistic`]: `1 / (1 + exp(-x))`, which is also the derivative of
//!   softplus and therefore the chain-rule factor for analytic gradients.

/// Shift applied inside [`shifted_softplus_inv`].
pub const SOFTPLUS_INV_SHIFT: f64 = 1e-6;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For `x > 20`, returns `x` (the correction `ln1p(exp(-x))` is below
///   `f64` resolution relative to `x`).
/// - Otherwise evaluates `ln1p(exp(x))`, which is accurate for large
///   negative `x`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: `t = ln(exp(x) - 1)`.
///
/// `x` must be finite and `> 0`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Starting-value map `θ = ln(expm1(x) + 1e-6)`.
///
/// Finite for every `x >= 0`, including `x = 0`, where it returns
/// `ln(1e-6)`.
pub fn shifted_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { (x.exp_m1() + SOFTPLUS_INV_SHIFT).ln() }
}

/// Numerically stable logistic `σ(x) = 1 / (1 + exp(-x))`.
///
/// Branches on the sign of `x` so `exp` only sees non-positive arguments.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement with naïve formulas on a safe grid.
    // - Inverse relationships and tail behavior.
    // - Logistic as the derivative of softplus.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Softplus and its inverse agree with naïve formulas and invert each other.
    //
    // Given
    // -----
    // - x in {-5, -1, 0, 0.5, 3, 10}.
    //
    // Expect
    // ------
    // - softplus(x) == ln(1 + e^x) and softplus_inv(softplus(x)) == x.
    fn softplus_round_trips_on_safe_grid() {
        // Arrange
        let grid = [-5.0, -1.0, 0.0, 0.5, 3.0, 10.0];

        for &x in &grid {
            // Act
            let sp = safe_softplus(x);

            // Assert
            assert_relative_eq!(sp, (1.0 + f64::exp(x)).ln(), epsilon = 1e-12);
            assert_relative_eq!(safe_softplus_inv(sp), x, epsilon = 1e-9);
        }
    }

    #[test]
    // Purpose
    // -------
    // The shifted inverse is finite at zero and close to the exact inverse
    // away from zero.
    //
    // Given
    // -----
    // - x = 0 and x = 2.
    //
    // Expect
    // ------
    // - ln(1e-6) at zero; within 1e-6 of `safe_softplus_inv(2)`.
    fn shifted_inverse_is_finite_at_zero() {
        // Arrange / Act
        let at_zero = shifted_softplus_inv(0.0);
        let at_two = shifted_softplus_inv(2.0);

        // Assert
        assert_relative_eq!(at_zero, SOFTPLUS_INV_SHIFT.ln(), epsilon = 1e-12);
        assert!((at_two - safe_softplus_inv(2.0)).abs() < 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // The logistic matches the central difference of softplus and saturates
    // without NaNs.
    //
    // Given
    // -----
    // - x in {-3, 0, 2}; extreme inputs ±800.
    //
    // Expect
    // ------
    // - Agreement to 1e-6; σ(800) = 1, σ(-800) = 0.
    fn logistic_is_softplus_derivative() {
        // Arrange
        let h = 1e-6;

        for &x in &[-3.0, 0.0, 2.0] {
            // Act
            let fd = (safe_softplus(x + h) - safe_softplus(x - h)) / (2.0 * h);

            // Assert
            assert_relative_eq!(safe_logistic(x), fd, epsilon = 1e-6);
        }
        assert_eq!(safe_logistic(800.0), 1.0);
        assert_eq!(safe_logistic(-800.0), 0.0);
    }
}
