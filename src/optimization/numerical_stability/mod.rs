//! numerical_stability — overflow-safe parameter transforms.
//!
//! Purpose
//! -------
//! Collect the scalar transforms that map unconstrained optimizer
//! coordinates onto positive rates, decays, dispersions, and detection
//! probabilities, so the model layer can assume well-conditioned `f64`
//! arithmetic.
//!
//! Key behaviors
//! -------------
//! - `safe_softplus` / `safe_softplus_inv` map ℝ ↔ (0, ∞) without
//!   overflow.
//! - `shifted_softplus_inv` is the starting-value map shared by all fits.
//! - `safe_logistic` maps ℝ → (0, 1) and doubles as the softplus
//!   derivative in analytic gradients.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite; domain checks live in the model layer.
//!
//! Conventions
//! -----------
//! - Pure functions, no logging or I/O; safe inside tight loops.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    SOFTPLUS_INV_SHIFT, safe_logistic, safe_softplus, safe_softplus_inv, shifted_softplus_inv,
};

pub mod prelude {
    pub use super::transformations::{
        safe_logistic, safe_softplus, safe_softplus_inv, shifted_softplus_inv,
    };
}
