//! optimization — likelihood maximization and numerical helpers.
//!
//! Purpose
//! -------
//! Provide the fitting machinery used by `hawkes::models`: an Argmin-backed
//! L-BFGS maximizer for any [`LogLikelihood`], numerically stable parameter
//! transforms, and one error surface for both.
//!
//! Key behaviors
//! -------------
//! - `loglik_optimizer`: maximize ℓ(θ) with an analytic or finite-difference
//!   gradient and configurable stopping rules.
//! - `numerical_stability`: softplus and logistic maps between unconstrained
//!   θ and positive or unit-interval model parameters.
//! - `errors`: [`OptError`] and [`OptResult`], with conversions from Argmin
//!   and from the Hawkes error types.
//!
//! Invariants & assumptions
//! ------------------------
//! - Solvers work in unconstrained θ and report ℓ(θ̂), never the internal
//!   cost `-ℓ`.
//! - Domain violations raised by a model (a non-positive rate, a shape
//!   mismatch) travel as `OptError` values, not panics.
//!
//! Downstream usage
//! ----------------
//! - Model code implements [`LogLikelihood`] and calls
//!   [`maximize`](loglik_optimizer::maximize); see `hawkes::models`.
//!
//! [`LogLikelihood`]: loglik_optimizer::LogLikelihood
//! [`OptError`]: errors::OptError
//! [`OptResult`]: errors::OptResult

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use road_hawkes::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
