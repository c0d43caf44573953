//! loglik_optimizer — L-BFGS maximum likelihood on top of Argmin.
//!
//! Purpose
//! -------
//! Maximize any model that implements [`LogLikelihood`] without exposing
//! Argmin to the modeling code. Hawkes fits supply ℓ(θ) (and optionally
//! ∇ℓ); this layer handles sign flips, numerical gradients, solver wiring,
//! and result validation.
//!
//! Key behaviors
//! -------------
//! - [`maximize`] is the entry point: check, adapt, build, run.
//!   [`maximize_tracked`] also records the best evaluated point.
//! - `adapter` negates ℓ for Argmin and falls back to central, then forward,
//!   finite differences when `grad` is not implemented.
//! - `builders` and `run` isolate Argmin's solver and executor types.
//! - `validation` guards tolerances, gradients, θ̂, and ℓ(θ̂).
//!
//! Invariants & assumptions
//! ------------------------
//! - θ is unconstrained. Models map it to positive or bounded parameters
//!   themselves (see `numerical_stability::transformations`).
//! - A returned [`OptimOutcome`] always has a finite θ̂ and ℓ(θ̂).
//!
//! Conventions
//! -----------
//! - All fallible calls return [`OptResult`].
//!
//! [`OptResult`]: crate::optimization::errors::OptResult

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::adapter::BestSoFar;
pub use self::api::{maximize, maximize_tracked};
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use road_hawkes::optimization::loglik_optimizer::prelude::*;
//
// to import the main optimizer surface in a single line.

pub mod prelude {
    pub use super::api::{maximize, maximize_tracked};
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
