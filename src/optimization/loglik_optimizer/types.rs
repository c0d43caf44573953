//! loglik_optimizer::types — numeric aliases shared by the optimizer.
//!
//! Purpose
//! -------
//! Pin the parameter, gradient, and cost types used between Hawkes
//! likelihoods and Argmin so that every layer agrees on one representation.
//!
//! Conventions
//! -----------
//! - θ and ∇ℓ are dense `Array1<f64>`; the Hawkes layout `[μ.., α, β?, r?]`
//!   is a concern of the model, not of these aliases.
//! - Costs are `f64` and always refer to the *negated* log-likelihood once
//!   they reach Argmin.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::Array1;
use std::collections::HashMap;

/// Unconstrained parameter vector handed to the solver.
pub type Theta = Array1<f64>;

/// Gradient of the log-likelihood with respect to [`Theta`].
pub type Grad = Array1<f64>;

pub type Cost = f64;

/// Argmin function-evaluation counters keyed by counter name
/// (`"cost_count"`, `"gradient_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// History size used by L-BFGS when the caller leaves it unset.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
