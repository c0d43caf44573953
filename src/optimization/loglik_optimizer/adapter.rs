//! loglik_optimizer::adapter — bridge from [`LogLikelihood`] to Argmin.
//!
//! Purpose
//! -------
//! Argmin minimizes; Hawkes models report ℓ(θ) to be maximized. The adapter
//! negates both cost and gradient and supplies a numerical gradient when the
//! model has no analytic one.
//!
//! Key behaviors
//! -------------
//! - `cost(θ) = -ℓ(θ)`; a non-finite ℓ is an error rather than a cost of
//!   `±∞`, so line searches see a failure instead of silently stepping into
//!   an invalid region.
//! - `gradient(θ)`: the analytic ∇ℓ when provided, otherwise central
//!   differences; if central differences touch an invalid point or produce a
//!   non-finite entry, forward differences are tried once.
//! - With a [`BestSoFar`] attached, every finite cost evaluation offers its
//!   point to the tracker, so the best θ survives a solver error.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every gradient handed to Argmin has length `θ.len()` and finite entries.
//! - Errors raised inside the finite-difference closure are captured and
//!   returned; the closure itself reports `NaN` so `finitediff` can finish.
//!
//! Testing notes
//! -------------
//! - Tests use a one-parameter Poisson log-rate likelihood whose gradient is
//!   known in closed form.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Highest finite ℓ(θ) seen during a solve, with its θ.
#[derive(Debug, Default)]
pub struct BestSoFar {
    inner: RefCell<Option<(Theta, f64)>>,
}

impl BestSoFar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `(theta, loglik)` if it beats the current best.
    pub fn offer(&self, theta: &Theta, loglik: f64) {
        let mut inner = self.inner.borrow_mut();
        match inner.as_ref() {
            Some((_, best)) if *best >= loglik => {}
            _ => *inner = Some((theta.clone(), loglik)),
        }
    }

    pub fn into_inner(self) -> Option<(Theta, f64)> {
        self.inner.into_inner()
    }
}

/// Borrowed `(model, data)` pair presented to Argmin as a minimization problem.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
    best: Option<&'a BestSoFar>,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data, best: None }
    }

    /// Record the best evaluated point in `best`.
    pub fn with_tracker(mut self, best: &'a BestSoFar) -> Self {
        self.best = Some(best);
        self
    }

    /// Finite-difference gradient of the negated log-likelihood.
    fn numerical_gradient(&self, theta: &Theta) -> Result<Grad, Error> {
        let failure: RefCell<Option<Error>> = RefCell::new(None);
        let neg_loglik = |t: &Theta| -> f64 {
            self.cost(t).unwrap_or_else(|err| {
                failure.borrow_mut().get_or_insert(err);
                f64::NAN
            })
        };

        let central = theta.central_diff(&neg_loglik);
        if failure.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
            return Ok(central);
        }

        // Central steps can cross a boundary the forward step does not.
        failure.replace(None);
        let forward = theta.forward_diff(&neg_loglik);
        if let Some(err) = failure.take() {
            return Err(err);
        }
        validate_grad(&forward, theta.len())?;
        Ok(forward)
    }
}

impl<F: LogLikelihood> CostFunction for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let loglik = self.f.value(theta, self.data)?;
        if !loglik.is_finite() {
            return Err(OptError::NonFiniteCost { value: loglik }.into());
        }
        if let Some(best) = self.best {
            best.offer(theta, loglik);
        }
        Ok(-loglik)
    }
}

impl<F: LogLikelihood> Gradient for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => self.numerical_gradient(theta),
            Err(err) => Err(err.into()),
        }
    }
}
