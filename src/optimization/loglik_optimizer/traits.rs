//! loglik_optimizer::traits — the model contract and optimizer options.
//!
//! Purpose
//! -------
//! Define what a model must provide to be maximized ([`LogLikelihood`]),
//! how the solver is configured ([`MLEOptions`], [`Tolerances`],
//! [`LineSearcher`]), and what comes back ([`OptimOutcome`]).
//!
//! Key behaviors
//! -------------
//! - Models return ℓ(θ) in the natural "larger is better" orientation; the
//!   adapter negates it for Argmin.
//! - `grad` is optional. The default returns
//!   [`OptError::GradientNotImplemented`], which switches the adapter to
//!   finite differences. Hawkes fits use this for every variant except the
//!   latent Poisson one.
//! - Options validate at construction; a built [`MLEOptions`] is always
//!   usable by the builders.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least one stopping rule (gradient tolerance, cost tolerance, or
//!   iteration cap) is present in every [`Tolerances`].
//! - [`OptimOutcome::theta_hat`] is finite and `value` is ℓ(θ̂), not −ℓ.
//!
//! Conventions
//! -----------
//! - `converged` is `true` for any Argmin termination reason other than
//!   `NotTerminated`; hitting the iteration cap therefore counts as
//!   terminated, and `status` carries the reason for callers that care.
//!
//! Testing notes
//! -------------
//! - Option validation and outcome construction are tested here; end-to-end
//!   solves live in `api`.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// A log-likelihood over an unconstrained parameter vector.
///
/// `check` runs once before optimization and should reject shape or
/// finiteness problems in `theta` and `data`; `value` may assume they hold.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    /// Analytic ∇ℓ(θ). Leave unimplemented to fall back on finite differences.
    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search paired with L-BFGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(&['-', '_', ' '][..], "").as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Solver configuration for a single maximization.
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    /// Emit per-iteration progress (initial state through `tracing`, and the
    /// Argmin slog observer when `obs_slog` is enabled).
    pub verbose: bool,
    /// L-BFGS history size; `None` means [`DEFAULT_LBFGS_MEM`].
    ///
    /// [`DEFAULT_LBFGS_MEM`]: crate::optimization::loglik_optimizer::DEFAULT_LBFGS_MEM
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// # Errors
    /// [`OptError::InvalidLBFGSMem`] when `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    /// Gradient tolerance 1e-6, at most 300 iterations, More–Thuente.
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(300) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Stopping rules. Any subset may be set, but not none of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] when all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for a
    ///   non-finite or non-positive tolerance.
    /// - [`OptError::InvalidMaxIter`] for `max_iter == Some(0)`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_grad(tol_grad)?;
        verify_tol_cost(tol_cost)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result of a maximization, expressed in the model's orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    /// ℓ(θ̂).
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Assemble an outcome from raw executor state.
    ///
    /// # Errors
    /// - [`OptError::MissingThetaHat`] / [`OptError::InvalidThetaHat`] for a
    ///   missing or non-finite θ̂.
    /// - [`OptError::NonFiniteCost`] for a non-finite `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            reason => (true, format!("{reason:?}")),
        };
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use argmin::core::TerminationReason;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validation rules of `Tolerances` and `MLEOptions`.
    // - Parsing of `LineSearcher` names.
    // - Mapping of Argmin termination states into `OptimOutcome`.
    //
    // They intentionally DO NOT cover:
    // - Running the solver; see `api`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `Tolerances::new` enforces at least one rule and valid values.
    //
    // Given
    // -----
    // - All-`None`, a zero iteration cap, a negative gradient tolerance, and
    //   a valid cap-only configuration.
    //
    // Expect
    // ------
    // - `NoTolerancesProvided`, `InvalidMaxIter`, `InvalidTolGrad`, then `Ok`.
    fn tolerances_validate_inputs() {
        // Arrange / Act
        let none = Tolerances::new(None, None, None);
        let zero_cap = Tolerances::new(Some(1e-6), None, Some(0));
        let negative = Tolerances::new(Some(-1e-3), None, None);
        let cap_only = Tolerances::new(None, None, Some(50));

        // Assert
        assert!(matches!(none, Err(OptError::NoTolerancesProvided)));
        assert!(matches!(zero_cap, Err(OptError::InvalidMaxIter { .. })));
        assert!(matches!(negative, Err(OptError::InvalidTolGrad { .. })));
        assert_eq!(cap_only.expect("valid").max_iter, Some(50));
    }

    #[test]
    // Purpose
    // -------
    // Defaults are usable and a zero L-BFGS memory is rejected.
    //
    // Given
    // -----
    // - `MLEOptions::default()` and `MLEOptions::new(.., Some(0))`.
    //
    // Expect
    // ------
    // - Default has tol_grad 1e-6, 300 iterations, More–Thuente.
    // - Zero memory yields `InvalidLBFGSMem`.
    fn mle_options_default_and_memory_guard() {
        // Arrange
        let opts = MLEOptions::default();

        // Act
        let zero_mem = MLEOptions::new(opts.tols, LineSearcher::HagerZhang, false, Some(0));

        // Assert
        assert_eq!(opts.tols.tol_grad, Some(1e-6));
        assert_eq!(opts.tols.max_iter, Some(300));
        assert_eq!(opts.line_searcher, LineSearcher::MoreThuente);
        assert!(matches!(zero_mem, Err(OptError::InvalidLBFGSMem { mem: 0, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Line-search names parse case-insensitively with common separators.
    //
    // Given
    // -----
    // - "HagerZhang", "more_thuente", "bfgs".
    //
    // Expect
    // ------
    // - HagerZhang, MoreThuente, then `InvalidLineSearch`.
    fn line_searcher_parses_names() {
        // Arrange / Act / Assert
        assert_eq!("HagerZhang".parse::<LineSearcher>().ok(), Some(LineSearcher::HagerZhang));
        assert_eq!("more_thuente".parse::<LineSearcher>().ok(), Some(LineSearcher::MoreThuente));
        assert!(matches!(
            "bfgs".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Outcome construction maps termination status and gradient norm.
    //
    // Given
    // -----
    // - θ̂ = [0.5, -0.5], ℓ = -12.0, gradient [3, 4].
    // - Termination `SolverConverged`, then `NotTerminated`.
    //
    // Expect
    // ------
    // - `converged` true then false; grad_norm = 5.
    fn outcome_maps_termination_and_grad_norm() {
        // Arrange
        let theta = array![0.5, -0.5];
        let grad = array![3.0, 4.0];

        // Act
        let done = OptimOutcome::new(
            Some(theta.clone()),
            -12.0,
            TerminationStatus::Terminated(TerminationReason::SolverConverged),
            17,
            FnEvalMap::new(),
            Some(grad),
        )
        .expect("valid outcome");
        let running = OptimOutcome::new(
            Some(theta),
            -12.0,
            TerminationStatus::NotTerminated,
            3,
            FnEvalMap::new(),
            None,
        )
        .expect("valid outcome");

        // Assert
        assert!(done.converged);
        assert_eq!(done.iterations, 17);
        assert_relative_eq!(done.grad_norm.expect("norm"), 5.0, epsilon = 1e-12);
        assert!(!running.converged);
        assert_eq!(running.status, "Not terminated");
        assert!(running.grad_norm.is_none());
    }
}
