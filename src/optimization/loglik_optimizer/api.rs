//! loglik_optimizer::api — the single entry point for maximum likelihood.
//!
//! Purpose
//! -------
//! [`maximize`] validates the starting point through
//! [`LogLikelihood::check`], wraps the model in the Argmin adapter, builds
//! the L-BFGS solver for the configured line search, and runs it.
//! [`maximize_tracked`] does the same while recording the best evaluated
//! point, so a caller can recover progress when the solver errors.
//!
//! Downstream usage
//! ----------------
//! - `RoadHawkesModel::fit_with_history` and the observation-parameter fit
//!   call this with their own `LogLikelihood` impls and keep the returned
//!   [`OptimOutcome`] on the model.
//!
//! Testing notes
//! -------------
//! - End-to-end solves of a Poisson log-rate likelihood with a known MLE,
//!   once per line search, with and without an analytic gradient.
//! - A likelihood that starts failing mid-solve, to check best-point
//!   recovery.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::{ArgMinAdapter, BestSoFar},
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize `f` over θ starting from `theta0`.
///
/// # Errors
/// - Whatever `f.check` rejects, before any solver work.
/// - Solver configuration or execution failures as `OptError`.
///
/// # Examples
/// ```ignore
/// use road_hawkes::optimization::loglik_optimizer::{maximize, MLEOptions};
///
/// let outcome = maximize(&model, theta0, &data, &MLEOptions::default())?;
/// println!("loglik = {}", outcome.value);
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    maximize_tracked(f, theta0, data, opts, &BestSoFar::new())
}

/// [`maximize`], offering every finite evaluation to `best`.
///
/// On `Err`, `best` still holds the highest ℓ(θ) the solver reached.
///
/// # Errors
/// As [`maximize`].
pub fn maximize_tracked<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions, best: &BestSoFar,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data).with_tracker(best);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            run_lbfgs(theta0, opts, problem, build_optimizer_more_thuente(opts)?)
        }
        LineSearcher::HagerZhang => {
            run_lbfgs(theta0, opts, problem, build_optimizer_hager_zhang(opts)?)
        }
    }
}
