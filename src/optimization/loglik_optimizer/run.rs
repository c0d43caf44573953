//! loglik_optimizer::run — drive an Argmin executor to an [`OptimOutcome`].
//!
//! The runner seeds the executor with θ₀, applies the iteration cap, runs
//! the solver, and converts the final state back to the maximization
//! orientation (`value = -best_cost`). With `opts.verbose` it logs ℓ(θ₀) and
//! ‖∇ℓ(θ₀)‖ at debug level before the first step and a summary at the end;
//! the `obs_slog` feature additionally attaches Argmin's slog observer.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter,
    },
};
use argmin::core::{CostFunction, Executor, Gradient, IterState, Solver, State};
use argmin_math::ArgminL2Norm;
use tracing::{debug, warn};

/// Run `solver` on `problem` from `theta0`.
///
/// # Errors
/// - Argmin failures (including errors raised by the model) as `OptError`.
/// - [`OptimOutcome::new`] errors for a missing or non-finite result.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    if opts.verbose {
        log_initial_state(&theta0, &problem);
    }

    let mut executor = Executor::new(problem, solver).configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        executor = executor.configure(|state| state.max_iters(max_iter as u64));
    }
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        executor = executor.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let termination = state.get_termination_status().clone();
    let grad = state.take_gradient();
    let outcome = OptimOutcome::new(
        state.take_best_param(),
        -state.get_best_cost(),
        termination,
        iterations,
        fn_evals,
        grad,
    )?;
    if opts.verbose {
        debug!(
            loglik = outcome.value,
            iterations = outcome.iterations,
            status = %outcome.status,
            grad_norm = ?outcome.grad_norm,
            "l-bfgs finished"
        );
    }
    Ok(outcome)
}

fn log_initial_state<F: LogLikelihood>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) {
    match problem.cost(theta0) {
        Ok(cost) => {
            let grad_norm = problem.gradient(theta0).ok().map(|g| g.l2_norm());
            debug!(loglik = -cost, grad_norm = ?grad_norm, n_params = theta0.len(), "l-bfgs start");
        }
        Err(err) => warn!(error = %err, "log-likelihood not finite at the starting point"),
    }
}
