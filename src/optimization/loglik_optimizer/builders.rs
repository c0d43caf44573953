//! loglik_optimizer::builders — L-BFGS solver construction.
//!
//! Purpose
//! -------
//! Turn an [`MLEOptions`] into a configured Argmin L-BFGS solver for either
//! line search, so that `api::maximize` never touches Argmin generics.
//!
//! Conventions
//! -----------
//! - Builders apply the history size and the gradient and cost tolerances.
//!   The starting point and the iteration cap are executor state and are set
//!   in `run::run_lbfgs`.
//! - Argmin configuration errors are converted into [`OptError`] through the
//!   crate's `From` impl.
//!
//! [`OptError`]: crate::optimization::errors::OptError
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};

/// L-BFGS with a Hager–Zhang line search.
///
/// # Errors
/// Any tolerance Argmin refuses.
pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let solver = LbfgsHagerZhang::new(HagerZhangLS::new(), history_size(opts));
    configure_lbfgs(solver, opts)
}

/// L-BFGS with a More–Thuente line search.
///
/// # Errors
/// Any tolerance Argmin refuses.
pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let solver = LbfgsMoreThuente::new(MoreThuenteLS::new(), history_size(opts));
    configure_lbfgs(solver, opts)
}

/// Apply whichever of `tol_grad` / `tol_cost` is set; unset tolerances keep
/// Argmin's defaults.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(tol) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(tol)?;
    }
    if let Some(tol) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(tol)?;
    }
    Ok(solver)
}

fn history_size(opts: &MLEOptions) -> usize {
    opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, Tolerances};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction for both line searches with default and explicit memory.
    // - Tolerance wiring with and without tolerances set.
    //
    // They intentionally DO NOT cover:
    // - Running the solver; see `api`.
    // -------------------------------------------------------------------------

    fn options(
        tol_grad: Option<f64>, tol_cost: Option<f64>, searcher: LineSearcher, mem: Option<usize>,
    ) -> MLEOptions {
        let tols = Tolerances::new(tol_grad, tol_cost, Some(50)).expect("valid tolerances");
        MLEOptions::new(tols, searcher, false, mem).expect("valid options")
    }

    #[test]
    // Purpose
    // -------
    // The history size falls back to the crate default.
    //
    // Given
    // -----
    // - `lbfgs_mem = None` and `Some(11)`.
    //
    // Expect
    // ------
    // - `DEFAULT_LBFGS_MEM` and 11.
    fn history_size_defaults_when_unset() {
        // Arrange
        let unset = options(Some(1e-6), None, LineSearcher::MoreThuente, None);
        let set = options(Some(1e-6), None, LineSearcher::MoreThuente, Some(11));

        // Act / Assert
        assert_eq!(history_size(&unset), DEFAULT_LBFGS_MEM);
        assert_eq!(history_size(&set), 11);
    }

    #[test]
    // Purpose
    // -------
    // Both builders accept the tolerances a Hawkes fit typically uses.
    //
    // Given
    // -----
    // - tol_grad = 1e-6, tol_cost = 1e-9, for each line search.
    //
    // Expect
    // ------
    // - Both builders return `Ok`.
    fn builders_accept_valid_tolerances() {
        // Arrange
        let hz = options(Some(1e-6), Some(1e-9), LineSearcher::HagerZhang, Some(5));
        let mt = options(Some(1e-6), Some(1e-9), LineSearcher::MoreThuente, None);

        // Act / Assert
        assert!(build_optimizer_hager_zhang(&hz).is_ok());
        assert!(build_optimizer_more_thuente(&mt).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // An iteration cap alone is a complete configuration.
    //
    // Given
    // -----
    // - No gradient or cost tolerance.
    //
    // Expect
    // ------
    // - `configure_lbfgs` returns `Ok`.
    fn configure_without_tolerances_keeps_defaults() {
        // Arrange
        let opts = options(None, None, LineSearcher::MoreThuente, None);
        let raw = LbfgsMoreThuente::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);

        // Act / Assert
        assert!(configure_lbfgs(raw, &opts).is_ok());
    }
}
