//! Conditional-intensity recursion `λ(t) = μ + α · W h(t)`.
//!
//! Purpose
//! -------
//! Provide the single shared primitive used by simulation, likelihood
//! evaluation, and forecasting: given a history of counts (or mean-field
//! proxies), compute the intensity for the next step.
//!
//! Key behaviors
//! -------------
//! - [`IntensityModel::new`] validates `μ`, `α`, and the weight matrix shape
//!   once, so the per-step code does no re-validation.
//! - [`intensity_step`] computes `h(t)` with the truncated lag convolution,
//!   applies `W` through the model's [`NumericBackend`], and clips to `>= 0`.
//! - [`intensity_matrix`] runs the recursion over every in-sample step using
//!   `y[:, ..t]` as history; [`predict_intensity_one_step`] forecasts the step
//!   after a history of length `T`.
//! - [`excitation_step`] exposes the unscaled `W h(t)` term.
//!
//! Invariants & assumptions
//! ------------------------
//! - `μ.len() == N == W.rows == W.cols`; history rows must equal `N`.
//! - Outputs are finite and non-negative whenever inputs are.
//!
//! Conventions
//! -----------
//! - Histories are `(N, T)` float views; integer counts are converted once
//!   by the caller.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the `t = 0` baseline, a hand-computed two-cell case,
//!   the `α = 0` reduction to `μ`, and the validation errors.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};

use crate::hawkes::{
    core::{
        backend::NumericBackend,
        kernel::{TemporalKernel, convolved_history},
        params::{validate_alpha, validate_mu_for_cells},
        spatial::CsrMatrix,
    },
    errors::{HawkesError, HawkesResult},
};

/// Borrowed, validated inputs of the intensity recursion.
#[derive(Debug, Clone, Copy)]
pub struct IntensityModel<'a> {
    pub weights: &'a CsrMatrix,
    pub backend: &'a dyn NumericBackend,
    pub mu: ArrayView1<'a, f64>,
    pub alpha: f64,
    pub kernel: &'a TemporalKernel,
}

impl<'a> IntensityModel<'a> {
    /// # Errors
    /// - [`HawkesError::NonSquareMatrix`] if `weights` is not square.
    /// - [`HawkesError::Param`] if `mu` has the wrong length or a bad entry,
    ///   or if `alpha` is negative or non-finite.
    pub fn new(
        weights: &'a CsrMatrix, backend: &'a dyn NumericBackend, mu: ArrayView1<'a, f64>,
        alpha: f64, kernel: &'a TemporalKernel,
    ) -> HawkesResult<Self> {
        if weights.rows != weights.cols {
            return Err(HawkesError::NonSquareMatrix { rows: weights.rows, cols: weights.cols });
        }
        validate_mu_for_cells(mu, weights.rows)?;
        validate_alpha(alpha)?;
        Ok(Self { weights, backend, mu, alpha, kernel })
    }

    pub fn n_cells(&self) -> usize {
        self.weights.rows
    }

    fn ensure_history(&self, history: ArrayView2<'_, f64>) -> HawkesResult<()> {
        if history.nrows() != self.n_cells() {
            return Err(HawkesError::CellCountMismatch {
                expected: self.n_cells(),
                found: history.nrows(),
            });
        }
        Ok(())
    }
}

/// `W h(t)` for the history `y[:, ..t]`.
pub fn excitation_step(
    model: &IntensityModel<'_>, history: ArrayView2<'_, f64>, t: usize,
) -> HawkesResult<Array1<f64>> {
    model.ensure_history(history)?;
    let h = convolved_history(history, model.kernel, t)?;
    model.backend.matvec(model.weights, h.view())
}

/// Intensity at step `t` given `history[:, ..t]`, clipped to `>= 0`.
pub fn intensity_step(
    model: &IntensityModel<'_>, history: ArrayView2<'_, f64>, t: usize,
) -> HawkesResult<Array1<f64>> {
    let mut lam = excitation_step(model, history, t)?;
    Zip::from(&mut lam).and(&model.mu).for_each(|l, &m| *l = (m + model.alpha * *l).max(0.0));
    Ok(lam)
}

/// In-sample intensities for every step of `y`.
///
/// Column `t` uses `y[:, ..t]` as history, so column 0 equals `μ`.
pub fn intensity_matrix(
    model: &IntensityModel<'_>, y: ArrayView2<'_, f64>,
) -> HawkesResult<Array2<f64>> {
    model.ensure_history(y)?;
    let n_steps = y.ncols();
    let mut out = Array2::zeros((model.n_cells(), n_steps));
    for t in 0..n_steps {
        let lam = intensity_step(model, y, t)?;
        out.column_mut(t).assign(&lam);
    }
    Ok(out)
}

/// Intensity for the step following a history of length `T`.
pub fn predict_intensity_one_step(
    model: &IntensityModel<'_>, y: ArrayView2<'_, f64>,
) -> HawkesResult<Array1<f64>> {
    intensity_step(model, y, y.ncols())
}
