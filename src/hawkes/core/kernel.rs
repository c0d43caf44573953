//! Discrete temporal lag kernel and truncated history convolution.
//!
//! Purpose
//! -------
//! Hold the lag weights `k[0..L)` that turn past counts into the excitation
//! history `h(t)` driving the Hawkes intensity, and compute that history for
//! any time index of a count series.
//!
//! Key behaviors
//! -------------
//! - [`TemporalKernel::new`] validates arbitrary weights (non-empty, finite,
//!   non-negative).
//! - [`discrete_exponential_kernel`] builds `exp(-beta * (l - 1))` for
//!   `l = 1..=L`, optionally normalized to unit mass.
//! - [`convolved_history`] evaluates
//!   `h(t)[i] = Σ_{l=1..min(L, t)} k[l-1] · y[i, t-l]`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Weight index `0` multiplies lag 1 (the most recent step).
//! - Early in a series (`t < L`) only the available lags are used; the window
//!   is shortened, never zero-padded.
//! - `t = 0` yields an all-zero history.
//!
//! Conventions
//! -----------
//! - Count series are `(n_cells, n_steps)` and may be passed as `f64` views
//!   so the same routine serves observed counts and mean-field proxies.
//!
//! Downstream usage
//! ----------------
//! - `core::intensity` calls [`convolved_history`] once per time step.
//! - The temporal-decay fit variant rebuilds the kernel from a candidate
//!   decay on every likelihood evaluation.
//!
//! Testing notes
//! -------------
//! - Unit tests cover kernel validation, normalization, the early-window
//!   truncation, and the `t = 0` edge case.
use ndarray::{Array1, ArrayView1, ArrayView2, s};

use crate::hawkes::errors::{HawkesError, HawkesResult};

/// Validated lag weights for lags `1..=L`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalKernel {
    weights: Array1<f64>,
}

impl TemporalKernel {
    /// Build a kernel from raw weights.
    ///
    /// # Errors
    /// - [`HawkesError::InvalidLagCount`] if `weights` is empty.
    /// - [`HawkesError::InvalidKernelWeight`] for the first non-finite or
    ///   negative weight.
    pub fn new(weights: Array1<f64>) -> HawkesResult<Self> {
        if weights.is_empty() {
            return Err(HawkesError::InvalidLagCount { n_lags: 0 });
        }
        for (index, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(HawkesError::InvalidKernelWeight { index, value });
            }
        }
        Ok(Self { weights })
    }

    /// Number of lags `L`.
    pub fn n_lags(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }
}

/// Exponentially decaying lag kernel `k[l-1] = exp(-beta * (l - 1))`.
///
/// When `normalize` is set the weights are divided by their sum so the kernel
/// has unit mass.
///
/// # Errors
/// - [`HawkesError::InvalidLagCount`] if `n_lags == 0`.
/// - [`HawkesError::InvalidDecay`] if `beta` is non-finite or `<= 0`.
pub fn discrete_exponential_kernel(
    n_lags: usize, beta: f64, normalize: bool,
) -> HawkesResult<TemporalKernel> {
    if n_lags == 0 {
        return Err(HawkesError::InvalidLagCount { n_lags });
    }
    if !beta.is_finite() || beta <= 0.0 {
        return Err(HawkesError::InvalidDecay { param: "beta", value: beta });
    }
    let mut weights = Array1::from_shape_fn(n_lags, |l| (-beta * l as f64).exp());
    if normalize {
        let total = weights.sum();
        weights /= total;
    }
    TemporalKernel::new(weights)
}

/// Truncated history convolution at time index `t`.
///
/// Uses columns `y[:, max(0, t - L)..t]`, newest first, against the leading
/// weights of `kernel`. Returns a vector of length `n_cells`.
///
/// # Errors
/// - [`HawkesError::TimeOutOfRange`] if `t > y.ncols()`.
pub fn convolved_history(
    y: ArrayView2<'_, f64>, kernel: &TemporalKernel, t: usize,
) -> HawkesResult<Array1<f64>> {
    if t > y.ncols() {
        return Err(HawkesError::TimeOutOfRange { t, len: y.ncols() });
    }
    let n_cells = y.nrows();
    let start = t.saturating_sub(kernel.n_lags());
    let mut history = Array1::zeros(n_cells);
    if start == t {
        return Ok(history);
    }
    let window = y.slice(s![.., start..t;-1]);
    let k = kernel.weights.slice(s![..t - start]);
    history.assign(&window.dot(&k));
    Ok(history)
}
