//! Scoring metrics for count forecasts.
//!
//! Purpose
//! -------
//! Score predicted means and predictive intervals against realized counts:
//! mean negative log-likelihood under a count family, RMSE, MAE, and
//! empirical interval coverage.
//!
//! Conventions
//! -----------
//! - Inputs are `(n_cells, n_steps)` arrays and must share a shape.
//! - Every metric averages over all elements; an empty input is an error
//!   rather than `NaN`.
use ndarray::{ArrayView2, Zip};

use crate::hawkes::{
    core::params::CountFamily,
    errors::{HawkesError, HawkesResult},
    likelihood::family_logpmf,
};

/// Mean of `-ln p(y | mean)` over all elements.
///
/// # Errors
/// - [`HawkesError::ShapeMismatch`] if `y` and `mean` differ in shape.
/// - [`HawkesError::EmptySeries`] for empty inputs.
/// - [`HawkesError::Param`] for an invalid NB2 dispersion.
pub fn mean_negative_log_likelihood(
    y: ArrayView2<'_, u64>, mean: ArrayView2<'_, f64>, family: CountFamily,
) -> HawkesResult<f64> {
    family.validate()?;
    let n = check_pair(y.dim(), mean.dim())?;
    let mut total = 0.0;
    Zip::from(&y).and(&mean).for_each(|&yi, &mi| total -= family_logpmf(yi, mi, family));
    Ok(total / n as f64)
}

/// Root mean squared error between realized counts and predictions.
pub fn rmse(y: ArrayView2<'_, u64>, yhat: ArrayView2<'_, f64>) -> HawkesResult<f64> {
    let n = check_pair(y.dim(), yhat.dim())?;
    let mut sq = 0.0;
    Zip::from(&y).and(&yhat).for_each(|&yi, &pi| sq += (yi as f64 - pi).powi(2));
    Ok((sq / n as f64).sqrt())
}

/// Mean absolute error between realized counts and predictions.
pub fn mae(y: ArrayView2<'_, u64>, yhat: ArrayView2<'_, f64>) -> HawkesResult<f64> {
    let n = check_pair(y.dim(), yhat.dim())?;
    let mut abs = 0.0;
    Zip::from(&y).and(&yhat).for_each(|&yi, &pi| abs += (yi as f64 - pi).abs());
    Ok(abs / n as f64)
}

/// Share of elements with `lo <= y <= hi`.
pub fn interval_coverage(
    y: ArrayView2<'_, u64>, lo: ArrayView2<'_, f64>, hi: ArrayView2<'_, f64>,
) -> HawkesResult<f64> {
    let n = check_pair(y.dim(), lo.dim())?;
    check_pair(y.dim(), hi.dim())?;
    let mut inside = 0usize;
    Zip::from(&y).and(&lo).and(&hi).for_each(|&yi, &l, &h| {
        let v = yi as f64;
        if v >= l && v <= h {
            inside += 1;
        }
    });
    Ok(inside as f64 / n as f64)
}

fn check_pair(left: (usize, usize), right: (usize, usize)) -> HawkesResult<usize> {
    if left != right {
        return Err(HawkesError::ShapeMismatch { left, right });
    }
    match left.0 * left.1 {
        0 => Err(HawkesError::EmptySeries),
        n => Ok(n),
    }
}
