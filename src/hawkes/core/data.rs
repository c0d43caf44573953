//! Count-series container for road-constrained Hawkes models.
//!
//! Purpose
//! -------
//! Provide a validated `(n_cells, n_steps)` container of non-negative integer
//! counts. Simulation produces it; callers may also build it from external
//! data.
//!
//! Key behaviors
//! -------------
//! - [`CountSeries::new`] enforces at least one cell.
//! - [`CountSeries::for_cells`] additionally checks the cell count against a
//!   substrate.
//! - Float views ([`CountSeries::to_f64`]) feed the history convolution.
//!
//! Invariants & assumptions
//! ------------------------
//! - `counts.nrows() >= 1`. Zero time steps are allowed and represent an
//!   empty history.
//! - Counts are `u64`, so non-negativity holds by construction.
//!
//! Conventions
//! -----------
//! - Rows are cells, columns are time steps, oldest column first.
//!
//! Downstream usage
//! ----------------
//! - Likelihoods, fits, and forecasts take `&CountSeries` and rely on the
//!   invariants above.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the empty-cell rejection, cell-count checks, step
//!   slicing, and row means.
use ndarray::{Array1, Array2, ArrayView2, Axis, s};

use crate::hawkes::errors::{HawkesError, HawkesResult};

/// Validated `(n_cells, n_steps)` count matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSeries {
    counts: Array2<u64>,
}

impl CountSeries {
    /// Wrap a count matrix.
    ///
    /// # Errors
    /// [`HawkesError::EmptySeries`] if the matrix has no rows.
    pub fn new(counts: Array2<u64>) -> HawkesResult<Self> {
        if counts.nrows() == 0 {
            return Err(HawkesError::EmptySeries);
        }
        Ok(Self { counts })
    }

    /// Wrap a count matrix and check it has `n_cells` rows.
    pub fn for_cells(counts: Array2<u64>, n_cells: usize) -> HawkesResult<Self> {
        let series = Self::new(counts)?;
        series.ensure_cells(n_cells)?;
        Ok(series)
    }

    pub fn ensure_cells(&self, n_cells: usize) -> HawkesResult<()> {
        if self.n_cells() != n_cells {
            return Err(HawkesError::CellCountMismatch { expected: n_cells, found: self.n_cells() });
        }
        Ok(())
    }

    pub fn n_cells(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_steps(&self) -> usize {
        self.counts.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, u64> {
        self.counts.view()
    }

    pub fn into_inner(self) -> Array2<u64> {
        self.counts
    }

    pub fn to_f64(&self) -> Array2<f64> {
        self.counts.mapv(|c| c as f64)
    }

    /// Columns `start..end` as a new series.
    ///
    /// # Errors
    /// [`HawkesError::TimeOutOfRange`] if `end > n_steps` or `start > end`.
    pub fn slice_steps(&self, start: usize, end: usize) -> HawkesResult<Self> {
        if end > self.n_steps() || start > end {
            return Err(HawkesError::TimeOutOfRange { t: end, len: self.n_steps() });
        }
        Ok(Self { counts: self.counts.slice(s![.., start..end]).to_owned() })
    }

    /// Per-cell mean count; zeros when there are no steps.
    pub fn row_means(&self) -> Array1<f64> {
        if self.n_steps() == 0 {
            return Array1::zeros(self.n_cells());
        }
        self.to_f64().mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(self.n_cells()))
    }

    /// Check that `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &CountSeries) -> HawkesResult<()> {
        if self.counts.dim() != other.counts.dim() {
            return Err(HawkesError::ShapeMismatch {
                left: self.counts.dim(),
                right: other.counts.dim(),
            });
        }
        Ok(())
    }
}
