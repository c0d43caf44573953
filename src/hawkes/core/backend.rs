//! Numeric backends for sparse spatial products.
//!
//! The intensity recursion only needs two sparse operations on `W`: the
//! product `W x` and the transposed product `Wᵀ x` (used by the analytic
//! gradient). [`NumericBackend`] abstracts both so a model can pick a
//! sequential or a rayon-parallel implementation once, at construction.
//!
//! - [`SparseBackend`] is the sequential reference.
//! - [`ParallelSparseBackend`] (feature `parallel`) splits `W x` over rows.
//!   Row sums are computed in the same order, so results match the
//!   sequential backend bit for bit.
//!
//! Fits and path sampling already fan out over seeds and paths, so
//! [`default_backend`] only hands out the row-parallel backend for networks
//! with at least [`PARALLEL_MIN_ROWS`] cells. Below that a rayon split costs
//! more than the product itself.
use ndarray::{Array1, ArrayView1};

use crate::hawkes::{
    core::spatial::CsrMatrix,
    errors::{HawkesError, HawkesResult},
};

/// Smallest `W` (in rows) for which [`default_backend`] picks the
/// row-parallel backend.
pub const PARALLEL_MIN_ROWS: usize = 4096;

/// Rows handed to one rayon task by [`ParallelSparseBackend`].
#[cfg(feature = "parallel")]
const PARALLEL_ROW_CHUNK: usize = 512;

/// Sparse matrix-vector strategy used by intensity and gradient code.
pub trait NumericBackend: Send + Sync + std::fmt::Debug {
    /// `W x`.
    fn matvec(&self, w: &CsrMatrix, x: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>>;

    /// `Wᵀ x`.
    fn matvec_transpose(&self, w: &CsrMatrix, x: ArrayView1<'_, f64>)
    -> HawkesResult<Array1<f64>>;

    fn name(&self) -> &'static str;
}

/// Sequential CSR products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparseBackend;

impl NumericBackend for SparseBackend {
    fn matvec(&self, w: &CsrMatrix, x: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>> {
        check_len(x.len(), w.cols)?;
        Ok(Array1::from_shape_fn(w.rows, |row| row_dot(w, row, x)))
    }

    fn matvec_transpose(
        &self, w: &CsrMatrix, x: ArrayView1<'_, f64>,
    ) -> HawkesResult<Array1<f64>> {
        check_len(x.len(), w.rows)?;
        let mut out = Array1::zeros(w.cols);
        for row in 0..w.rows {
            let xr = x[row];
            if xr == 0.0 {
                continue;
            }
            for idx in w.row_ptr[row]..w.row_ptr[row + 1] {
                out[w.col_indices[idx]] += w.values[idx] * xr;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "sparse"
    }
}

/// Row-parallel CSR products backed by rayon.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelSparseBackend;

#[cfg(feature = "parallel")]
impl NumericBackend for ParallelSparseBackend {
    fn matvec(&self, w: &CsrMatrix, x: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>> {
        use rayon::prelude::*;

        check_len(x.len(), w.cols)?;
        let out: Vec<f64> = (0..w.rows)
            .into_par_iter()
            .with_min_len(PARALLEL_ROW_CHUNK)
            .map(|row| row_dot(w, row, x))
            .collect();
        Ok(Array1::from(out))
    }

    // Scatter-add does not split cleanly over rows; fall back to the
    // sequential kernel so summation order stays deterministic.
    fn matvec_transpose(
        &self, w: &CsrMatrix, x: ArrayView1<'_, f64>,
    ) -> HawkesResult<Array1<f64>> {
        SparseBackend.matvec_transpose(w, x)
    }

    fn name(&self) -> &'static str {
        "parallel_sparse"
    }
}

/// Backend picked when the caller does not choose one, sized to a network
/// of `n_cells` cells.
///
/// Sequential unless the `parallel` feature is on and
/// `n_cells >= PARALLEL_MIN_ROWS`.
pub fn default_backend(n_cells: usize) -> std::sync::Arc<dyn NumericBackend> {
    #[cfg(feature = "parallel")]
    {
        if n_cells >= PARALLEL_MIN_ROWS {
            return std::sync::Arc::new(ParallelSparseBackend);
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = n_cells;
    std::sync::Arc::new(SparseBackend)
}

#[inline]
fn row_dot(w: &CsrMatrix, row: usize, x: ArrayView1<'_, f64>) -> f64 {
    let mut acc = 0.0;
    for idx in w.row_ptr[row]..w.row_ptr[row + 1] {
        acc += w.values[idx] * x[w.col_indices[idx]];
    }
    acc
}

fn check_len(found: usize, expected: usize) -> HawkesResult<()> {
    if found != expected {
        return Err(HawkesError::CellCountMismatch { expected, found });
    }
    Ok(())
}
