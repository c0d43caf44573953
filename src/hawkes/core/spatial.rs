//! Sparse travel-time matrices and spatial excitation weights.
//!
//! Purpose
//! -------
//! Turn a square CSR matrix of road travel times (seconds) into the spatial
//! weight matrix `W` used in `λ(t) = μ + α · W h(t)`. Weights come either from
//! the built-in exponential decay `exp(-β d)` or from a pluggable
//! [`SpatialKernel`].
//!
//! Key behaviors
//! -------------
//! - [`CsrMatrix::new`] validates the CSR arrays (pointer monotonicity, column
//!   bounds, matching lengths).
//! - [`spatial_weights`] applies `exp(-β d)` to stored entries and forces a
//!   unit diagonal whether or not the input stores one.
//! - [`spatial_weights_from_kernel`] does the same with a user kernel, after
//!   an optional probe check ([`validate_spatial_kernel`]) and a re-check of
//!   the kernel output on the real entries.
//! - [`travel_time_on_weight_pattern`] lays the travel times out on the
//!   pattern of `W`, so `∂W/∂β = -d ⊙ W` is an elementwise product.
//!
//! Invariants & assumptions
//! ------------------------
//! - Output keeps the input sparsity pattern plus the diagonal; column indices
//!   within a row stay sorted when the input rows are sorted.
//! - Stored travel times must be finite and `>= 0`; a missing diagonal entry
//!   is a zero travel time to self.
//! - Symmetry is not required.
//!
//! Conventions
//! -----------
//! - Kernel output errors use the words "same shape", "nonnegative", and
//!   "finite" so callers can match on them.
//!
//! Downstream usage
//! ----------------
//! - Models build `W` once per fit (or per likelihood call for the
//!   spatial-decay variant) and hand it to a `NumericBackend`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover CSR validation, exponential weights with and without a
//!   stored diagonal, `ExpDecayKernel`, and probe failures for mis-shaped,
//!   negative, and non-finite kernel output.
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};

use crate::hawkes::errors::{HawkesError, HawkesResult};

/// Travel-time probe used to smoke-test user spatial kernels.
///
/// A 4 x 4 grid of distances in seconds, flattened row-major.
pub const KERNEL_PROBE_DISTANCES: [f64; 16] = [
    0.0, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
    10800.0, 21600.0,
];

/// Compressed sparse row matrix of `f64` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    pub row_ptr: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl CsrMatrix {
    /// Build a validated CSR matrix.
    ///
    /// # Errors
    /// [`HawkesError::InvalidCsr`] when the arrays are structurally
    /// inconsistent.
    pub fn new(
        rows: usize, cols: usize, row_ptr: Vec<usize>, col_indices: Vec<usize>, values: Vec<f64>,
    ) -> HawkesResult<Self> {
        if row_ptr.len() != rows + 1 {
            return Err(HawkesError::InvalidCsr { reason: "row_ptr must have rows + 1 entries" });
        }
        if row_ptr[0] != 0 {
            return Err(HawkesError::InvalidCsr { reason: "row_ptr must start at 0" });
        }
        if row_ptr.windows(2).any(|w| w[1] < w[0]) {
            return Err(HawkesError::InvalidCsr { reason: "row_ptr must be non-decreasing" });
        }
        if values.len() != col_indices.len() {
            return Err(HawkesError::InvalidCsr {
                reason: "values and col_indices must have equal length",
            });
        }
        if row_ptr[rows] != col_indices.len() {
            return Err(HawkesError::InvalidCsr { reason: "row_ptr must end at nnz" });
        }
        if col_indices.iter().any(|&c| c >= cols) {
            return Err(HawkesError::InvalidCsr { reason: "column index out of range" });
        }
        Ok(Self { row_ptr, col_indices, values, rows, cols })
    }

    /// Dense-to-CSR conversion keeping every non-zero entry.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (rows, cols) = dense.dim();
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in dense.rows() {
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    col_indices.push(c);
                    values.push(v);
                }
            }
            row_ptr.push(col_indices.len());
        }
        Self { row_ptr, col_indices, values, rows, cols }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored value at `(row, col)`, or `None` when the entry is structurally zero.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows {
            return None;
        }
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_indices[range.clone()]
            .iter()
            .position(|&c| c == col)
            .map(|offset| self.values[range.start + offset])
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows, self.cols));
        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                dense[[row, self.col_indices[idx]]] += self.values[idx];
            }
        }
        dense
    }

    /// Iterate `(row, col, value)` over the stored entries.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |row| {
            (self.row_ptr[row]..self.row_ptr[row + 1])
                .map(move |idx| (row, self.col_indices[idx], self.values[idx]))
        })
    }

    fn ensure_square(&self) -> HawkesResult<()> {
        if self.rows != self.cols {
            return Err(HawkesError::NonSquareMatrix { rows: self.rows, cols: self.cols });
        }
        Ok(())
    }
}

/// Pluggable distance-to-weight map for spatial excitation.
///
/// Implementations must return an array of the same length as `distances`
/// whose entries are finite and non-negative.
pub trait SpatialKernel: Send + Sync + std::fmt::Debug {
    fn weights(&self, distances: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>>;

    /// Label used in error messages.
    fn name(&self) -> &str {
        "spatial_kernel"
    }
}

/// Reference kernel `w = exp(-d / lengthscale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpDecayKernel {
    lengthscale: f64,
}

impl ExpDecayKernel {
    pub fn new(lengthscale: f64) -> HawkesResult<Self> {
        if !lengthscale.is_finite() || lengthscale <= 0.0 {
            return Err(HawkesError::InvalidLengthscale { value: lengthscale });
        }
        Ok(Self { lengthscale })
    }

    pub fn lengthscale(&self) -> f64 {
        self.lengthscale
    }
}

impl SpatialKernel for ExpDecayKernel {
    fn weights(&self, distances: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>> {
        if distances.iter().any(|&d| d < 0.0) {
            return Err(HawkesError::InvalidSpatialKernel {
                name: self.name().to_string(),
                reason: "distances must be nonnegative".to_string(),
            });
        }
        Ok(distances.mapv(|d| (-d / self.lengthscale).exp()))
    }

    fn name(&self) -> &str {
        "exp_decay"
    }
}

/// How a model turns travel times into spatial weights.
#[derive(Debug, Clone)]
pub enum SpatialWeighting {
    /// `exp(-β d)` with `β` taken from the model parameters.
    ExpDecay,
    /// User kernel; the parameter `β` is ignored.
    Custom(Arc<dyn SpatialKernel>),
}

impl SpatialWeighting {
    /// Build `W` for the given decay.
    pub fn build(&self, travel_time: &CsrMatrix, beta: f64) -> HawkesResult<CsrMatrix> {
        match self {
            SpatialWeighting::ExpDecay => spatial_weights(travel_time, beta),
            SpatialWeighting::Custom(kernel) => {
                spatial_weights_from_kernel(travel_time, kernel.as_ref(), false)
            }
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, SpatialWeighting::Custom(_))
    }
}

/// Exponential travel-time weights `W_ij = exp(-β d_ij)` with `W_ii = 1`.
///
/// # Errors
/// - [`HawkesError::InvalidDecay`] if `beta` is non-finite or `<= 0`.
/// - [`HawkesError::NonSquareMatrix`] for a non-square input.
/// - [`HawkesError::InvalidTravelTime`] for a negative or non-finite entry.
pub fn spatial_weights(travel_time: &CsrMatrix, beta: f64) -> HawkesResult<CsrMatrix> {
    if !beta.is_finite() || beta <= 0.0 {
        return Err(HawkesError::InvalidDecay { param: "beta", value: beta });
    }
    travel_time.ensure_square()?;
    validate_travel_times(travel_time)?;
    let weights = travel_time.values.iter().map(|&d| (-beta * d).exp()).collect();
    Ok(with_unit_diagonal(travel_time, weights))
}

/// Spatial weights from a user kernel evaluated on the stored travel times.
///
/// With `validate` set, the kernel is first checked on
/// [`KERNEL_PROBE_DISTANCES`]. Its output on the real entries is always
/// re-checked before use.
pub fn spatial_weights_from_kernel(
    travel_time: &CsrMatrix, kernel: &dyn SpatialKernel, validate: bool,
) -> HawkesResult<CsrMatrix> {
    travel_time.ensure_square()?;
    validate_travel_times(travel_time)?;
    if validate {
        validate_spatial_kernel(kernel)?;
    }
    let distances = ArrayView1::from(travel_time.values.as_slice());
    let out = kernel.weights(distances)?;
    check_kernel_output(kernel.name(), distances.len(), &out)?;
    Ok(with_unit_diagonal(travel_time, out.to_vec()))
}

/// Travel times stored on the sparsity pattern of `W` with a zero diagonal.
///
/// Entry `idx` pairs with `W.values[idx]` for every `W` built from
/// `travel_time`, whatever the decay.
///
/// # Errors
/// [`HawkesError::NonSquareMatrix`] for a non-square input.
pub fn travel_time_on_weight_pattern(travel_time: &CsrMatrix) -> HawkesResult<CsrMatrix> {
    travel_time.ensure_square()?;
    let mut out = with_unit_diagonal(travel_time, travel_time.values.clone());
    for row in 0..out.rows {
        for idx in out.row_ptr[row]..out.row_ptr[row + 1] {
            if out.col_indices[idx] == row {
                out.values[idx] = 0.0;
            }
        }
    }
    Ok(out)
}

/// Smoke-test a kernel on [`KERNEL_PROBE_DISTANCES`].
///
/// # Errors
/// [`HawkesError::InvalidSpatialKernel`] whose reason mentions "same shape",
/// "finite", or "nonnegative".
pub fn validate_spatial_kernel(kernel: &dyn SpatialKernel) -> HawkesResult<()> {
    let probe = ArrayView1::from(&KERNEL_PROBE_DISTANCES[..]);
    let out = kernel.weights(probe)?;
    check_kernel_output(kernel.name(), probe.len(), &out)
}

fn check_kernel_output(name: &str, expected_len: usize, out: &Array1<f64>) -> HawkesResult<()> {
    let fail = |reason: String| HawkesError::InvalidSpatialKernel { name: name.to_string(), reason };
    if out.len() != expected_len {
        return Err(fail(format!(
            "output must have the same shape as the input ({expected_len}), got {}",
            out.len()
        )));
    }
    if out.iter().any(|w| !w.is_finite()) {
        return Err(fail("output must be finite".to_string()));
    }
    if out.iter().any(|&w| w < 0.0) {
        return Err(fail("output must be nonnegative".to_string()));
    }
    Ok(())
}

fn validate_travel_times(travel_time: &CsrMatrix) -> HawkesResult<()> {
    match travel_time.triplets().find(|&(_, _, d)| !d.is_finite() || d < 0.0) {
        Some((row, col, value)) => Err(HawkesError::InvalidTravelTime { row, col, value }),
        None => Ok(()),
    }
}

// Copy the sparsity pattern, replace values, and pin the diagonal to 1.0.
fn with_unit_diagonal(pattern: &CsrMatrix, weights: Vec<f64>) -> CsrMatrix {
    let n = pattern.rows;
    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_indices = Vec::with_capacity(pattern.nnz() + n);
    let mut values = Vec::with_capacity(pattern.nnz() + n);
    row_ptr.push(0);
    for row in 0..n {
        let mut entries: Vec<(usize, f64)> = (pattern.row_ptr[row]..pattern.row_ptr[row + 1])
            .map(|idx| {
                let col = pattern.col_indices[idx];
                (col, if col == row { 1.0 } else { weights[idx] })
            })
            .collect();
        if !entries.iter().any(|&(col, _)| col == row) {
            entries.push((row, 1.0));
        }
        entries.sort_by_key(|&(col, _)| col);
        for (col, w) in entries {
            col_indices.push(col);
            values.push(w);
        }
        row_ptr.push(col_indices.len());
    }
    CsrMatrix { row_ptr, col_indices, values, rows: n, cols: n }
}
