//! Synthetic travel-time substrate for tests and evaluation runs.
//!
//! Cells are placed uniformly at random in a square of side `extent_s` and
//! travel times are the Euclidean distances between them, read as seconds.
//! The resulting CSR matrix stores every off-diagonal pair; the diagonal is
//! left implicit (zero travel time to self).
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::hawkes::{
    core::spatial::CsrMatrix,
    errors::{HawkesError, HawkesResult},
};

/// Random planar cells and their pairwise travel times.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSubstrate {
    /// `(n_cells, 2)` coordinates in `[0, extent_s)`.
    pub xy: Array2<f64>,
    pub travel_time: CsrMatrix,
}

impl SyntheticSubstrate {
    /// # Errors
    /// - [`HawkesError::EmptySeries`] when `n_cells == 0`.
    /// - [`HawkesError::InvalidConfig`] when `extent_s` is not finite and
    ///   positive.
    pub fn generate(n_cells: usize, seed: u64, extent_s: f64) -> HawkesResult<Self> {
        if n_cells == 0 {
            return Err(HawkesError::EmptySeries);
        }
        if !extent_s.is_finite() || extent_s <= 0.0 {
            return Err(HawkesError::InvalidConfig {
                field: "extent_s",
                reason: "must be finite and > 0",
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let xy = Array2::from_shape_simple_fn((n_cells, 2), || rng.gen_range(0.0..extent_s));
        let dense = Array2::from_shape_fn((n_cells, n_cells), |(i, j)| {
            let dx = xy[[i, 0]] - xy[[j, 0]];
            let dy = xy[[i, 1]] - xy[[j, 1]];
            dx.hypot(dy)
        });
        Ok(Self { xy, travel_time: CsrMatrix::from_dense(&dense) })
    }

    pub fn n_cells(&self) -> usize {
        self.travel_time.rows
    }
}
