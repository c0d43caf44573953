//! core — kernels, spatial weights, intensity recursion, and shared containers.
//!
//! Purpose
//! -------
//! Collect the building blocks of the road-constrained discrete-time Hawkes
//! model: the temporal lag kernel and history convolution, sparse travel-time
//! matrices and spatial weights, the numeric backend for sparse products, the
//! intensity recursion, and validated parameter/data/option containers.
//! Likelihoods, simulation, fitting, and forecasting build on these.
//!
//! Key behaviors
//! -------------
//! - [`TemporalKernel`], [`discrete_exponential_kernel`], and
//!   [`convolved_history`] implement `h(t) = Σ_l k[l-1] y(t-l)` with early
//!   truncation.
//! - [`CsrMatrix`], [`spatial_weights`], [`spatial_weights_from_kernel`], and
//!   the [`SpatialKernel`] trait build `W` from travel times with a unit
//!   diagonal.
//! - [`NumericBackend`] abstracts `W x` and `Wᵀ x`
//!   ([`SparseBackend`], and `ParallelSparseBackend` behind `parallel`).
//! - [`IntensityModel`] and [`intensity_step`] compute
//!   `λ(t) = max(0, μ + α W h(t))`, the one recursion every caller shares.
//! - [`HawkesParams`], [`CountSeries`], [`FitOptions`], [`SimOptions`], and
//!   [`ForecastOptions`] carry validated inputs.
//!
//! Invariants & assumptions
//! ------------------------
//! - Travel times are finite and non-negative seconds; `W` is square with
//!   `W_ii = 1`.
//! - `μ >= 0`, `α >= 0`, `β > 0`; counts are non-negative integers.
//! - Cell counts agree across `μ`, `W`, and every count series; mismatches
//!   are reported as errors, never truncated.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based. Count and intensity arrays are `(n_cells, n_steps)`
//!   with the oldest step in column 0.
//! - This module avoids I/O and logging; errors are reported via
//!   `HawkesResult` / `ParamResult`.
//!
//! Downstream usage
//! ----------------
//! - `hawkes::likelihood`, `hawkes::simulate`, and `hawkes::forecast` call
//!   [`intensity_step`] (directly or through [`intensity_matrix`]).
//! - `hawkes::models` rebuilds `W` or the kernel from candidate decays and
//!   applies `Wᵀ` through the [`NumericBackend`] for the analytic Poisson
//!   gradient.
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own invariants and edge
//!   cases; end-to-end behavior is covered by the integration tests.

pub mod backend;
pub mod data;
pub mod intensity;
pub mod kernel;
pub mod options;
pub mod params;
pub mod spatial;

// ---- Re-exports (primary public surface) ----------------------------------

#[cfg(feature = "parallel")]
pub use self::backend::ParallelSparseBackend;
pub use self::{
    backend::{NumericBackend, SparseBackend, default_backend},
    data::CountSeries,
    intensity::{
        IntensityModel, excitation_step, intensity_matrix, intensity_step,
        predict_intensity_one_step,
    },
    kernel::{TemporalKernel, convolved_history, discrete_exponential_kernel},
    options::{DEFAULT_FIT_MAXITER, FitOptions, ForecastOptions, SimOptions},
    params::{CountFamily, HawkesParams},
    spatial::{
        CsrMatrix, ExpDecayKernel, KERNEL_PROBE_DISTANCES, SpatialKernel, SpatialWeighting,
        spatial_weights, spatial_weights_from_kernel, travel_time_on_weight_pattern,
        validate_spatial_kernel,
    },
};
