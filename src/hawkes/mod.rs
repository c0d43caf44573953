//! hawkes — road-constrained discrete-time Hawkes count processes.
//!
//! Purpose
//! -------
//! Model event counts on a road network as a self-exciting process where
//! past events raise the rate of nearby cells, with nearness measured in
//! travel time. The module covers the full modeling loop: intensity
//! recursion, simulation, likelihoods, maximum-likelihood fitting,
//! forecasting, and evaluation.
//!
//! Key behaviors
//! -------------
//! - `core`: kernels, spatial weights, the numeric backend, the intensity
//!   recursion `λ(t) = μ + α · W h(t)`, and validated parameter, data, and
//!   option types.
//! - `likelihood`: Poisson and NB2 count likelihoods plus the exact and
//!   Poisson-approximate observed-count likelihoods.
//! - `simulate` and `forecast`: seeded generation of latent and observed
//!   counts, mean-field roll-forward, and Monte-Carlo predictive paths.
//! - `models`: [`RoadHawkesModel`] and the observation-parameter fit.
//! - `workflows`, `metrics`, `substrate`: end-to-end pipelines, scoring, and
//!   a synthetic travel-time substrate.
//!
//! Invariants & assumptions
//! ------------------------
//! - Count series are `(n_cells, n_steps)`; time is discrete and the
//!   intensity at step `t` depends only on counts before `t`.
//! - Travel times are seconds, finite, and non-negative.
//! - All randomness comes from explicitly seeded `StdRng` instances.
//!
//! Conventions
//! -----------
//! - Fallible operations return [`HawkesResult`]; parameter constructors
//!   return [`ParamResult`].
//! - The library emits `tracing` events and never installs a subscriber.
//!
//! Downstream usage
//! ----------------
//! - Most callers need only the items in [`prelude`].
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests; `tests/` covers the full pipelines.

pub mod core;
pub mod errors;
pub mod forecast;
pub mod likelihood;
pub mod metrics;
pub mod models;
pub mod simulate;
pub mod substrate;
pub mod workflows;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    CountFamily, CountSeries, CsrMatrix, ExpDecayKernel, FitOptions, ForecastOptions,
    HawkesParams, NumericBackend, SimOptions, SparseBackend, SpatialKernel, SpatialWeighting,
    TemporalKernel,
};
pub use self::errors::{HawkesError, HawkesResult, ParamError, ParamResult};
pub use self::forecast::{ObservedPaths, PathSummary, PredictivePaths, summarize_paths};
pub use self::models::{DecayTarget, FitFamily, FitResult, FitVariant, RoadHawkesModel};
pub use self::simulate::{SimulationOutput, simulate, simulate_on_network};
pub use self::substrate::SyntheticSubstrate;
pub use self::workflows::{
    EvalConfig, EvalRecord, ParameterRecoverySummary, SubstrateConfig, evaluate_synthetic,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use road_hawkes::hawkes::prelude::*;
//
// to import the main modeling surface in a single line.

pub mod prelude {
    pub use super::{
        CountFamily, CountSeries, CsrMatrix, DecayTarget, EvalConfig, FitFamily, FitOptions,
        FitResult, FitVariant, ForecastOptions, HawkesError, HawkesParams, HawkesResult,
        RoadHawkesModel, SimOptions, SpatialWeighting, TemporalKernel, evaluate_synthetic,
        simulate_on_network, summarize_paths,
    };
}
