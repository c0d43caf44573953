//! models — maximum-likelihood fitting for road-constrained Hawkes models.
//!
//! Purpose
//! -------
//! Collect the user-facing fitting APIs. This layer sits on top of
//! `hawkes::core` and `hawkes::likelihood`, wiring the intensity recursion
//! and count likelihoods into the generic log-likelihood optimizer.
//!
//! Key behaviors
//! -------------
//! - [`RoadHawkesModel`] implements [`LogLikelihood`] and provides `fit`,
//!   `forecast`, `sample_paths`, and in-sample prediction.
//! - [`FitVariant`] and [`DecayTarget`] select the likelihood and which decay
//!   (spatial, temporal, or none) is estimated.
//! - [`observation`] fits `(p_detect, false_rate)` with the exact
//!   thinning-plus-clutter likelihood and reports the complete-data split.
//!
//! Invariants & assumptions
//! ------------------------
//! - θ has the layout `[μ_0 .. μ_{N-1}, α, β?, dispersion?]` with finite
//!   entries; [`LogLikelihood::check`] enforces length and finiteness.
//! - A fit never ends below its starting log-likelihood; the guard restores
//!   the starting point and logs a warning instead.
//!
//! Downstream usage
//! ----------------
//! - Build a model with [`RoadHawkesModel::latent`] (the common case) or
//!   [`RoadHawkesModel::new`], call `fit`, then forecast from the cached
//!   [`FitResult`].
//!
//! Testing notes
//! -------------
//! - Unit tests cover gradient agreement with finite differences, the
//!   non-regression guard per variant, configuration errors, and the
//!   observation-parameter fit.
//!
//! [`LogLikelihood`]: crate::optimization::loglik_optimizer::LogLikelihood
//! [`LogLikelihood::check`]: crate::optimization::loglik_optimizer::LogLikelihood::check

pub mod observation;
pub mod road_hawkes;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::observation::{
    CompleteDataFit, ObservationFit, fit_complete_data_with_exact_obs,
    fit_observation_params_exact,
};
pub use self::road_hawkes::{
    DecayTarget, FitData, FitFamily, FitResult, FitVariant, ParamLayout, RoadHawkesModel,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use road_hawkes::hawkes::models::prelude::*;
//
// to import the main fitting surface in a single line.

pub mod prelude {
    pub use super::observation::fit_observation_params_exact;
    pub use super::road_hawkes::{DecayTarget, FitFamily, FitResult, FitVariant, RoadHawkesModel};
}
