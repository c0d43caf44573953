//! Observation-model fits: detection probability, clutter rate, and the
//! complete-data decomposition.
//!
//! Purpose
//! -------
//! Estimate `(p_detect, false_rate)` from paired latent/observed series with
//! the exact thinning-plus-clutter likelihood, and report how a latent fit
//! and the observation model split the complete-data log-likelihood.
//!
//! Key behaviors
//! -------------
//! - [`fit_observation_params_exact`] maximizes
//!   `Σ ln P(y_obs | y_true, p, fr)` with `p = clip(logistic(θ₀))` and
//!   `fr = softplus(θ₁)`. The Hawkes parameters play no role.
//! - [`fit_complete_data_with_exact_obs`] fits the latent model on `y_true`
//!   and adds the exact observation term at known `(p, fr)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `p` stays inside `[1e-6, 1 - 1e-6]` and `fr > 0` during the search, so
//!   the likelihood never needs the degenerate case splits.
//! - The same non-regression guard as the Hawkes fit applies.
//!
//! Testing notes
//! -------------
//! - Unit tests check ballpark recovery on simulated data and the joint
//!   decomposition.
use ndarray::{Array1, array};
use tracing::{info, warn};

use crate::{
    hawkes::{
        core::{
            data::CountSeries,
            options::FitOptions,
            params::{validate_false_rate, validate_p_detect},
        },
        errors::{HawkesError, HawkesResult},
        likelihood::loglik_observation_exact,
        models::road_hawkes::{FitResult, FitVariant, RoadHawkesModel},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{BestSoFar, LogLikelihood, Theta, maximize_tracked},
        numerical_stability::transformations::{
            safe_logistic, safe_softplus, shifted_softplus_inv,
        },
    },
};

/// Bounds applied to the detection probability during the search.
pub const P_DETECT_CLIP: f64 = 1e-6;

/// Fitted observation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationFit {
    pub p_detect: f64,
    pub false_rate: f64,
    pub loglik: f64,
    pub loglik_init: f64,
}

/// Latent fit plus the exact observation term.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteDataFit {
    pub fit: FitResult,
    pub loglik_latent: f64,
    pub loglik_obs_exact: f64,
    /// `loglik_latent + loglik_obs_exact`.
    pub loglik_joint: f64,
}

/// Paired series scored by the observation likelihood.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationData {
    pub y_true: CountSeries,
    pub y_obs: CountSeries,
}

/// `θ = [logit-scale p, softplus-scale fr]` objective for the exact
/// observation likelihood.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationLikelihood;

impl ObservationLikelihood {
    pub fn decode(theta: &Theta) -> (f64, f64) {
        let p = safe_logistic(theta[0]).clamp(P_DETECT_CLIP, 1.0 - P_DETECT_CLIP);
        (p, safe_softplus(theta[1]))
    }

    pub fn encode(p_detect: f64, false_rate: f64) -> Theta {
        let p = p_detect.clamp(P_DETECT_CLIP, 1.0 - P_DETECT_CLIP);
        array![(p / (1.0 - p)).ln(), shifted_softplus_inv(false_rate.max(0.0))]
    }
}

impl LogLikelihood for ObservationLikelihood {
    type Data = ObservationData;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        let (p, fr) = Self::decode(theta);
        Ok(loglik_observation_exact(&data.y_true, &data.y_obs, p, fr)?)
    }

    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()> {
        if theta.len() != 2 {
            return Err(OptError::ThetaLengthMismatch { expected: 2, actual: theta.len() });
        }
        if let Some((index, &value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(OptError::InvalidThetaInput { index, value });
        }
        data.y_true.ensure_same_shape(&data.y_obs)?;
        Ok(())
    }
}

/// Fit `(p_detect, false_rate)` by maximizing the exact observed likelihood.
///
/// # Errors
/// - Shape mismatch between `y_true` and `y_obs`.
/// - Invalid starting values or `maxiter == 0`.
/// - [`HawkesError::OptimizationFailed`] if the starting point has a
///   non-finite likelihood.
pub fn fit_observation_params_exact(
    y_true: &CountSeries, y_obs: &CountSeries, init_p_detect: f64, init_false_rate: f64,
    maxiter: usize,
) -> HawkesResult<ObservationFit> {
    validate_p_detect(init_p_detect)?;
    validate_false_rate(init_false_rate)?;
    y_true.ensure_same_shape(y_obs)?;
    let mle_opts = FitOptions::default().with_maxiter(maxiter)?.effective_mle_opts();

    let objective = ObservationLikelihood;
    let data = ObservationData { y_true: y_true.clone(), y_obs: y_obs.clone() };
    let theta0 = ObservationLikelihood::encode(init_p_detect, init_false_rate);
    let loglik_init = objective.value(&theta0, &data)?;
    if !loglik_init.is_finite() {
        return Err(HawkesError::OptimizationFailed {
            status: format!("initial observation log-likelihood is not finite: {loglik_init}"),
        });
    }

    let best = BestSoFar::new();
    let outcome = maximize_tracked(&objective, theta0.clone(), &data, &mle_opts, &best);
    let theta_hat: Array1<f64> = match outcome {
        Ok(out) => match objective.value(&out.theta_hat, &data) {
            Ok(ll) if ll.is_finite() && ll >= loglik_init => out.theta_hat,
            _ => {
                warn!(loglik_init, "observation fit regressed; keeping initial parameters");
                theta0
            }
        },
        Err(err) => match best.into_inner() {
            Some((theta, ll)) if ll > loglik_init => {
                warn!(
                    error = %err,
                    loglik = ll,
                    "observation fit failed; keeping best point reached"
                );
                theta
            }
            _ => {
                warn!(error = %err, "observation fit failed; keeping initial parameters");
                theta0
            }
        },
    };
    let (p_detect, false_rate) = ObservationLikelihood::decode(&theta_hat);
    let loglik = objective.value(&theta_hat, &data)?;
    info!(p_detect, false_rate, loglik, "observation parameters fitted");
    Ok(ObservationFit { p_detect, false_rate, loglik, loglik_init })
}

/// Fit the latent model on `y_true`, then add the exact observation term.
///
/// # Errors
/// - [`HawkesError::InvalidConfig`] if `model` is not a latent variant.
/// - Any fit error, or invalid `(p_detect, false_rate)`.
pub fn fit_complete_data_with_exact_obs(
    model: &mut RoadHawkesModel, y_true: &CountSeries, y_obs: &CountSeries, p_detect: f64,
    false_rate: f64,
) -> HawkesResult<CompleteDataFit> {
    if !matches!(model.variant, FitVariant::Latent { .. }) {
        return Err(HawkesError::InvalidConfig {
            field: "variant",
            reason: "complete-data fit needs a latent variant",
        });
    }
    let loglik_obs_exact = loglik_observation_exact(y_true, y_obs, p_detect, false_rate)?;
    let fit = model.fit(y_true)?;
    let loglik_latent = fit.loglik;
    Ok(CompleteDataFit {
        fit,
        loglik_latent,
        loglik_obs_exact,
        loglik_joint: loglik_latent + loglik_obs_exact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hawkes::{
        core::{
            kernel::discrete_exponential_kernel, options::SimOptions, params::HawkesParams,
            spatial::CsrMatrix,
        },
        models::road_hawkes::FitFamily,
        simulate::{SimulationOutput, simulate_on_network},
    };
    use approx::assert_relative_eq;
    use ndarray::Array2;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Ballpark recovery of (p_detect, false_rate) with the exact likelihood.
    // - The latent + observation decomposition of the complete-data fit.
    // - Rejection of a non-latent model in the complete-data fit.
    // -------------------------------------------------------------------------

    fn network() -> CsrMatrix {
        CsrMatrix::from_dense(&array![
            [0.0, 40.0, 80.0, 120.0],
            [40.0, 0.0, 40.0, 80.0],
            [80.0, 40.0, 0.0, 40.0],
            [120.0, 80.0, 40.0, 0.0]
        ])
    }

    fn simulated(p_detect: f64, false_rate: f64, n_steps: usize) -> SimulationOutput {
        let kernel = discrete_exponential_kernel(4, 1.0, true).expect("valid kernel");
        let params = HawkesParams::new(Array1::from_elem(4, 1.0), 0.4, 0.02, kernel)
            .expect("valid params")
            .with_observation(p_detect, false_rate)
            .expect("valid observation");
        let opts = SimOptions::poisson(1, n_steps).expect("valid options");
        simulate_on_network(&network(), &params, &opts).expect("simulates")
    }

    #[test]
    // Purpose
    // -------
    // The exact observation fit lands near the generating (p, fr).
    //
    // Given
    // -----
    // - 4 cells x 250 steps with p = 0.65 and fr = 0.2.
    // - Start at p = 0.8, fr = 0.05.
    //
    // Expect
    // ------
    // - 0 < p < 1, fr >= 0, both within 0.2 of truth.
    // - loglik improves on loglik_init by more than 1 nat.
    fn observation_fit_recovers_ballpark() {
        // Arrange
        let out = simulated(0.65, 0.2, 250);

        // Act
        let fit = fit_observation_params_exact(&out.y_true, &out.y_obs, 0.8, 0.05, 400)
            .expect("fit succeeds");

        // Assert
        assert!(fit.p_detect > 0.0 && fit.p_detect < 1.0);
        assert!(fit.false_rate >= 0.0);
        assert!((fit.p_detect - 0.65).abs() < 0.2, "p_hat = {}", fit.p_detect);
        assert!((fit.false_rate - 0.2).abs() < 0.2, "fr_hat = {}", fit.false_rate);
        assert!(fit.loglik > fit.loglik_init + 1.0, "{} vs {}", fit.loglik, fit.loglik_init);
    }

    #[test]
    // Purpose
    // -------
    // The complete-data fit reports a joint log-likelihood equal to the sum
    // of its parts, with the observation term computed independently.
    //
    // Given
    // -----
    // - 4 cells x 60 steps with p = 0.7, fr = 0.1; Poisson latent model.
    //
    // Expect
    // ------
    // - loglik_joint == loglik_latent + loglik_obs_exact.
    // - loglik_obs_exact matches `loglik_observation_exact` directly.
    fn complete_data_fit_sums_terms() {
        // Arrange
        let out = simulated(0.7, 0.1, 60);
        let kernel = discrete_exponential_kernel(4, 1.0, true).expect("valid kernel");
        let options = FitOptions::default().with_init_beta(0.02).with_maxiter(50).expect("valid");
        let mut model = RoadHawkesModel::latent(network(), kernel, FitFamily::Poisson, options)
            .expect("valid model");

        // Act
        let joint = fit_complete_data_with_exact_obs(&mut model, &out.y_true, &out.y_obs, 0.7, 0.1)
            .expect("fit succeeds");

        // Assert
        let direct =
            loglik_observation_exact(&out.y_true, &out.y_obs, 0.7, 0.1).expect("finite");
        assert_relative_eq!(joint.loglik_obs_exact, direct, epsilon = 1e-12);
        assert_relative_eq!(
            joint.loglik_joint,
            joint.loglik_latent + joint.loglik_obs_exact,
            epsilon = 1e-12
        );
        assert_eq!(joint.loglik_latent, joint.fit.loglik);
    }

    #[test]
    // Purpose
    // -------
    // Mismatched series shapes are rejected before any optimization.
    //
    // Given
    // -----
    // - y_true of shape (2, 3) and y_obs of shape (2, 4).
    //
    // Expect
    // ------
    // - `HawkesError::ShapeMismatch`.
    fn observation_fit_rejects_shape_mismatch() {
        // Arrange
        let y_true = CountSeries::new(Array2::zeros((2, 3))).expect("valid series");
        let y_obs = CountSeries::new(Array2::zeros((2, 4))).expect("valid series");

        // Act
        let result = fit_observation_params_exact(&y_true, &y_obs, 0.5, 0.1, 10);

        // Assert
        assert!(matches!(result, Err(HawkesError::ShapeMismatch { .. })));
    }
}
