//! workflows — end-to-end pipelines over simulation, fitting, and forecasting.
//!
//! Purpose
//! -------
//! Package the common multi-step uses of the crate behind single calls with
//! typed, serializable outputs: fit then forecast, a deterministic synthetic
//! backtest, a multi-seed parameter-recovery harness, and the observed-only
//! fit → sample → summarize path used when latent counts are unavailable.
//!
//! Key behaviors
//! -------------
//! - [`fit_forecast_road_hawkes`] fits `(μ, α, β)` and rolls the intensity
//!   forward `horizon` steps.
//! - [`evaluate_synthetic`] builds a [`SyntheticSubstrate`], simulates
//!   `n_steps_train + horizon` steps with seed `seed + 1`, fits the lag-kernel
//!   decay on the training window, samples predictive paths with seed
//!   `seed + 2`, and scores the held-out window.
//! - [`run_parameter_recovery`] repeats simulate → fit per seed and collects
//!   the estimates in a [`ParameterRecoverySummary`]. With the `parallel`
//!   feature seeds run on the rayon pool; results do not depend on it.
//! - [`observed_fit_sample_summarize_poisson_approx`] fits `(μ, α)` on
//!   `y_obs` with known `(p, fr)`, samples observed paths, and summarizes
//!   them.
//!
//! Invariants & assumptions
//! ------------------------
//! - `EvalConfig::n_steps_train > 1` and `horizon >= 1`; other fields are
//!   validated by the constructors they feed.
//! - Held-out NLL is `-(ℓ_full - ℓ_train) / (N · horizon)` with both terms
//!   evaluated at the fitted parameters, so the test window is scored
//!   conditional on the realized training history.
//!
//! Conventions
//! -----------
//! - Records serialize with the exact field names `config`, `fit`,
//!   `forecasts`, and `metrics`; arrays become nested JSON lists.
//! - `config` carries the flat evaluation fields plus one nested
//!   `substrate` object (`spatial_beta`, `extent_s`). Readers that only know
//!   the flat fields can ignore it, and configs without it get the defaults.
//! - `metrics.coverage` is omitted when fewer than two quantile levels are
//!   requested. It is the share of held-out counts inside
//!   `[q_min, q_max]`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover config defaults and JSON round-trips, validation, and
//!   the serialized record layout; the integration tests run the full
//!   pipelines.
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hawkes::{
    core::{
        backend::default_backend,
        data::CountSeries,
        intensity::IntensityModel,
        kernel::{TemporalKernel, discrete_exponential_kernel},
        options::{FitOptions, ForecastOptions, SimOptions},
        params::{CountFamily, HawkesParams},
        spatial::{CsrMatrix, SpatialWeighting, spatial_weights},
    },
    errors::{HawkesError, HawkesResult},
    forecast::{ObservedPaths, PathSummary, sample_predictive_paths, summarize_paths},
    likelihood::loglik,
    metrics::{interval_coverage, mae, rmse},
    models::road_hawkes::{DecayTarget, FitFamily, FitResult, FitVariant, RoadHawkesModel},
    simulate::simulate_on_network,
    substrate::SyntheticSubstrate,
};

/// Starting lag-kernel decay used by [`evaluate_synthetic`].
pub const EVAL_INIT_BETA: f64 = 1.0;

/// Configuration of a synthetic evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub seed: u64,
    pub n_locations: usize,
    pub n_steps_train: usize,
    pub horizon: usize,
    /// Baseline rate shared by every cell.
    pub mu: f64,
    pub alpha: f64,
    pub n_lags: usize,
    /// Lag-kernel decay of the generating model.
    pub beta: f64,
    pub p_detect: f64,
    pub false_rate: f64,
    pub fit_maxiter: usize,
    pub n_paths: usize,
    pub q: Vec<f64>,
    /// Synthetic network settings. Serialized as a nested `substrate`
    /// object so the flat fields above keep their established layout.
    pub substrate: SubstrateConfig,
}

/// Settings of the synthetic road network behind [`evaluate_synthetic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateConfig {
    /// Travel-time decay of the generating `W` (held fixed in the fit).
    pub spatial_beta: f64,
    /// Side of the square the synthetic cells are placed in, in seconds.
    pub extent_s: f64,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self { spatial_beta: 0.02, extent_s: 600.0 }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            n_locations: 5,
            n_steps_train: 60,
            horizon: 7,
            mu: 0.1,
            alpha: 0.6,
            n_lags: 6,
            beta: 1.0,
            p_detect: 1.0,
            false_rate: 0.0,
            fit_maxiter: 400,
            n_paths: 200,
            q: vec![0.05, 0.5, 0.95],
            substrate: SubstrateConfig::default(),
        }
    }
}

impl EvalConfig {
    pub fn to_json(&self) -> HawkesResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Missing fields take their defaults.
    pub fn from_json(text: &str) -> HawkesResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    /// - [`HawkesError::InvalidSteps`] when `n_steps_train <= 1`.
    /// - [`HawkesError::InvalidHorizon`] when `horizon == 0`.
    pub fn validate(&self) -> HawkesResult<()> {
        if self.n_steps_train <= 1 {
            return Err(HawkesError::InvalidSteps {
                n_steps: self.n_steps_train,
                reason: "n_steps_train must be > 1",
            });
        }
        if self.horizon == 0 {
            return Err(HawkesError::InvalidHorizon { horizon: 0 });
        }
        Ok(())
    }
}

/// Fitted parameters reported by [`evaluate_synthetic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalFit {
    pub mu: Vec<f64>,
    pub alpha: f64,
    pub beta: f64,
    pub loglik: f64,
    pub loglik_init: f64,
}

/// Predictive summaries of latent counts over the held-out window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalForecasts {
    /// `(n_cells, horizon)`.
    pub y_true_mean: Vec<Vec<f64>>,
    /// `(len(q), n_cells, horizon)`.
    pub y_true_quantiles: Vec<Vec<Vec<f64>>>,
    pub q: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub nll_test: f64,
    pub rmse: f64,
    pub mae: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

/// Output of [`evaluate_synthetic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub config: EvalConfig,
    pub fit: EvalFit,
    pub forecasts: EvalForecasts,
    pub metrics: EvalMetrics,
}

impl EvalRecord {
    pub fn to_json(&self) -> HawkesResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fit plus mean-field intensity forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct FitForecast {
    pub fit: FitResult,
    /// `(n_cells, horizon)`.
    pub lam_forecast: Array2<f64>,
}

/// Fit `(μ, α, β_spatial)` (and the NB2 dispersion for `FitFamily::NegBin`)
/// on `y`, then roll the intensity forward `horizon` steps.
pub fn fit_forecast_road_hawkes(
    travel_time: &CsrMatrix, kernel: &TemporalKernel, y: &CountSeries, horizon: usize,
    family: FitFamily, options: &FitOptions,
) -> HawkesResult<FitForecast> {
    if horizon == 0 {
        return Err(HawkesError::InvalidHorizon { horizon });
    }
    let mut model =
        RoadHawkesModel::latent(travel_time.clone(), kernel.clone(), family, options.clone())?;
    let fit = model.fit(y)?;
    let lam_forecast = model.forecast(y, horizon)?;
    Ok(FitForecast { fit, lam_forecast })
}

/// Deterministic synthetic backtest.
///
/// ## Steps
/// 1. Generate a substrate from `seed` and simulate with `seed + 1`.
/// 2. Fit `(μ, α, β_lag)` on the first `n_steps_train` steps with `W` fixed
///    at `spatial_beta`, starting from `α = 0.1`, `β = 1`.
/// 3. Sample `n_paths` latent paths over the horizon with `seed + 2`.
/// 4. Score the held-out counts: NLL, RMSE and MAE of the path mean, and
///    central-interval coverage.
pub fn evaluate_synthetic(config: &EvalConfig) -> HawkesResult<EvalRecord> {
    config.validate()?;
    let n_steps = config.n_steps_train + config.horizon;
    debug!(seed = config.seed, n_locations = config.n_locations, n_steps, "synthetic evaluation");

    let substrate =
        SyntheticSubstrate::generate(config.n_locations, config.seed, config.substrate.extent_s)?;
    let kernel_true = discrete_exponential_kernel(config.n_lags, config.beta, true)?;
    let params_true = HawkesParams::new(
        Array1::from_elem(config.n_locations, config.mu),
        config.alpha,
        config.substrate.spatial_beta,
        kernel_true.clone(),
    )?
    .with_observation(config.p_detect, config.false_rate)?;
    let sim_opts = SimOptions::poisson(config.seed.wrapping_add(1), n_steps)?;
    let sim = simulate_on_network(&substrate.travel_time, &params_true, &sim_opts)?;

    let y_full = sim.y_true;
    let y_train = y_full.slice_steps(0, config.n_steps_train)?;
    let y_test = y_full.slice_steps(config.n_steps_train, n_steps)?;

    let fit_options = FitOptions::new(
        0.1,
        EVAL_INIT_BETA,
        FitOptions::default().init_dispersion,
        config.fit_maxiter,
        FitOptions::default().mle_opts,
    )?;
    let variant = FitVariant::Latent {
        family: FitFamily::Poisson,
        decay: DecayTarget::Temporal { n_lags: config.n_lags },
    };
    let mut model = RoadHawkesModel::new(
        substrate.travel_time.clone(),
        SpatialWeighting::ExpDecay,
        kernel_true,
        config.substrate.spatial_beta,
        variant,
        fit_options,
    )?;
    let fit = model.fit(&y_train)?;

    let weights = spatial_weights(&substrate.travel_time, fit.spatial_beta)?;
    let backend = default_backend(weights.rows);
    let fitted =
        IntensityModel::new(&weights, backend.as_ref(), fit.mu.view(), fit.alpha, &fit.kernel)?;

    let forecast_opts = ForecastOptions::new(
        config.horizon,
        config.n_paths,
        config.seed.wrapping_add(2),
        config.q.clone(),
    )?;
    let paths = sample_predictive_paths(
        &fitted,
        &y_train,
        CountFamily::Poisson,
        config.p_detect,
        config.false_rate,
        &forecast_opts,
    )?;
    let y_paths = paths.y_true.mapv(|v| v as f64);
    let summary = summarize_paths(y_paths.view(), &config.q)?;

    let ll_train = loglik(&fitted, &y_train, CountFamily::Poisson)?;
    let ll_full = loglik(&fitted, &y_full, CountFamily::Poisson)?;
    let n_test = (config.n_locations * config.horizon).max(1);
    let nll_test = -(ll_full - ll_train) / n_test as f64;

    let coverage = match central_interval(&config.q) {
        Some((q_lo, q_hi)) => {
            let bounds = summarize_paths(y_paths.view(), &[q_lo, q_hi])?;
            let lo = bounds.quantiles.index_axis(Axis(0), 0);
            let hi = bounds.quantiles.index_axis(Axis(0), 1);
            Some(interval_coverage(y_test.view(), lo, hi)?)
        }
        None => None,
    };
    let metrics = EvalMetrics {
        nll_test,
        rmse: rmse(y_test.view(), summary.mean.view())?,
        mae: mae(y_test.view(), summary.mean.view())?,
        coverage,
    };
    info!(
        nll_test = metrics.nll_test,
        rmse = metrics.rmse,
        mae = metrics.mae,
        "synthetic evaluation finished"
    );

    Ok(EvalRecord {
        config: config.clone(),
        fit: EvalFit {
            mu: fit.mu.to_vec(),
            alpha: fit.alpha,
            beta: fit.beta,
            loglik: fit.loglik,
            loglik_init: fit.loglik_init,
        },
        forecasts: EvalForecasts {
            y_true_mean: nested_2d(summary.mean.view()),
            y_true_quantiles: nested_3d(&summary.quantiles),
            q: summary.q,
        },
        metrics,
    })
}

/// [`evaluate_synthetic`] over JSON text; returns the record as JSON.
pub fn evaluate_synthetic_json(config_json: &str) -> HawkesResult<String> {
    let config = EvalConfig::from_json(config_json)?;
    evaluate_synthetic(&config)?.to_json()
}

/// Per-seed estimates from [`run_parameter_recovery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecoverySummary {
    pub seeds: Vec<u64>,
    pub mu_true: Vec<f64>,
    pub alpha_true: f64,
    pub beta_true: f64,
    /// `(n_seeds, n_cells)`.
    pub mu_hat: Vec<Vec<f64>>,
    pub alpha_hat: Vec<f64>,
    pub beta_hat: Vec<f64>,
    pub loglik: Vec<f64>,
    pub loglik_init: Vec<f64>,
}

impl ParameterRecoverySummary {
    pub fn n_seeds(&self) -> usize {
        self.mu_hat.len()
    }

    /// Mean absolute `μ` error per seed.
    pub fn mu_mae_per_seed(&self) -> Vec<f64> {
        self.mu_hat
            .iter()
            .map(|row| {
                let total: f64 =
                    row.iter().zip(&self.mu_true).map(|(hat, truth)| (hat - truth).abs()).sum();
                total / self.mu_true.len().max(1) as f64
            })
            .collect()
    }

    pub fn alpha_abs_err(&self) -> Vec<f64> {
        self.alpha_hat.iter().map(|a| (a - self.alpha_true).abs()).collect()
    }

    pub fn beta_abs_err(&self) -> Vec<f64> {
        self.beta_hat.iter().map(|b| (b - self.beta_true).abs()).collect()
    }
}

/// Simulate and refit the Poisson spatial-decay model once per seed.
///
/// # Errors
/// - [`HawkesError::EmptySeeds`] when `seeds` is empty.
/// - Any simulation or fit configuration error.
pub fn run_parameter_recovery(
    travel_time: &CsrMatrix, kernel: &TemporalKernel, mu_true: &Array1<f64>, alpha_true: f64,
    beta_true: f64, n_steps: usize, seeds: &[u64], options: &FitOptions,
) -> HawkesResult<ParameterRecoverySummary> {
    if seeds.is_empty() {
        return Err(HawkesError::EmptySeeds);
    }
    let params = HawkesParams::new(mu_true.clone(), alpha_true, beta_true, kernel.clone())?;
    let model = RoadHawkesModel::latent(
        travel_time.clone(),
        kernel.clone(),
        FitFamily::Poisson,
        options.clone(),
    )?;

    let run = |&seed: &u64| -> HawkesResult<FitResult> {
        let sim = simulate_on_network(travel_time, &params, &SimOptions::poisson(seed, n_steps)?)?;
        let mut local = model.clone();
        local.fit(&sim.y_true)
    };
    #[cfg(feature = "parallel")]
    let fits: Vec<FitResult> = seeds.par_iter().map(run).collect::<HawkesResult<_>>()?;
    #[cfg(not(feature = "parallel"))]
    let fits: Vec<FitResult> = seeds.iter().map(run).collect::<HawkesResult<_>>()?;
    info!(n_seeds = seeds.len(), "parameter recovery finished");

    Ok(ParameterRecoverySummary {
        seeds: seeds.to_vec(),
        mu_true: mu_true.to_vec(),
        alpha_true,
        beta_true,
        mu_hat: fits.iter().map(|f| f.mu.to_vec()).collect(),
        alpha_hat: fits.iter().map(|f| f.alpha).collect(),
        beta_hat: fits.iter().map(|f| f.beta).collect(),
        loglik: fits.iter().map(|f| f.loglik).collect(),
        loglik_init: fits.iter().map(|f| f.loglik_init).collect(),
    })
}

/// Output of the observed-only pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedWorkflowOutput {
    pub fit: FitResult,
    pub paths: ObservedPaths,
    pub summary: PathSummary,
}

/// Observed-only pipeline: fit `(μ, α)` on `y_obs` under the Poisson
/// approximation with `W` fixed at `spatial_beta`, then sample and summarize
/// observed paths.
pub fn observed_fit_sample_summarize_poisson_approx(
    travel_time: &CsrMatrix, kernel: &TemporalKernel, spatial_beta: f64, y_obs: &CountSeries,
    p_detect: f64, false_rate: f64, forecast: &ForecastOptions, options: &FitOptions,
) -> HawkesResult<ObservedWorkflowOutput> {
    let variant =
        FitVariant::ObservedPoissonApprox { p_detect, false_rate, decay: DecayTarget::Fixed };
    let mut model = RoadHawkesModel::new(
        travel_time.clone(),
        SpatialWeighting::ExpDecay,
        kernel.clone(),
        spatial_beta,
        variant,
        options.clone(),
    )?;
    let fit = model.fit_with_history(y_obs, y_obs)?;
    let paths = model.sample_observed_paths(y_obs, forecast)?;
    let summary = summarize_paths(paths.y_obs.mapv(|v| v as f64).view(), &forecast.q)?;
    Ok(ObservedWorkflowOutput { fit, paths, summary })
}

fn central_interval(q: &[f64]) -> Option<(f64, f64)> {
    if q.len() < 2 {
        return None;
    }
    let lo = q.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = q.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lo, hi))
}

fn nested_2d(a: ArrayView2<'_, f64>) -> Vec<Vec<f64>> {
    a.outer_iter().map(|row| row.to_vec()).collect()
}

fn nested_3d(a: &Array3<f64>) -> Vec<Vec<Vec<f64>>> {
    a.outer_iter().map(nested_2d).collect()
}
