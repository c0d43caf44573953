//! Road-constrained Hawkes model: maximum-likelihood fitting and prediction.
//!
//! This module wires the intensity recursion to the `LogLikelihood` trait.
//! Parameters live in an unconstrained space and map to model space through
//! softplus:
//!
//! - `μ_i = softplus(θ_i) + 1e-12` for each cell,
//! - `α = softplus(θ_α)`,
//! - `β = softplus(θ_β) + 1e-12` when the decay is fitted,
//! - `k = softplus(θ_k) + 1e-12` for the NB2 dispersion.
//!
//! Starting values map back with `θ = ln(expm1(x) + 1e-6)`.
//!
//! Key ideas:
//! - [`FitVariant`] selects the likelihood (latent Poisson/NB2 or the
//!   observed Poisson approximation) and [`DecayTarget`] selects which decay,
//!   if any, is estimated.
//! - The Poisson latent variants with a spatial or fixed decay return an
//!   **analytic gradient**. With residuals `r_it = y_it / λ_it - 1` and
//!   excitation `E_t = W h(t)`:
//!   1) `∂ℓ/∂μ_i = Σ_t r_it` and `∂ℓ/∂α = Σ_t r_t · E_t`;
//!   2) `∂ℓ/∂β = α Σ_t h(t) · (∂W/∂β)ᵀ r_t` through the backend's
//!      transposed product, where `∂W_ij/∂β = -d_ij W_ij` off the diagonal;
//!   3) each component is scaled by the softplus derivative (logistic).
//!
//!   Every other variant falls back to finite differences in the adapter.
//! - A non-regression guard keeps the starting point whenever the optimizer
//!   ends below the initial log-likelihood. When the optimizer errors, the
//!   best point it evaluated is kept if it beats the start.
use std::{borrow::Cow, sync::Arc};

use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::{
    hawkes::{
        core::{
            backend::{NumericBackend, default_backend},
            data::CountSeries,
            intensity::{IntensityModel, intensity_matrix},
            kernel::{TemporalKernel, convolved_history, discrete_exponential_kernel},
            options::{FitOptions, ForecastOptions},
            params::{CountFamily, HawkesParams, validate_false_rate, validate_p_detect},
            spatial::{
                CsrMatrix, SpatialWeighting, travel_time_on_weight_pattern,
                validate_spatial_kernel,
            },
        },
        errors::{HawkesError, HawkesResult, ParamError},
        forecast::{
            ObservedPaths, PredictivePaths, forecast_intensity_horizon,
            predict_intensity_in_sample, sample_observed_paths_poisson_approx,
            sample_predictive_paths,
        },
        likelihood::{MEAN_FLOOR, family_loglik_sum},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{
            BestSoFar, Grad, LogLikelihood, OptimOutcome, Theta, maximize_tracked,
        },
        numerical_stability::transformations::{
            safe_logistic, safe_softplus, shifted_softplus_inv,
        },
    },
};

/// Floor added to softplus outputs for `μ`, `β`, and the dispersion.
pub const POSITIVE_FLOOR: f64 = 1e-12;

/// Latent count family to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitFamily {
    #[default]
    Poisson,
    /// NB2; the dispersion is estimated alongside `(μ, α)`.
    NegBin,
}

/// Which decay parameter, if any, the fit estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayTarget {
    /// Travel-time decay of `W`; the temporal kernel stays fixed.
    Spatial,
    /// Decay of a normalized exponential lag kernel with `n_lags` lags; `W`
    /// stays fixed.
    Temporal { n_lags: usize },
    /// Nothing beyond `(μ, α)` and, for NB2, the dispersion.
    Fixed,
}

impl DecayTarget {
    pub fn is_fitted(&self) -> bool {
        !matches!(self, DecayTarget::Fixed)
    }
}

/// Likelihood and parameter set of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitVariant {
    /// Fit latent counts directly.
    Latent { family: FitFamily, decay: DecayTarget },
    /// Fit observed counts with `y_obs ~ Poisson(p λ + fr)` at known `(p, fr)`.
    ObservedPoissonApprox { p_detect: f64, false_rate: f64, decay: DecayTarget },
}

impl FitVariant {
    pub fn decay(&self) -> DecayTarget {
        match *self {
            FitVariant::Latent { decay, .. } | FitVariant::ObservedPoissonApprox { decay, .. } => {
                decay
            }
        }
    }

    pub fn fits_dispersion(&self) -> bool {
        matches!(self, FitVariant::Latent { family: FitFamily::NegBin, .. })
    }

    /// `(p_detect, false_rate)`; latent fits observe perfectly.
    pub fn observation(&self) -> (f64, f64) {
        match *self {
            FitVariant::Latent { .. } => (1.0, 0.0),
            FitVariant::ObservedPoissonApprox { p_detect, false_rate, .. } => {
                (p_detect, false_rate)
            }
        }
    }

    /// Whether [`RoadHawkesModel`] supplies `∇ℓ` in closed form.
    pub fn has_analytic_gradient(&self) -> bool {
        matches!(
            self,
            FitVariant::Latent {
                family: FitFamily::Poisson,
                decay: DecayTarget::Spatial | DecayTarget::Fixed
            }
        )
    }

    fn validate(&self, spatial: &SpatialWeighting) -> HawkesResult<()> {
        match self.decay() {
            DecayTarget::Temporal { n_lags: 0 } => {
                return Err(HawkesError::InvalidLagCount { n_lags: 0 });
            }
            DecayTarget::Spatial if spatial.is_custom() => {
                return Err(HawkesError::UnidentifiableBeta);
            }
            _ => {}
        }
        if let FitVariant::ObservedPoissonApprox { p_detect, false_rate, .. } = *self {
            validate_p_detect(p_detect)?;
            validate_false_rate(false_rate)?;
        }
        Ok(())
    }
}

/// Positions of each parameter block in `θ`.
///
/// Layout: `[μ_0 .. μ_{N-1}, α, β?, dispersion?]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLayout {
    pub n_cells: usize,
    pub fits_beta: bool,
    pub fits_dispersion: bool,
}

impl ParamLayout {
    pub fn n_params(&self) -> usize {
        self.n_cells + 1 + usize::from(self.fits_beta) + usize::from(self.fits_dispersion)
    }

    pub fn alpha_index(&self) -> usize {
        self.n_cells
    }

    pub fn beta_index(&self) -> Option<usize> {
        self.fits_beta.then_some(self.n_cells + 1)
    }

    pub fn dispersion_index(&self) -> Option<usize> {
        self.fits_dispersion.then_some(self.n_cells + 1 + usize::from(self.fits_beta))
    }
}

/// Owned fit payload: the series driving `h(t)` and the counts scored.
#[derive(Debug, Clone, PartialEq)]
pub struct FitData {
    pub history: Array2<f64>,
    pub counts: Array2<u64>,
}

impl FitData {
    /// # Errors
    /// [`HawkesError::ShapeMismatch`] if the two series differ in shape.
    pub fn new(history: &CountSeries, target: &CountSeries) -> HawkesResult<Self> {
        history.ensure_same_shape(target)?;
        Ok(Self { history: history.to_f64(), counts: target.view().to_owned() })
    }
}

/// Model-space point decoded from `θ`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedParams {
    pub mu: Array1<f64>,
    pub alpha: f64,
    pub beta: Option<f64>,
    pub dispersion: Option<f64>,
}

/// Fitted parameters and diagnostics.
///
/// `beta` is the decay in the role chosen by [`DecayTarget`] (the fixed
/// travel-time decay for [`DecayTarget::Fixed`]); `spatial_beta` is always
/// the decay used to build `W`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub mu: Array1<f64>,
    pub alpha: f64,
    pub beta: f64,
    pub spatial_beta: f64,
    pub kernel: TemporalKernel,
    pub dispersion: Option<f64>,
    pub p_detect: f64,
    pub false_rate: f64,
    pub loglik: f64,
    pub loglik_init: f64,
    pub variant: FitVariant,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    /// Set when the non-regression guard restored the starting point.
    pub used_fallback: bool,
}

impl FitResult {
    pub fn family(&self) -> CountFamily {
        count_family(self.dispersion)
    }

    /// Fitted parameters as a validated [`HawkesParams`].
    pub fn params(&self) -> HawkesResult<HawkesParams> {
        let mut params =
            HawkesParams::new(self.mu.clone(), self.alpha, self.spatial_beta, self.kernel.clone())?
                .with_observation(self.p_detect, self.false_rate)?;
        if let Some(dispersion) = self.dispersion {
            params = params.with_dispersion(dispersion)?;
        }
        Ok(params)
    }
}

/// Road-constrained Hawkes model with MLE fitting.
///
/// Holds the travel-time substrate, the spatial weighting, the fixed
/// temporal kernel, and the fit configuration. After [`fit`](Self::fit),
/// `results` keeps the raw optimizer outcome (when the optimizer returned
/// one) and `fitted` the model-space estimates used for prediction.
#[derive(Debug, Clone)]
pub struct RoadHawkesModel {
    pub travel_time: CsrMatrix,
    pub spatial: SpatialWeighting,
    /// Lag kernel used unless the decay target is [`DecayTarget::Temporal`].
    pub kernel: TemporalKernel,
    /// Travel-time decay used unless the decay target is
    /// [`DecayTarget::Spatial`].
    pub spatial_beta: f64,
    pub variant: FitVariant,
    pub options: FitOptions,
    backend: Arc<dyn NumericBackend>,
    fixed_weights: CsrMatrix,
    // Travel times on the pattern of `W`, for `∂W/∂β`.
    aligned_travel_time: CsrMatrix,
    pub results: Option<OptimOutcome>,
    pub fitted: Option<FitResult>,
}

impl RoadHawkesModel {
    /// # Errors
    /// - [`HawkesError::UnidentifiableBeta`] for a custom spatial kernel with
    ///   [`DecayTarget::Spatial`].
    /// - [`HawkesError::InvalidSpatialKernel`] if a custom kernel fails its
    ///   probe.
    /// - Travel-time and decay errors from building `W`.
    pub fn new(
        travel_time: CsrMatrix, spatial: SpatialWeighting, kernel: TemporalKernel,
        spatial_beta: f64, variant: FitVariant, options: FitOptions,
    ) -> HawkesResult<Self> {
        variant.validate(&spatial)?;
        if let SpatialWeighting::Custom(custom) = &spatial {
            validate_spatial_kernel(custom.as_ref())?;
        }
        let fixed_weights = spatial.build(&travel_time, spatial_beta)?;
        let aligned_travel_time = travel_time_on_weight_pattern(&travel_time)?;
        let backend = default_backend(travel_time.rows);
        Ok(Self {
            travel_time,
            spatial,
            kernel,
            spatial_beta,
            variant,
            options,
            backend,
            fixed_weights,
            aligned_travel_time,
            results: None,
            fitted: None,
        })
    }

    /// Latent fit of `(μ, α, β_spatial)` with exponential travel-time weights.
    pub fn latent(
        travel_time: CsrMatrix, kernel: TemporalKernel, family: FitFamily, options: FitOptions,
    ) -> HawkesResult<Self> {
        let start = options.init_beta.max(POSITIVE_FLOOR);
        let variant = FitVariant::Latent { family, decay: DecayTarget::Spatial };
        Self::new(travel_time, SpatialWeighting::ExpDecay, kernel, start, variant, options)
    }

    /// Replace the numeric backend.
    pub fn with_backend(mut self, backend: Arc<dyn NumericBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn backend(&self) -> &dyn NumericBackend {
        self.backend.as_ref()
    }

    pub fn n_cells(&self) -> usize {
        self.travel_time.rows
    }

    pub fn layout(&self) -> ParamLayout {
        ParamLayout {
            n_cells: self.n_cells(),
            fits_beta: self.variant.decay().is_fitted(),
            fits_dispersion: self.variant.fits_dispersion(),
        }
    }

    /// Fit a latent count series (history and target are the same series).
    pub fn fit(&mut self, y: &CountSeries) -> HawkesResult<FitResult> {
        self.fit_with_history(y, y)
    }

    /// Fit `target` with `h(t)` driven by `history`.
    ///
    /// ## Steps
    /// 1. Build the starting point from row means of `target` and the
    ///    configured starting values; evaluate `ℓ(θ₀)`.
    /// 2. Run L-BFGS per `options` with the iteration cap applied.
    /// 3. Re-evaluate `ℓ` at the optimizer's best point. If that value is
    ///    below `ℓ(θ₀)`, keep `θ₀` and log a warning. If the optimizer
    ///    failed, keep the best point it evaluated when that beats `ℓ(θ₀)`,
    ///    and `θ₀` otherwise.
    /// 4. Decode the kept point into a [`FitResult`] and cache it.
    ///
    /// ## Errors
    /// - Shape errors between `history`, `target`, and the substrate.
    /// - [`HawkesError::OptimizationFailed`] if `ℓ(θ₀)` is not finite.
    ///
    /// Optimizer non-convergence is never an error.
    pub fn fit_with_history(
        &mut self, history: &CountSeries, target: &CountSeries,
    ) -> HawkesResult<FitResult> {
        history.ensure_cells(self.n_cells())?;
        let data = FitData::new(history, target)?;
        let theta0 = self.initial_theta(target);
        let loglik_init = self.evaluate(&theta0, &data)?;
        if !loglik_init.is_finite() {
            return Err(HawkesError::OptimizationFailed {
                status: format!("initial log-likelihood is not finite: {loglik_init}"),
            });
        }

        debug!(
            n_params = theta0.len(),
            loglik_init,
            backend = self.backend.name(),
            variant = ?self.variant,
            "starting road hawkes fit"
        );
        let mle_opts = self.options.effective_mle_opts();
        let best = BestSoFar::new();
        let outcome = maximize_tracked(&*self, theta0.clone(), &data, &mle_opts, &best);
        let (theta_hat, loglik, used_fallback) = match &outcome {
            Ok(out) => match self.evaluate(&out.theta_hat, &data) {
                Ok(ll) if ll.is_finite() && ll >= loglik_init => {
                    (out.theta_hat.clone(), ll, false)
                }
                _ => {
                    warn!(
                        loglik_init,
                        optimizer_loglik = out.value,
                        "fit ended below the starting log-likelihood; keeping initial parameters"
                    );
                    (theta0, loglik_init, true)
                }
            },
            Err(err) => match best.into_inner() {
                Some((theta, ll)) if ll > loglik_init => {
                    warn!(
                        error = %err,
                        loglik = ll,
                        "optimizer failed; keeping best point reached"
                    );
                    (theta, ll, false)
                }
                _ => {
                    warn!(error = %err, "optimizer failed; keeping initial parameters");
                    (theta0, loglik_init, true)
                }
            },
        };
        let diagnostics = match &outcome {
            Ok(out) => Diagnostics {
                converged: out.converged,
                status: out.status.clone(),
                iterations: out.iterations,
                used_fallback,
            },
            Err(err) => Diagnostics {
                converged: false,
                status: err.to_string(),
                iterations: 0,
                used_fallback,
            },
        };
        info!(
            loglik,
            gain = loglik - loglik_init,
            iterations = diagnostics.iterations,
            status = %diagnostics.status,
            "road hawkes fit finished"
        );

        let decoded = self.decode(&theta_hat)?;
        let fitted = self.to_result(decoded, loglik, loglik_init, diagnostics)?;
        self.results = outcome.ok();
        self.fitted = Some(fitted.clone());
        Ok(fitted)
    }

    /// In-sample intensities at the fitted parameters.
    pub fn predict_in_sample(&self, y: &CountSeries) -> HawkesResult<Array2<f64>> {
        self.with_fitted_model(|model, _| predict_intensity_in_sample(model, y))
    }

    /// Mean-field intensity forecast for `horizon` steps after `y_history`.
    pub fn forecast(&self, y_history: &CountSeries, horizon: usize) -> HawkesResult<Array2<f64>> {
        self.with_fitted_model(|model, _| forecast_intensity_horizon(model, y_history, horizon))
    }

    /// Monte-Carlo latent and observed paths at the fitted parameters.
    pub fn sample_paths(
        &self, y_history: &CountSeries, opts: &ForecastOptions,
    ) -> HawkesResult<PredictivePaths> {
        self.with_fitted_model(|model, fit| {
            sample_predictive_paths(
                model,
                y_history,
                fit.family(),
                fit.p_detect,
                fit.false_rate,
                opts,
            )
        })
    }

    /// Monte-Carlo observed paths under the Poisson approximation.
    pub fn sample_observed_paths(
        &self, y_history: &CountSeries, opts: &ForecastOptions,
    ) -> HawkesResult<ObservedPaths> {
        self.with_fitted_model(|model, fit| {
            sample_observed_paths_poisson_approx(
                model,
                y_history,
                fit.p_detect,
                fit.false_rate,
                opts,
            )
        })
    }

    /// Map `θ` to model space.
    ///
    /// # Errors
    /// - `ParamError::ThetaLengthMismatch` for a wrongly sized `θ`.
    /// - `ParamError::InvalidThetaInput` for a non-finite entry.
    pub fn decode(&self, theta: &Theta) -> HawkesResult<DecodedParams> {
        let layout = self.layout();
        check_theta(theta, layout)?;
        let n = layout.n_cells;
        let mu = theta.slice(ndarray::s![..n]).mapv(|x| safe_softplus(x) + POSITIVE_FLOOR);
        let alpha = safe_softplus(theta[layout.alpha_index()]);
        let beta = layout.beta_index().map(|i| safe_softplus(theta[i]) + POSITIVE_FLOOR);
        let dispersion =
            layout.dispersion_index().map(|i| safe_softplus(theta[i]) + POSITIVE_FLOOR);
        Ok(DecodedParams { mu, alpha, beta, dispersion })
    }

    /// Starting point `θ₀` for `target`.
    pub fn initial_theta(&self, target: &CountSeries) -> Theta {
        let layout = self.layout();
        let mut theta = Array1::zeros(layout.n_params());
        for (slot, m) in theta.iter_mut().zip(target.row_means().iter()) {
            *slot = shifted_softplus_inv(m.max(1e-6));
        }
        theta[layout.alpha_index()] = shifted_softplus_inv(self.options.init_alpha.max(0.0));
        if let Some(i) = layout.beta_index() {
            theta[i] = shifted_softplus_inv(self.options.init_beta.max(POSITIVE_FLOOR));
        }
        if let Some(i) = layout.dispersion_index() {
            theta[i] = shifted_softplus_inv(self.options.init_dispersion.max(1e-6));
        }
        theta
    }

    /// `ℓ(θ)` for the configured variant.
    pub fn evaluate(&self, theta: &Theta, data: &FitData) -> HawkesResult<f64> {
        let decoded = self.decode(theta)?;
        self.loglik_at(&decoded, data)
    }

    // ---- Internals ----

    fn loglik_at(&self, p: &DecodedParams, data: &FitData) -> HawkesResult<f64> {
        let weights = self.weights_for(p.beta)?;
        let kernel = self.kernel_for(p.beta)?;
        let model =
            IntensityModel::new(&weights, self.backend(), p.mu.view(), p.alpha, &kernel)?;
        let lam = intensity_matrix(&model, data.history.view())?;
        match self.variant {
            FitVariant::Latent { .. } => {
                family_loglik_sum(data.counts.view(), lam.view(), count_family(p.dispersion))
            }
            FitVariant::ObservedPoissonApprox { p_detect, false_rate, .. } => {
                let mean = lam.mapv(|l| p_detect * l + false_rate);
                family_loglik_sum(data.counts.view(), mean.view(), CountFamily::Poisson)
            }
        }
    }

    fn weights_for(&self, beta: Option<f64>) -> HawkesResult<Cow<'_, CsrMatrix>> {
        match (self.variant.decay(), beta) {
            (DecayTarget::Spatial, Some(b)) => {
                Ok(Cow::Owned(self.spatial.build(&self.travel_time, b)?))
            }
            _ => Ok(Cow::Borrowed(&self.fixed_weights)),
        }
    }

    fn kernel_for(&self, beta: Option<f64>) -> HawkesResult<Cow<'_, TemporalKernel>> {
        match (self.variant.decay(), beta) {
            (DecayTarget::Temporal { n_lags }, Some(b)) => {
                Ok(Cow::Owned(discrete_exponential_kernel(n_lags, b, true)?))
            }
            _ => Ok(Cow::Borrowed(&self.kernel)),
        }
    }

    // ∂W/∂β = -d ⊙ W; the aligned travel times are zero on the diagonal.
    fn decay_derivative(&self, weights: &CsrMatrix) -> CsrMatrix {
        let mut dw = weights.clone();
        for (slot, &d) in dw.values.iter_mut().zip(self.aligned_travel_time.values.iter()) {
            *slot *= -d;
        }
        dw
    }

    fn poisson_gradient(&self, theta: &Theta, data: &FitData) -> HawkesResult<Grad> {
        let layout = self.layout();
        let p = self.decode(theta)?;
        let weights = self.weights_for(p.beta)?;
        let dw = p.beta.map(|_| self.decay_derivative(&weights));
        let backend = self.backend();
        let n = layout.n_cells;

        let mut g_mu = Array1::<f64>::zeros(n);
        let mut g_alpha = 0.0;
        let mut g_beta = 0.0;
        let mut resid = Array1::<f64>::zeros(n);
        for t in 0..data.history.ncols() {
            let h = convolved_history(data.history.view(), &self.kernel, t)?;
            let e = backend.matvec(&weights, h.view())?;
            for i in 0..n {
                let lam = (p.mu[i] + p.alpha * e[i]).max(MEAN_FLOOR);
                resid[i] = data.counts[[i, t]] as f64 / lam - 1.0;
            }
            g_mu += &resid;
            g_alpha += resid.dot(&e);
            if let Some(dw) = &dw {
                g_beta += p.alpha * backend.matvec_transpose(dw, resid.view())?.dot(&h);
            }
        }

        let mut grad = Array1::zeros(layout.n_params());
        for i in 0..n {
            grad[i] = g_mu[i] * safe_logistic(theta[i]);
        }
        let a = layout.alpha_index();
        grad[a] = g_alpha * safe_logistic(theta[a]);
        if let Some(b) = layout.beta_index() {
            grad[b] = g_beta * safe_logistic(theta[b]);
        }
        Ok(grad)
    }

    fn to_result(
        &self, p: DecodedParams, loglik: f64, loglik_init: f64, diagnostics: Diagnostics,
    ) -> HawkesResult<FitResult> {
        let kernel = self.kernel_for(p.beta)?.into_owned();
        let (beta, spatial_beta) = match (self.variant.decay(), p.beta) {
            (DecayTarget::Spatial, Some(b)) => (b, b),
            (DecayTarget::Temporal { .. }, Some(b)) => (b, self.spatial_beta),
            _ => (self.spatial_beta, self.spatial_beta),
        };
        let (p_detect, false_rate) = self.variant.observation();
        Ok(FitResult {
            mu: p.mu,
            alpha: p.alpha,
            beta,
            spatial_beta,
            kernel,
            dispersion: p.dispersion,
            p_detect,
            false_rate,
            loglik,
            loglik_init,
            variant: self.variant,
            converged: diagnostics.converged,
            status: diagnostics.status,
            iterations: diagnostics.iterations,
            used_fallback: diagnostics.used_fallback,
        })
    }

    fn with_fitted_model<T>(
        &self, run: impl FnOnce(&IntensityModel<'_>, &FitResult) -> HawkesResult<T>,
    ) -> HawkesResult<T> {
        let fit = self.fitted.as_ref().ok_or(HawkesError::ModelNotFitted)?;
        let weights = match self.variant.decay() {
            DecayTarget::Spatial => {
                Cow::Owned(self.spatial.build(&self.travel_time, fit.spatial_beta)?)
            }
            _ => Cow::Borrowed(&self.fixed_weights),
        };
        let model =
            IntensityModel::new(&weights, self.backend(), fit.mu.view(), fit.alpha, &fit.kernel)?;
        run(&model, fit)
    }
}

impl LogLikelihood for RoadHawkesModel {
    type Data = FitData;

    /// `ℓ(θ)`; model-side failures surface as `OptError`.
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        Ok(self.evaluate(theta, data)?)
    }

    /// Reject a wrongly sized or non-finite `θ` and data that do not match
    /// the substrate before the solver starts.
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()> {
        check_theta(theta, self.layout())?;
        if data.history.nrows() != self.n_cells() {
            return Err(HawkesError::CellCountMismatch {
                expected: self.n_cells(),
                found: data.history.nrows(),
            }
            .into());
        }
        if data.history.dim() != data.counts.dim() {
            return Err(HawkesError::ShapeMismatch {
                left: data.history.dim(),
                right: data.counts.dim(),
            }
            .into());
        }
        Ok(())
    }

    /// Closed-form `∇ℓ(θ)` for the Poisson latent spatial/fixed variants.
    fn grad(&self, theta: &Theta, data: &Self::Data) -> OptResult<Grad> {
        if !self.variant.has_analytic_gradient() {
            return Err(OptError::GradientNotImplemented);
        }
        Ok(self.poisson_gradient(theta, data)?)
    }
}

struct Diagnostics {
    converged: bool,
    status: String,
    iterations: usize,
    used_fallback: bool,
}

fn count_family(dispersion: Option<f64>) -> CountFamily {
    match dispersion {
        Some(dispersion) => CountFamily::NegBin { dispersion },
        None => CountFamily::Poisson,
    }
}

fn check_theta(theta: &Theta, layout: ParamLayout) -> Result<(), ParamError> {
    let expected = layout.n_params();
    if theta.len() != expected {
        return Err(ParamError::ThetaLengthMismatch { expected, actual: theta.len() });
    }
    match theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        Some((index, &value)) => Err(ParamError::InvalidThetaInput { index, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hawkes::{
        core::{kernel::discrete_exponential_kernel, options::SimOptions, spatial::SpatialKernel},
        simulate::simulate_on_network,
    };
    use approx::assert_relative_eq;
    use ndarray::{ArrayView1, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Parameter layout and decoding.
    // - Analytic gradient against central finite differences.
    // - The non-regression guard for latent and observed variants.
    // - Configuration errors and prediction before fitting.
    //
    // They intentionally DO NOT cover:
    // - Statistical parameter recovery (see the integration tests).
    // -------------------------------------------------------------------------

    fn network() -> CsrMatrix {
        CsrMatrix::from_dense(&array![[0.0, 30.0, 90.0], [30.0, 0.0, 45.0], [90.0, 45.0, 0.0]])
    }

    fn simulated_counts(seed: u64, n_steps: usize) -> CountSeries {
        let kernel = discrete_exponential_kernel(3, 0.7, true).expect("valid kernel");
        let params =
            HawkesParams::new(array![0.5, 0.3, 0.8], 0.4, 0.02, kernel).expect("valid params");
        let opts = SimOptions::poisson(seed, n_steps).expect("valid options");
        simulate_on_network(&network(), &params, &opts).expect("simulates").y_true
    }

    fn short_fit_options() -> FitOptions {
        FitOptions::default().with_init_beta(0.05).with_maxiter(60).expect("valid maxiter")
    }

    #[derive(Debug)]
    struct FlatKernel;

    impl SpatialKernel for FlatKernel {
        fn weights(&self, distances: ArrayView1<'_, f64>) -> HawkesResult<Array1<f64>> {
            Ok(Array1::from_elem(distances.len(), 0.5))
        }
    }

    #[test]
    // Purpose
    // -------
    // The layout orders (μ, α, β, dispersion) and decoding applies the floors.
    //
    // Given
    // -----
    // - A 3-cell NB2 fit with a temporal decay.
    // - θ = 0 everywhere.
    //
    // Expect
    // ------
    // - 6 parameters; α = ln 2; μ, β, and dispersion = ln 2 + 1e-12.
    fn layout_and_decode_follow_parameter_order() {
        // Arrange
        let kernel = TemporalKernel::new(array![1.0]).expect("valid kernel");
        let variant = FitVariant::Latent {
            family: FitFamily::NegBin,
            decay: DecayTarget::Temporal { n_lags: 4 },
        };
        let model = RoadHawkesModel::new(
            network(),
            SpatialWeighting::ExpDecay,
            kernel,
            0.02,
            variant,
            FitOptions::default(),
        )
        .expect("valid model");
        let theta = Array1::zeros(6);

        // Act
        let layout = model.layout();
        let decoded = model.decode(&theta).expect("valid theta");

        // Assert
        assert_eq!(layout.n_params(), 6);
        assert_eq!(layout.beta_index(), Some(4));
        assert_eq!(layout.dispersion_index(), Some(5));
        let ln2 = 2.0f64.ln();
        assert_relative_eq!(decoded.alpha, ln2, epsilon = 1e-15);
        assert_relative_eq!(decoded.mu[2], ln2 + POSITIVE_FLOOR, epsilon = 1e-15);
        assert_relative_eq!(decoded.beta.expect("fitted beta"), ln2 + POSITIVE_FLOOR);
        assert_relative_eq!(decoded.dispersion.expect("fitted dispersion"), ln2 + POSITIVE_FLOOR);
        assert!(matches!(
            model.decode(&Array1::zeros(5)),
            Err(HawkesError::Param(ParamError::ThetaLengthMismatch { expected: 6, actual: 5 }))
        ));
    }

    #[test]
    // Purpose
    // -------
    // The closed-form gradient matches central finite differences of ℓ.
    //
    // Given
    // -----
    // - Simulated 3-cell counts (40 steps), Poisson latent fit with a
    //   spatial decay, evaluated at a generic θ.
    //
    // Expect
    // ------
    // - Every component agrees to a relative tolerance of 1e-4.
    fn analytic_gradient_matches_finite_differences() {
        // Arrange
        let y = simulated_counts(5, 40);
        let kernel = discrete_exponential_kernel(3, 0.7, true).expect("valid kernel");
        let model =
            RoadHawkesModel::latent(network(), kernel, FitFamily::Poisson, short_fit_options())
                .expect("valid model");
        let data = FitData::new(&y, &y).expect("same shape");
        let theta = array![-0.4, -1.0, 0.1, -0.8, -3.5];
        let step = 1e-6;

        // Act
        let grad = model.grad(&theta, &data).expect("analytic gradient");

        // Assert
        for j in 0..theta.len() {
            let mut up = theta.clone();
            let mut down = theta.clone();
            up[j] += step;
            down[j] -= step;
            let fd = (model.evaluate(&up, &data).expect("finite")
                - model.evaluate(&down, &data).expect("finite"))
                / (2.0 * step);
            assert_relative_eq!(grad[j], fd, max_relative = 1e-4, epsilon = 1e-5);
        }
    }

    #[test]
    // Purpose
    // -------
    // Latent fits move away from the starting point and keep the optimizer
    // outcome.
    //
    // Given
    // -----
    // - Simulated counts; Poisson/spatial, NB2/temporal, and Poisson/fixed
    //   variants.
    //
    // Expect
    // ------
    // - No fallback, an optimizer outcome on the model, and loglik above
    //   loglik_init by more than 0.1 for each.
    // - NB2 reports a dispersion; fitted values are finite and μ > 0.
    fn latent_fits_improve_on_start() {
        // Arrange
        let y = simulated_counts(17, 60);
        let kernel = discrete_exponential_kernel(3, 0.7, true).expect("valid kernel");
        let variants = [
            FitVariant::Latent { family: FitFamily::Poisson, decay: DecayTarget::Spatial },
            FitVariant::Latent {
                family: FitFamily::NegBin,
                decay: DecayTarget::Temporal { n_lags: 3 },
            },
            FitVariant::Latent { family: FitFamily::Poisson, decay: DecayTarget::Fixed },
        ];

        for variant in variants {
            let mut model = RoadHawkesModel::new(
                network(),
                SpatialWeighting::ExpDecay,
                kernel.clone(),
                0.02,
                variant,
                short_fit_options(),
            )
            .expect("valid model");

            // Act
            let fit = model.fit(&y).expect("fit succeeds");

            // Assert
            assert!(!fit.used_fallback, "{variant:?}: {fit:?}");
            assert!(fit.loglik > fit.loglik_init + 0.1, "{variant:?}: {fit:?}");
            assert!(model.results.is_some());
            assert!(fit.mu.iter().all(|&m| m.is_finite() && m > 0.0));
            assert!(fit.alpha.is_finite() && fit.beta.is_finite());
            assert_eq!(fit.dispersion.is_some(), variant.fits_dispersion());
            assert!(model.fitted.is_some());
        }
    }

    #[test]
    // Purpose
    // -------
    // The observed Poisson-approx fit scores y_obs and reports (p, fr).
    //
    // Given
    // -----
    // - Simulated latent counts used as history and target; p = 0.8,
    //   fr = 0.1; fixed decay.
    //
    // Expect
    // ------
    // - No fallback and loglik above loglik_init by more than 0.1.
    // - The result carries p = 0.8 and fr = 0.1.
    fn observed_fit_reports_observation_model() {
        // Arrange
        let y = simulated_counts(23, 50);
        let kernel = discrete_exponential_kernel(3, 0.7, true).expect("valid kernel");
        let variant = FitVariant::ObservedPoissonApprox {
            p_detect: 0.8,
            false_rate: 0.1,
            decay: DecayTarget::Fixed,
        };
        let mut model = RoadHawkesModel::new(
            network(),
            SpatialWeighting::ExpDecay,
            kernel,
            0.02,
            variant,
            short_fit_options(),
        )
        .expect("valid model");

        // Act
        let fit = model.fit_with_history(&y, &y).expect("fit succeeds");

        // Assert
        assert!(!fit.used_fallback, "{fit:?}");
        assert!(fit.loglik > fit.loglik_init + 0.1, "{fit:?}");
        assert!(model.results.is_some());
        assert_eq!((fit.p_detect, fit.false_rate), (0.8, 0.1));
        assert_eq!(fit.params().expect("valid params").p_detect(), 0.8);
    }

    #[test]
    // Purpose
    // -------
    // A custom spatial kernel cannot be combined with a fitted spatial decay,
    // but is accepted with a fixed decay.
    //
    // Given
    // -----
    // - `FlatKernel` with `DecayTarget::Spatial` and `DecayTarget::Fixed`.
    //
    // Expect
    // ------
    // - `UnidentifiableBeta` for the first; Ok for the second.
    fn custom_kernel_with_spatial_decay_is_rejected() {
        // Arrange
        let kernel = TemporalKernel::new(array![1.0]).expect("valid kernel");
        let spatial = SpatialWeighting::Custom(Arc::new(FlatKernel));
        let spatial_variant =
            FitVariant::Latent { family: FitFamily::Poisson, decay: DecayTarget::Spatial };
        let fixed_variant =
            FitVariant::Latent { family: FitFamily::Poisson, decay: DecayTarget::Fixed };

        // Act
        let bad = RoadHawkesModel::new(
            network(),
            spatial.clone(),
            kernel.clone(),
            0.02,
            spatial_variant,
            FitOptions::default(),
        );
        let ok = RoadHawkesModel::new(
            network(),
            spatial,
            kernel,
            0.02,
            fixed_variant,
            FitOptions::default(),
        );

        // Assert
        assert!(matches!(bad, Err(HawkesError::UnidentifiableBeta)));
        assert!(ok.is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Prediction requires a fit; afterwards forecasts have shape (N, H).
    //
    // Given
    // -----
    // - A fresh model, then the same model fitted on simulated counts.
    //
    // Expect
    // ------
    // - `ModelNotFitted` before; a (3, 4) non-negative forecast after.
    fn prediction_requires_fit() {
        // Arrange
        let y = simulated_counts(31, 40);
        let kernel = discrete_exponential_kernel(3, 0.7, true).expect("valid kernel");
        let mut model =
            RoadHawkesModel::latent(network(), kernel, FitFamily::Poisson, short_fit_options())
                .expect("valid model");

        // Act
        let before = model.forecast(&y, 4);
        model.fit(&y).expect("fit succeeds");
        let after = model.forecast(&y, 4).expect("fitted forecast");

        // Assert
        assert_eq!(before, Err(HawkesError::ModelNotFitted));
        assert_eq!(after.dim(), (3, 4));
        assert!(after.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
