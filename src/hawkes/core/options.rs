//! Hawkes options — configuration for fitting, simulation, and forecasting.
//!
//! Purpose
//! -------
//! Keep the tunable knobs of each workflow in explicit, validated structs so
//! call sites pass a single options value instead of loose arguments.
//!
//! Key behaviors
//! -------------
//! - [`FitOptions`]: starting values for `(α, β, dispersion)`, the iteration
//!   cap, and the optimizer configuration ([`MLEOptions`]).
//! - [`SimOptions`]: RNG seed, number of steps, and latent count family.
//! - [`ForecastOptions`]: horizon, number of Monte-Carlo paths, seed, and
//!   quantile levels.
//!
//! Invariants & assumptions
//! ------------------------
//! - Constructors reject zero horizons, zero path counts, quantiles outside
//!   `[0, 1]`, zero iteration caps, and zero simulation lengths.
//! - `FitOptions::maxiter` overrides `mle_opts.tols.max_iter` when the fit
//!   runs ([`FitOptions::effective_mle_opts`]).
//!
//! Conventions
//! -----------
//! - Defaults: `init_alpha = 0.1`, `init_beta = 1e-3`,
//!   `init_dispersion = 10`, `maxiter = 600`; forecasts use
//!   `q = [0.05, 0.5, 0.95]`.
//!
//! Testing notes
//! -------------
//! - Unit tests check defaults and each constructor rejection.
use crate::{
    hawkes::{
        core::params::CountFamily,
        errors::{HawkesError, HawkesResult},
    },
    optimization::loglik_optimizer::{MLEOptions, Tolerances},
};

/// Default iteration cap for Hawkes fits.
pub const DEFAULT_FIT_MAXITER: usize = 600;

/// Starting values and optimizer settings for a maximum-likelihood fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub init_alpha: f64,
    pub init_beta: f64,
    pub init_dispersion: f64,
    pub maxiter: usize,
    pub mle_opts: MLEOptions,
}

impl FitOptions {
    /// # Errors
    /// - [`HawkesError::InvalidConfig`] when `maxiter == 0` or a starting
    ///   value is not finite.
    pub fn new(
        init_alpha: f64, init_beta: f64, init_dispersion: f64, maxiter: usize,
        mle_opts: MLEOptions,
    ) -> HawkesResult<Self> {
        if maxiter == 0 {
            return Err(HawkesError::InvalidConfig { field: "maxiter", reason: "must be >= 1" });
        }
        for (field, value) in [
            ("init_alpha", init_alpha),
            ("init_beta", init_beta),
            ("init_dispersion", init_dispersion),
        ] {
            if !value.is_finite() {
                return Err(HawkesError::InvalidConfig { field, reason: "must be finite" });
            }
        }
        Ok(Self { init_alpha, init_beta, init_dispersion, maxiter, mle_opts })
    }

    /// Optimizer options with `maxiter` applied as the iteration cap.
    pub fn effective_mle_opts(&self) -> MLEOptions {
        let mut opts = self.mle_opts.clone();
        opts.tols = Tolerances { max_iter: Some(self.maxiter), ..opts.tols };
        opts
    }

    /// Same options with a different starting decay.
    pub fn with_init_beta(&self, init_beta: f64) -> Self {
        Self { init_beta, ..self.clone() }
    }

    pub fn with_maxiter(&self, maxiter: usize) -> HawkesResult<Self> {
        Self::new(
            self.init_alpha,
            self.init_beta,
            self.init_dispersion,
            maxiter,
            self.mle_opts.clone(),
        )
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            init_alpha: 0.1,
            init_beta: 1e-3,
            init_dispersion: 10.0,
            maxiter: DEFAULT_FIT_MAXITER,
            mle_opts: MLEOptions::default(),
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimOptions {
    pub seed: u64,
    pub n_steps: usize,
    pub family: CountFamily,
}

impl SimOptions {
    /// # Errors
    /// - [`HawkesError::InvalidSteps`] if `n_steps == 0`.
    /// - [`HawkesError::Param`] if an NB2 family has a bad dispersion.
    pub fn new(seed: u64, n_steps: usize, family: CountFamily) -> HawkesResult<Self> {
        if n_steps == 0 {
            return Err(HawkesError::InvalidSteps { n_steps, reason: "must be positive" });
        }
        family.validate()?;
        Ok(Self { seed, n_steps, family })
    }

    pub fn poisson(seed: u64, n_steps: usize) -> HawkesResult<Self> {
        Self::new(seed, n_steps, CountFamily::Poisson)
    }
}

/// Forecast configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOptions {
    pub horizon: usize,
    pub n_paths: usize,
    pub seed: u64,
    pub q: Vec<f64>,
}

impl ForecastOptions {
    /// # Errors
    /// - [`HawkesError::InvalidHorizon`] if `horizon == 0`.
    /// - [`HawkesError::InvalidPathCount`] if `n_paths == 0`.
    /// - [`HawkesError::InvalidQuantile`] for a level outside `[0, 1]`.
    pub fn new(horizon: usize, n_paths: usize, seed: u64, q: Vec<f64>) -> HawkesResult<Self> {
        validate_horizon(horizon)?;
        validate_n_paths(n_paths)?;
        validate_quantiles(&q)?;
        Ok(Self { horizon, n_paths, seed, q })
    }
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self { horizon: 7, n_paths: 200, seed: 0, q: vec![0.05, 0.5, 0.95] }
    }
}

pub fn validate_horizon(horizon: usize) -> HawkesResult<()> {
    if horizon == 0 {
        return Err(HawkesError::InvalidHorizon { horizon });
    }
    Ok(())
}

pub fn validate_n_paths(n_paths: usize) -> HawkesResult<()> {
    if n_paths == 0 {
        return Err(HawkesError::InvalidPathCount { n_paths });
    }
    Ok(())
}

pub fn validate_quantiles(q: &[f64]) -> HawkesResult<()> {
    match q.iter().find(|&&level| !(0.0..=1.0).contains(&level)) {
        Some(&value) => Err(HawkesError::InvalidQuantile { value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Defaults for fit and forecast options.
    // - Constructor rejections.
    // - Iteration-cap override in `effective_mle_opts`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Fit defaults match the documented starting values.
    //
    // Given
    // -----
    // - `FitOptions::default()`.
    //
    // Expect
    // ------
    // - alpha 0.1, beta 1e-3, dispersion 10, maxiter 600.
    fn fit_defaults_match_documented_values() {
        // Arrange / Act
        let opts = FitOptions::default();

        // Assert
        assert_eq!(opts.init_alpha, 0.1);
        assert_eq!(opts.init_beta, 1e-3);
        assert_eq!(opts.init_dispersion, 10.0);
        assert_eq!(opts.maxiter, DEFAULT_FIT_MAXITER);
    }

    #[test]
    // Purpose
    // -------
    // `maxiter` replaces the optimizer's own iteration cap.
    //
    // Given
    // -----
    // - Default options with maxiter = 42.
    //
    // Expect
    // ------
    // - `effective_mle_opts().tols.max_iter == Some(42)`.
    fn effective_mle_opts_applies_maxiter() {
        // Arrange
        let opts = FitOptions::default().with_maxiter(42).expect("valid maxiter");

        // Act
        let mle = opts.effective_mle_opts();

        // Assert
        assert_eq!(mle.tols.max_iter, Some(42));
    }

    #[test]
    // Purpose
    // -------
    // Invalid forecast and simulation settings are rejected.
    //
    // Given
    // -----
    // - horizon 0, n_paths 0, q containing 1.5, n_steps 0, NB2 with
    //   dispersion -1.
    //
    // Expect
    // ------
    // - The dedicated error for each case.
    fn constructors_reject_invalid_settings() {
        // Arrange / Act / Assert
        assert_eq!(
            ForecastOptions::new(0, 10, 0, vec![0.5]),
            Err(HawkesError::InvalidHorizon { horizon: 0 })
        );
        assert_eq!(
            ForecastOptions::new(3, 0, 0, vec![0.5]),
            Err(HawkesError::InvalidPathCount { n_paths: 0 })
        );
        assert_eq!(
            ForecastOptions::new(3, 10, 0, vec![0.5, 1.5]),
            Err(HawkesError::InvalidQuantile { value: 1.5 })
        );
        assert!(matches!(SimOptions::poisson(0, 0), Err(HawkesError::InvalidSteps { .. })));
        assert!(matches!(
            SimOptions::new(0, 5, CountFamily::NegBin { dispersion: -1.0 }),
            Err(HawkesError::Param(_))
        ));
    }
}
