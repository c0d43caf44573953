//! Model-space parameters for road-constrained Hawkes count processes.
//!
//! ## What this module defines
//! - [`HawkesParams`]: validated `(μ, α, β, kernel)` plus the observation
//!   model `(p_detect, false_rate)` and an optional NB2 dispersion.
//! - [`CountFamily`]: the latent count distribution (Poisson or NB2).
//! - Scalar validators shared by constructors, fits, and the optimizer layer.
//!
//! ## Invariants validated by constructors
//! - `μ_i >= 0` and finite, one entry per cell
//! - `α >= 0` and finite
//! - `β > 0` and finite
//! - `p_detect ∈ (0, 1]`, `false_rate >= 0`
//! - `dispersion > 0` when present
//!
//! Parameters are immutable after construction; fitting produces a new set.
//!
//! ## JSON
//! [`HawkesParams::to_json`] / [`HawkesParams::from_json`] round-trip through
//! a flat record with plain lists. Missing `p_detect` / `false_rate` default
//! to `1` / `0`.
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::hawkes::{
    core::kernel::TemporalKernel,
    errors::{HawkesResult, ParamError, ParamResult},
};

/// Latent count distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum CountFamily {
    Poisson,
    /// NB2 with `Var = m + m² / dispersion`.
    NegBin { dispersion: f64 },
}

impl CountFamily {
    /// Check that an NB2 dispersion is finite and positive.
    pub fn validate(&self) -> ParamResult<()> {
        match *self {
            CountFamily::Poisson => Ok(()),
            CountFamily::NegBin { dispersion } => validate_dispersion(dispersion),
        }
    }

    pub fn dispersion(&self) -> Option<f64> {
        match *self {
            CountFamily::Poisson => None,
            CountFamily::NegBin { dispersion } => Some(dispersion),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CountFamily::Poisson => "poisson",
            CountFamily::NegBin { .. } => "negbin",
        }
    }
}

impl Default for CountFamily {
    fn default() -> Self {
        CountFamily::Poisson
    }
}

/// Validated parameters of a road-constrained Hawkes model.
#[derive(Debug, Clone, PartialEq)]
pub struct HawkesParams {
    mu: Array1<f64>,
    alpha: f64,
    beta: f64,
    kernel: TemporalKernel,
    p_detect: f64,
    false_rate: f64,
    dispersion: Option<f64>,
}

impl HawkesParams {
    /// Latent-process parameters with a perfect observation model
    /// (`p_detect = 1`, `false_rate = 0`) and Poisson counts.
    pub fn new(
        mu: Array1<f64>, alpha: f64, beta: f64, kernel: TemporalKernel,
    ) -> ParamResult<Self> {
        validate_mu(mu.view())?;
        validate_alpha(alpha)?;
        validate_beta(beta)?;
        Ok(Self { mu, alpha, beta, kernel, p_detect: 1.0, false_rate: 0.0, dispersion: None })
    }

    /// Attach a detection/clutter observation model.
    pub fn with_observation(mut self, p_detect: f64, false_rate: f64) -> ParamResult<Self> {
        validate_p_detect(p_detect)?;
        validate_false_rate(false_rate)?;
        self.p_detect = p_detect;
        self.false_rate = false_rate;
        Ok(self)
    }

    /// Attach an NB2 dispersion.
    pub fn with_dispersion(mut self, dispersion: f64) -> ParamResult<Self> {
        validate_dispersion(dispersion)?;
        self.dispersion = Some(dispersion);
        Ok(self)
    }

    pub fn mu(&self) -> ArrayView1<'_, f64> {
        self.mu.view()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn kernel(&self) -> &TemporalKernel {
        &self.kernel
    }

    pub fn p_detect(&self) -> f64 {
        self.p_detect
    }

    pub fn false_rate(&self) -> f64 {
        self.false_rate
    }

    pub fn dispersion(&self) -> Option<f64> {
        self.dispersion
    }

    pub fn n_cells(&self) -> usize {
        self.mu.len()
    }

    /// Count family implied by the presence of a dispersion.
    pub fn family(&self) -> CountFamily {
        match self.dispersion {
            Some(dispersion) => CountFamily::NegBin { dispersion },
            None => CountFamily::Poisson,
        }
    }

    /// Copy with the latent baseline and excitation replaced.
    pub fn with_latent(&self, mu: Array1<f64>, alpha: f64, beta: f64) -> ParamResult<Self> {
        validate_mu(mu.view())?;
        validate_alpha(alpha)?;
        validate_beta(beta)?;
        Ok(Self { mu, alpha, beta, ..self.clone() })
    }

    /// Copy with a different temporal kernel.
    pub fn with_kernel(&self, kernel: TemporalKernel) -> Self {
        Self { kernel, ..self.clone() }
    }

    pub fn to_json(&self) -> HawkesResult<String> {
        let record = ParamsRecord {
            mu: self.mu.to_vec(),
            alpha: self.alpha,
            beta: self.beta,
            kernel: self.kernel.weights().to_vec(),
            p_detect: self.p_detect,
            false_rate: self.false_rate,
            dispersion: self.dispersion,
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn from_json(text: &str) -> HawkesResult<Self> {
        let record: ParamsRecord = serde_json::from_str(text)?;
        let kernel = TemporalKernel::new(Array1::from(record.kernel))?;
        let mut params =
            HawkesParams::new(Array1::from(record.mu), record.alpha, record.beta, kernel)?
                .with_observation(record.p_detect, record.false_rate)?;
        if let Some(dispersion) = record.dispersion {
            params = params.with_dispersion(dispersion)?;
        }
        Ok(params)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ParamsRecord {
    mu: Vec<f64>,
    alpha: f64,
    beta: f64,
    kernel: Vec<f64>,
    #[serde(default = "default_p_detect")]
    p_detect: f64,
    #[serde(default)]
    false_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dispersion: Option<f64>,
}

fn default_p_detect() -> f64 {
    1.0
}

// ---- Validators ----

pub fn validate_mu(mu: ArrayView1<'_, f64>) -> ParamResult<()> {
    for (index, &value) in mu.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(ParamError::InvalidMu { index, value });
        }
    }
    Ok(())
}

/// Check `mu` values and that there is exactly one per cell.
pub fn validate_mu_for_cells(mu: ArrayView1<'_, f64>, n_cells: usize) -> ParamResult<()> {
    if mu.len() != n_cells {
        return Err(ParamError::MuLengthMismatch { expected: n_cells, actual: mu.len() });
    }
    validate_mu(mu)
}

pub fn validate_alpha(alpha: f64) -> ParamResult<()> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(ParamError::InvalidAlpha { value: alpha });
    }
    Ok(())
}

pub fn validate_beta(beta: f64) -> ParamResult<()> {
    if !beta.is_finite() || beta <= 0.0 {
        return Err(ParamError::InvalidBeta { value: beta });
    }
    Ok(())
}

pub fn validate_p_detect(p_detect: f64) -> ParamResult<()> {
    if !p_detect.is_finite() || p_detect <= 0.0 || p_detect > 1.0 {
        return Err(ParamError::InvalidPDetect { value: p_detect });
    }
    Ok(())
}

pub fn validate_false_rate(false_rate: f64) -> ParamResult<()> {
    if !false_rate.is_finite() || false_rate < 0.0 {
        return Err(ParamError::InvalidFalseRate { value: false_rate });
    }
    Ok(())
}

pub fn validate_dispersion(dispersion: f64) -> ParamResult<()> {
    if !dispersion.is_finite() || dispersion <= 0.0 {
        return Err(ParamError::InvalidDispersion { value: dispersion });
    }
    Ok(())
}
