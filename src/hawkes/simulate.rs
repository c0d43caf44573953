//! Seeded simulation of road-constrained Hawkes count series.
//!
//! Purpose
//! -------
//! Generate latent and observed count series from the intensity recursion,
//! with every random draw taken from one explicitly seeded generator.
//!
//! Key behaviors
//! -------------
//! - [`simulate`] steps forward in time: intensity, latent draw (Poisson or
//!   NB2 as a Gamma-Poisson mixture), then the observation model (Binomial
//!   thinning plus Poisson clutter).
//! - [`simulate_on_network`] builds `W` from travel times and `β` first.
//! - [`draw_latent_count`] and [`draw_observed_count`] are shared with the
//!   Monte-Carlo forecaster so both paths use identical sampling rules.
//!
//! Invariants & assumptions
//! ------------------------
//! - A zero intensity draws zero without touching the distribution
//!   constructors (which reject a zero rate).
//! - Thinning is skipped when `p_detect = 1`; clutter is skipped when
//!   `false_rate = 0`. The generator therefore advances differently under
//!   degenerate observation models, but is still deterministic per seed.
//!
//! Conventions
//! -----------
//! - Outputs are `(n_cells, n_steps)`; column `t` of `intensity` is the rate
//!   that generated column `t` of `y_true`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover reproducibility, perfect observation, the zero-rate
//!   draw, NB2 mean sanity, and configuration errors.
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Binomial, Distribution, Gamma, Poisson};

use crate::hawkes::{
    core::{
        backend::{NumericBackend, default_backend},
        data::CountSeries,
        intensity::{IntensityModel, intensity_step},
        options::SimOptions,
        params::{CountFamily, HawkesParams},
        spatial::{CsrMatrix, spatial_weights},
    },
    errors::HawkesResult,
};

/// Latent counts, observed counts, and the generating intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub y_true: CountSeries,
    pub y_obs: CountSeries,
    pub intensity: Array2<f64>,
}

/// Simulate `opts.n_steps` steps on a prebuilt weight matrix.
///
/// # Errors
/// - [`HawkesError::Param`](crate::hawkes::errors::HawkesError::Param) if
///   `mu` does not match `W` or a family parameter is invalid.
/// - [`HawkesError::InvalidDistribution`](crate::hawkes::errors::HawkesError::InvalidDistribution)
///   if a sampler rejects its parameters.
pub fn simulate(
    weights: &CsrMatrix, backend: &dyn NumericBackend, params: &HawkesParams, opts: &SimOptions,
) -> HawkesResult<SimulationOutput> {
    opts.family.validate()?;
    let model =
        IntensityModel::new(weights, backend, params.mu(), params.alpha(), params.kernel())?;
    let n_cells = model.n_cells();
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut history = Array2::<f64>::zeros((n_cells, opts.n_steps));
    let mut y_true = Array2::<u64>::zeros((n_cells, opts.n_steps));
    let mut y_obs = Array2::<u64>::zeros((n_cells, opts.n_steps));
    let mut intensity = Array2::<f64>::zeros((n_cells, opts.n_steps));

    for t in 0..opts.n_steps {
        let lam = intensity_step(&model, history.view(), t)?;
        for i in 0..n_cells {
            let latent = draw_latent_count(&mut rng, lam[i], opts.family)?;
            y_true[[i, t]] = latent;
            history[[i, t]] = latent as f64;
            y_obs[[i, t]] =
                draw_observed_count(&mut rng, latent, params.p_detect(), params.false_rate())?;
        }
        intensity.column_mut(t).assign(&lam);
    }

    Ok(SimulationOutput {
        y_true: CountSeries::new(y_true)?,
        y_obs: CountSeries::new(y_obs)?,
        intensity,
    })
}

/// Build `W` from travel times and `params.beta()`, then [`simulate`] with
/// the default backend.
pub fn simulate_on_network(
    travel_time: &CsrMatrix, params: &HawkesParams, opts: &SimOptions,
) -> HawkesResult<SimulationOutput> {
    let weights = spatial_weights(travel_time, params.beta())?;
    let backend = default_backend(weights.rows);
    simulate(&weights, backend.as_ref(), params, opts)
}

/// One latent count at rate `lam`.
pub fn draw_latent_count<R: Rng + ?Sized>(
    rng: &mut R, lam: f64, family: CountFamily,
) -> HawkesResult<u64> {
    if lam <= 0.0 {
        return Ok(0);
    }
    let rate = match family {
        CountFamily::Poisson => lam,
        CountFamily::NegBin { dispersion } => {
            let g = Gamma::new(dispersion, lam / dispersion)?.sample(rng);
            if g <= 0.0 {
                return Ok(0);
            }
            g
        }
    };
    draw_poisson(rng, rate)
}

/// Observed count for a latent count under thinning and clutter.
pub fn draw_observed_count<R: Rng + ?Sized>(
    rng: &mut R, latent: u64, p_detect: f64, false_rate: f64,
) -> HawkesResult<u64> {
    let detected = if p_detect >= 1.0 || latent == 0 {
        latent
    } else {
        Binomial::new(latent, p_detect)?.sample(rng)
    };
    let clutter = if false_rate > 0.0 { draw_poisson(rng, false_rate)? } else { 0 };
    Ok(detected + clutter)
}

pub(crate) fn draw_poisson<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> HawkesResult<u64> {
    if rate <= 0.0 {
        return Ok(0);
    }
    let x: f64 = Poisson::new(rate)?.sample(rng);
    Ok(x as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hawkes::{core::kernel::discrete_exponential_kernel, errors::HawkesError};
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Seed reproducibility and output shapes.
    // - Perfect observation (y_obs == y_true).
    // - Zero-rate draws and the NB2 sample mean.
    // - Configuration errors.
    //
    // They intentionally DO NOT cover:
    // - Distributional goodness-of-fit of the samplers.
    // -------------------------------------------------------------------------

    fn three_cell_network() -> CsrMatrix {
        CsrMatrix::from_dense(&array![[0.0, 60.0, 120.0], [60.0, 0.0, 60.0], [120.0, 60.0, 0.0]])
    }

    fn base_params() -> HawkesParams {
        let kernel = discrete_exponential_kernel(4, 0.5, true).expect("valid kernel");
        HawkesParams::new(array![0.4, 0.2, 0.6], 0.3, 0.01, kernel).expect("valid params")
    }

    #[test]
    // Purpose
    // -------
    // Equal seeds give bit-identical output; different seeds differ.
    //
    // Given
    // -----
    // - A 3-cell network, 50 steps, thinning p = 0.7 and clutter fr = 0.2.
    //
    // Expect
    // ------
    // - Runs with seed 11 are equal; seed 12 differs somewhere.
    // - All shapes are (3, 50) and intensities are finite and >= 0.
    fn simulation_is_reproducible_per_seed() {
        // Arrange
        let tt = three_cell_network();
        let params = base_params().with_observation(0.7, 0.2).expect("valid observation");
        let a_opts = SimOptions::poisson(11, 50).expect("valid options");
        let b_opts = SimOptions::poisson(12, 50).expect("valid options");

        // Act
        let a1 = simulate_on_network(&tt, &params, &a_opts).expect("simulates");
        let a2 = simulate_on_network(&tt, &params, &a_opts).expect("simulates");
        let b = simulate_on_network(&tt, &params, &b_opts).expect("simulates");

        // Assert
        assert_eq!(a1, a2);
        assert_ne!(a1.y_true, b.y_true);
        assert_eq!(a1.y_true.view().dim(), (3, 50));
        assert_eq!(a1.intensity.dim(), (3, 50));
        assert!(a1.intensity.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    // Purpose
    // -------
    // A perfect observation model copies latent counts.
    //
    // Given
    // -----
    // - p_detect = 1, false_rate = 0 (the defaults).
    //
    // Expect
    // ------
    // - y_obs == y_true; column 0 of the intensity equals mu.
    fn perfect_observation_copies_latent_counts() {
        // Arrange
        let tt = three_cell_network();
        let params = base_params();
        let opts = SimOptions::poisson(3, 30).expect("valid options");

        // Act
        let out = simulate_on_network(&tt, &params, &opts).expect("simulates");

        // Assert
        assert_eq!(out.y_obs, out.y_true);
        assert_eq!(out.intensity.column(0), params.mu());
    }

    #[test]
    // Purpose
    // -------
    // Zero rates draw zero, and thinning never adds counts without clutter.
    //
    // Given
    // -----
    // - lam = 0 for both families; latent = 5 with p = 0.3 and fr = 0.
    //
    // Expect
    // ------
    // - 0 draws; observed count <= 5.
    fn zero_rate_and_thinning_bounds() {
        // Arrange
        let mut rng = StdRng::seed_from_u64(0);

        // Act
        let p0 = draw_latent_count(&mut rng, 0.0, CountFamily::Poisson).expect("draws");
        let n0 = draw_latent_count(&mut rng, 0.0, CountFamily::NegBin { dispersion: 2.0 })
            .expect("draws");
        let thinned = draw_observed_count(&mut rng, 5, 0.3, 0.0).expect("draws");

        // Assert
        assert_eq!(p0, 0);
        assert_eq!(n0, 0);
        assert!(thinned <= 5);
    }

    #[test]
    // Purpose
    // -------
    // NB2 draws have roughly the requested mean.
    //
    // Given
    // -----
    // - 20_000 draws at lam = 4, dispersion = 2 from a fixed seed.
    //
    // Expect
    // ------
    // - Sample mean within 0.2 of 4.
    fn negbin_draws_have_requested_mean() {
        // Arrange
        let mut rng = StdRng::seed_from_u64(42);
        let family = CountFamily::NegBin { dispersion: 2.0 };
        let n = 20_000;

        // Act
        let total: u64 =
            (0..n).map(|_| draw_latent_count(&mut rng, 4.0, family).expect("draws")).sum();

        // Assert
        let mean = total as f64 / n as f64;
        assert!((mean - 4.0).abs() < 0.2, "sample mean {mean}");
    }

    #[test]
    // Purpose
    // -------
    // Mismatched mu and W is a configuration error.
    //
    // Given
    // -----
    // - 2-cell travel times with 3-cell params.
    //
    // Expect
    // ------
    // - `HawkesError::Param(_)`.
    fn simulate_rejects_cell_mismatch() {
        // Arrange
        let tt = CsrMatrix::from_dense(&array![[0.0, 5.0], [5.0, 0.0]]);
        let opts = SimOptions::poisson(0, 5).expect("valid options");

        // Act
        let result = simulate_on_network(&tt, &base_params(), &opts);

        // Assert
        assert!(matches!(result, Err(HawkesError::Param(_))));
    }
}
