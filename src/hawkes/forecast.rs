//! Forecasting for road-constrained Hawkes models.
//!
//! Purpose
//! -------
//! Produce point and probabilistic forecasts from a history of counts: the
//! in-sample intensity path, a deterministic mean-field roll-forward, seeded
//! Monte-Carlo predictive paths, and summaries of path ensembles.
//!
//! Key behaviors
//! -------------
//! - [`predict_intensity_in_sample`]: the intensity at every observed step.
//! - [`forecast_intensity_horizon`]: iterate the one-step forecast,
//!   appending each predicted intensity as the proxy count.
//! - [`sample_predictive_paths`]: latent Monte-Carlo paths plus the
//!   observation model. Path `p` is seeded with
//!   `seed.wrapping_add(p * 1_000_003)`, so the ensemble does not depend on
//!   execution order. With the `parallel` feature paths are fanned out with
//!   rayon.
//! - [`sample_observed_paths_poisson_approx`]: observed-only paths drawn from
//!   `Poisson(p λ + fr)`, rolled forward with the expected observed count.
//! - [`summarize_paths`]: per-(cell, step) mean and linear-interpolation
//!   quantiles over the path axis.
//!
//! Invariants & assumptions
//! ------------------------
//! - `horizon >= 1`, `n_paths >= 1`, quantile levels in `[0, 1]`.
//! - History rows equal the model's cell count.
//!
//! Conventions
//! -----------
//! - Path ensembles are `(n_paths, n_cells, horizon)`; quantile arrays are
//!   `(len(q), n_cells, horizon)`.
//! - Quantiles use `h = (n - 1) q` with linear interpolation between order
//!   statistics.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the `α = 0` reduction, reproducibility per seed,
//!   observed-path shapes, quantile interpolation, and input validation.
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis, s};
use rand::{SeedableRng, rngs::StdRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::hawkes::{
    core::{
        data::CountSeries,
        intensity::{IntensityModel, intensity_matrix, intensity_step},
        options::{ForecastOptions, validate_horizon, validate_n_paths, validate_quantiles},
        params::{CountFamily, validate_false_rate, validate_p_detect},
    },
    errors::{HawkesError, HawkesResult},
    simulate::{draw_latent_count, draw_observed_count, draw_poisson},
};

/// Seed stride between consecutive Monte-Carlo paths.
pub const PATH_SEED_STRIDE: u64 = 1_000_003;

/// Latent and observed Monte-Carlo paths with their intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictivePaths {
    pub y_true: Array3<u64>,
    pub y_obs: Array3<u64>,
    pub intensity: Array3<f64>,
}

/// Observed-only Monte-Carlo paths under the Poisson approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPaths {
    pub y_obs: Array3<u64>,
    pub intensity_obs: Array3<f64>,
}

/// Mean and quantiles of a path ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSummary {
    pub mean: Array2<f64>,
    pub quantiles: Array3<f64>,
    pub q: Vec<f64>,
}

pub fn predict_intensity_in_sample(
    model: &IntensityModel<'_>, y: &CountSeries,
) -> HawkesResult<Array2<f64>> {
    y.ensure_cells(model.n_cells())?;
    intensity_matrix(model, y.to_f64().view())
}

/// Deterministic mean-field roll-forward over `horizon` steps.
pub fn forecast_intensity_horizon(
    model: &IntensityModel<'_>, y_history: &CountSeries, horizon: usize,
) -> HawkesResult<Array2<f64>> {
    validate_horizon(horizon)?;
    y_history.ensure_cells(model.n_cells())?;
    let t0 = y_history.n_steps();
    let mut extended = extend_history(&y_history.to_f64(), horizon);
    let mut out = Array2::zeros((model.n_cells(), horizon));
    for k in 0..horizon {
        let lam = intensity_step(model, extended.view(), t0 + k)?;
        extended.column_mut(t0 + k).assign(&lam);
        out.column_mut(k).assign(&lam);
    }
    Ok(out)
}

/// Monte-Carlo latent paths with the observation model applied per step.
///
/// # Errors
/// - [`HawkesError::InvalidHorizon`] / [`HawkesError::InvalidPathCount`].
/// - [`HawkesError::CellCountMismatch`] for a history with the wrong rows.
/// - [`HawkesError::Param`] for an invalid observation model or family.
pub fn sample_predictive_paths(
    model: &IntensityModel<'_>, y_history: &CountSeries, family: CountFamily, p_detect: f64,
    false_rate: f64, opts: &ForecastOptions,
) -> HawkesResult<PredictivePaths> {
    validate_horizon(opts.horizon)?;
    validate_n_paths(opts.n_paths)?;
    validate_p_detect(p_detect)?;
    validate_false_rate(false_rate)?;
    family.validate()?;
    y_history.ensure_cells(model.n_cells())?;

    let history = y_history.to_f64();
    let run = |p: usize| {
        let seed = path_seed(opts.seed, p);
        latent_path(model, &history, family, p_detect, false_rate, opts.horizon, seed)
    };
    #[cfg(feature = "parallel")]
    let paths: Vec<PathDraw> =
        (0..opts.n_paths).into_par_iter().map(run).collect::<HawkesResult<_>>()?;
    #[cfg(not(feature = "parallel"))]
    let paths: Vec<PathDraw> = (0..opts.n_paths).map(run).collect::<HawkesResult<_>>()?;

    let shape = (opts.n_paths, model.n_cells(), opts.horizon);
    let mut out = PredictivePaths {
        y_true: Array3::zeros(shape),
        y_obs: Array3::zeros(shape),
        intensity: Array3::zeros(shape),
    };
    for (p, draw) in paths.into_iter().enumerate() {
        out.y_true.index_axis_mut(Axis(0), p).assign(&draw.y_true);
        out.y_obs.index_axis_mut(Axis(0), p).assign(&draw.y_obs);
        out.intensity.index_axis_mut(Axis(0), p).assign(&draw.intensity);
    }
    Ok(out)
}

/// Monte-Carlo observed paths: `y_obs ~ Poisson(p λ + fr)`.
///
/// The history is driven by `y_history` (typically the observed series) and
/// extended with the expected observed count, not the draw.
pub fn sample_observed_paths_poisson_approx(
    model: &IntensityModel<'_>, y_history: &CountSeries, p_detect: f64, false_rate: f64,
    opts: &ForecastOptions,
) -> HawkesResult<ObservedPaths> {
    validate_horizon(opts.horizon)?;
    validate_n_paths(opts.n_paths)?;
    validate_p_detect(p_detect)?;
    validate_false_rate(false_rate)?;
    y_history.ensure_cells(model.n_cells())?;

    let n_cells = model.n_cells();
    let t0 = y_history.n_steps();
    let shape = (opts.n_paths, n_cells, opts.horizon);
    let mut y_obs = Array3::zeros(shape);
    let mut intensity_obs = Array3::zeros(shape);
    let base = y_history.to_f64();

    for p in 0..opts.n_paths {
        let mut rng = StdRng::seed_from_u64(path_seed(opts.seed, p));
        let mut extended = extend_history(&base, opts.horizon);
        for k in 0..opts.horizon {
            let lam = intensity_step(model, extended.view(), t0 + k)?;
            let lam_obs = lam.mapv(|l| (p_detect * l + false_rate).max(0.0));
            for i in 0..n_cells {
                y_obs[[p, i, k]] = draw_poisson(&mut rng, lam_obs[i])?;
            }
            intensity_obs.slice_mut(s![p, .., k]).assign(&lam_obs);
            extended.column_mut(t0 + k).assign(&lam_obs);
        }
    }
    Ok(ObservedPaths { y_obs, intensity_obs })
}

/// Mean and linear-interpolation quantiles over the path axis.
///
/// # Errors
/// - [`HawkesError::InvalidPathCount`] for an empty ensemble.
/// - [`HawkesError::InvalidQuantile`] for a level outside `[0, 1]`.
pub fn summarize_paths(paths: ArrayView3<'_, f64>, q: &[f64]) -> HawkesResult<PathSummary> {
    let (n_paths, n_cells, horizon) = paths.dim();
    validate_n_paths(n_paths)?;
    validate_quantiles(q)?;

    let mean = paths.mean_axis(Axis(0)).ok_or(HawkesError::InvalidPathCount { n_paths })?;
    let mut quantiles = Array3::zeros((q.len(), n_cells, horizon));
    let mut column = Vec::with_capacity(n_paths);
    for i in 0..n_cells {
        for k in 0..horizon {
            column.clear();
            column.extend(paths.slice(s![.., i, k]).iter().copied());
            column.sort_by(f64::total_cmp);
            for (j, &level) in q.iter().enumerate() {
                quantiles[[j, i, k]] = quantile_sorted(&column, level);
            }
        }
    }
    Ok(PathSummary { mean, quantiles, q: q.to_vec() })
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
pub fn quantile_sorted(sorted: &[f64], level: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * level;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

// ---- Helpers ----

struct PathDraw {
    y_true: Array2<u64>,
    y_obs: Array2<u64>,
    intensity: Array2<f64>,
}

fn path_seed(seed: u64, path: usize) -> u64 {
    seed.wrapping_add((path as u64).wrapping_mul(PATH_SEED_STRIDE))
}

// History with `horizon` zero columns appended; step `t0 + k` only reads
// columns before it.
fn extend_history(history: &Array2<f64>, horizon: usize) -> Array2<f64> {
    let (n_cells, t0) = history.dim();
    let mut extended = Array2::zeros((n_cells, t0 + horizon));
    extended.slice_mut(s![.., ..t0]).assign(history);
    extended
}

fn latent_path(
    model: &IntensityModel<'_>, history: &Array2<f64>, family: CountFamily, p_detect: f64,
    false_rate: f64, horizon: usize, seed: u64,
) -> HawkesResult<PathDraw> {
    let n_cells = model.n_cells();
    let t0 = history.ncols();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut extended = extend_history(history, horizon);
    let mut draw = PathDraw {
        y_true: Array2::zeros((n_cells, horizon)),
        y_obs: Array2::zeros((n_cells, horizon)),
        intensity: Array2::zeros((n_cells, horizon)),
    };
    for k in 0..horizon {
        let lam: Array1<f64> = intensity_step(model, extended.view(), t0 + k)?;
        for i in 0..n_cells {
            let latent = draw_latent_count(&mut rng, lam[i], family)?;
            draw.y_true[[i, k]] = latent;
            draw.y_obs[[i, k]] = draw_observed_count(&mut rng, latent, p_detect, false_rate)?;
            extended[[i, t0 + k]] = latent as f64;
        }
        draw.intensity.column_mut(k).assign(&lam);
    }
    Ok(draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hawkes::core::{
        backend::SparseBackend,
        kernel::TemporalKernel,
        spatial::{CsrMatrix, spatial_weights},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Mean-field roll-forward (alpha = 0 reduction, hand-computed step).
    // - Seeded Monte-Carlo paths (reproducibility, shapes, nonnegativity).
    // - Observed-path sampling and ensemble summaries.
    // - Validation of horizon, path counts, and quantile levels.
    //
    // They intentionally DO NOT cover:
    // - Calibration of predictive intervals (see the integration tests).
    // -------------------------------------------------------------------------

    fn two_cell_weights() -> CsrMatrix {
        let tt = CsrMatrix::from_dense(&array![[0.0, 10.0], [10.0, 0.0]]);
        spatial_weights(&tt, 0.1).expect("valid weights")
    }

    fn history() -> CountSeries {
        CountSeries::new(array![[1u64, 0, 2, 1], [0, 3, 1, 0]]).expect("valid series")
    }

    #[test]
    // Purpose
    // -------
    // With alpha = 0 the multi-step forecast is mu at every step.
    //
    // Given
    // -----
    // - Two cells, mu = [0.25, 0.75], alpha = 0, horizon 5.
    //
    // Expect
    // ------
    // - Every column equals mu exactly.
    fn zero_alpha_forecast_equals_mu() {
        // Arrange
        let w = two_cell_weights();
        let kernel = TemporalKernel::new(array![0.6, 0.2]).expect("valid kernel");
        let mu = array![0.25, 0.75];
        let model = IntensityModel::new(&w, &SparseBackend, mu.view(), 0.0, &kernel).expect("ok");

        // Act
        let fc = forecast_intensity_horizon(&model, &history(), 5).expect("valid forecast");

        // Assert
        assert_eq!(fc.dim(), (2, 5));
        for k in 0..5 {
            assert_eq!(fc.column(k), mu);
        }
    }

    #[test]
    // Purpose
    // -------
    // The second forecast step feeds the first predicted intensity back as
    // the proxy count.
    //
    // Given
    // -----
    // - One cell, kernel [1.0], mu = 0.5, alpha = 0.5, history [2].
    //
    // Expect
    // ------
    // - λ₁ = 0.5 + 0.5 * 2 = 1.5; λ₂ = 0.5 + 0.5 * 1.5 = 1.25.
    fn mean_field_roll_forward_feeds_back_intensity() {
        // Arrange
        let tt = CsrMatrix::from_dense(&array![[0.0]]);
        let w = spatial_weights(&tt, 1.0).expect("valid weights");
        let kernel = TemporalKernel::new(array![1.0]).expect("valid kernel");
        let mu = array![0.5];
        let model = IntensityModel::new(&w, &SparseBackend, mu.view(), 0.5, &kernel).expect("ok");
        let y = CountSeries::new(array![[2u64]]).expect("valid series");

        // Act
        let fc = forecast_intensity_horizon(&model, &y, 2).expect("valid forecast");

        // Assert
        assert_relative_eq!(fc[[0, 0]], 1.5, epsilon = 1e-12);
        assert_relative_eq!(fc[[0, 1]], 1.25, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Predictive paths are reproducible per seed and well-formed.
    //
    // Given
    // -----
    // - 30 paths, horizon 4, p = 0.8, fr = 0.1, seed 9 (twice) and seed 10.
    //
    // Expect
    // ------
    // - Identical ensembles for equal seeds; a different one for seed 10.
    // - Shapes (30, 2, 4); intensities finite and >= mu.
    fn predictive_paths_are_reproducible() {
        // Arrange
        let w = two_cell_weights();
        let kernel = TemporalKernel::new(array![0.6, 0.2]).expect("valid kernel");
        let mu = array![0.25, 0.75];
        let model = IntensityModel::new(&w, &SparseBackend, mu.view(), 0.4, &kernel).expect("ok");
        let opts = ForecastOptions::new(4, 30, 9, vec![0.1, 0.9]).expect("valid options");
        let other = ForecastOptions { seed: 10, ..opts.clone() };

        // Act
        let a = sample_predictive_paths(&model, &history(), CountFamily::Poisson, 0.8, 0.1, &opts)
            .expect("samples");
        let b = sample_predictive_paths(&model, &history(), CountFamily::Poisson, 0.8, 0.1, &opts)
            .expect("samples");
        let c =
            sample_predictive_paths(&model, &history(), CountFamily::Poisson, 0.8, 0.1, &other)
                .expect("samples");

        // Assert
        assert_eq!(a, b);
        assert_ne!(a.y_true, c.y_true);
        assert_eq!(a.y_true.dim(), (30, 2, 4));
        for p in 0..30 {
            for k in 0..4 {
                assert!(a.intensity[[p, 0, k]] >= 0.25 && a.intensity[[p, 0, k]].is_finite());
                assert!(a.intensity[[p, 1, k]] >= 0.75 && a.intensity[[p, 1, k]].is_finite());
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Observed Poisson-approx paths share one deterministic intensity path.
    //
    // Given
    // -----
    // - 10 paths, horizon 3, p = 0.5, fr = 0.2.
    //
    // Expect
    // ------
    // - intensity_obs identical across paths; first step equals
    //   0.5 * λ₁ + 0.2 where λ₁ is the one-step latent forecast.
    fn observed_paths_roll_forward_expected_counts() {
        // Arrange
        let w = two_cell_weights();
        let kernel = TemporalKernel::new(array![0.6, 0.2]).expect("valid kernel");
        let mu = array![0.25, 0.75];
        let model = IntensityModel::new(&w, &SparseBackend, mu.view(), 0.4, &kernel).expect("ok");
        let opts = ForecastOptions::new(3, 10, 1, vec![0.5]).expect("valid options");
        let y = history();

        // Act
        let paths =
            sample_observed_paths_poisson_approx(&model, &y, 0.5, 0.2, &opts).expect("samples");
        let lam1 = forecast_intensity_horizon(&model, &y, 1).expect("valid forecast");

        // Assert
        assert_eq!(paths.y_obs.dim(), (10, 2, 3));
        for p in 1..10 {
            assert_eq!(
                paths.intensity_obs.index_axis(Axis(0), p),
                paths.intensity_obs.index_axis(Axis(0), 0)
            );
        }
        assert_relative_eq!(
            paths.intensity_obs[[0, 0, 0]],
            0.5 * lam1[[0, 0]] + 0.2,
            epsilon = 1e-12
        );
    }

    #[test]
    // Purpose
    // -------
    // Quantiles interpolate linearly between order statistics.
    //
    // Given
    // -----
    // - Five paths with values 4, 0, 3, 1, 2 in a single (cell, step) slot.
    // - q = [0, 0.3, 0.5, 1].
    //
    // Expect
    // ------
    // - mean 2; quantiles 0, 1.2, 2, 4.
    fn summarize_uses_linear_quantiles() {
        // Arrange
        let paths = Array3::from_shape_vec((5, 1, 1), vec![4.0, 0.0, 3.0, 1.0, 2.0])
            .expect("valid shape");

        // Act
        let summary = summarize_paths(paths.view(), &[0.0, 0.3, 0.5, 1.0]).expect("valid q");

        // Assert
        assert_relative_eq!(summary.mean[[0, 0]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[[0, 0, 0]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[[1, 0, 0]], 1.2, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[[2, 0, 0]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[[3, 0, 0]], 4.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Invalid forecast inputs fail before any sampling.
    //
    // Given
    // -----
    // - horizon 0 for the roll-forward; an empty ensemble; q = [-0.1].
    //
    // Expect
    // ------
    // - `InvalidHorizon`, `InvalidPathCount`, `InvalidQuantile`.
    fn forecast_inputs_are_validated() {
        // Arrange
        let w = two_cell_weights();
        let kernel = TemporalKernel::new(array![1.0]).expect("valid kernel");
        let mu = array![0.1, 0.1];
        let model = IntensityModel::new(&w, &SparseBackend, mu.view(), 0.1, &kernel).expect("ok");
        let empty = Array3::<f64>::zeros((0, 2, 3));
        let some = Array3::<f64>::zeros((4, 2, 3));

        // Act / Assert
        assert_eq!(
            forecast_intensity_horizon(&model, &history(), 0),
            Err(HawkesError::InvalidHorizon { horizon: 0 })
        );
        assert_eq!(
            summarize_paths(empty.view(), &[0.5]),
            Err(HawkesError::InvalidPathCount { n_paths: 0 })
        );
        assert_eq!(
            summarize_paths(some.view(), &[-0.1]),
            Err(HawkesError::InvalidQuantile { value: -0.1 })
        );
    }
}
