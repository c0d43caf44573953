//! road_hawkes — road-constrained discrete-time Hawkes count processes.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the Hawkes modeling surface to Python via the `_road_hawkes`
//! extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`hawkes` and `optimization`) as the
//!   public crate surface.
//! - With `python-bindings`, define the `RoadHawkes` class (fit, forecast,
//!   sample paths), its `HawkesOptimOutcome` diagnostics, and an
//!   `evaluate_synthetic` function that takes and returns JSON.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs FFI
//!   glue, input conversion, and error mapping only.
//! - Count matrices cross the boundary as `(n_cells, n_steps)` arrays and
//!   predictive paths as `(n_paths, n_cells, horizon)` arrays.
//!
//! Conventions
//! -----------
//! - Python classes live under `_road_hawkes.models` and functions under
//!   `_road_hawkes.workflows`; both submodules are registered in
//!   `sys.modules` so dotted imports work.
//! - Domain errors surface as `ValueError` through the `From` impls in
//!   `hawkes::errors`.
//!
//! Downstream usage
//! ----------------
//! - Rust code should depend on `hawkes::prelude` and ignore the PyO3 items.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   `tests/integration_road_hawkes_pipeline.rs`.

pub mod hawkes;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray2, PyArray3};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    hawkes::{
        core::{options::ForecastOptions, spatial::SpatialWeighting},
        errors::HawkesError,
        models::{FitResult, FitVariant, RoadHawkesModel},
        workflows::evaluate_synthetic_json,
    },
    optimization::loglik_optimizer::OptimOutcome,
    utils::{
        build_fit_options, build_kernel, extract_counts, extract_travel_time, parse_fit_target,
    },
};

/// RoadHawkes — Python-facing wrapper for [`RoadHawkesModel`].
///
/// Constructed from Python as
/// `RoadHawkes(travel_time, n_lags=3, kernel_beta=1.0, kernel_weights=None,
/// family="poisson", decay="spatial", spatial_beta=None, p_detect=None,
/// false_rate=0.0, ...)`. Supplying `p_detect` selects the observed-count
/// Poisson approximation; otherwise the latent counts are fitted directly.
/// Optimizer keywords (`maxiter`, `tol_grad`, `tol_cost`, `line_searcher`,
/// `lbfgs_mem`) and starting values (`init_alpha`, `init_beta`,
/// `init_dispersion`) map onto `FitOptions`.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "road_hawkes.models", unsendable)]
pub struct RoadHawkes {
    pub inner: RoadHawkesModel,
}

#[cfg(feature = "python-bindings")]
impl RoadHawkes {
    fn fitted(&self) -> PyResult<&FitResult> {
        self.inner.fitted.as_ref().ok_or_else(|| HawkesError::ModelNotFitted.into())
    }
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl RoadHawkes {
    #[new]
    #[pyo3(
        signature = (
            travel_time,
            n_lags = 3,
            kernel_beta = 1.0,
            kernel_weights = None,
            family = "poisson",
            decay = "spatial",
            spatial_beta = None,
            p_detect = None,
            false_rate = 0.0,
            init_alpha = None,
            init_beta = None,
            init_dispersion = None,
            maxiter = None,
            tol_grad = None,
            tol_cost = None,
            line_searcher = None,
            lbfgs_mem = None,
        ),
        text_signature = "(travel_time, /, n_lags=3, kernel_beta=1.0, kernel_weights=None, \
                          family='poisson', decay='spatial', spatial_beta=None, \
                          p_detect=None, false_rate=0.0, init_alpha=None, init_beta=None, \
                          init_dispersion=None, maxiter=None, tol_grad=None, tol_cost=None, \
                          line_searcher=None, lbfgs_mem=None)"
    )]
    pub fn new<'py>(
        py: Python<'py>, travel_time: &Bound<'py, PyAny>, n_lags: usize, kernel_beta: f64,
        kernel_weights: Option<Vec<f64>>, family: &str, decay: &str, spatial_beta: Option<f64>,
        p_detect: Option<f64>, false_rate: f64, init_alpha: Option<f64>, init_beta: Option<f64>,
        init_dispersion: Option<f64>, maxiter: Option<usize>, tol_grad: Option<f64>,
        tol_cost: Option<f64>, line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
    ) -> PyResult<Self> {
        let travel_time = extract_travel_time(py, travel_time)?;
        let kernel = build_kernel(kernel_weights, n_lags, kernel_beta)?;
        let (family, decay) = parse_fit_target(family, decay, kernel.n_lags())?;
        let options = build_fit_options(
            init_alpha,
            init_beta,
            init_dispersion,
            maxiter,
            tol_grad,
            tol_cost,
            line_searcher,
            lbfgs_mem,
        )?;
        let variant = match p_detect {
            Some(p_detect) => FitVariant::ObservedPoissonApprox { p_detect, false_rate, decay },
            None => FitVariant::Latent { family, decay },
        };
        let spatial_beta = spatial_beta.unwrap_or(options.init_beta);
        let inner = RoadHawkesModel::new(
            travel_time,
            SpatialWeighting::ExpDecay,
            kernel,
            spatial_beta,
            variant,
            options,
        )?;
        Ok(RoadHawkes { inner })
    }

    /// Fit on a `(n_cells, n_steps)` count matrix; returns the final ℓ.
    pub fn fit<'py>(&mut self, y: &Bound<'py, PyAny>) -> PyResult<f64> {
        let y = extract_counts(y)?;
        Ok(self.inner.fit(&y)?.loglik)
    }

    /// Mean-field intensity for the next `horizon` steps after `y`.
    pub fn forecast<'py>(
        &self, py: Python<'py>, y: &Bound<'py, PyAny>, horizon: usize,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let y = extract_counts(y)?;
        Ok(self.inner.forecast(&y, horizon)?.into_pyarray(py))
    }

    /// One-step-ahead in-sample intensity for `y`.
    pub fn predict_in_sample<'py>(
        &self, py: Python<'py>, y: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let y = extract_counts(y)?;
        Ok(self.inner.predict_in_sample(&y)?.into_pyarray(py))
    }

    /// Monte-Carlo `(y_true, y_obs, intensity)` paths after `y`.
    #[pyo3(signature = (y, horizon, n_paths = 200, seed = 0))]
    pub fn sample_paths<'py>(
        &self, py: Python<'py>, y: &Bound<'py, PyAny>, horizon: usize, n_paths: usize, seed: u64,
    ) -> PyResult<(
        Bound<'py, PyArray3<u64>>,
        Bound<'py, PyArray3<u64>>,
        Bound<'py, PyArray3<f64>>,
    )> {
        let y = extract_counts(y)?;
        let opts = ForecastOptions::new(horizon, n_paths, seed, ForecastOptions::default().q)?;
        let paths = self.inner.sample_paths(&y, &opts)?;
        Ok((
            paths.y_true.into_pyarray(py),
            paths.y_obs.into_pyarray(py),
            paths.intensity.into_pyarray(py),
        ))
    }

    #[getter]
    pub fn mu(&self) -> PyResult<Vec<f64>> {
        Ok(self.fitted()?.mu.to_vec())
    }

    #[getter]
    pub fn alpha(&self) -> PyResult<f64> {
        Ok(self.fitted()?.alpha)
    }

    #[getter]
    pub fn beta(&self) -> PyResult<f64> {
        Ok(self.fitted()?.beta)
    }

    #[getter]
    pub fn spatial_beta(&self) -> PyResult<f64> {
        Ok(self.fitted()?.spatial_beta)
    }

    #[getter]
    pub fn dispersion(&self) -> PyResult<Option<f64>> {
        Ok(self.fitted()?.dispersion)
    }

    #[getter]
    pub fn kernel_weights(&self) -> PyResult<Vec<f64>> {
        Ok(self.fitted()?.kernel.weights().to_vec())
    }

    #[getter]
    pub fn loglik(&self) -> PyResult<f64> {
        Ok(self.fitted()?.loglik)
    }

    #[getter]
    pub fn loglik_init(&self) -> PyResult<f64> {
        Ok(self.fitted()?.loglik_init)
    }

    #[getter]
    pub fn used_fallback(&self) -> PyResult<bool> {
        Ok(self.fitted()?.used_fallback)
    }

    #[getter]
    pub fn results(&self) -> PyResult<HawkesOptimOutcome> {
        match &self.inner.results {
            Some(outcome) => Ok(HawkesOptimOutcome { inner: outcome.clone() }),
            None => Err(HawkesError::ModelNotFitted.into()),
        }
    }
}

/// HawkesOptimOutcome — read-only optimizer diagnostics from the last fit.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "road_hawkes.models")]
pub struct HawkesOptimOutcome {
    pub inner: OptimOutcome,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl HawkesOptimOutcome {
    #[getter]
    pub fn theta_hat(&self) -> Vec<f64> {
        self.inner.theta_hat.to_vec()
    }

    #[getter]
    pub fn value(&self) -> f64 {
        self.inner.value
    }

    #[getter]
    pub fn converged(&self) -> bool {
        self.inner.converged
    }

    #[getter]
    pub fn status(&self) -> String {
        self.inner.status.clone()
    }

    #[getter]
    pub fn iterations(&self) -> usize {
        self.inner.iterations
    }

    #[getter]
    pub fn grad_norm(&self) -> Option<f64> {
        self.inner.grad_norm
    }

    #[getter]
    pub fn fn_evals(&self) -> Vec<(String, u64)> {
        self.inner.fn_evals.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }
}

/// Run the synthetic simulate, fit, forecast, and score pipeline.
///
/// Takes an `EvalConfig` as JSON (missing fields use defaults; `None` means
/// all defaults) and returns the `EvalRecord` as JSON.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (config_json = None))]
pub fn evaluate_synthetic(config_json: Option<&str>) -> PyResult<String> {
    Ok(evaluate_synthetic_json(config_json.unwrap_or("{}"))?)
}

/// _road_hawkes — PyO3 module initializer for the Python extension.
///
/// Creates the `models` and `workflows` submodules, attaches them to the
/// parent module, and registers them in `sys.modules` under
/// `road_hawkes.<name>` so dotted imports resolve.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _road_hawkes<'py>(py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let models_mod = PyModule::new(py, "models")?;
    let workflows_mod = PyModule::new(py, "workflows")?;
    models(m, &models_mod)?;
    workflows(m, &workflows_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    let sys_modules = py.import("sys")?.getattr("modules")?;
    sys_modules.set_item("road_hawkes.models", models_mod)?;
    sys_modules.set_item("road_hawkes.workflows", workflows_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn models<'py>(parent: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<RoadHawkes>()?;
    m.add_class::<HawkesOptimOutcome>()?;
    parent.add_submodule(m)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn workflows<'py>(parent: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(evaluate_synthetic, m)?)?;
    parent.add_submodule(m)?;
    Ok(())
}
