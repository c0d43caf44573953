//! utils — Python-to-Rust conversion helpers for the PyO3 bindings.
//!
//! Everything here is compiled only with `python-bindings`. The helpers
//! accept the array-likes a Python caller is likely to hold (NumPy arrays,
//! pandas frames via `to_numpy`, nested lists, SciPy CSR matrices) and
//! return validated crate types, mapping every failure to a `PyErr`.
#[cfg(feature = "python-bindings")]
use std::str::FromStr;

#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArrayMethods, PyReadonlyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use crate::{
    hawkes::{
        core::{
            data::CountSeries,
            kernel::{TemporalKernel, discrete_exponential_kernel},
            options::FitOptions,
            spatial::CsrMatrix,
        },
        models::{DecayTarget, FitFamily},
    },
    optimization::{
        errors::OptError,
        loglik_optimizer::{LineSearcher, MLEOptions, Tolerances},
    },
};

#[cfg(feature = "python-bindings")]
fn opt_err(err: OptError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Read a 2-D float array, going through `to_numpy()` or a nested sequence
/// when the object is not already a contiguous `float64` ndarray.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(
    py: Python<'py>, raw: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray2<'py, f64>> {
    if let Ok(arr) = raw.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr);
    }
    if let Ok(obj) = raw.call_method("to_numpy", (), None) {
        if let Ok(arr) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(arr);
        }
    }
    let rows: Vec<Vec<f64>> = raw.extract().map_err(|_| {
        PyTypeError::new_err("expected a 2-D numpy.ndarray, DataFrame, or nested sequence of float")
    })?;
    Ok(rectangular(rows)?.into_pyarray(py).readonly())
}

/// Read a `(n_cells, n_steps)` count matrix. Negative entries are rejected.
#[cfg(feature = "python-bindings")]
pub fn extract_counts<'py>(raw: &Bound<'py, PyAny>) -> PyResult<CountSeries> {
    let signed: Array2<i64> = if let Ok(arr) = raw.extract::<PyReadonlyArray2<i64>>() {
        arr.as_array().to_owned()
    } else if let Ok(arr) = raw.extract::<PyReadonlyArray2<u64>>() {
        return Ok(CountSeries::new(arr.as_array().to_owned())?);
    } else {
        let rows: Vec<Vec<i64>> = raw.extract().map_err(|_| {
            PyTypeError::new_err("counts must be a 2-D integer array of shape (n_cells, n_steps)")
        })?;
        rectangular(rows)?
    };
    if signed.iter().any(|&v| v < 0) {
        return Err(PyValueError::new_err("counts must be non-negative"));
    }
    Ok(CountSeries::new(signed.mapv(|v| v as u64))?)
}

/// Travel times from either a dense square matrix or any object exposing
/// SciPy's CSR attributes (`shape`, `indptr`, `indices`, `data`).
#[cfg(feature = "python-bindings")]
pub fn extract_travel_time<'py>(
    py: Python<'py>, raw: &Bound<'py, PyAny>,
) -> PyResult<CsrMatrix> {
    if raw.hasattr("indptr")? {
        let (rows, cols): (usize, usize) = raw.getattr("shape")?.extract()?;
        let row_ptr: Vec<usize> = raw.getattr("indptr")?.call_method0("tolist")?.extract()?;
        let col_indices: Vec<usize> = raw.getattr("indices")?.call_method0("tolist")?.extract()?;
        let values: Vec<f64> = raw.getattr("data")?.call_method0("tolist")?.extract()?;
        return Ok(CsrMatrix::new(rows, cols, row_ptr, col_indices, values)?);
    }
    let dense = extract_f64_matrix(py, raw)?;
    Ok(CsrMatrix::from_dense(&dense.as_array().to_owned()))
}

/// Temporal kernel from explicit weights, or a normalized discrete
/// exponential with `n_lags` lags and decay `beta`.
#[cfg(feature = "python-bindings")]
pub fn build_kernel(
    weights: Option<Vec<f64>>, n_lags: usize, beta: f64,
) -> PyResult<TemporalKernel> {
    let kernel = match weights {
        Some(w) => TemporalKernel::new(w.into())?,
        None => discrete_exponential_kernel(n_lags, beta, true)?,
    };
    Ok(kernel)
}

/// Parse the `(family, decay)` pair accepted by `RoadHawkes(...)`.
#[cfg(feature = "python-bindings")]
pub fn parse_fit_target(
    family: &str, decay: &str, n_lags: usize,
) -> PyResult<(FitFamily, DecayTarget)> {
    let family = match family.to_lowercase().as_str() {
        "poisson" => FitFamily::Poisson,
        "negbin" | "nb2" | "negative_binomial" => FitFamily::NegBin,
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown family '{other}'; expected 'poisson' or 'negbin'"
            )));
        }
    };
    let decay = match decay.to_lowercase().as_str() {
        "spatial" => DecayTarget::Spatial,
        "temporal" => DecayTarget::Temporal { n_lags },
        "fixed" | "none" => DecayTarget::Fixed,
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown decay target '{other}'; expected 'spatial', 'temporal', or 'fixed'"
            )));
        }
    };
    Ok((family, decay))
}

/// Assemble [`FitOptions`] from keyword arguments, defaulting any that are
/// missing to `FitOptions::default()`.
#[cfg(feature = "python-bindings")]
pub fn build_fit_options(
    init_alpha: Option<f64>, init_beta: Option<f64>, init_dispersion: Option<f64>,
    maxiter: Option<usize>, tol_grad: Option<f64>, tol_cost: Option<f64>,
    line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
) -> PyResult<FitOptions> {
    let defaults = FitOptions::default();
    let maxiter = maxiter.unwrap_or(defaults.maxiter);
    let tol_grad = tol_grad.or(defaults.mle_opts.tols.tol_grad);
    let tols = Tolerances::new(tol_grad, tol_cost, Some(maxiter)).map_err(opt_err)?;
    let searcher = match line_searcher {
        Some(name) => LineSearcher::from_str(name).map_err(opt_err)?,
        None => defaults.mle_opts.line_searcher,
    };
    let mle_opts = MLEOptions::new(tols, searcher, false, lbfgs_mem).map_err(opt_err)?;
    Ok(FitOptions::new(
        init_alpha.unwrap_or(defaults.init_alpha),
        init_beta.unwrap_or(defaults.init_beta),
        init_dispersion.unwrap_or(defaults.init_dispersion),
        maxiter,
        mle_opts,
    )?)
}

#[cfg(feature = "python-bindings")]
fn rectangular<T: Clone>(rows: Vec<Vec<T>>) -> PyResult<Array2<T>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(PyValueError::new_err("rows must all have the same length"));
    }
    let flat: Vec<T> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}
