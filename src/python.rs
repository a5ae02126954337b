//! Python bindings (feature `python`).
//!
//! Exposes constant-valued group tables; time-varying parameters and custom
//! rhythmic shapes are only available from Rust.

use numpy::PyArray2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::error::SimError;
use crate::simulation::{
    simulate_seeded, Family, GroupSpecTable, SimConfig, TimeGridConfig, TimepointsType,
};

fn to_py_err(e: SimError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Simulate rhythmic abundances for a single condition.
///
/// # Arguments
/// * `n_features` - Requested number of features
/// * `family` - One of "gaussian", "negbinom", "bernoulli", "poisson"
/// * `amp`, `base`, `period`, `phase`, `sd` - Optional per-group columns
/// * `frac_features` - Optional fraction of features per group
/// * `timepoints_type` - "auto", "specified" or "random"
/// * `seed` - RNG seed
///
/// # Returns
/// * Dict with "abund_data" (features × samples array), "feature_ids",
///   "sample_metadata", "feature_metadata", "warnings" and "exp_config" (JSON)
#[pyfunction]
#[pyo3(signature = (
    n_features=10,
    family="gaussian",
    amp=None,
    base=None,
    period=None,
    phase=None,
    sd=None,
    frac_features=None,
    timepoints_type="auto",
    timepoints=None,
    time_range=(0.0, 48.0),
    interval=2.0,
    n_reps=1,
    n_samples_per_cond=None,
    log_odds=false,
    seed=0
))]
#[allow(clippy::too_many_arguments)]
fn simulate_abundance<'py>(
    py: Python<'py>,
    n_features: usize,
    family: &str,
    amp: Option<Vec<f64>>,
    base: Option<Vec<f64>>,
    period: Option<Vec<f64>>,
    phase: Option<Vec<f64>>,
    sd: Option<Vec<f64>>,
    frac_features: Option<Vec<f64>>,
    timepoints_type: &str,
    timepoints: Option<Vec<f64>>,
    time_range: (f64, f64),
    interval: f64,
    n_reps: usize,
    n_samples_per_cond: Option<usize>,
    log_odds: bool,
    seed: u64,
) -> PyResult<&'py PyDict> {
    let family: Family = family.parse().map_err(to_py_err)?;
    let timepoints_type: TimepointsType = timepoints_type.parse().map_err(to_py_err)?;

    let table = GroupSpecTable {
        frac_features,
        amp: amp.map(|v| v.into_iter().map(Into::into).collect()),
        base: base.map(|v| v.into_iter().map(Into::into).collect()),
        period,
        phase,
        sd,
        ..Default::default()
    };

    let config = SimConfig {
        feature_groups: table.into(),
        n_features,
        time_grid: TimeGridConfig {
            timepoints_type,
            timepoints,
            time_range,
            interval,
            n_reps,
            n_samples_per_cond,
        },
        log_odds,
        family,
        ..Default::default()
    };

    let result = simulate_seeded(&config, seed).map_err(to_py_err)?;

    let samples = result
        .sample_metadata
        .iter()
        .map(|s| {
            let dict = PyDict::new(py);
            dict.set_item("sample", &s.sample)?;
            dict.set_item("cond", &s.cond)?;
            dict.set_item("time", s.time)?;
            Ok(dict.into())
        })
        .collect::<PyResult<Vec<PyObject>>>()?;

    let features = result
        .feature_metadata
        .rows
        .iter()
        .map(|r| {
            let dict = PyDict::new(py);
            dict.set_item("feature", &r.feature)?;
            dict.set_item("cond", &r.cond)?;
            dict.set_item("group", r.group)?;
            dict.set_item("amp0", r.amp0)?;
            dict.set_item("base0", r.base0)?;
            dict.set_item("period", r.period)?;
            dict.set_item("phase", r.phase)?;
            Ok(dict.into())
        })
        .collect::<PyResult<Vec<PyObject>>>()?;

    let warnings: Vec<String> = result.warnings.iter().map(ToString::to_string).collect();
    let exp_config = result.exp_config.to_json().map_err(to_py_err)?;

    let out = PyDict::new(py);
    out.set_item("abund_data", PyArray2::from_owned_array(py, result.abund_data))?;
    out.set_item("feature_ids", result.feature_metadata.feature_ids)?;
    out.set_item("sample_metadata", samples)?;
    out.set_item("feature_metadata", features)?;
    out.set_item("warnings", warnings)?;
    out.set_item("exp_config", exp_config)?;
    Ok(out)
}

/// Python module definition
#[pymodule]
fn simphony(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(simulate_abundance, m)?)?;
    Ok(())
}
