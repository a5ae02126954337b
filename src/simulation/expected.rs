//! Expected abundance under the rhythmic model.
//!
//! For a feature with baseline `base(t)`, amplitude `amp(t)`, rhythmic shape
//! `f` (period 2π), period `T` and phase `φ`:
//!
//! ```text
//! mu(t) = base(t) + amp(t) · f(2π (t − φ) / T)
//! ```
//!
//! The scale of `mu` depends on the family: linear (Gaussian), log2 counts
//! (negative binomial), probability or log-odds (Bernoulli), counts
//! (Poisson). Nothing is back-transformed here except the negative binomial
//! dispersion, which is a function of the linear mean `2^mu`.

use std::collections::HashMap;
use std::f64::consts::TAU;

use rayon::prelude::*;
use serde::Serialize;

use super::family::Family;
use super::features::{FeatureMetadata, FeatureRow};
use super::params::DEFAULT_SD;
use super::time_grid::{Sample, SampleTable};
use crate::error::{Result, SimError};
use crate::functions::ScalarFn;

/// Times at which to evaluate the model.
#[derive(Clone, Copy, Debug)]
pub enum TimeTarget<'a> {
    /// Every feature row at every time.
    Times(&'a [f64]),
    /// Every feature row at the samples of its own condition.
    Samples(&'a SampleTable),
}

/// Expected value of one feature at one time in one condition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpectedRow {
    pub feature: String,
    pub cond: String,
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    pub mu: f64,
    /// Negative binomial only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disp: Option<f64>,
    /// Gaussian only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<f64>,
    /// Matrix row (feature index).
    #[serde(skip)]
    pub row: usize,
    /// Matrix column (sample index), when evaluated at a sample table.
    #[serde(skip)]
    pub col: Option<usize>,
}

/// Table of expected values.
#[derive(Clone, Debug, Serialize)]
pub struct ExpectedAbundance {
    pub family: Family,
    pub log_odds: bool,
    /// Matrix row labels.
    pub feature_ids: Vec<String>,
    /// Matrix column labels, when evaluated at a sample table.
    pub sample_ids: Option<Vec<String>>,
    pub rows: Vec<ExpectedRow>,
}

impl ExpectedAbundance {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when every row maps to a matrix cell.
    pub fn is_sample_aligned(&self) -> bool {
        self.sample_ids.is_some() && self.rows.iter().all(|r| r.col.is_some())
    }
}

/// Rhythmic model at time `t`.
#[inline]
pub fn rhythmic_mu(row: &FeatureRow, period: f64, t: f64) -> f64 {
    row.base.eval(t) + row.amp.eval(t) * row.rhy_func.eval(TAU * (t - row.phase) / period)
}

/// Evaluate expected abundances.
///
/// `period`, when given, replaces the period of every feature.
pub fn get_expected_abund(
    feature_metadata: &FeatureMetadata,
    period: Option<f64>,
    target: TimeTarget<'_>,
) -> Result<ExpectedAbundance> {
    if let Some(p) = period {
        if !(p.is_finite() && p > 0.0) {
            return Err(SimError::config(format!(
                "period must be finite and positive, got {}",
                p
            )));
        }
    }

    let feature_index = feature_metadata.feature_index();
    let family = feature_metadata.family;
    let default_disp = ScalarFn::default_dispersion();

    let (rows, sample_ids) = match target {
        TimeTarget::Times(times) => {
            let rows = feature_metadata
                .rows
                .par_iter()
                .map(|fr| {
                    let row = lookup_row(&feature_index, fr)?;
                    Ok(times
                        .iter()
                        .map(|&t| evaluate(fr, family, period, &default_disp, t, row, None))
                        .collect::<Vec<_>>())
                })
                .collect::<Result<Vec<_>>>()?;
            (rows, None)
        }
        TimeTarget::Samples(samples) => {
            let mut by_cond: HashMap<&str, Vec<(usize, &Sample)>> = HashMap::new();
            for (col, s) in samples.iter().enumerate() {
                by_cond.entry(s.cond.as_str()).or_default().push((col, s));
            }
            let empty = Vec::new();

            let rows = feature_metadata
                .rows
                .par_iter()
                .map(|fr| {
                    let row = lookup_row(&feature_index, fr)?;
                    Ok(by_cond
                        .get(fr.cond.as_str())
                        .unwrap_or(&empty)
                        .iter()
                        .map(|&(col, s)| {
                            evaluate(fr, family, period, &default_disp, s.time, row, Some((col, s)))
                        })
                        .collect::<Vec<_>>())
                })
                .collect::<Result<Vec<_>>>()?;
            let sample_ids = samples.iter().map(|s| s.sample.clone()).collect();
            (rows, Some(sample_ids))
        }
    };

    Ok(ExpectedAbundance {
        family,
        log_odds: feature_metadata.log_odds,
        feature_ids: feature_metadata.feature_ids.clone(),
        sample_ids,
        rows: rows.into_iter().flatten().collect(),
    })
}

fn lookup_row(feature_index: &HashMap<&str, usize>, fr: &FeatureRow) -> Result<usize> {
    feature_index.get(fr.feature.as_str()).copied().ok_or_else(|| {
        SimError::config(format!(
            "feature '{}' is missing from the feature id list",
            fr.feature
        ))
    })
}

fn evaluate(
    fr: &FeatureRow,
    family: Family,
    period: Option<f64>,
    default_disp: &ScalarFn,
    t: f64,
    row: usize,
    sample: Option<(usize, &Sample)>,
) -> ExpectedRow {
    let mu = rhythmic_mu(fr, period.unwrap_or(fr.period), t);

    let disp = match family {
        Family::NegBinom => {
            let mean = mu.exp2();
            Some(fr.disp_func.as_ref().unwrap_or(default_disp).eval(mean))
        }
        _ => None,
    };
    let sd = match family {
        Family::Gaussian => Some(fr.sd.unwrap_or(DEFAULT_SD)),
        _ => None,
    };

    ExpectedRow {
        feature: fr.feature.clone(),
        cond: fr.cond.clone(),
        time: t,
        sample: sample.map(|(_, s)| s.sample.clone()),
        mu,
        disp,
        sd,
        row,
        col: sample.map(|(col, _)| col),
    }
}
