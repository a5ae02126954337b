//! Allocation of features to groups.
//!
//! Expands group-level records into feature-level records: each group gets
//! `round(frac_features * n_features)` features, and every feature carries a
//! back-reference to its group plus that group's resolved parameters in every
//! condition.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::family::Family;
use super::padded_id;
use super::params::ResolvedCondition;
use crate::error::{Result, SimError};
use crate::functions::ScalarFn;

/// Parameters of one feature in one condition.
#[derive(Clone, Debug, Serialize)]
pub struct FeatureRow {
    pub feature: String,
    pub cond: String,
    /// 1-based group index.
    pub group: usize,
    pub rhy_func: ScalarFn,
    pub amp: ScalarFn,
    pub base: ScalarFn,
    pub period: f64,
    pub phase: f64,
    /// `amp(0)`, for grouping downstream.
    pub amp0: f64,
    /// `base(0)`, for grouping downstream.
    pub base0: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disp_func: Option<ScalarFn>,
}

/// Feature metadata: one row per (feature, condition).
#[derive(Clone, Debug, Serialize)]
pub struct FeatureMetadata {
    pub family: Family,
    pub log_odds: bool,
    /// Unique feature ids in matrix row order.
    pub feature_ids: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureMetadata {
    /// Build from rows; feature order is order of first appearance.
    pub fn from_rows(family: Family, log_odds: bool, rows: Vec<FeatureRow>) -> Self {
        let mut seen = HashSet::new();
        let mut feature_ids = Vec::new();
        for row in &rows {
            if seen.insert(row.feature.as_str()) {
                feature_ids.push(row.feature.clone());
            }
        }
        Self {
            family,
            log_odds,
            feature_ids,
            rows,
        }
    }

    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    /// Matrix row index of each feature id.
    pub fn feature_index(&self) -> HashMap<&str, usize> {
        self.feature_ids
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect()
    }

    /// Rows of one condition.
    pub fn rows_for<'a>(&'a self, cond: &'a str) -> impl Iterator<Item = &'a FeatureRow> + 'a {
        self.rows.iter().filter(move |r| r.cond == cond)
    }
}

/// Number of features per group, `round(frac * n_features)` with ties to even.
///
/// The total can differ slightly from `n_features`; the residue is not
/// redistributed.
pub fn group_counts(fractions: &[f64], n_features: usize) -> Vec<usize> {
    fractions
        .iter()
        .map(|&f| (f * n_features as f64).round_ties_even().max(0.0) as usize)
        .collect()
}

/// Assign features to groups and build the metadata table.
///
/// Rows are condition-major; within a condition features appear in id order.
pub fn assign_features(
    conditions: &[ResolvedCondition],
    n_features: usize,
    family: Family,
    log_odds: bool,
) -> Result<FeatureMetadata> {
    if n_features == 0 {
        return Err(SimError::config("n_features must be at least 1"));
    }
    let first = conditions
        .first()
        .ok_or_else(|| SimError::config("at least one condition is required"))?;

    let fractions: Vec<f64> = first.groups.iter().map(|g| g.frac_features).collect();
    let counts = group_counts(&fractions, n_features);
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Err(SimError::config(format!(
            "frac_features {:?} allocate no features out of {}",
            fractions, n_features
        )));
    }
    if total != n_features {
        debug!(
            requested = n_features,
            allocated = total,
            "feature allocation differs from requested count after rounding"
        );
    }

    // Group index of every feature, in id order.
    let feature_groups: Vec<usize> = counts
        .iter()
        .enumerate()
        .flat_map(|(g, &n)| std::iter::repeat(g).take(n))
        .collect();
    let feature_ids: Vec<String> = (1..=total).map(|i| padded_id("feature", i, total)).collect();

    let mut rows = Vec::with_capacity(total * conditions.len());
    for cond in conditions {
        for (feature, &g) in feature_ids.iter().zip(&feature_groups) {
            let group = &cond.groups[g];
            rows.push(FeatureRow {
                feature: feature.clone(),
                cond: cond.cond.clone(),
                group: group.group,
                rhy_func: group.rhy_func.clone(),
                amp: group.amp.clone(),
                base: group.base.clone(),
                period: group.period,
                phase: group.phase,
                amp0: group.amp.eval(0.0),
                base0: group.base.eval(0.0),
                sd: group.sd,
                disp_func: group.disp_func.clone(),
            });
        }
    }

    Ok(FeatureMetadata {
        family,
        log_odds,
        feature_ids,
        rows,
    })
}
