//! Long-format view of a simulation.
//!
//! Joins the abundance matrix with sample and feature metadata, keyed on
//! feature id and sample id, into one row per observed value.

use std::collections::HashMap;

use serde::Serialize;

use crate::simulation::{FeatureRow, SimResult};

/// One observed value with its metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergedRow {
    pub feature: String,
    pub cond: String,
    pub sample: String,
    pub time: f64,
    pub group: usize,
    pub amp0: f64,
    pub base0: f64,
    pub period: f64,
    pub phase: f64,
    pub mu: f64,
    pub abund: f64,
}

/// Merge a simulation into long format.
///
/// Rows follow the order of the expected abundance table: feature rows in
/// metadata order, samples in table order within each.
pub fn merge_sim_data(result: &SimResult) -> Vec<MergedRow> {
    let features: HashMap<(&str, &str), &FeatureRow> = result
        .feature_metadata
        .rows
        .iter()
        .map(|r| ((r.feature.as_str(), r.cond.as_str()), r))
        .collect();

    result
        .expected
        .rows
        .iter()
        .filter_map(|e| {
            let col = e.col?;
            let sample = e.sample.clone()?;
            let fr = features.get(&(e.feature.as_str(), e.cond.as_str()))?;
            Some(MergedRow {
                feature: e.feature.clone(),
                cond: e.cond.clone(),
                sample,
                time: e.time,
                group: fr.group,
                amp0: fr.amp0,
                base0: fr.base0,
                period: fr.period,
                phase: fr.phase,
                mu: e.mu,
                abund: result.abund_data[[e.row, col]],
            })
        })
        .collect()
}
