//! Sampling timepoints.
//!
//! Builds the [`SampleTable`]: one row per observed measurement, ordered by
//! condition and then by time as produced by the chosen mode.

use std::str::FromStr;

use rand::Rng;
use serde::Serialize;

use super::padded_id;
use super::params::ResolvedCondition;
use crate::error::{Result, SimError};

/// How sampling timepoints are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimepointsType {
    /// Regular grid over `time_range` with `n_reps` replicates per time.
    #[default]
    Auto,
    /// Literal list of timepoints, replicates included.
    Specified,
    /// Uniform draws over one period, independently per condition.
    Random,
}

impl FromStr for TimepointsType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(TimepointsType::Auto),
            "specified" => Ok(TimepointsType::Specified),
            "random" => Ok(TimepointsType::Random),
            other => Err(SimError::config(format!(
                "unknown timepoints type '{}', expected auto, specified or random",
                other
            ))),
        }
    }
}

/// Time grid settings. Only the fields of the selected mode are read.
#[derive(Clone, Debug, Serialize)]
pub struct TimeGridConfig {
    pub timepoints_type: TimepointsType,
    /// Required for `Specified`.
    pub timepoints: Option<Vec<f64>>,
    /// `Auto`: first and last time.
    pub time_range: (f64, f64),
    /// `Auto`: step between times.
    pub interval: f64,
    /// `Auto`: replicates per time.
    pub n_reps: usize,
    /// Required for `Random`.
    pub n_samples_per_cond: Option<usize>,
}

impl Default for TimeGridConfig {
    fn default() -> Self {
        Self {
            timepoints_type: TimepointsType::Auto,
            timepoints: None,
            time_range: (0.0, 48.0),
            interval: 2.0,
            n_reps: 1,
            n_samples_per_cond: None,
        }
    }
}

impl TimeGridConfig {
    pub fn specified(timepoints: Vec<f64>) -> Self {
        Self {
            timepoints_type: TimepointsType::Specified,
            timepoints: Some(timepoints),
            ..Default::default()
        }
    }

    pub fn random(n_samples_per_cond: usize) -> Self {
        Self {
            timepoints_type: TimepointsType::Random,
            n_samples_per_cond: Some(n_samples_per_cond),
            ..Default::default()
        }
    }

    /// Check that the arguments of the selected mode are present and sane.
    pub fn validate(&self) -> Result<()> {
        match self.timepoints_type {
            TimepointsType::Auto => {
                let (start, end) = self.time_range;
                if !(start.is_finite() && end.is_finite()) || end < start {
                    return Err(SimError::config(format!(
                        "time_range must be finite and increasing, got ({}, {})",
                        start, end
                    )));
                }
                if !(self.interval.is_finite() && self.interval > 0.0) {
                    return Err(SimError::config(format!(
                        "interval must be finite and positive, got {}",
                        self.interval
                    )));
                }
                if self.n_reps == 0 {
                    return Err(SimError::config("n_reps must be at least 1"));
                }
            }
            TimepointsType::Specified => match &self.timepoints {
                None => {
                    return Err(SimError::config(
                        "timepoints must be supplied when timepoints_type is 'specified'",
                    ))
                }
                Some(times) if times.is_empty() => {
                    return Err(SimError::config("timepoints is empty"));
                }
                Some(times) if times.iter().any(|t| !t.is_finite()) => {
                    return Err(SimError::config("timepoints must be finite"));
                }
                Some(_) => {}
            },
            TimepointsType::Random => match self.n_samples_per_cond {
                None => {
                    return Err(SimError::config(
                        "n_samples_per_cond must be supplied when timepoints_type is 'random'",
                    ))
                }
                Some(0) => return Err(SimError::config("n_samples_per_cond must be at least 1")),
                Some(_) => {}
            },
        }
        Ok(())
    }
}

/// One observed measurement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub sample: String,
    pub cond: String,
    pub time: f64,
}

/// Ordered samples of a simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SampleTable {
    samples: Vec<Sample>,
}

impl SampleTable {
    /// Build a table from `(cond, time)` pairs, assigning sample ids in order.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Self {
        let pairs: Vec<(String, f64)> = pairs.into_iter().map(|(c, t)| (c.into(), t)).collect();
        let n = pairs.len();
        let samples = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (cond, time))| Sample {
                sample: padded_id("sample", i + 1, n),
                cond,
                time,
            })
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Column indices and samples belonging to `cond`.
    pub fn for_condition<'a>(
        &'a self,
        cond: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Sample)> + 'a {
        self.samples
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.cond == cond)
    }

    /// Times of `cond`, in table order.
    pub fn times_for(&self, cond: &str) -> Vec<f64> {
        self.for_condition(cond).map(|(_, s)| s.time).collect()
    }
}

/// Regular grid `start, start + interval, ...` up to and including `end`.
pub fn auto_timepoints(time_range: (f64, f64), interval: f64, n_reps: usize) -> Vec<f64> {
    let (start, end) = time_range;
    // Same fuzz as a seq() style step count so that e.g. 0.1 steps keep the end point.
    let n_times = ((end - start) / interval + 1e-10).floor() as usize + 1;
    (0..n_times)
        .map(|i| start + i as f64 * interval)
        .flat_map(|t| std::iter::repeat(t).take(n_reps))
        .collect()
}

/// Build the sample table for the given conditions.
///
/// In random mode the period of the first group of the first condition
/// bounds the draws; every condition gets its own draws from `rng`.
pub fn build_time_grid<R: Rng + ?Sized>(
    config: &TimeGridConfig,
    conditions: &[ResolvedCondition],
    rng: &mut R,
) -> Result<SampleTable> {
    config.validate()?;
    if conditions.is_empty() {
        return Err(SimError::config("at least one condition is required"));
    }

    let pairs: Vec<(String, f64)> = match config.timepoints_type {
        TimepointsType::Auto => {
            let times = auto_timepoints(config.time_range, config.interval, config.n_reps);
            replicate_for_conditions(conditions, &times)
        }
        TimepointsType::Specified => {
            let times = config.timepoints.as_deref().unwrap_or_default();
            replicate_for_conditions(conditions, times)
        }
        TimepointsType::Random => {
            let n = config.n_samples_per_cond.unwrap_or_default();
            let period = conditions[0]
                .groups
                .first()
                .map(|g| g.period)
                .ok_or_else(|| SimError::config("condition has no groups"))?;
            let mut pairs = Vec::with_capacity(n * conditions.len());
            for cond in conditions {
                for _ in 0..n {
                    pairs.push((cond.cond.clone(), rng.gen_range(0.0..period)));
                }
            }
            pairs
        }
    };

    Ok(SampleTable::from_pairs(pairs))
}

fn replicate_for_conditions(conditions: &[ResolvedCondition], times: &[f64]) -> Vec<(String, f64)> {
    conditions
        .iter()
        .flat_map(|c| times.iter().map(move |&t| (c.cond.clone(), t)))
        .collect()
}
