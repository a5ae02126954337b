//! Noise models.
//!
//! Draws observed abundances from expected values. Points whose expectation
//! falls outside the family's domain are still sampled, using the boundary
//! or degenerate behavior of the family, and are reported as one
//! [`DomainWarning`] per (family, condition).

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Gamma, Normal, Poisson};
use serde::Serialize;
use tracing::{debug, warn};

use super::expected::{ExpectedAbundance, ExpectedRow};
use super::family::Family;
use super::params::DEFAULT_SD;
use crate::error::{Result, SimError};
use crate::functions::ScalarFn;

/// Non-fatal domain problem found while sampling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DomainWarning {
    pub family: Family,
    pub cond: String,
    /// Number of affected points.
    pub n_points: usize,
    pub message: String,
}

impl fmt::Display for DomainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sampling in {}: {} point(s) {}",
            self.family, self.cond, self.n_points, self.message
        )
    }
}

/// Sampled abundance matrix (features × samples) with any domain warnings.
#[derive(Clone, Debug)]
pub struct SampledAbundance {
    pub matrix: Array2<f64>,
    pub warnings: Vec<DomainWarning>,
}

/// One draw and whether its parameters were inside the family's domain.
struct Draw {
    value: f64,
    in_domain: bool,
}

impl Draw {
    fn ok(value: f64) -> Self {
        Self {
            value,
            in_domain: true,
        }
    }

    fn clamped(value: f64) -> Self {
        Self {
            value,
            in_domain: false,
        }
    }
}

/// Logistic function, log-odds to probability.
#[inline]
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sample observed abundances.
///
/// `expected` must be evaluated at a sample table so that every row maps to
/// a matrix cell. Cells without an expectation are left as NaN.
pub fn get_sampled_abund<R: Rng + ?Sized>(
    expected: &ExpectedAbundance,
    log_odds: bool,
    family: Family,
    rng: &mut R,
) -> Result<SampledAbundance> {
    let sample_ids = match &expected.sample_ids {
        Some(ids) if expected.is_sample_aligned() => ids,
        _ => {
            return Err(SimError::config(
                "sampling requires expected abundances evaluated at a sample table",
            ))
        }
    };
    if family != expected.family {
        debug!(
            expected_family = %expected.family,
            family = %family,
            "sampling with a family different from the one used for expectations"
        );
    }

    if family == Family::Gaussian {
        validate_sd(&expected.rows)?;
    }

    let mut matrix = Array2::from_elem((expected.feature_ids.len(), sample_ids.len()), f64::NAN);
    let mut out_of_domain: BTreeMap<&str, usize> = BTreeMap::new();
    let default_disp = ScalarFn::default_dispersion();

    for row in &expected.rows {
        let draw = match family {
            Family::Gaussian => sample_gaussian(row, rng)?,
            Family::NegBinom => sample_negbinom(row, &default_disp, rng),
            Family::Bernoulli => sample_bernoulli(row, log_odds, rng)?,
            Family::Poisson => sample_poisson(row.mu, rng),
        };
        if !draw.in_domain {
            *out_of_domain.entry(row.cond.as_str()).or_insert(0) += 1;
        }
        if let Some(col) = row.col {
            matrix[[row.row, col]] = draw.value;
        }
    }

    let warnings: Vec<DomainWarning> = out_of_domain
        .into_iter()
        .map(|(cond, n_points)| DomainWarning {
            family,
            cond: cond.to_string(),
            n_points,
            message: domain_message(family, log_odds).to_string(),
        })
        .collect();
    for w in &warnings {
        warn!(family = %w.family, cond = %w.cond, n_points = w.n_points, "{}", w);
    }

    Ok(SampledAbundance { matrix, warnings })
}

fn domain_message(family: Family, log_odds: bool) -> &'static str {
    match family {
        Family::Gaussian => "had an invalid expectation",
        Family::NegBinom => {
            "had a negative or non-finite mean (sampled as 0) or an invalid dispersion (sampled as Poisson)"
        }
        Family::Bernoulli if log_odds => "had a non-finite log-odds (probability clamped to [0, 1])",
        Family::Bernoulli => "had a probability outside [0, 1] (clamped)",
        Family::Poisson => "had a negative or non-finite mean (sampled as 0)",
    }
}

/// Every Gaussian sd must be usable before any draw is made.
fn validate_sd(rows: &[ExpectedRow]) -> Result<()> {
    for row in rows {
        let sd = row.sd.unwrap_or(DEFAULT_SD);
        if !(sd.is_finite() && sd >= 0.0) {
            return Err(SimError::config(format!(
                "sd of {} in {} must be finite and non-negative, got {}",
                row.feature, row.cond, sd
            )));
        }
    }
    Ok(())
}

fn sample_gaussian<R: Rng + ?Sized>(row: &ExpectedRow, rng: &mut R) -> Result<Draw> {
    let sd = row.sd.unwrap_or(DEFAULT_SD);
    if !row.mu.is_finite() {
        return Ok(Draw::clamped(row.mu));
    }
    let normal = Normal::new(row.mu, sd).map_err(|e| {
        SimError::config(format!("invalid Gaussian sd {} for {}: {}", sd, row.feature, e))
    })?;
    Ok(Draw::ok(normal.sample(rng)))
}

/// Negative binomial with mean `2^mu` and variance `mean + disp * mean^2`,
/// drawn as a gamma-Poisson mixture.
fn sample_negbinom<R: Rng + ?Sized>(row: &ExpectedRow, default_disp: &ScalarFn, rng: &mut R) -> Draw {
    let mean = row.mu.exp2();
    if !(mean.is_finite() && mean >= 0.0) {
        return Draw::clamped(0.0);
    }
    if mean == 0.0 {
        return Draw::ok(0.0);
    }

    let disp = row.disp.unwrap_or_else(|| default_disp.eval(mean));
    if !(disp.is_finite() && disp >= 0.0) {
        let poisson = sample_poisson(mean, rng);
        return Draw::clamped(poisson.value);
    }
    if disp == 0.0 {
        return sample_poisson(mean, rng);
    }

    let shape = 1.0 / disp;
    let scale = mean * disp;
    match Gamma::new(shape, scale) {
        Ok(gamma) if shape.is_finite() => {
            let lambda: f64 = gamma.sample(rng);
            sample_poisson(lambda, rng)
        }
        // Vanishing dispersion: the mixture collapses to Poisson.
        _ => sample_poisson(mean, rng),
    }
}

fn sample_bernoulli<R: Rng + ?Sized>(row: &ExpectedRow, log_odds: bool, rng: &mut R) -> Result<Draw> {
    let p = if log_odds { logistic(row.mu) } else { row.mu };

    let (p, in_domain) = if p.is_nan() {
        (0.0, false)
    } else if (0.0..=1.0).contains(&p) {
        (p, true)
    } else {
        (p.clamp(0.0, 1.0), false)
    };

    let bernoulli = Bernoulli::new(p)
        .map_err(|e| SimError::config(format!("invalid Bernoulli probability {}: {}", p, e)))?;
    let value = if bernoulli.sample(rng) { 1.0 } else { 0.0 };
    Ok(Draw { value, in_domain })
}

fn sample_poisson<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> Draw {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Draw::clamped(0.0);
    }
    if lambda == 0.0 {
        return Draw::ok(0.0);
    }
    match Poisson::new(lambda) {
        Ok(poisson) => Draw::ok(poisson.sample(rng)),
        Err(_) => Draw::clamped(0.0),
    }
}
