//! Noise families.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SimError;

/// Distribution family used to sample observed abundances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// `mu` on the linear scale, `Normal(mu, sd)`
    #[default]
    Gaussian,
    /// `mu` is log2 expected count
    NegBinom,
    /// `mu` is a probability, or log-odds
    Bernoulli,
    /// `mu` is the expected count
    Poisson,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Gaussian => "gaussian",
            Family::NegBinom => "negbinom",
            Family::Bernoulli => "bernoulli",
            Family::Poisson => "poisson",
        }
    }

    /// Baseline used when a group table has no `base` column.
    pub fn default_base(&self, log_odds: bool) -> f64 {
        match self {
            Family::Gaussian => 0.0,
            Family::NegBinom => 8.0,
            Family::Bernoulli => {
                if log_odds {
                    0.0
                } else {
                    0.5
                }
            }
            Family::Poisson => 1.0,
        }
    }

    /// Whether samples are whole numbers.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, Family::Gaussian)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Family::Gaussian),
            "negbinom" => Ok(Family::NegBinom),
            "bernoulli" => Ok(Family::Bernoulli),
            "poisson" => Ok(Family::Poisson),
            other => Err(SimError::config(format!(
                "unknown family '{}', expected one of gaussian, negbinom, bernoulli, poisson",
                other
            ))),
        }
    }
}
