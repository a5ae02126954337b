//! Scalar functions of one variable.
//!
//! Every time-varying parameter (amplitude, baseline), the rhythmic shape and
//! the negative binomial dispersion curve are carried as a [`ScalarFn`].
//! Constants are wrapped once at resolution time so the evaluator only ever
//! calls functions.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

type Inner = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A shareable `f64 -> f64` function with a label for provenance.
#[derive(Clone)]
pub struct ScalarFn {
    f: Inner,
    label: String,
    constant: Option<f64>,
}

impl ScalarFn {
    /// Wrap a closure.
    pub fn new<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(f),
            label: label.into(),
            constant: None,
        }
    }

    /// Constant function `_ -> value`.
    pub fn constant(value: f64) -> Self {
        Self {
            f: Arc::new(move |_| value),
            label: format!("{}", value),
            constant: Some(value),
        }
    }

    /// Evaluate at `x`.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        (self.f)(x)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The wrapped value if this function was built from a constant.
    pub fn as_constant(&self) -> Option<f64> {
        self.constant
    }

    /// Sine, the default rhythmic shape.
    pub fn sine() -> Self {
        Self::new("sin", f64::sin)
    }

    /// Cosine.
    pub fn cosine() -> Self {
        Self::new("cos", f64::cos)
    }

    /// Unit-amplitude square wave with period 2π: +1 on the first half cycle.
    pub fn square() -> Self {
        Self::new("square", |x: f64| {
            if x.rem_euclid(TAU) < TAU / 2.0 {
                1.0
            } else {
                -1.0
            }
        })
    }

    /// Default negative binomial dispersion as a function of mean count.
    ///
    /// disp(mean) = 3 / mean
    pub fn default_dispersion() -> Self {
        Self::new("3/mean", |mean: f64| 3.0 / mean)
    }
}

impl fmt::Debug for ScalarFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarFn({})", self.label)
    }
}

impl Serialize for ScalarFn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.constant {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(&self.label),
        }
    }
}

/// User-supplied value of a time-varying parameter.
#[derive(Clone, Debug)]
pub enum Param {
    Constant(f64),
    Function(ScalarFn),
}

impl Param {
    /// Resolve to a function of time.
    pub fn into_fn(self) -> ScalarFn {
        match self {
            Param::Constant(value) => ScalarFn::constant(value),
            Param::Function(f) => f,
        }
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Constant(value)
    }
}

impl From<ScalarFn> for Param {
    fn from(f: ScalarFn) -> Self {
        Param::Function(f)
    }
}
