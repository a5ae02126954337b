//! Error types for simphony.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised while configuring or running a simulation.
///
/// Domain problems found while sampling (a negative Poisson mean, a
/// probability outside `[0, 1]`) are not errors; they are reported as
/// [`DomainWarning`](crate::simulation::DomainWarning)s on the result.
#[derive(Error, Debug)]
pub enum SimError {
    /// Malformed or inconsistent input. Always fatal to the call.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provenance record could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }

    /// True for input validation failures.
    pub fn is_config(&self) -> bool {
        matches!(self, SimError::Config(_))
    }
}
