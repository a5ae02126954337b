//! Simulation of rhythmic feature abundances.
//!
//! Features (e.g. genes) are organised in groups that share a rhythmic
//! parameter specification. For every condition each feature follows
//!
//! ```text
//! mu(t) = base(t) + amp(t) · rhy_func(2π (t − phase) / period)
//! ```
//!
//! and observed abundances are drawn from a Gaussian, negative binomial,
//! Bernoulli or Poisson noise model.
//!
//! ```
//! use simphony::{simulate_seeded, Family, GroupSpecTable, SimConfig};
//!
//! let config = SimConfig {
//!     feature_groups: GroupSpecTable::new()
//!         .with_frac_features(vec![0.75, 0.25])
//!         .with_amp([0.0, 0.3])
//!         .into(),
//!     n_features: 200,
//!     family: Family::NegBinom,
//!     ..Default::default()
//! };
//! let result = simulate_seeded(&config, 42)?;
//! assert_eq!(result.abund_data.nrows(), 200);
//! # Ok::<(), simphony::SimError>(())
//! ```

pub mod error;
pub mod functions;
pub mod merge;
pub mod simulation;

#[cfg(feature = "python")]
mod python;

pub use error::{Result, SimError};
pub use functions::{Param, ScalarFn};
pub use merge::{merge_sim_data, MergedRow};
pub use simulation::{
    get_expected_abund, get_sampled_abund, simulate, simulate_seeded, DomainWarning,
    ExpectedAbundance, ExperimentConfig, Family, FeatureMetadata, GroupSpecTable, GroupSpecs,
    SampleTable, SimConfig, SimResult, TimeGridConfig, TimeTarget, TimepointsType,
};
