//! Rhythmic abundance simulation.
//!
//! This module provides:
//! - Parameter resolution: per-group specifications with family-aware defaults
//! - Time grids: auto, specified and random sampling timepoints
//! - Feature assignment: groups expanded into per-feature metadata
//! - Expected abundance: the rhythmic model evaluated at sampling times
//! - Sampling: Gaussian, negative binomial, Bernoulli and Poisson noise
//! - The `simulate` entry point tying these together

pub mod expected;
pub mod family;
pub mod features;
pub mod params;
pub mod sampler;
pub mod simulate;
pub mod time_grid;

pub use expected::{get_expected_abund, rhythmic_mu, ExpectedAbundance, ExpectedRow, TimeTarget};
pub use family::Family;
pub use features::{assign_features, group_counts, FeatureMetadata, FeatureRow};
pub use params::{
    resolve_group_specs, resolve_group_table, GroupSpecTable, GroupSpecs, ResolveContext,
    ResolvedCondition, ResolvedGroup,
};
pub use sampler::{get_sampled_abund, logistic, DomainWarning, SampledAbundance};
pub use simulate::{simulate, simulate_seeded, ExperimentConfig, SimConfig, SimResult};
pub use time_grid::{
    auto_timepoints, build_time_grid, Sample, SampleTable, TimeGridConfig, TimepointsType,
};

/// `prefix_N` with N zero padded to the width of `max`.
pub(crate) fn padded_id(prefix: &str, i: usize, max: usize) -> String {
    let width = max.max(1).to_string().len();
    format!("{}_{:0width$}", prefix, i, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_id() {
        assert_eq!(padded_id("feature", 7, 200), "feature_007");
        assert_eq!(padded_id("cond", 1, 1), "cond_1");
        assert_eq!(padded_id("sample", 10, 10), "sample_10");
    }
}
