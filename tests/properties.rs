//! Property-based tests for resolution, time grids and the rhythmic model.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;

use simphony::simulation::{
    assign_features, auto_timepoints, build_time_grid, resolve_group_specs, resolve_group_table,
    ResolveContext,
};
use simphony::{
    get_expected_abund, Family, GroupSpecTable, GroupSpecs, Param, ScalarFn, TimeGridConfig,
    TimeTarget,
};

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

fn family() -> impl Strategy<Value = Family> {
    prop_oneof![
        Just(Family::Gaussian),
        Just(Family::NegBinom),
        Just(Family::Bernoulli),
        Just(Family::Poisson),
    ]
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Omitted fractions are uniform and sum to one.
    #[test]
    fn prop_default_fractions_sum_to_one(amps in prop::collection::vec(0.0f64..5.0, 1..20), fam in family()) {
        let table = GroupSpecTable::new().with_amp(amps.clone());
        let ctx = ResolveContext { family: fam, ..Default::default() };
        let groups = resolve_group_table(&table, &ctx).unwrap();
        prop_assert_eq!(groups.len(), amps.len());
        let total: f64 = groups.iter().map(|g| g.frac_features).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }

    /// Auto grids have n_reps * floor((end - start) / interval + 1) samples per condition.
    #[test]
    fn prop_auto_grid_size(
        start in -24.0f64..24.0,
        span in 0.0f64..96.0,
        interval in 0.5f64..12.0,
        n_reps in 1usize..4,
        n_conds in 1usize..4,
    ) {
        let end = start + span;
        let steps = (end - start) / interval;
        // skip step counts within floating point noise of an integer
        prop_assume!((steps + 1e-10).floor() == steps.floor());
        let per_cond = n_reps * ((end - start) / interval + 1.0).floor() as usize;
        prop_assert_eq!(auto_timepoints((start, end), interval, n_reps).len(), per_cond);

        let tables = vec![GroupSpecTable::new(); n_conds];
        let conds = resolve_group_specs(&GroupSpecs::PerCondition(tables), None, &ResolveContext::default()).unwrap();
        let config = TimeGridConfig { time_range: (start, end), interval, n_reps, ..Default::default() };
        let grid = build_time_grid(&config, &conds, &mut StdRng::seed_from_u64(0)).unwrap();
        prop_assert_eq!(grid.len(), per_cond * n_conds);
        let first = grid.times_for(&conds[0].cond);
        for c in &conds {
            prop_assert_eq!(grid.times_for(&c.cond), first.clone());
        }
    }

    /// Random grids stay inside one period and depend only on the seed.
    #[test]
    fn prop_random_grid_in_period(period in 1.0f64..48.0, n in 1usize..30, seed in any::<u64>()) {
        let tables = vec![GroupSpecTable::new().with_period(vec![period]); 2];
        let conds = resolve_group_specs(&GroupSpecs::PerCondition(tables), None, &ResolveContext::default()).unwrap();
        let config = TimeGridConfig::random(n);
        let a = build_time_grid(&config, &conds, &mut StdRng::seed_from_u64(seed)).unwrap();
        let b = build_time_grid(&config, &conds, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert!(a.iter().all(|s| s.time >= 0.0 && s.time < period));
        prop_assert_eq!(a, b);
    }

    /// With zero amplitude, mu is the baseline function whatever the shape and period.
    #[test]
    fn prop_zero_amplitude_is_baseline(
        slope in -2.0f64..2.0,
        intercept in -5.0f64..5.0,
        period in 0.5f64..100.0,
        use_cos in any::<bool>(),
        times in prop::collection::vec(-100.0f64..100.0, 1..10),
    ) {
        let base = ScalarFn::new("linear", move |t| intercept + slope * t);
        let rhy = if use_cos { ScalarFn::cosine() } else { ScalarFn::square() };
        let table = GroupSpecTable::new()
            .with_amp([0.0])
            .with_base([Param::Function(base.clone())])
            .with_period(vec![period])
            .with_rhy_func(vec![rhy]);
        let conds = resolve_group_specs(&table.into(), None, &ResolveContext::default()).unwrap();
        let meta = assign_features(&conds, 3, Family::Gaussian, false).unwrap();

        let a = get_expected_abund(&meta, None, TimeTarget::Times(&times)).unwrap();
        let b = get_expected_abund(&meta, None, TimeTarget::Times(&times)).unwrap();
        prop_assert_eq!(&a.rows, &b.rows);
        for r in &a.rows {
            prop_assert_eq!(r.mu, base.eval(r.time));
        }
    }
}
