//! Feature group specifications and their resolution.
//!
//! A [`GroupSpecTable`] is what the user writes: one row per feature group,
//! any column may be left out. Resolution fills every missing column with a
//! family-aware default and wraps constants as functions of time, so that
//! everything downstream works with a fully specified [`ResolvedGroup`].

use serde::Serialize;
use tracing::debug;

use super::family::Family;
use super::padded_id;
use crate::error::{Result, SimError};
use crate::functions::{Param, ScalarFn};

/// Default rhythm period, in the same time units as the sampling grid.
pub const DEFAULT_PERIOD: f64 = 24.0;
/// Default standard deviation for Gaussian noise.
pub const DEFAULT_SD: f64 = 1.0;

/// Per-group parameters for one condition. Absent columns take defaults.
#[derive(Clone, Debug, Default)]
pub struct GroupSpecTable {
    /// Fraction of all features in each group.
    pub frac_features: Option<Vec<f64>>,
    /// Rhythmic shape, period 2π.
    pub rhy_func: Option<Vec<ScalarFn>>,
    /// Rhythm amplitude, constant or function of time.
    pub amp: Option<Vec<Param>>,
    pub period: Option<Vec<f64>>,
    pub phase: Option<Vec<f64>>,
    /// Baseline abundance, constant or function of time.
    pub base: Option<Vec<Param>>,
    /// Gaussian only.
    pub sd: Option<Vec<f64>>,
    /// Negative binomial only: dispersion as a function of mean count.
    pub disp_func: Option<Vec<ScalarFn>>,
}

impl GroupSpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frac_features(mut self, frac: Vec<f64>) -> Self {
        self.frac_features = Some(frac);
        self
    }

    pub fn with_rhy_func(mut self, rhy_func: Vec<ScalarFn>) -> Self {
        self.rhy_func = Some(rhy_func);
        self
    }

    pub fn with_amp<P: Into<Param>>(mut self, amp: impl IntoIterator<Item = P>) -> Self {
        self.amp = Some(amp.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_period(mut self, period: Vec<f64>) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_phase(mut self, phase: Vec<f64>) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_base<P: Into<Param>>(mut self, base: impl IntoIterator<Item = P>) -> Self {
        self.base = Some(base.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sd(mut self, sd: Vec<f64>) -> Self {
        self.sd = Some(sd);
        self
    }

    pub fn with_disp_func(mut self, disp_func: Vec<ScalarFn>) -> Self {
        self.disp_func = Some(disp_func);
        self
    }

    /// Number of groups (rows).
    ///
    /// All present columns must agree. A table without columns is a single
    /// all-default group.
    pub fn n_groups(&self) -> Result<usize> {
        let lengths = [
            ("frac_features", self.frac_features.as_ref().map(Vec::len)),
            ("rhy_func", self.rhy_func.as_ref().map(Vec::len)),
            ("amp", self.amp.as_ref().map(Vec::len)),
            ("period", self.period.as_ref().map(Vec::len)),
            ("phase", self.phase.as_ref().map(Vec::len)),
            ("base", self.base.as_ref().map(Vec::len)),
            ("sd", self.sd.as_ref().map(Vec::len)),
            ("disp_func", self.disp_func.as_ref().map(Vec::len)),
        ];

        let mut n_groups: Option<(&str, usize)> = None;
        for (name, len) in lengths {
            let Some(len) = len else { continue };
            if len == 0 {
                return Err(SimError::config(format!("column '{}' has no rows", name)));
            }
            match n_groups {
                None => n_groups = Some((name, len)),
                Some((first, n)) if n != len => {
                    return Err(SimError::config(format!(
                        "column '{}' has {} rows but '{}' has {}",
                        name, len, first, n
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(n_groups.map_or(1, |(_, n)| n))
    }
}

/// Group specifications for one or several conditions.
///
/// Tables in a per-condition list correspond group for group: row `i` of
/// every table describes the same features.
#[derive(Clone, Debug)]
pub enum GroupSpecs {
    Single(GroupSpecTable),
    PerCondition(Vec<GroupSpecTable>),
}

impl GroupSpecs {
    pub fn tables(&self) -> &[GroupSpecTable] {
        match self {
            GroupSpecs::Single(table) => std::slice::from_ref(table),
            GroupSpecs::PerCondition(tables) => tables,
        }
    }
}

impl Default for GroupSpecs {
    fn default() -> Self {
        GroupSpecs::Single(GroupSpecTable::default())
    }
}

impl From<GroupSpecTable> for GroupSpecs {
    fn from(table: GroupSpecTable) -> Self {
        GroupSpecs::Single(table)
    }
}

impl From<Vec<GroupSpecTable>> for GroupSpecs {
    fn from(tables: Vec<GroupSpecTable>) -> Self {
        GroupSpecs::PerCondition(tables)
    }
}

/// Settings that decide the defaults during resolution.
#[derive(Clone, Debug)]
pub struct ResolveContext {
    pub family: Family,
    pub log_odds: bool,
    pub rhy_func: ScalarFn,
    pub disp_func: ScalarFn,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            family: Family::default(),
            log_odds: false,
            rhy_func: ScalarFn::sine(),
            disp_func: ScalarFn::default_dispersion(),
        }
    }
}

/// A fully specified feature group.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedGroup {
    /// 1-based group index.
    pub group: usize,
    pub frac_features: f64,
    pub rhy_func: ScalarFn,
    pub amp: ScalarFn,
    pub period: f64,
    pub phase: f64,
    pub base: ScalarFn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disp_func: Option<ScalarFn>,
}

/// Resolved groups of one condition.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedCondition {
    pub cond: String,
    pub groups: Vec<ResolvedGroup>,
}

/// Resolve a single table.
///
/// `frac_features` here is this table's own column; cross-condition rules are
/// applied by [`resolve_group_specs`].
pub fn resolve_group_table(
    table: &GroupSpecTable,
    ctx: &ResolveContext,
) -> Result<Vec<ResolvedGroup>> {
    let n = table.n_groups()?;
    let frac = table_fractions(table, n)?;
    resolve_groups(table, n, &frac, ctx)
}

/// Fractions of a table's own column, or uniform.
fn table_fractions(table: &GroupSpecTable, n: usize) -> Result<Vec<f64>> {
    match &table.frac_features {
        Some(frac) => {
            validate_fractions(frac)?;
            Ok(frac.clone())
        }
        None => Ok(vec![1.0 / n as f64; n]),
    }
}

/// Resolve `n` groups with the given fractions. The table's own
/// `frac_features` column is not read.
fn resolve_groups(
    table: &GroupSpecTable,
    n: usize,
    frac: &[f64],
    ctx: &ResolveContext,
) -> Result<Vec<ResolvedGroup>> {
    let mut groups = Vec::with_capacity(n);
    for i in 0..n {
        let period = table.period.as_ref().map_or(DEFAULT_PERIOD, |p| p[i]);
        if !(period.is_finite() && period > 0.0) {
            return Err(SimError::config(format!(
                "period of group {} must be finite and positive, got {}",
                i + 1,
                period
            )));
        }

        let phase = table.phase.as_ref().map_or(0.0, |p| p[i]);
        if !phase.is_finite() {
            return Err(SimError::config(format!(
                "phase of group {} must be finite, got {}",
                i + 1,
                phase
            )));
        }

        let sd = match ctx.family {
            Family::Gaussian => {
                let sd = table.sd.as_ref().map_or(DEFAULT_SD, |s| s[i]);
                if !(sd.is_finite() && sd >= 0.0) {
                    return Err(SimError::config(format!(
                        "sd of group {} must be finite and non-negative, got {}",
                        i + 1,
                        sd
                    )));
                }
                Some(sd)
            }
            _ => None,
        };

        let disp_func = match ctx.family {
            Family::NegBinom => Some(
                table
                    .disp_func
                    .as_ref()
                    .map_or_else(|| ctx.disp_func.clone(), |d| d[i].clone()),
            ),
            _ => None,
        };

        groups.push(ResolvedGroup {
            group: i + 1,
            frac_features: frac[i],
            rhy_func: table
                .rhy_func
                .as_ref()
                .map_or_else(|| ctx.rhy_func.clone(), |r| r[i].clone()),
            amp: table
                .amp
                .as_ref()
                .map_or_else(|| ScalarFn::constant(0.0), |a| a[i].clone().into_fn()),
            period,
            phase,
            base: table.base.as_ref().map_or_else(
                || ScalarFn::constant(ctx.family.default_base(ctx.log_odds)),
                |b| b[i].clone().into_fn(),
            ),
            sd,
            disp_func,
        });
    }

    Ok(groups)
}

/// Resolve all conditions.
///
/// Fractions come from `frac_override` when given, otherwise from the first
/// table (or uniform). A `frac_features` column on any later table is
/// ignored.
pub fn resolve_group_specs(
    specs: &GroupSpecs,
    frac_override: Option<&[f64]>,
    ctx: &ResolveContext,
) -> Result<Vec<ResolvedCondition>> {
    let tables = specs.tables();
    if tables.is_empty() {
        return Err(SimError::config("group specification list is empty"));
    }

    let n_groups = tables[0].n_groups()?;
    for (i, table) in tables.iter().enumerate().skip(1) {
        let n = table.n_groups()?;
        if n != n_groups {
            return Err(SimError::config(format!(
                "group tables must have equal row counts across conditions: \
                 condition 1 has {} groups, condition {} has {}",
                n_groups,
                i + 1,
                n
            )));
        }
    }

    let frac = match frac_override {
        Some(frac) => {
            if frac.len() != n_groups {
                return Err(SimError::config(format!(
                    "frac_features has {} entries for {} groups",
                    frac.len(),
                    n_groups
                )));
            }
            validate_fractions(frac)?;
            frac.to_vec()
        }
        None => table_fractions(&tables[0], n_groups)?,
    };

    let n_conds = tables.len();
    let mut conditions = Vec::with_capacity(n_conds);
    for (i, table) in tables.iter().enumerate() {
        if i > 0 && table.frac_features.is_some() {
            debug!(
                condition = i + 1,
                "ignoring frac_features outside the first condition"
            );
        }
        conditions.push(ResolvedCondition {
            cond: padded_id("cond", i + 1, n_conds),
            groups: resolve_groups(table, n_groups, &frac, ctx)?,
        });
    }

    debug!(
        n_conditions = n_conds,
        n_groups,
        family = %ctx.family,
        "resolved group specifications"
    );

    Ok(conditions)
}

fn validate_fractions(frac: &[f64]) -> Result<()> {
    if let Some(bad) = frac.iter().find(|f| !(f.is_finite() && **f >= 0.0)) {
        return Err(SimError::config(format!(
            "frac_features must be finite and non-negative, got {}",
            bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(family: Family) -> ResolveContext {
        ResolveContext {
            family,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_for_empty_table() {
        let groups = resolve_group_table(&GroupSpecTable::new(), &ctx(Family::Gaussian)).unwrap();
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.group, 1);
        assert_eq!(g.frac_features, 1.0);
        assert_eq!(g.period, 24.0);
        assert_eq!(g.phase, 0.0);
        assert_eq!(g.amp.eval(5.0), 0.0);
        assert_eq!(g.base.eval(5.0), 0.0);
        assert_eq!(g.sd, Some(1.0));
        assert!(g.disp_func.is_none());
        assert_eq!(g.rhy_func.label(), "sin");
    }

    #[test]
    fn test_uniform_fractions_sum_to_one() {
        let table = GroupSpecTable::new().with_amp([0.0, 0.5, 1.0]);
        let groups = resolve_group_table(&table, &ctx(Family::Gaussian)).unwrap();
        let total: f64 = groups.iter().map(|g| g.frac_features).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_family_specific_columns() {
        let table = GroupSpecTable::new().with_sd(vec![2.0]);

        let nb = resolve_group_table(&table, &ctx(Family::NegBinom)).unwrap();
        assert_eq!(nb[0].base.eval(0.0), 8.0);
        assert!(nb[0].sd.is_none());
        assert_eq!(nb[0].disp_func.as_ref().unwrap().label(), "3/mean");

        let pois = resolve_group_table(&table, &ctx(Family::Poisson)).unwrap();
        assert_eq!(pois[0].base.eval(0.0), 1.0);
        assert!(pois[0].disp_func.is_none());

        let bern_odds = ResolveContext {
            family: Family::Bernoulli,
            log_odds: true,
            ..Default::default()
        };
        let bern = resolve_group_table(&table, &bern_odds).unwrap();
        assert_eq!(bern[0].base.eval(0.0), 0.0);
    }

    #[test]
    fn test_function_params_pass_through() {
        let table = GroupSpecTable::new()
            .with_amp([Param::Function(ScalarFn::new("t/10", |t| t / 10.0))])
            .with_base([3.0]);
        let groups = resolve_group_table(&table, &ctx(Family::Gaussian)).unwrap();
        assert_eq!(groups[0].amp.eval(20.0), 2.0);
        assert_eq!(groups[0].base.eval(20.0), 3.0);
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let table = GroupSpecTable::new()
            .with_amp([0.0, 1.0])
            .with_phase(vec![0.0, 1.0, 2.0]);
        assert!(table.n_groups().unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_period_rejected() {
        let table = GroupSpecTable::new().with_period(vec![0.0]);
        let err = resolve_group_table(&table, &ctx(Family::Gaussian)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_mismatched_conditions_rejected() {
        let specs = GroupSpecs::PerCondition(vec![
            GroupSpecTable::new().with_amp([0.0, 1.0]),
            GroupSpecTable::new().with_amp([0.0]),
        ]);
        let err = resolve_group_specs(&specs, None, &ctx(Family::Gaussian)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_condition_list_rejected() {
        let specs = GroupSpecs::PerCondition(vec![]);
        assert!(resolve_group_specs(&specs, None, &ctx(Family::Gaussian)).is_err());
    }

    #[test]
    fn test_later_condition_fractions_ignored() {
        let specs = GroupSpecs::PerCondition(vec![
            GroupSpecTable::new().with_frac_features(vec![0.8, 0.2]),
            GroupSpecTable::new()
                .with_frac_features(vec![0.1, 0.9])
                .with_amp([0.0, 1.0]),
        ]);
        let conds = resolve_group_specs(&specs, None, &ctx(Family::Gaussian)).unwrap();
        assert_eq!(conds[0].cond, "cond_1");
        assert_eq!(conds[1].cond, "cond_2");
        assert_eq!(conds[1].groups[0].frac_features, 0.8);
        assert_eq!(conds[1].groups[1].frac_features, 0.2);
    }

    #[test]
    fn test_invalid_later_condition_fractions_ignored() {
        let specs = GroupSpecs::PerCondition(vec![
            GroupSpecTable::new().with_frac_features(vec![0.5, 0.5]),
            GroupSpecTable::new().with_frac_features(vec![-1.0, 2.0]),
        ]);
        let conds = resolve_group_specs(&specs, None, &ctx(Family::Gaussian)).unwrap();
        assert_eq!(conds[1].groups[0].frac_features, 0.5);
        assert_eq!(conds[1].groups[1].frac_features, 0.5);
    }

    #[test]
    fn test_invalid_first_condition_fractions_rejected() {
        for frac in [vec![-0.5, 1.5], vec![f64::NAN, 1.0], vec![f64::INFINITY, 0.0]] {
            let specs = GroupSpecs::PerCondition(vec![
                GroupSpecTable::new().with_frac_features(frac),
                GroupSpecTable::new().with_amp([0.0, 1.0]),
            ]);
            let err = resolve_group_specs(&specs, None, &ctx(Family::Gaussian)).unwrap_err();
            assert!(err.is_config());
        }
        let err = resolve_group_table(
            &GroupSpecTable::new().with_frac_features(vec![-0.1]),
            &ctx(Family::Gaussian),
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_phase_rejected() {
        for phase in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let table = GroupSpecTable::new().with_phase(vec![phase]);
            let err = resolve_group_table(&table, &ctx(Family::Gaussian)).unwrap_err();
            assert!(err.is_config());
        }
    }

    #[test]
    fn test_invalid_sd_rejected() {
        for sd in [-1.0, f64::NAN, f64::INFINITY] {
            let table = GroupSpecTable::new().with_sd(vec![sd]);
            let err = resolve_group_table(&table, &ctx(Family::Gaussian)).unwrap_err();
            assert!(err.is_config());
        }
        // sd is only read for Gaussian
        let table = GroupSpecTable::new().with_sd(vec![-1.0]);
        assert!(resolve_group_table(&table, &ctx(Family::Poisson)).is_ok());
    }

    #[test]
    fn test_invalid_frac_override_rejected() {
        let specs = GroupSpecs::Single(GroupSpecTable::new().with_frac_features(vec![-1.0]));
        let conds = resolve_group_specs(&specs, Some(&[1.0]), &ctx(Family::Gaussian)).unwrap();
        assert_eq!(conds[0].groups[0].frac_features, 1.0);

        let specs = GroupSpecs::Single(GroupSpecTable::new());
        let err = resolve_group_specs(&specs, Some(&[f64::NAN]), &ctx(Family::Gaussian)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_frac_override() {
        let specs = GroupSpecs::Single(GroupSpecTable::new().with_amp([0.0, 1.0]));
        let conds =
            resolve_group_specs(&specs, Some(&[0.25, 0.75]), &ctx(Family::Gaussian)).unwrap();
        assert_eq!(conds[0].groups[1].frac_features, 0.75);

        let err =
            resolve_group_specs(&specs, Some(&[1.0]), &ctx(Family::Gaussian)).unwrap_err();
        assert!(err.is_config());
    }
}
