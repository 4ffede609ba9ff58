//! Year-stepped projection of one scenario.
//!
//! The engine walks 2020..=2050 once. Each year it compounds growth and
//! efficiency factors into the baseline branch (and the policy branch once it
//! exists), forks the policy branch at the policy year, and records the
//! sector rows of every year from the start year onward.

use emissions_schema::ScenarioKindSpec;
use tracing::{debug, info, warn};

use crate::{
    context::{ScenarioContext, ScenarioState, YearFactors},
    decade::{FIRST_PROJECTION_YEAR, LAST_PROJECTION_YEAR},
    engine_config::DegeneracyPolicy,
    error::EmissionsError,
    levers::{LeverEnv, LeverFlags, LeverPlan},
    results::{Branch, ProjectionResult, ResultAggregator, YearEmissions},
    sector::SectorMatrix,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    NotStarted,
    Baseline,
    PolicyPending,
    PolicyApplied,
    Done,
}

/// Policy branch parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyPlan {
    pub policy_year: u16,
    /// Population from the policy year onwards.
    pub population: f64,
    pub new_floor_area: f64,
    pub levers: LeverPlan,
}

/// Caller-chosen scenario kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScenarioKind {
    #[default]
    Baseline,
    Policy(PolicyPlan),
}

impl ScenarioKind {
    /// A policy without any enabled lever runs as a baseline.
    pub fn from_spec(spec: &ScenarioKindSpec) -> Self {
        match spec {
            ScenarioKindSpec::Baseline => ScenarioKind::Baseline,
            ScenarioKindSpec::Policy(policy) if policy.levers.any_enabled() => {
                ScenarioKind::Policy(PolicyPlan {
                    policy_year: policy.policy_year,
                    population: policy.population,
                    new_floor_area: policy.new_floor_area,
                    levers: LeverPlan::from_settings(&policy.levers),
                })
            }
            ScenarioKindSpec::Policy(_) => ScenarioKind::Baseline,
        }
    }

    pub fn policy(&self) -> Option<&PolicyPlan> {
        match self {
            ScenarioKind::Baseline => None,
            ScenarioKind::Policy(plan) => Some(plan),
        }
    }
}

pub struct ProjectionEngine<'a> {
    context: &'a ScenarioContext,
    kind: ScenarioKind,
    phase: EnginePhase,
    year: u16,
    baseline: ScenarioState,
    policy: Option<ScenarioState>,
    aggregator: ResultAggregator,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(context: &'a ScenarioContext, kind: ScenarioKind) -> Result<Self, EmissionsError> {
        let kind = match kind {
            ScenarioKind::Policy(plan) if plan.levers.is_empty() => ScenarioKind::Baseline,
            kind => kind,
        };
        if let Some(plan) = kind.policy() {
            if !(FIRST_PROJECTION_YEAR..=LAST_PROJECTION_YEAR).contains(&plan.policy_year) {
                return Err(EmissionsError::configuration(format!(
                    "policy year {} outside {FIRST_PROJECTION_YEAR}..={LAST_PROJECTION_YEAR}",
                    plan.policy_year
                )));
            }
            if !plan.new_floor_area.is_finite() || plan.new_floor_area < 0.0 {
                return Err(EmissionsError::configuration(format!(
                    "new floor area {} must be finite and non-negative",
                    plan.new_floor_area
                )));
            }
        }
        let aggregator = ResultAggregator::new(kind.policy().is_some());
        Ok(Self {
            context,
            kind,
            phase: EnginePhase::NotStarted,
            year: FIRST_PROJECTION_YEAR,
            baseline: context.fresh_state(),
            policy: None,
            aggregator,
        })
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Next year to be stepped.
    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn baseline_state(&self) -> &ScenarioState {
        &self.baseline
    }

    pub fn policy_state(&self) -> Option<&ScenarioState> {
        self.policy.as_ref()
    }

    /// Advances one year. Returns `false` once the range is exhausted.
    pub fn step(&mut self) -> Result<bool, EmissionsError> {
        if self.phase == EnginePhase::Done {
            return Ok(false);
        }
        if self.phase == EnginePhase::NotStarted {
            self.phase = if self.kind.policy().is_some() {
                EnginePhase::PolicyPending
            } else {
                EnginePhase::Baseline
            };
        }

        let year = self.year;
        let factors = self.context.factors_for_year(year);
        advance_state(&mut self.baseline, year, factors);
        if let Some(policy) = self.policy.as_mut() {
            advance_state(policy, year, factors);
        }

        if self.phase == EnginePhase::PolicyPending {
            self.fire_policy_if_due(year)?;
        }

        if year >= self.context.start_year() {
            self.record_year(year)?;
        }

        if year >= LAST_PROJECTION_YEAR {
            self.phase = EnginePhase::Done;
        } else {
            self.year = year + 1;
        }
        Ok(true)
    }

    pub fn run(mut self) -> Result<ProjectionResult, EmissionsError> {
        while self.step()? {}
        self.finish()
    }

    fn fire_policy_if_due(&mut self, year: u16) -> Result<(), EmissionsError> {
        let Some(plan) = self.kind.policy() else {
            return Ok(());
        };
        if year != plan.policy_year {
            return Ok(());
        }

        let env = LeverEnv {
            roles: self.context.roles(),
            country: self.context.country(),
            config: self.context.config(),
        };
        let branch = self.baseline.branch_for_policy();
        let mut applied = plan.levers.apply(&branch, &env)?;
        applied.population = plan.population;

        info!(
            target: "emissions::engine",
            year,
            levers = ?plan.levers.flags().names(),
            "policy.branch=forked"
        );
        self.policy = Some(applied);
        self.phase = EnginePhase::PolicyApplied;
        Ok(())
    }

    fn record_year(&mut self, year: u16) -> Result<(), EmissionsError> {
        let context = self.context;
        let sectors = context.catalog().sectors();

        let baseline = sector_row(&self.baseline, sectors);
        let population = self.baseline.population;
        let (baseline_row, baseline_population) =
            self.resolve(year, Branch::Baseline, baseline, population)?;
        self.aggregator
            .record(Branch::Baseline, year, baseline_row, baseline_population);

        if self.kind.policy().is_some() {
            let policy = self
                .policy
                .as_ref()
                .map(|state| (sector_row(state, sectors), state.population));
            // Before the policy year the policy series mirrors the baseline.
            let (row, population) = match policy {
                Some((outcome, population)) => {
                    self.resolve(year, Branch::Policy, outcome, population)?
                }
                None => (baseline_row, baseline_population),
            };
            self.aggregator.record(Branch::Policy, year, row, population);
        }
        Ok(())
    }

    /// Applies the degeneracy policy to one branch's row for `year`.
    fn resolve(
        &mut self,
        year: u16,
        branch: Branch,
        outcome: Result<YearEmissions, Degenerate>,
        population: f64,
    ) -> Result<(YearEmissions, f64), EmissionsError> {
        let Degenerate { quantity, value } = match outcome {
            Ok(row) => return Ok((row, population)),
            Err(degenerate) => degenerate,
        };
        match self.context.config().numerics().degeneracy_policy() {
            DegeneracyPolicy::Error => Err(EmissionsError::NumericDegeneracy {
                year,
                quantity,
                value,
            }),
            DegeneracyPolicy::ZeroFill => {
                let branch = match branch {
                    Branch::Baseline => "baseline",
                    Branch::Policy => "policy",
                };
                warn!(
                    target: "emissions::engine",
                    year,
                    quantity,
                    value,
                    branch,
                    "degeneracy.zero_filled"
                );
                self.aggregator.warn(format!(
                    "{year}: {branch} {quantity} is {value}; year zero-filled"
                ));
                Ok((YearEmissions::zeroed(), 0.0))
            }
        }
    }

    fn finish(mut self) -> Result<ProjectionResult, EmissionsError> {
        let levers_applied = match (&self.kind, &self.policy) {
            (ScenarioKind::Policy(plan), Some(_)) => plan.levers.flags(),
            _ => LeverFlags::empty(),
        };

        if let (ScenarioKind::Policy(plan), Some(policy)) = (&self.kind, &self.policy) {
            if plan.new_floor_area > 0.0 && plan.policy_year >= self.context.start_year() {
                let intensity = self
                    .context
                    .config()
                    .construction()
                    .intensity(self.context.region_group());
                let absolute = intensity * plan.new_floor_area;
                if policy.population > 0.0 {
                    self.aggregator.add_construction(
                        plan.policy_year,
                        absolute / policy.population,
                        absolute,
                    );
                } else {
                    self.aggregator.warn(format!(
                        "{}: construction add-on skipped, policy population is {}",
                        plan.policy_year, policy.population
                    ));
                }
            }
        }

        debug!(
            target: "emissions::engine",
            country = %self.baseline.country,
            levers = ?levers_applied.names(),
            "projection.done"
        );
        Ok(self.aggregator.finish(levers_applied))
    }
}

/// Compounds one year's factors into a branch.
fn advance_state(state: &mut ScenarioState, year: u16, factors: YearFactors) {
    state.year = year;
    if factors == YearFactors::IDENTITY {
        return;
    }
    state.demand.scale(factors.income);
    state.house_size *= factors.house_size;
    state.intensities.scale(factors.efficiency);
    state.use_phase.scale(factors.efficiency);
    state.tailpipe.scale(factors.efficiency);
}

/// A divisor or result that cannot produce a finite row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Degenerate {
    quantity: &'static str,
    value: f64,
}

fn sector_row(state: &ScenarioState, sectors: &SectorMatrix) -> Result<YearEmissions, Degenerate> {
    for (quantity, value) in [
        ("house_size", state.house_size),
        ("population", state.population),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(Degenerate { quantity, value });
        }
    }
    let row = sectors.aggregate(&per_capita_by_product(state));
    if let Some(value) = row.iter().copied().find(|value| !value.is_finite()) {
        return Err(Degenerate {
            quantity: "sector emissions",
            value,
        });
    }
    Ok(YearEmissions::from_sectors(row))
}

/// `(direct + indirect + tailpipe + use_phase) ⊙ demand / house_size`.
pub fn per_capita_by_product(state: &ScenarioState) -> Vec<f64> {
    let direct = state.intensities.direct.hadamard(&state.demand);
    let indirect = state.intensities.indirect.hadamard(&state.demand);
    let use_phase = state
        .demand
        .hadamard(&state.tailpipe.plus(&state.use_phase));
    direct
        .plus(&indirect)
        .plus(&use_phase)
        .values()
        .iter()
        .map(|value| value / state.house_size)
        .collect()
}

#[cfg(test)]
mod tests {
    use emissions_schema::{BiofuelSettings, PolicySpec};

    use super::*;
    use crate::{
        context::ScenarioInputs, engine_config::EngineConfig, levers::PolicyLever,
        reference::ReferenceData,
    };

    fn context(country: &str, year: u16) -> ScenarioContext {
        ScenarioContext::new(
            ReferenceData::builtin(),
            EngineConfig::builtin(),
            ScenarioInputs::new(country, year, 1000.0),
        )
        .expect("context builds")
    }

    fn policy(year: u16, levers: Vec<PolicyLever>) -> ScenarioKind {
        ScenarioKind::Policy(PolicyPlan {
            policy_year: year,
            population: 1200.0,
            new_floor_area: 0.0,
            levers: LeverPlan::new(levers),
        })
    }

    #[test]
    fn phases_follow_policy_lifecycle() {
        let ctx = context("Ireland", 2020);
        let kind = policy(2022, vec![PolicyLever::Biofuel { scaler: 0.3 }]);
        let mut engine = ProjectionEngine::new(&ctx, kind).expect("engine builds");
        assert_eq!(engine.phase(), EnginePhase::NotStarted);

        engine.step().expect("2020");
        assert_eq!(engine.phase(), EnginePhase::PolicyPending);
        engine.step().expect("2021");
        assert!(engine.policy_state().is_none());
        engine.step().expect("2022");
        assert_eq!(engine.phase(), EnginePhase::PolicyApplied);
        assert!(engine.policy_state().is_some());
        assert!(engine.baseline_state().is_baseline);

        while engine.step().expect("step") {}
        assert_eq!(engine.phase(), EnginePhase::Done);
    }

    #[test]
    fn baseline_run_reports_start_year_onwards() {
        let ctx = context("Germany", 2025);
        let result = ProjectionEngine::new(&ctx, ScenarioKind::Baseline)
            .and_then(ProjectionEngine::run)
            .expect("baseline runs");

        let years: Vec<u16> = result.baseline.per_capita.years().collect();
        assert_eq!(years.first(), Some(&2025));
        assert_eq!(years.last(), Some(&2050));
        assert_eq!(years.len(), 26);
        assert!(result.policy.is_none());
        assert!(result.levers_applied.is_empty());
    }

    #[test]
    fn policy_series_mirrors_baseline_before_policy_year() {
        let ctx = context("Ireland", 2020);
        let kind = policy(2030, vec![PolicyLever::EfficiencyRetrofit { scaler: 0.5 }]);
        let result = ProjectionEngine::new(&ctx, kind)
            .and_then(ProjectionEngine::run)
            .expect("policy runs");
        let policy = result.policy.as_ref().expect("policy series");

        assert_eq!(
            policy.per_capita.get(2029),
            result.baseline.per_capita.get(2029)
        );
        let base_2030 = result.baseline.per_capita.total(2030).expect("2030");
        let policy_2030 = policy.per_capita.total(2030).expect("2030");
        assert!(policy_2030 < base_2030);
        assert_eq!(
            policy.absolute.total(2030),
            Some(policy_2030 * 1200.0)
        );
        assert_eq!(result.levers_applied, LeverFlags::EFFICIENCY_RETROFIT);
    }

    #[test]
    fn policy_without_levers_runs_as_baseline() {
        let mut spec = PolicySpec::new(2025, 100.0);
        spec.new_floor_area = 1000.0;
        let kind = ScenarioKind::from_spec(&ScenarioKindSpec::Policy(spec.clone()));
        assert_eq!(kind, ScenarioKind::Baseline);

        spec.levers.biofuel = Some(BiofuelSettings { scaler: 0.1 });
        let kind = ScenarioKind::from_spec(&ScenarioKindSpec::Policy(spec));
        assert!(kind.policy().is_some());

        let ctx = context("Ireland", 2020);
        let result = ProjectionEngine::new(&ctx, policy(2025, Vec::new()))
            .and_then(ProjectionEngine::run)
            .expect("empty plan runs");
        assert!(result.policy.is_none());
        assert!(result.levers_applied.is_empty());
    }

    #[test]
    fn zero_population_is_degenerate_by_default() {
        let ctx = ScenarioContext::new(
            ReferenceData::builtin(),
            EngineConfig::builtin(),
            ScenarioInputs::new("Ireland", 2020, 0.0),
        )
        .expect("context builds");
        let err = ProjectionEngine::new(&ctx, ScenarioKind::Baseline)
            .and_then(ProjectionEngine::run)
            .expect_err("zero population");
        assert_eq!(
            err,
            EmissionsError::NumericDegeneracy {
                year: 2020,
                quantity: "population",
                value: 0.0
            }
        );
    }

    #[test]
    fn collapsing_house_size_is_degenerate() {
        let json = crate::reference::tests::TINY.replace(
            r#""house_size": { "average": 2.0 },"#,
            r#""house_size": { "average": 2.0 },
                "house_size_growth": { "2030": 0.0, "2040": 1.0, "2050": 1.0 },"#,
        );
        let reference = ReferenceData::from_json_str(&json).expect("dataset parses");
        let ctx = ScenarioContext::new(
            std::sync::Arc::new(reference),
            EngineConfig::builtin(),
            ScenarioInputs::new("Testland", 2020, 1000.0),
        )
        .expect("context builds");
        assert_eq!(ctx.initial_state().house_size, 2.0);

        let err = ProjectionEngine::new(&ctx, ScenarioKind::Baseline)
            .and_then(ProjectionEngine::run)
            .expect_err("house size collapses in 2021");
        assert_eq!(
            err,
            EmissionsError::NumericDegeneracy {
                year: 2021,
                quantity: "house_size",
                value: 0.0
            }
        );
    }

    #[test]
    fn zero_fill_policy_records_warnings() {
        let mut config = EngineConfig::default();
        config
            .numerics_mut()
            .set_degeneracy_policy(DegeneracyPolicy::ZeroFill);
        let ctx = ScenarioContext::new(
            ReferenceData::builtin(),
            std::sync::Arc::new(config),
            ScenarioInputs::new("Ireland", 2048, 0.0),
        )
        .expect("context builds");
        let result = ProjectionEngine::new(&ctx, ScenarioKind::Baseline)
            .and_then(ProjectionEngine::run)
            .expect("zero-filled run");

        assert_eq!(result.warnings.len(), 3);
        assert!(result.warnings[0].starts_with("2048: baseline population"));
        assert_eq!(result.baseline.per_capita.total(2050), Some(0.0));
        assert_eq!(result.baseline.absolute.total(2050), Some(0.0));
    }

    #[test]
    fn policy_year_outside_range_is_rejected() {
        let ctx = context("Ireland", 2020);
        let kind = policy(2060, vec![PolicyLever::Biofuel { scaler: 0.3 }]);
        assert!(matches!(
            ProjectionEngine::new(&ctx, kind),
            Err(EmissionsError::Configuration(_))
        ));
    }
}
