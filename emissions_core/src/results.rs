use std::collections::BTreeMap;

use emissions_schema::{ProjectionTables, ScenarioOutput, YearRow, TOTAL_EMISSIONS_KEY};
use serde::Serialize;

use crate::{
    levers::LeverFlags,
    sector::{Sector, SectorRow},
};

/// Sector breakdown of one year plus its total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearEmissions {
    pub sectors: SectorRow,
    /// Sum of the sectors, plus any construction add-on in the policy year.
    pub total: f64,
}

impl YearEmissions {
    pub fn from_sectors(sectors: SectorRow) -> Self {
        Self {
            sectors,
            total: sectors.iter().sum(),
        }
    }

    pub fn zeroed() -> Self {
        Self::from_sectors([0.0; Sector::COUNT])
    }

    pub fn sector(&self, sector: Sector) -> f64 {
        self.sectors[sector.index()]
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut sectors = self.sectors;
        sectors.iter_mut().for_each(|value| *value *= factor);
        Self {
            sectors,
            total: self.total * factor,
        }
    }

    fn to_row(self) -> YearRow {
        let mut row: YearRow = Sector::variants()
            .iter()
            .map(|sector| (sector.as_str().to_string(), self.sector(*sector)))
            .collect();
        row.insert(TOTAL_EMISSIONS_KEY.to_string(), self.total);
        row
    }
}

/// Year-keyed emissions for one branch in one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionTable {
    rows: BTreeMap<u16, YearEmissions>,
}

impl ProjectionTable {
    pub fn insert(&mut self, year: u16, row: YearEmissions) {
        self.rows.insert(year, row);
    }

    pub fn get(&self, year: u16) -> Option<&YearEmissions> {
        self.rows.get(&year)
    }

    pub fn total(&self, year: u16) -> Option<f64> {
        self.rows.get(&year).map(|row| row.total)
    }

    pub fn years(&self) -> impl Iterator<Item = u16> + '_ {
        self.rows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &YearEmissions)> {
        self.rows.iter().map(|(year, row)| (*year, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cumulative_total(&self) -> f64 {
        self.rows.values().map(|row| row.total).sum()
    }

    pub fn cumulative_sectors(&self) -> SectorRow {
        let mut out = [0.0; Sector::COUNT];
        for row in self.rows.values() {
            for (slot, value) in out.iter_mut().zip(row.sectors.iter()) {
                *slot += value;
            }
        }
        out
    }

    fn add_to_total(&mut self, year: u16, delta: f64) {
        if let Some(row) = self.rows.get_mut(&year) {
            row.total += delta;
        }
    }

    fn to_rows(&self) -> BTreeMap<u16, YearRow> {
        self.rows
            .iter()
            .map(|(year, row)| (*year, row.to_row()))
            .collect()
    }
}

/// Per-capita series and its population-scaled twin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionSeries {
    pub per_capita: ProjectionTable,
    pub absolute: ProjectionTable,
}

impl ProjectionSeries {
    pub fn to_tables(&self) -> ProjectionTables {
        ProjectionTables {
            per_capita: self.per_capita.to_rows(),
            absolute: self.absolute.to_rows(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Baseline,
    Policy,
}

/// Collects per-year rows from the engine into baseline and policy series.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    baseline: ProjectionSeries,
    policy: Option<ProjectionSeries>,
    warnings: Vec<String>,
}

impl ResultAggregator {
    pub fn new(with_policy: bool) -> Self {
        Self {
            baseline: ProjectionSeries::default(),
            policy: with_policy.then(ProjectionSeries::default),
            warnings: Vec::new(),
        }
    }

    /// Stores `per_capita` for `year` and its twin scaled by `population`.
    pub fn record(&mut self, branch: Branch, year: u16, per_capita: YearEmissions, population: f64) {
        let series = match branch {
            Branch::Baseline => &mut self.baseline,
            Branch::Policy => match self.policy.as_mut() {
                Some(series) => series,
                None => return,
            },
        };
        series.per_capita.insert(year, per_capita);
        series.absolute.insert(year, per_capita.scaled(population));
    }

    /// Adds embodied construction emissions to the policy year's totals.
    pub fn add_construction(&mut self, year: u16, per_capita: f64, absolute: f64) {
        if let Some(series) = self.policy.as_mut() {
            series.per_capita.add_to_total(year, per_capita);
            series.absolute.add_to_total(year, absolute);
        }
    }

    pub fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    pub fn finish(self, levers_applied: LeverFlags) -> ProjectionResult {
        ProjectionResult {
            baseline: self.baseline,
            policy: self.policy,
            levers_applied,
            warnings: self.warnings,
        }
    }
}

/// Everything one `emission_calculation` produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub baseline: ProjectionSeries,
    /// Present only when at least one lever was enabled.
    pub policy: Option<ProjectionSeries>,
    pub levers_applied: LeverFlags,
    pub warnings: Vec<String>,
}

impl ProjectionResult {
    pub fn to_output(&self) -> ScenarioOutput {
        ScenarioOutput {
            baseline: self.baseline.to_tables(),
            policy: self.policy.as_ref().map(ProjectionSeries::to_tables),
            levers_applied: self
                .levers_applied
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn comparison(&self) -> Option<ScenarioComparison> {
        self.policy
            .as_ref()
            .map(|policy| ScenarioComparison::between(&self.baseline, policy))
    }
}

/// Cumulative baseline versus policy emissions over the reported years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub baseline_per_capita: f64,
    pub policy_per_capita: f64,
    pub baseline_absolute: f64,
    pub policy_absolute: f64,
    /// Baseline minus policy, absolute units.
    pub reduction: f64,
    /// `reduction / baseline_absolute`; zero when the baseline is zero.
    pub relative_reduction: f64,
    /// Policy minus baseline, per sector, absolute units.
    pub sector_deltas: BTreeMap<Sector, f64>,
}

impl ScenarioComparison {
    pub fn between(baseline: &ProjectionSeries, policy: &ProjectionSeries) -> Self {
        let baseline_absolute = baseline.absolute.cumulative_total();
        let policy_absolute = policy.absolute.cumulative_total();
        let reduction = baseline_absolute - policy_absolute;
        let relative_reduction = if baseline_absolute != 0.0 {
            reduction / baseline_absolute
        } else {
            0.0
        };

        let base_sectors = baseline.absolute.cumulative_sectors();
        let policy_sectors = policy.absolute.cumulative_sectors();
        let sector_deltas = Sector::variants()
            .iter()
            .map(|sector| {
                let idx = sector.index();
                (*sector, policy_sectors[idx] - base_sectors[idx])
            })
            .collect();

        Self {
            baseline_per_capita: baseline.per_capita.cumulative_total(),
            policy_per_capita: policy.per_capita.cumulative_total(),
            baseline_absolute,
            policy_absolute,
            reduction,
            relative_reduction,
            sector_deltas,
        }
    }
}
