use std::sync::Arc;

use emissions_schema::{AreaType, EfficiencyPreset, ScenarioRequest};
use tracing::{debug, warn};

use crate::{
    decade::{DecadeMultipliers, FIRST_PROJECTION_YEAR, LAST_PROJECTION_YEAR},
    engine_config::EngineConfig,
    error::EmissionsError,
    reference::{CountryTables, ProductCatalog, ReferenceData, RegionGroup, RoleIndex},
    vector::{DemandVector, EmissionIntensityMatrix, ProductVector},
};

/// Caller-supplied description of the household being projected.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioInputs {
    pub country: String,
    /// First reported year.
    pub year: u16,
    pub population: f64,
    pub region: Option<String>,
    pub local_dataset: Option<String>,
    pub area_type: AreaType,
    /// Persons per household; zero selects the reference default.
    pub house_size: f64,
    pub income_choice: i32,
    pub efficiency: EfficiencyPreset,
}

impl ScenarioInputs {
    pub fn new(country: impl Into<String>, year: u16, population: f64) -> Self {
        Self {
            country: country.into(),
            year,
            population,
            region: None,
            local_dataset: None,
            area_type: AreaType::Average,
            house_size: 0.0,
            income_choice: IncomeChoice::OVERALL_INDEX,
            efficiency: EfficiencyPreset::Normal,
        }
    }
}

impl From<&ScenarioRequest> for ScenarioInputs {
    fn from(request: &ScenarioRequest) -> Self {
        Self {
            country: request.country.clone(),
            year: request.year,
            population: request.population,
            region: request.region.clone(),
            local_dataset: request.local_dataset.clone(),
            area_type: request.area_type,
            house_size: request.house_size,
            income_choice: request.income_choice,
            efficiency: request.efficiency,
        }
    }
}

/// Which slice of the income distribution the household sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeChoice {
    /// 1..=5, lowest to highest.
    Quintile(u8),
    /// Mean over all households.
    Overall,
}

impl IncomeChoice {
    pub const OVERALL_INDEX: i32 = 5;
    pub const FALLBACK: IncomeChoice = IncomeChoice::Quintile(3);

    /// Maps the wire index; `None` means the index was out of range.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0..=4 => Some(IncomeChoice::Quintile(index as u8 + 1)),
            Self::OVERALL_INDEX => Some(IncomeChoice::Overall),
            _ => None,
        }
    }

    /// Ratio of this slice's mean spend to the overall mean spend.
    pub fn factor(self, country: &CountryTables) -> f64 {
        match self {
            IncomeChoice::Overall => 1.0,
            IncomeChoice::Quintile(q) => {
                let idx = usize::from(q.clamp(1, 5) - 1);
                country.income.quintiles[idx] / country.income.mean
            }
        }
    }
}

/// Mutable state of one scenario branch at a given year.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioState {
    pub year: u16,
    pub country: String,
    pub region: Option<String>,
    pub population: f64,
    pub house_size: f64,
    pub demand: DemandVector,
    pub intensities: EmissionIntensityMatrix,
    pub use_phase: ProductVector,
    pub tailpipe: ProductVector,
    /// Share of electricity spend that goes to space and water heating.
    pub elec_heating_share: f64,
    pub is_baseline: bool,
}

impl ScenarioState {
    pub fn total_electricity(&self, roles: &RoleIndex) -> f64 {
        self.demand.sum_of(&roles.electricity)
    }

    pub fn heating_electricity(&self, roles: &RoleIndex) -> f64 {
        self.total_electricity(roles) * self.elec_heating_share
    }

    pub fn non_heating_electricity(&self, roles: &RoleIndex) -> f64 {
        self.total_electricity(roles) - self.heating_electricity(roles)
    }

    /// Liquids + solids + gases + district heat + heating electricity.
    pub fn total_heating_fuel(&self, roles: &RoleIndex) -> f64 {
        self.demand.sum_of(&roles.combustible_heating())
            + self.demand.sum_of(&roles.district_heat)
            + self.heating_electricity(roles)
    }

    /// Independent copy that a policy branch may mutate.
    pub fn branch_for_policy(&self) -> ScenarioState {
        let mut branch = self.clone();
        branch.is_baseline = false;
        branch
    }
}

/// Growth and efficiency factors applied when stepping into one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearFactors {
    pub income: f64,
    pub house_size: f64,
    pub efficiency: f64,
}

impl YearFactors {
    pub const IDENTITY: YearFactors = YearFactors {
        income: 1.0,
        house_size: 1.0,
        efficiency: 1.0,
    };
}

/// One scenario's resolved inputs and its initial state.
///
/// Built once per calculation from the shared reference snapshot. The
/// initial state is owned here; the engine works on clones of it.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    reference: Arc<ReferenceData>,
    config: Arc<EngineConfig>,
    inputs: ScenarioInputs,
    country_name: String,
    income_choice: IncomeChoice,
    income_factor: f64,
    income_growth: DecadeMultipliers,
    house_size_growth: DecadeMultipliers,
    annual_efficiency: f64,
    initial: ScenarioState,
}

impl ScenarioContext {
    pub fn new(
        reference: Arc<ReferenceData>,
        config: Arc<EngineConfig>,
        inputs: ScenarioInputs,
    ) -> Result<Self, EmissionsError> {
        if !(FIRST_PROJECTION_YEAR..=LAST_PROJECTION_YEAR).contains(&inputs.year) {
            return Err(EmissionsError::configuration(format!(
                "start year {} outside {FIRST_PROJECTION_YEAR}..={LAST_PROJECTION_YEAR}",
                inputs.year
            )));
        }

        let country = reference.country(&inputs.country).ok_or_else(|| {
            EmissionsError::configuration(format!("unknown country '{}'", inputs.country))
        })?;

        let base_demand = match inputs.local_dataset.as_deref() {
            Some(name) => country.local_dataset(name).ok_or_else(|| {
                EmissionsError::configuration(format!(
                    "unknown local dataset '{name}' for {}",
                    country.name
                ))
            })?,
            None => country.demand_for(inputs.area_type).ok_or_else(|| {
                EmissionsError::configuration(format!(
                    "no {} demand vector for {}",
                    inputs.area_type, country.name
                ))
            })?,
        };
        if let Some((id, value)) = base_demand.iter().find(|(_, value)| *value < 0.0) {
            return Err(EmissionsError::configuration(format!(
                "negative expenditure {value} for product {}",
                id.index()
            )));
        }

        let income_choice = match IncomeChoice::from_index(inputs.income_choice) {
            Some(choice) => choice,
            None => {
                warn!(
                    target: "emissions::context",
                    income_choice = inputs.income_choice,
                    "income_choice.clamped=quintile_3"
                );
                IncomeChoice::FALLBACK
            }
        };
        let income_factor = income_choice.factor(country);
        if !income_factor.is_finite() {
            return Err(EmissionsError::configuration(format!(
                "income factor for {} is not finite",
                country.name
            )));
        }

        if !inputs.house_size.is_finite() || inputs.house_size < 0.0 {
            return Err(EmissionsError::NumericDegeneracy {
                year: inputs.year,
                quantity: "house_size",
                value: inputs.house_size,
            });
        }
        let house_size = if inputs.house_size > 0.0 {
            inputs.house_size
        } else {
            country
                .default_house_size(inputs.area_type, inputs.region.as_deref())
                .ok_or_else(|| {
                    EmissionsError::configuration(format!(
                        "no default house size for {}",
                        country.name
                    ))
                })?
        };

        let mut demand = base_demand.clone();
        demand.scale(income_factor);

        let initial = ScenarioState {
            year: FIRST_PROJECTION_YEAR,
            country: country.name.clone(),
            region: inputs.region.clone(),
            population: inputs.population,
            house_size,
            demand,
            intensities: country.intensity.clone(),
            use_phase: country.use_phase.clone(),
            tailpipe: country.tailpipe.clone(),
            elec_heating_share: country.electricity_heating_share,
            is_baseline: true,
        };
        let annual_efficiency = config.efficiency().annual_factor(inputs.efficiency);

        debug!(
            target: "emissions::context",
            country = %country.name,
            area = %inputs.area_type,
            local_dataset = inputs.local_dataset.as_deref().unwrap_or("-"),
            income_factor,
            house_size,
            "scenario_context.built"
        );

        Ok(Self {
            country_name: country.name.clone(),
            income_growth: country.income_growth,
            house_size_growth: country.house_size_growth,
            reference,
            config,
            inputs,
            income_choice,
            income_factor,
            annual_efficiency,
            initial,
        })
    }

    pub fn inputs(&self) -> &ScenarioInputs {
        &self.inputs
    }

    pub fn start_year(&self) -> u16 {
        self.inputs.year
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn catalog(&self) -> &ProductCatalog {
        self.reference.catalog()
    }

    pub fn roles(&self) -> &RoleIndex {
        self.reference.catalog().roles()
    }

    pub fn country(&self) -> &CountryTables {
        self.reference
            .country(&self.country_name)
            .expect("country resolved at context construction")
    }

    pub fn region_group(&self) -> RegionGroup {
        self.country().region_group
    }

    pub fn income_choice(&self) -> IncomeChoice {
        self.income_choice
    }

    pub fn income_factor(&self) -> f64 {
        self.income_factor
    }

    pub fn initial_state(&self) -> &ScenarioState {
        &self.initial
    }

    /// Fresh copy of the initial state for a new run.
    pub fn fresh_state(&self) -> ScenarioState {
        self.initial.clone()
    }

    pub fn total_electricity(&self) -> f64 {
        self.initial.total_electricity(self.roles())
    }

    pub fn total_heating_fuel(&self) -> f64 {
        self.initial.total_heating_fuel(self.roles())
    }

    /// Growth multipliers come from the year's decade bucket. Efficiency is
    /// the preset's annual factor and does not vary by bucket.
    pub fn factors_for_year(&self, year: u16) -> YearFactors {
        if year <= FIRST_PROJECTION_YEAR {
            return YearFactors::IDENTITY;
        }
        YearFactors {
            income: self.income_growth.for_year(year),
            house_size: self.house_size_growth.for_year(year),
            efficiency: self.annual_efficiency,
        }
    }
}
