use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const FIRST_PROJECTION_YEAR: u16 = 2020;
pub const LAST_PROJECTION_YEAR: u16 = 2050;

/// Settlement type used to pick the base demand vector.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    #[default]
    Average,
    City,
    Rural,
    Town,
}

impl AreaType {
    pub const VARIANTS: [AreaType; 4] = [
        AreaType::Average,
        AreaType::City,
        AreaType::Rural,
        AreaType::Town,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AreaType::Average => "average",
            AreaType::City => "city",
            AreaType::Rural => "rural",
            AreaType::Town => "town",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pace at which emission intensities improve over each decade.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyPreset {
    Fast,
    #[default]
    Normal,
    Slow,
}

impl EfficiencyPreset {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EfficiencyPreset::Fast => "fast",
            EfficiencyPreset::Normal => "normal",
            EfficiencyPreset::Slow => "slow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ScenarioRequest {
    /// Country whose reference tables drive the scenario.
    pub country: String,
    /// First year reported in the output tables (2020..=2050).
    pub year: u16,
    /// Number of inhabitants used for the population-scaled table.
    pub population: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Exact name of a local demand dataset; takes precedence over `area_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dataset: Option<String>,
    #[serde(default)]
    pub area_type: AreaType,
    /// Persons per household; 0 picks the regional or area-type default.
    #[serde(default)]
    pub house_size: f64,
    /// 0..=4 select income quintiles 1..5, 5 selects the overall mean.
    #[serde(default = "default_income_choice")]
    pub income_choice: i32,
    #[serde(default)]
    pub efficiency: EfficiencyPreset,
    #[serde(default)]
    pub scenario: ScenarioKindSpec,
}

fn default_income_choice() -> i32 {
    5
}

impl ScenarioRequest {
    pub fn baseline(country: impl Into<String>, year: u16, population: f64) -> Self {
        Self {
            country: country.into(),
            year,
            population,
            region: None,
            local_dataset: None,
            area_type: AreaType::Average,
            house_size: 0.0,
            income_choice: default_income_choice(),
            efficiency: EfficiencyPreset::Normal,
            scenario: ScenarioKindSpec::Baseline,
        }
    }

    pub fn with_policy(mut self, policy: PolicySpec) -> Self {
        self.scenario = ScenarioKindSpec::Policy(policy);
        self
    }

    pub fn parse_str(contents: &str) -> Result<Self, RequestValidationError> {
        let request: ScenarioRequest = serde_json::from_str(contents).map_err(|err| {
            RequestValidationError::single(format!("failed to parse scenario request JSON: {err}"))
        })?;
        request.validate()?;
        Ok(request)
    }

    /// Collects every structural problem with the request.
    ///
    /// A population of exactly zero passes: the engine reports it as a numeric
    /// degeneracy for the affected years instead.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        let mut errors = Vec::new();

        if self.country.trim().is_empty() {
            errors.push("country must not be empty".to_string());
        }
        if !year_in_range(self.year) {
            errors.push(format!(
                "year {} outside {FIRST_PROJECTION_YEAR}..={LAST_PROJECTION_YEAR}",
                self.year
            ));
        }
        if !self.population.is_finite() || self.population < 0.0 {
            errors.push(format!("population {} must be >= 0", self.population));
        }
        if !self.house_size.is_finite() || self.house_size < 0.0 {
            errors.push(format!("house_size {} must be >= 0", self.house_size));
        }
        if let Some(dataset) = &self.local_dataset {
            if dataset.trim().is_empty() {
                errors.push("local_dataset must not be blank when present".to_string());
            }
        }

        if let ScenarioKindSpec::Policy(policy) = &self.scenario {
            policy.collect_errors(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RequestValidationError::new(errors))
        }
    }
}

fn year_in_range(year: u16) -> bool {
    (FIRST_PROJECTION_YEAR..=LAST_PROJECTION_YEAR).contains(&year)
}

/// Explicit choice between a baseline-only run and a baseline plus policy run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioKindSpec {
    #[default]
    Baseline,
    Policy(PolicySpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PolicySpec {
    /// Year at which the enabled levers fire, once.
    pub policy_year: u16,
    /// Population from the policy year onwards.
    pub population: f64,
    /// New floor area built under the policy, in square metres.
    #[serde(default)]
    pub new_floor_area: f64,
    #[serde(default)]
    pub levers: LeverSettings,
}

impl PolicySpec {
    pub fn new(policy_year: u16, population: f64) -> Self {
        Self {
            policy_year,
            population,
            new_floor_area: 0.0,
            levers: LeverSettings::default(),
        }
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        if !year_in_range(self.policy_year) {
            errors.push(format!(
                "policy_year {} outside {FIRST_PROJECTION_YEAR}..={LAST_PROJECTION_YEAR}",
                self.policy_year
            ));
        }
        if !self.population.is_finite() || self.population < 0.0 {
            errors.push(format!("policy population {} must be >= 0", self.population));
        }
        if !self.new_floor_area.is_finite() || self.new_floor_area < 0.0 {
            errors.push(format!(
                "new_floor_area {} must be >= 0",
                self.new_floor_area
            ));
        }
        self.levers.collect_errors(errors);
    }
}

/// Lever parameters; a lever is enabled exactly when its entry is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct LeverSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency_retrofit: Option<RetrofitSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_generation: Option<LocalGenerationSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_heating: Option<LocalHeatingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biofuel: Option<BiofuelSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electric_vehicles: Option<ElectricVehicleSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal_shift: Option<ModalShiftSettings>,
}

impl LeverSettings {
    pub fn any_enabled(&self) -> bool {
        self.efficiency_retrofit.is_some()
            || self.local_generation.is_some()
            || self.local_heating.is_some()
            || self.biofuel.is_some()
            || self.electric_vehicles.is_some()
            || self.modal_shift.is_some()
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        let mut finite = |name: &str, value: f64| {
            if !value.is_finite() {
                errors.push(format!("{name} must be a finite number, got {value}"));
            }
        };

        if let Some(retrofit) = &self.efficiency_retrofit {
            finite("efficiency_retrofit.scaler", retrofit.scaler);
        }
        if let Some(generation) = &self.local_generation {
            finite("local_generation.scaler", generation.scaler);
        }
        if let Some(heating) = &self.local_heating {
            finite("local_heating.district_prop", heating.district_prop);
            finite("local_heating.elec_heat_prop", heating.elec_heat_prop);
            finite("local_heating.combustible_prop", heating.combustible_prop);
            finite("local_heating.liquids_prop", heating.liquids_prop);
            finite("local_heating.solids_prop", heating.solids_prop);
            finite("local_heating.gases_prop", heating.gases_prop);
        }
        if let Some(biofuel) = &self.biofuel {
            finite("biofuel.scaler", biofuel.scaler);
        }
        if let Some(ev) = &self.electric_vehicles {
            finite("electric_vehicles.scaler", ev.scaler);
        }
        if let Some(shift) = &self.modal_shift {
            finite("modal_shift.fuel_scaler", shift.fuel_scaler);
            finite("modal_shift.pt_scaler", shift.pt_scaler);
            finite("modal_shift.veh_scaler", shift.veh_scaler);
        }

        if let Some(generation) = &self.local_generation {
            if generation.elec_type.trim().is_empty() {
                errors.push("local_generation.elec_type must not be empty".to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RetrofitSettings {
    /// Fraction of heating demand removed by the retrofit (0..=1).
    pub scaler: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LocalGenerationSettings {
    /// Fraction of grid electricity replaced by local generation (0..=1).
    pub scaler: f64,
    /// Generation technology looked up in the LCA table, e.g. `solar_pv`.
    pub elec_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct LocalHeatingSettings {
    pub district_prop: f64,
    pub elec_heat_prop: f64,
    pub combustible_prop: f64,
    pub liquids_prop: f64,
    pub solids_prop: f64,
    pub gases_prop: f64,
    /// Replacement direct intensity for district heat (kg CO2e per currency unit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_value: Option<f64>,
    /// Heating-fuel budget to redistribute; absent uses the current total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_heat_fuel: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BiofuelSettings {
    /// Target biofuel share of the four road-fuel categories (0..=1).
    pub scaler: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ElectricVehicleSettings {
    /// Fraction of road-fuel spend converted to electricity (0..=1).
    pub scaler: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ModalShiftSettings {
    pub fuel_scaler: f64,
    pub pt_scaler: f64,
    pub veh_scaler: f64,
}

#[derive(Debug, Clone)]
pub struct RequestValidationError {
    errors: Vec<String>,
}

impl RequestValidationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}

impl std::error::Error for RequestValidationError {}

pub fn request_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ScenarioRequest)
}
