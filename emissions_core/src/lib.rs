//! Household consumption emissions projection engine.
//!
//! Projects per-capita and absolute emissions from a household expenditure
//! vector, year by year from 2020 to 2050, for a baseline trajectory and an
//! optional policy trajectory forked at a chosen year. [`emission_calculation`]
//! runs one scenario against a shared [`ReferenceData`] snapshot.

mod context;
mod decade;
mod engine;
mod engine_config;
mod error;
pub mod levers;
mod model;
mod reference;
mod results;
mod sector;
mod vector;

use std::sync::Arc;

pub use context::{IncomeChoice, ScenarioContext, ScenarioInputs, ScenarioState, YearFactors};
pub use decade::{DecadeBucket, DecadeMultipliers, FIRST_PROJECTION_YEAR, LAST_PROJECTION_YEAR};
pub use engine::{per_capita_by_product, EnginePhase, PolicyPlan, ProjectionEngine, ScenarioKind};
pub use engine_config::{
    load_engine_config_from_env, ConstructionConfig, DegeneracyPolicy, EfficiencyConfig,
    ElectricVehicleConfig, EngineConfig, EngineConfigError, EngineConfigMetadata,
    NumericsConfig, BUILTIN_ENGINE_CONFIG,
};
pub use error::EmissionsError;
pub use levers::{HeatingMix, LeverEnv, LeverFlags, LeverKind, LeverPlan, PolicyLever};
pub use model::EmissionsModel;
pub use reference::{
    load_reference_data_from_env, CountryTables, IncomeDistribution, LcaTable, PriceTable,
    Product, ProductCatalog, ProductRole, ReferenceData, ReferenceDataError,
    ReferenceDataMetadata, RegionGroup, RoleIndex, BUILTIN_REFERENCE_DATA,
};
pub use results::{
    Branch, ProjectionResult, ProjectionSeries, ProjectionTable, ResultAggregator,
    ScenarioComparison, YearEmissions,
};
pub use sector::{Sector, SectorMatrix, SectorRow};
pub use vector::{DemandVector, EmissionIntensityMatrix, ProductId, ProductVector};

/// Runs one scenario: builds its context, steps 2020..=2050 and aggregates.
///
/// The reference snapshot and config are only read; all mutable state lives
/// in the call and is dropped on return.
pub fn emission_calculation(
    reference: Arc<ReferenceData>,
    config: Arc<EngineConfig>,
    inputs: ScenarioInputs,
    kind: ScenarioKind,
) -> Result<ProjectionResult, EmissionsError> {
    EmissionsModel::new(reference, config).calculate(inputs, kind)
}
