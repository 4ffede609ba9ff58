//! Wire contracts for the household emissions projection engine.
//!
//! These types describe what a caller (an HTTP layer, the scenario harness, a
//! batch file) sends in and gets back. They carry no model logic and do not
//! depend on `emissions_core`, so a transport layer can validate requests and
//! publish the JSON schema without pulling in the engine.

mod output;
mod request;

pub use output::{
    output_schema, ProjectionTables, ScenarioOutput, YearRow, TOTAL_EMISSIONS_KEY,
};
pub use request::{
    request_schema, AreaType, BiofuelSettings, EfficiencyPreset, ElectricVehicleSettings,
    LeverSettings, LocalGenerationSettings, LocalHeatingSettings, ModalShiftSettings,
    PolicySpec, RequestValidationError, RetrofitSettings, ScenarioKindSpec, ScenarioRequest,
    FIRST_PROJECTION_YEAR, LAST_PROJECTION_YEAR,
};
