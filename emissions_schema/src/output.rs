use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Key carrying the sum of all sector values in every year row.
pub const TOTAL_EMISSIONS_KEY: &str = "Total_Emissions";

/// Sector name (plus [`TOTAL_EMISSIONS_KEY`]) to kg CO2e.
pub type YearRow = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProjectionTables {
    /// Year to per-capita emissions.
    pub per_capita: BTreeMap<u16, YearRow>,
    /// Year to population-scaled emissions.
    pub absolute: BTreeMap<u16, YearRow>,
}

impl ProjectionTables {
    pub fn total(&self, year: u16) -> Option<f64> {
        self.per_capita
            .get(&year)
            .and_then(|row| row.get(TOTAL_EMISSIONS_KEY))
            .copied()
    }

    pub fn absolute_total(&self, year: u16) -> Option<f64> {
        self.absolute
            .get(&year)
            .and_then(|row| row.get(TOTAL_EMISSIONS_KEY))
            .copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ScenarioOutput {
    pub baseline: ProjectionTables,
    /// Present only when at least one lever was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ProjectionTables>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levers_applied: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn output_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ScenarioOutput)
}
