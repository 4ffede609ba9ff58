use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use emissions_schema::EfficiencyPreset;
use serde::Deserialize;
use thiserror::Error;

use crate::reference::RegionGroup;

pub const BUILTIN_ENGINE_CONFIG: &str = include_str!("data/engine_config.json");

/// Model constants for the projection engine and the policy levers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    efficiency: EfficiencyConfig,
    electric_vehicles: ElectricVehicleConfig,
    construction: ConstructionConfig,
    numerics: NumericsConfig,
}

impl EngineConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_ENGINE_CONFIG)
                .expect("builtin engine config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| EngineConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        EngineConfig::from_json_str(&contents)
    }

    pub fn efficiency(&self) -> &EfficiencyConfig {
        &self.efficiency
    }

    pub fn electric_vehicles(&self) -> &ElectricVehicleConfig {
        &self.electric_vehicles
    }

    pub fn construction(&self) -> &ConstructionConfig {
        &self.construction
    }

    pub fn numerics(&self) -> &NumericsConfig {
        &self.numerics
    }

    pub fn numerics_mut(&mut self) -> &mut NumericsConfig {
        &mut self.numerics
    }

    fn validate(&self) -> Result<(), EngineConfigError> {
        let efficiency = &self.efficiency;
        for (name, value) in [
            ("efficiency.fast", efficiency.fast),
            ("efficiency.normal", efficiency.normal),
            ("efficiency.slow", efficiency.slow),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(EngineConfigError::OutOfRange { field: name, value });
            }
        }
        if efficiency.steps_per_decade == 0 {
            return Err(EngineConfigError::OutOfRange {
                field: "efficiency.steps_per_decade",
                value: 0.0,
            });
        }
        let ev = &self.electric_vehicles;
        for (name, value) in [
            ("electric_vehicles.petrol_mj_per_litre", ev.petrol_mj_per_litre),
            ("electric_vehicles.diesel_mj_per_litre", ev.diesel_mj_per_litre),
            ("electric_vehicles.kwh_per_mj", ev.kwh_per_mj),
            ("electric_vehicles.efficiency_gain", ev.efficiency_gain),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineConfigError::OutOfRange { field: name, value });
            }
        }
        if !self.numerics.conservation_tolerance.is_finite()
            || self.numerics.conservation_tolerance < 0.0
        {
            return Err(EngineConfigError::OutOfRange {
                field: "numerics.conservation_tolerance",
                value: self.numerics.conservation_tolerance,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read engine config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("engine config field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Decay of emission intensities per decade for each preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    fast: f64,
    normal: f64,
    slow: f64,
    steps_per_decade: u32,
}

impl EfficiencyConfig {
    pub fn decade_decay(&self, preset: EfficiencyPreset) -> f64 {
        match preset {
            EfficiencyPreset::Fast => self.fast,
            EfficiencyPreset::Normal => self.normal,
            EfficiencyPreset::Slow => self.slow,
        }
    }

    /// Per-year factor that compounds to `1 - decade_decay` over one decade.
    pub fn annual_factor(&self, preset: EfficiencyPreset) -> f64 {
        let steps = self.steps_per_decade.max(1) as f64;
        (1.0 - self.decade_decay(preset)).powf(1.0 / steps)
    }
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            fast: 0.07,
            normal: 0.03,
            slow: 0.01,
            steps_per_decade: 10,
        }
    }
}

/// Energy constants for converting road-fuel spend into electricity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElectricVehicleConfig {
    petrol_mj_per_litre: f64,
    diesel_mj_per_litre: f64,
    kwh_per_mj: f64,
    efficiency_gain: f64,
}

impl ElectricVehicleConfig {
    pub fn petrol_kwh_per_litre(&self) -> f64 {
        self.petrol_mj_per_litre * self.kwh_per_mj
    }

    pub fn diesel_kwh_per_litre(&self) -> f64 {
        self.diesel_mj_per_litre * self.kwh_per_mj
    }

    /// How many times less final energy an electric drivetrain needs.
    pub fn efficiency_gain(&self) -> f64 {
        self.efficiency_gain
    }
}

impl Default for ElectricVehicleConfig {
    fn default() -> Self {
        Self {
            petrol_mj_per_litre: 34.2,
            diesel_mj_per_litre: 38.6,
            kwh_per_mj: 0.278,
            efficiency_gain: 4.54,
        }
    }
}

/// Embodied emissions of new construction per square metre (kg CO2e).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    north: f64,
    west: f64,
    east: f64,
}

impl ConstructionConfig {
    pub fn intensity(&self, group: RegionGroup) -> f64 {
        match group {
            RegionGroup::North => self.north,
            RegionGroup::West => self.west,
            RegionGroup::East => self.east,
        }
    }
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            north: 350.0,
            west: 520.0,
            east: 580.0,
        }
    }
}

/// What to do when a year's divisor (house size, population) degenerates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneracyPolicy {
    #[default]
    Error,
    ZeroFill,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NumericsConfig {
    degeneracy_policy: DegeneracyPolicy,
    conservation_tolerance: f64,
}

impl NumericsConfig {
    pub fn degeneracy_policy(&self) -> DegeneracyPolicy {
        self.degeneracy_policy
    }

    pub fn set_degeneracy_policy(&mut self, policy: DegeneracyPolicy) {
        self.degeneracy_policy = policy;
    }

    pub fn conservation_tolerance(&self) -> f64 {
        self.conservation_tolerance
    }
}

impl Default for NumericsConfig {
    fn default() -> Self {
        Self {
            degeneracy_policy: DegeneracyPolicy::Error,
            conservation_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfigMetadata {
    path: Option<PathBuf>,
}

impl EngineConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_engine_config_from_env() -> (Arc<EngineConfig>, EngineConfigMetadata) {
    let override_path = env::var("EMISSIONS_ENGINE_CONFIG_PATH")
        .ok()
        .map(PathBuf::from);

    if let Some(path) = override_path {
        match EngineConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "emissions::config",
                    path = %path.display(),
                    "engine_config.loaded=file"
                );
                return (Arc::new(config), EngineConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "emissions::config",
                    path = %path.display(),
                    error = %err,
                    "engine_config.load_failed"
                );
            }
        }
    }

    let config = EngineConfig::builtin();
    tracing::info!(target: "emissions::config", "engine_config.loaded=builtin");
    (config, EngineConfigMetadata::new(None))
}
