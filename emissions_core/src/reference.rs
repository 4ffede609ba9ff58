//! Read-only reference tables shared by every scenario.
//!
//! The tables are loaded once, validated, converted into dense vectors
//! aligned with the product catalogue and then handed out behind an `Arc`.
//! Nothing in the engine mutates them; scenarios copy what they need.

use std::{
    collections::{BTreeMap, HashMap},
    env, fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use emissions_schema::AreaType;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    decade::DecadeMultipliers,
    sector::{Sector, SectorMatrix, SectorRow},
    vector::{DemandVector, EmissionIntensityMatrix, ProductId, ProductVector},
};

pub const BUILTIN_REFERENCE_DATA: &str = include_str!("data/reference_data.json");

const SECTOR_WEIGHT_TOLERANCE: f64 = 1e-6;

/// What a product stands for as far as the policy levers are concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRole {
    #[default]
    None,
    Electricity,
    UnspecifiedElectricity,
    HeatingLiquid,
    HeatingSolid,
    HeatingGas,
    DistrictHeat,
    MotorGasoline,
    GasDieselOil,
    Biogasoline,
    Biodiesel,
    Vehicle,
    PublicTransport,
}

impl ProductRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductRole::None => "none",
            ProductRole::Electricity => "electricity",
            ProductRole::UnspecifiedElectricity => "unspecified_electricity",
            ProductRole::HeatingLiquid => "heating_liquid",
            ProductRole::HeatingSolid => "heating_solid",
            ProductRole::HeatingGas => "heating_gas",
            ProductRole::DistrictHeat => "district_heat",
            ProductRole::MotorGasoline => "motor_gasoline",
            ProductRole::GasDieselOil => "gas_diesel_oil",
            ProductRole::Biogasoline => "biogasoline",
            ProductRole::Biodiesel => "biodiesel",
            ProductRole::Vehicle => "vehicle",
            ProductRole::PublicTransport => "public_transport",
        }
    }
}

impl fmt::Display for ProductRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Country grouping that selects the construction emission constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGroup {
    North,
    West,
    East,
}

impl RegionGroup {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RegionGroup::North => "north",
            RegionGroup::West => "west",
            RegionGroup::East => "east",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub role: ProductRole,
}

/// Product ids grouped by the role the levers address them by.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleIndex {
    /// Every electricity category, the unspecified one included.
    pub electricity: Vec<ProductId>,
    /// Electricity categories tied to a named grid source.
    pub grid_electricity: Vec<ProductId>,
    pub unspecified_electricity: ProductId,
    pub heating_liquids: Vec<ProductId>,
    pub heating_solids: Vec<ProductId>,
    pub heating_gases: Vec<ProductId>,
    pub district_heat: Vec<ProductId>,
    pub motor_gasoline: ProductId,
    pub gas_diesel_oil: ProductId,
    pub biogasoline: ProductId,
    pub biodiesel: ProductId,
    pub vehicles: Vec<ProductId>,
    pub public_transport: Vec<ProductId>,
}

impl RoleIndex {
    fn build(products: &[Product]) -> Result<Self, ReferenceDataError> {
        let ids_for = |role: ProductRole| -> Vec<ProductId> {
            products
                .iter()
                .filter(|product| product.role == role)
                .map(|product| product.id)
                .collect()
        };
        let single = |role: ProductRole| -> Result<ProductId, ReferenceDataError> {
            let ids = ids_for(role);
            match ids.as_slice() {
                [id] => Ok(*id),
                [] => Err(ReferenceDataError::MissingRole { role }),
                _ => Err(ReferenceDataError::AmbiguousRole {
                    role,
                    count: ids.len(),
                }),
            }
        };

        let unspecified_electricity = single(ProductRole::UnspecifiedElectricity)?;
        let grid_electricity = ids_for(ProductRole::Electricity);
        let mut electricity = grid_electricity.clone();
        electricity.push(unspecified_electricity);
        electricity.sort_unstable();

        let district_heat = ids_for(ProductRole::DistrictHeat);
        if district_heat.is_empty() {
            return Err(ReferenceDataError::MissingRole {
                role: ProductRole::DistrictHeat,
            });
        }

        Ok(Self {
            electricity,
            grid_electricity,
            unspecified_electricity,
            heating_liquids: ids_for(ProductRole::HeatingLiquid),
            heating_solids: ids_for(ProductRole::HeatingSolid),
            heating_gases: ids_for(ProductRole::HeatingGas),
            district_heat,
            motor_gasoline: single(ProductRole::MotorGasoline)?,
            gas_diesel_oil: single(ProductRole::GasDieselOil)?,
            biogasoline: single(ProductRole::Biogasoline)?,
            biodiesel: single(ProductRole::Biodiesel)?,
            vehicles: ids_for(ProductRole::Vehicle),
            public_transport: ids_for(ProductRole::PublicTransport),
        })
    }

    /// The four road-fuel categories: petrol, diesel and their biofuels.
    pub fn transport_fuels(&self) -> [ProductId; 4] {
        [
            self.motor_gasoline,
            self.gas_diesel_oil,
            self.biogasoline,
            self.biodiesel,
        ]
    }

    /// Liquid, solid and gas heating categories.
    pub fn combustible_heating(&self) -> Vec<ProductId> {
        let mut ids = Vec::with_capacity(
            self.heating_liquids.len() + self.heating_solids.len() + self.heating_gases.len(),
        );
        ids.extend_from_slice(&self.heating_liquids);
        ids.extend_from_slice(&self.heating_solids);
        ids.extend_from_slice(&self.heating_gases);
        ids
    }
}

/// Products, their lever roles and the fixed sector-membership matrix.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    products: Vec<Product>,
    by_name: HashMap<String, ProductId>,
    roles: RoleIndex,
    sectors: SectorMatrix,
}

impl ProductCatalog {
    fn from_raw(raw: Vec<RawProduct>) -> Result<Self, ReferenceDataError> {
        if raw.len() > u16::MAX as usize {
            return Err(ReferenceDataError::TooManyProducts { count: raw.len() });
        }
        let mut products = Vec::with_capacity(raw.len());
        let mut by_name = HashMap::with_capacity(raw.len());
        let mut rows: Vec<SectorRow> = Vec::with_capacity(raw.len());

        for (idx, entry) in raw.into_iter().enumerate() {
            let id = ProductId(idx as u16);
            if by_name.insert(entry.name.clone(), id).is_some() {
                return Err(ReferenceDataError::DuplicateProduct { name: entry.name });
            }

            let mut row = [0.0; Sector::COUNT];
            for (sector, weight) in &entry.sectors {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(ReferenceDataError::SectorWeights {
                        product: entry.name.clone(),
                        total: *weight,
                    });
                }
                row[sector.index()] += weight;
            }
            let total: f64 = row.iter().sum();
            if (total - 1.0).abs() > SECTOR_WEIGHT_TOLERANCE {
                return Err(ReferenceDataError::SectorWeights {
                    product: entry.name,
                    total,
                });
            }
            rows.push(row);
            products.push(Product {
                id,
                name: entry.name,
                role: entry.role,
            });
        }

        let roles = RoleIndex::build(&products)?;
        Ok(Self {
            products,
            by_name,
            roles,
            sectors: SectorMatrix::from_rows(rows),
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn id(&self, name: &str) -> Option<ProductId> {
        self.by_name.get(name).copied()
    }

    pub fn roles(&self) -> &RoleIndex {
        &self.roles
    }

    pub fn sectors(&self) -> &SectorMatrix {
        &self.sectors
    }

    fn dense(
        &self,
        country: &str,
        table: &str,
        values: &BTreeMap<String, f64>,
    ) -> Result<ProductVector, ReferenceDataError> {
        let mut vector = ProductVector::zeros(self.products.len());
        for (name, value) in values {
            let id = self
                .id(name)
                .ok_or_else(|| ReferenceDataError::UnknownProduct {
                    country: country.to_string(),
                    table: table.to_string(),
                    name: name.clone(),
                })?;
            if !value.is_finite() {
                return Err(ReferenceDataError::InvalidValue {
                    country: country.to_string(),
                    table: table.to_string(),
                    name: name.clone(),
                    value: *value,
                });
            }
            vector.set(id, *value);
        }
        Ok(vector)
    }

    fn demand(
        &self,
        country: &str,
        table: &str,
        values: &BTreeMap<String, f64>,
    ) -> Result<DemandVector, ReferenceDataError> {
        let vector = self.dense(country, table, values)?;
        if let Some((id, value)) = vector.iter().find(|(_, value)| *value < 0.0) {
            return Err(ReferenceDataError::InvalidValue {
                country: country.to_string(),
                table: table.to_string(),
                name: self.products[id.index()].name.clone(),
                value,
            });
        }
        Ok(vector)
    }
}

/// Mean household spend per income quintile and overall.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct IncomeDistribution {
    pub mean: f64,
    pub quintiles: [f64; 5],
}

/// Road fuels per litre, electricity per kWh.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceTable {
    pub petrol: f64,
    pub diesel: f64,
    pub electricity: f64,
}

/// Lifecycle intensities of local generation technologies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LcaTable {
    #[serde(default)]
    pub direct: BTreeMap<String, f64>,
    #[serde(default)]
    pub indirect: BTreeMap<String, f64>,
}

impl LcaTable {
    /// `(direct, indirect)` for a technology; a technology missing from one
    /// row counts as zero there, missing from both is unknown.
    pub fn intensity(&self, elec_type: &str) -> Option<(f64, f64)> {
        let direct = self.direct.get(elec_type).copied();
        let indirect = self.indirect.get(elec_type).copied();
        if direct.is_none() && indirect.is_none() {
            return None;
        }
        Some((direct.unwrap_or(0.0), indirect.unwrap_or(0.0)))
    }

    pub fn technologies(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .direct
            .keys()
            .chain(self.indirect.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }
}

/// Every table the engine reads for one country.
#[derive(Debug, Clone)]
pub struct CountryTables {
    pub name: String,
    pub region_group: RegionGroup,
    pub house_size: BTreeMap<AreaType, f64>,
    pub regional_house_size: BTreeMap<String, f64>,
    pub electricity_heating_share: f64,
    pub demand: BTreeMap<AreaType, DemandVector>,
    pub local_datasets: BTreeMap<String, DemandVector>,
    pub intensity: EmissionIntensityMatrix,
    pub use_phase: ProductVector,
    pub tailpipe: ProductVector,
    pub income: IncomeDistribution,
    pub income_growth: DecadeMultipliers,
    pub house_size_growth: DecadeMultipliers,
    pub prices: PriceTable,
    pub lca: LcaTable,
}

impl CountryTables {
    pub fn demand_for(&self, area: AreaType) -> Option<&DemandVector> {
        self.demand.get(&area)
    }

    /// Exact-name lookup of a local demand dataset.
    pub fn local_dataset(&self, name: &str) -> Option<&DemandVector> {
        self.local_datasets.get(name)
    }

    /// Persons per household when the caller leaves house size unset.
    pub fn default_house_size(&self, area: AreaType, region: Option<&str>) -> Option<f64> {
        region
            .and_then(|region| self.regional_house_size.get(region))
            .or_else(|| self.house_size.get(&area))
            .or_else(|| self.house_size.get(&AreaType::Average))
            .copied()
    }
}

/// The whole reference snapshot: catalogue plus per-country tables.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    version: u32,
    catalog: ProductCatalog,
    countries: BTreeMap<String, CountryTables>,
}

impl ReferenceData {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            ReferenceData::from_json_str(BUILTIN_REFERENCE_DATA)
                .unwrap_or_else(|err| panic!("failed to parse builtin reference data: {err}")),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ReferenceDataError> {
        let raw: RawReferenceData = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_file(path: &Path) -> Result<Self, ReferenceDataError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ReferenceDataError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    fn from_raw(raw: RawReferenceData) -> Result<Self, ReferenceDataError> {
        let catalog = ProductCatalog::from_raw(raw.products)?;
        let mut countries = BTreeMap::new();
        for (name, entry) in raw.countries {
            let tables = entry.into_tables(&name, &catalog)?;
            countries.insert(name, tables);
        }
        Ok(Self {
            version: raw.version,
            catalog,
            countries,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Looks a country up by exact name, then case-insensitively.
    pub fn country(&self, name: &str) -> Option<&CountryTables> {
        self.countries.get(name).or_else(|| {
            self.countries
                .values()
                .find(|tables| tables.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn country_names(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("failed to parse reference data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read reference data from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate product {name}")]
    DuplicateProduct { name: String },
    #[error("catalogue holds {count} products, more than a product id can address")]
    TooManyProducts { count: usize },
    #[error("sector weights of product {product} sum to {total}, expected 1")]
    SectorWeights { product: String, total: f64 },
    #[error("no product carries the required role {role}")]
    MissingRole { role: ProductRole },
    #[error("role {role} must be unique but {count} products carry it")]
    AmbiguousRole { role: ProductRole, count: usize },
    #[error("{country}: table {table} references unknown product {name}")]
    UnknownProduct {
        country: String,
        table: String,
        name: String,
    },
    #[error("{country}: table {table} holds invalid value {value} for {name}")]
    InvalidValue {
        country: String,
        table: String,
        name: String,
        value: f64,
    },
    #[error("{country}: {reason}")]
    InvalidCountry { country: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct RawReferenceData {
    #[serde(default)]
    version: u32,
    products: Vec<RawProduct>,
    #[serde(default)]
    countries: BTreeMap<String, RawCountry>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    name: String,
    #[serde(default)]
    role: ProductRole,
    sectors: BTreeMap<Sector, f64>,
}

#[derive(Debug, Deserialize)]
struct RawIntensity {
    direct: BTreeMap<String, f64>,
    indirect: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    region_group: RegionGroup,
    house_size: BTreeMap<AreaType, f64>,
    #[serde(default)]
    regional_house_size: BTreeMap<String, f64>,
    #[serde(default)]
    electricity_heating_share: f64,
    demand: BTreeMap<AreaType, BTreeMap<String, f64>>,
    #[serde(default)]
    local_datasets: BTreeMap<String, BTreeMap<String, f64>>,
    intensity: RawIntensity,
    #[serde(default)]
    use_phase: BTreeMap<String, f64>,
    #[serde(default)]
    tailpipe: BTreeMap<String, f64>,
    income: IncomeDistribution,
    #[serde(default)]
    income_growth: DecadeMultipliers,
    #[serde(default)]
    house_size_growth: DecadeMultipliers,
    prices: PriceTable,
    #[serde(default)]
    lca: LcaTable,
}

impl RawCountry {
    fn into_tables(
        self,
        country: &str,
        catalog: &ProductCatalog,
    ) -> Result<CountryTables, ReferenceDataError> {
        let invalid = |reason: String| ReferenceDataError::InvalidCountry {
            country: country.to_string(),
            reason,
        };

        if !(0.0..=1.0).contains(&self.electricity_heating_share) {
            return Err(invalid(format!(
                "electricity_heating_share {} outside 0..=1",
                self.electricity_heating_share
            )));
        }
        if !self.income.mean.is_finite() || self.income.mean <= 0.0 {
            return Err(invalid(format!("income mean {} must be > 0", self.income.mean)));
        }
        if let Some(bad) = self
            .income
            .quintiles
            .iter()
            .find(|value| !value.is_finite() || **value < 0.0)
        {
            return Err(invalid(format!("income quintile {bad} must be >= 0")));
        }
        if let Some((area, size)) = self
            .house_size
            .iter()
            .find(|(_, size)| !size.is_finite() || **size <= 0.0)
        {
            return Err(invalid(format!("house_size for {area} is {size}")));
        }
        if self.demand.is_empty() {
            return Err(invalid("no demand vectors".to_string()));
        }

        let mut demand = BTreeMap::new();
        for (area, values) in &self.demand {
            let table = format!("demand.{area}");
            demand.insert(*area, catalog.demand(country, &table, values)?);
        }
        let mut local_datasets = BTreeMap::new();
        for (name, values) in &self.local_datasets {
            let table = format!("local_datasets.{name}");
            local_datasets.insert(name.clone(), catalog.demand(country, &table, values)?);
        }

        let intensity = EmissionIntensityMatrix::new(
            catalog.dense(country, "intensity.direct", &self.intensity.direct)?,
            catalog.dense(country, "intensity.indirect", &self.intensity.indirect)?,
        );

        Ok(CountryTables {
            name: country.to_string(),
            region_group: self.region_group,
            house_size: self.house_size,
            regional_house_size: self.regional_house_size,
            electricity_heating_share: self.electricity_heating_share,
            demand,
            local_datasets,
            intensity,
            use_phase: catalog.dense(country, "use_phase", &self.use_phase)?,
            tailpipe: catalog.dense(country, "tailpipe", &self.tailpipe)?,
            income: self.income,
            income_growth: self.income_growth,
            house_size_growth: self.house_size_growth,
            prices: self.prices,
            lca: self.lca,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceDataMetadata {
    path: Option<PathBuf>,
}

impl ReferenceDataMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_reference_data_from_env() -> (Arc<ReferenceData>, ReferenceDataMetadata) {
    let override_path = env::var("EMISSIONS_REFERENCE_DATA_PATH")
        .ok()
        .map(PathBuf::from);

    if let Some(path) = override_path {
        match ReferenceData::from_file(&path) {
            Ok(data) => {
                tracing::info!(
                    target: "emissions::config",
                    path = %path.display(),
                    countries = data.countries.len(),
                    products = data.catalog.len(),
                    "reference_data.loaded=file"
                );
                return (Arc::new(data), ReferenceDataMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "emissions::config",
                    path = %path.display(),
                    error = %err,
                    "reference_data.load_failed"
                );
            }
        }
    }

    let data = ReferenceData::builtin();
    tracing::info!(target: "emissions::config", "reference_data.loaded=builtin");
    (data, ReferenceDataMetadata::new(None))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TINY: &str = r#"{
        "version": 3,
        "products": [
            { "name": "GRID", "role": "electricity", "sectors": { "household_energy": 1.0 } },
            { "name": "ELEC_NEC", "role": "unspecified_electricity", "sectors": { "household_energy": 1.0 } },
            { "name": "DH", "role": "district_heat", "sectors": { "household_energy": 1.0 } },
            { "name": "PETROL", "role": "motor_gasoline", "sectors": { "transport_fuel": 1.0 } },
            { "name": "DIESEL", "role": "gas_diesel_oil", "sectors": { "transport_fuel": 1.0 } },
            { "name": "BIO_P", "role": "biogasoline", "sectors": { "transport_fuel": 1.0 } },
            { "name": "BIO_D", "role": "biodiesel", "sectors": { "transport_fuel": 1.0 } },
            { "name": "MEALS", "sectors": { "food": 0.4, "services": 0.6 } }
        ],
        "countries": {
            "Testland": {
                "region_group": "west",
                "house_size": { "average": 2.0 },
                "regional_house_size": { "Capital": 1.5 },
                "demand": { "average": { "GRID": 100.0, "MEALS": 50.0 } },
                "intensity": { "direct": { "GRID": 1.0 }, "indirect": { "MEALS": 0.5 } },
                "income": { "mean": 100.0, "quintiles": [50.0, 75.0, 100.0, 125.0, 150.0] },
                "prices": { "petrol": 1.5, "diesel": 1.4, "electricity": 0.3 },
                "lca": { "indirect": { "wind": 0.04 } }
            }
        }
    }"#;

    #[test]
    fn builtin_reference_data_parses() {
        let data = ReferenceData::builtin();
        assert!(data.country("Ireland").is_some());
        assert!(data.catalog().id("BIOGASOLINE").is_some());
        assert_eq!(
            data.country("Ireland").map(|c| c.region_group),
            Some(RegionGroup::West)
        );
    }

    #[test]
    fn builtin_countries_cover_every_area_type() {
        let data = ReferenceData::builtin();
        for name in data.country_names() {
            let country = data.country(name).expect("listed country resolves");
            for area in AreaType::VARIANTS {
                assert!(
                    country.demand_for(area).is_some(),
                    "{name} lacks a {area} demand vector"
                );
            }
        }
    }

    #[test]
    fn tiny_dataset_builds_dense_tables() {
        let data = ReferenceData::from_json_str(TINY).expect("tiny dataset should parse");
        assert_eq!(data.version(), 3);
        let catalog = data.catalog();
        let roles = catalog.roles();
        assert_eq!(roles.grid_electricity.len(), 1);
        assert_eq!(roles.electricity.len(), 2);
        assert!(roles.heating_liquids.is_empty());

        let country = data.country("testland").expect("case-insensitive lookup");
        let demand = country.demand_for(AreaType::Average).expect("average demand");
        assert_eq!(demand.len(), catalog.len());
        assert_eq!(demand.get(catalog.id("GRID").unwrap()), 100.0);
        assert_eq!(demand.get(catalog.id("DH").unwrap()), 0.0);
        assert_eq!(country.lca.intensity("wind"), Some((0.0, 0.04)));
        assert_eq!(country.lca.intensity("solar_pv"), None);

        let meals = catalog.sectors().weights(catalog.id("MEALS").unwrap()).unwrap();
        assert_eq!(meals[Sector::Food.index()], 0.4);
    }

    #[test]
    fn default_house_size_prefers_region() {
        let data = ReferenceData::from_json_str(TINY).expect("tiny dataset should parse");
        let country = data.country("Testland").unwrap();
        assert_eq!(
            country.default_house_size(AreaType::City, Some("Capital")),
            Some(1.5)
        );
        assert_eq!(
            country.default_house_size(AreaType::City, Some("Elsewhere")),
            Some(2.0)
        );
    }

    #[test]
    fn rejects_unknown_product_in_country_table() {
        let json = TINY.replace(r#""MEALS": 50.0"#, r#""SNACKS": 50.0"#);
        let err = ReferenceData::from_json_str(&json).expect_err("unknown product should fail");
        assert!(matches!(err, ReferenceDataError::UnknownProduct { .. }));
    }

    #[test]
    fn rejects_negative_demand() {
        let json = TINY.replace(r#""GRID": 100.0"#, r#""GRID": -1.0"#);
        let err = ReferenceData::from_json_str(&json).expect_err("negative demand should fail");
        assert!(err.to_string().contains("invalid value -1"));
    }

    #[test]
    fn rejects_unbalanced_sector_weights() {
        let json = TINY.replace(r#""food": 0.4"#, r#""food": 0.5"#);
        let err = ReferenceData::from_json_str(&json).expect_err("weights should fail");
        assert!(matches!(err, ReferenceDataError::SectorWeights { .. }));
    }

    #[test]
    fn rejects_missing_required_role() {
        let json = TINY.replace(r#""role": "biodiesel", "#, "");
        let err = ReferenceData::from_json_str(&json).expect_err("missing role should fail");
        assert!(matches!(
            err,
            ReferenceDataError::MissingRole {
                role: ProductRole::Biodiesel
            }
        ));
    }
}
