use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::vector::ProductId;

/// Reporting aggregate that product emissions roll up into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    HouseholdEnergy,
    HouseholdOther,
    TransportFuel,
    TransportOther,
    AirTransport,
    Food,
    TangibleGoods,
    Services,
}

/// One value per sector, indexed by [`Sector::index`].
pub type SectorRow = [f64; Sector::COUNT];

impl Sector {
    pub const COUNT: usize = 8;

    pub const VARIANTS: [Sector; Sector::COUNT] = [
        Sector::HouseholdEnergy,
        Sector::HouseholdOther,
        Sector::TransportFuel,
        Sector::TransportOther,
        Sector::AirTransport,
        Sector::Food,
        Sector::TangibleGoods,
        Sector::Services,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Sector::HouseholdEnergy => "household_energy",
            Sector::HouseholdOther => "household_other",
            Sector::TransportFuel => "transport_fuel",
            Sector::TransportOther => "transport_other",
            Sector::AirTransport => "air_transport",
            Sector::Food => "food",
            Sector::TangibleGoods => "tangible_goods",
            Sector::Services => "services",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Sector::HouseholdEnergy => 0,
            Sector::HouseholdOther => 1,
            Sector::TransportFuel => 2,
            Sector::TransportOther => 3,
            Sector::AirTransport => 4,
            Sector::Food => 5,
            Sector::TangibleGoods => 6,
            Sector::Services => 7,
        }
    }

    pub const fn variants() -> &'static [Sector; Sector::COUNT] {
        &Self::VARIANTS
    }
}

impl FromStr for Sector {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "household_energy" => Ok(Sector::HouseholdEnergy),
            "household_other" => Ok(Sector::HouseholdOther),
            "transport_fuel" => Ok(Sector::TransportFuel),
            "transport_other" => Ok(Sector::TransportOther),
            "air_transport" => Ok(Sector::AirTransport),
            "food" => Ok(Sector::Food),
            "tangible_goods" => Ok(Sector::TangibleGoods),
            "services" => Ok(Sector::Services),
            _ => Err(()),
        }
    }
}

/// Fixed product-by-sector weighting matrix.
///
/// Row `p` holds the share of product `p` attributed to each sector; every
/// row sums to one, so aggregation preserves the product total.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectorMatrix {
    rows: Vec<SectorRow>,
}

impl SectorMatrix {
    pub fn from_rows(rows: Vec<SectorRow>) -> Self {
        Self { rows }
    }

    pub fn weights(&self, product: ProductId) -> Option<&SectorRow> {
        self.rows.get(product.index())
    }

    /// Right-multiplies a per-product row vector by the membership matrix.
    pub fn aggregate(&self, per_product: &[f64]) -> SectorRow {
        let mut out = [0.0; Sector::COUNT];
        for (value, weights) in per_product.iter().zip(self.rows.iter()) {
            if *value == 0.0 {
                continue;
            }
            for (slot, weight) in out.iter_mut().zip(weights.iter()) {
                *slot += value * weight;
            }
        }
        out
    }
}
