//! Decade-bucketed multipliers shared by every year-stepped projection.

use serde::{Deserialize, Serialize};

pub use emissions_schema::{FIRST_PROJECTION_YEAR, LAST_PROJECTION_YEAR};

/// One of the three ten-year spans that select growth and efficiency factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecadeBucket {
    /// 2020..=2030
    To2030,
    /// 2031..=2040
    To2040,
    /// 2041..=2050
    To2050,
}

impl DecadeBucket {
    pub fn for_year(year: u16) -> Option<Self> {
        match year {
            2020..=2030 => Some(DecadeBucket::To2030),
            2031..=2040 => Some(DecadeBucket::To2040),
            2041..=2050 => Some(DecadeBucket::To2050),
            _ => None,
        }
    }
}

/// Annual multiplier per decade bucket, keyed `"2030"`, `"2040"`, `"2050"` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecadeMultipliers {
    #[serde(rename = "2030")]
    pub to_2030: f64,
    #[serde(rename = "2040")]
    pub to_2040: f64,
    #[serde(rename = "2050")]
    pub to_2050: f64,
}

impl Default for DecadeMultipliers {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl DecadeMultipliers {
    pub const fn uniform(value: f64) -> Self {
        Self {
            to_2030: value,
            to_2040: value,
            to_2050: value,
        }
    }

    pub fn for_bucket(&self, bucket: DecadeBucket) -> f64 {
        match bucket {
            DecadeBucket::To2030 => self.to_2030,
            DecadeBucket::To2040 => self.to_2040,
            DecadeBucket::To2050 => self.to_2050,
        }
    }

    /// Multiplier applied when stepping into `year`.
    ///
    /// The first projection year is the starting point and always yields 1,
    /// as does any year outside the projection range.
    pub fn for_year(&self, year: u16) -> f64 {
        if year <= FIRST_PROJECTION_YEAR {
            return 1.0;
        }
        DecadeBucket::for_year(year).map_or(1.0, |bucket| self.for_bucket(bucket))
    }

    pub fn values(&self) -> [f64; 3] {
        [self.to_2030, self.to_2040, self.to_2050]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_edges_are_inclusive_upper() {
        assert_eq!(DecadeBucket::for_year(2020), Some(DecadeBucket::To2030));
        assert_eq!(DecadeBucket::for_year(2030), Some(DecadeBucket::To2030));
        assert_eq!(DecadeBucket::for_year(2031), Some(DecadeBucket::To2040));
        assert_eq!(DecadeBucket::for_year(2040), Some(DecadeBucket::To2040));
        assert_eq!(DecadeBucket::for_year(2041), Some(DecadeBucket::To2050));
        assert_eq!(DecadeBucket::for_year(2050), Some(DecadeBucket::To2050));
        assert_eq!(DecadeBucket::for_year(2019), None);
        assert_eq!(DecadeBucket::for_year(2051), None);
    }

    #[test]
    fn first_year_uses_unit_multiplier() {
        let multipliers = DecadeMultipliers {
            to_2030: 1.1,
            to_2040: 1.2,
            to_2050: 1.3,
        };
        assert_eq!(multipliers.for_year(2020), 1.0);
        assert_eq!(multipliers.for_year(2021), 1.1);
        assert_eq!(multipliers.for_year(2035), 1.2);
        assert_eq!(multipliers.for_year(2050), 1.3);
        assert_eq!(multipliers.for_year(2060), 1.0);
    }

    #[test]
    fn parses_decade_keys() {
        let parsed: DecadeMultipliers =
            serde_json::from_str(r#"{ "2030": 1.01, "2040": 1.02, "2050": 1.03 }"#)
                .expect("multipliers should parse");
        assert_eq!(parsed.values(), [1.01, 1.02, 1.03]);
    }
}
