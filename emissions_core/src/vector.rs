use std::ops::Index;

/// Position of a product in the reference catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProductId(pub u16);

impl ProductId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense per-product values aligned with the product catalogue.
///
/// Used for expenditure (the demand vector) as well as for the intensity,
/// use-phase and tailpipe tables. Values are owned; cloning a vector is the
/// only way to share its contents with another scenario branch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductVector {
    values: Vec<f64>,
}

/// Annual household expenditure per product.
pub type DemandVector = ProductVector;

impl ProductVector {
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, id: ProductId) -> f64 {
        self.values.get(id.index()).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn set(&mut self, id: ProductId, value: f64) {
        if let Some(slot) = self.values.get_mut(id.index()) {
            *slot = value;
        }
    }

    #[inline]
    pub fn add(&mut self, id: ProductId, delta: f64) {
        if let Some(slot) = self.values.get_mut(id.index()) {
            *slot += delta;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(idx, value)| (ProductId(idx as u16), *value))
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|value| *value *= factor);
    }

    pub fn scale_products(&mut self, ids: &[ProductId], factor: f64) {
        for &id in ids {
            if let Some(slot) = self.values.get_mut(id.index()) {
                *slot *= factor;
            }
        }
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn sum_of(&self, ids: &[ProductId]) -> f64 {
        ids.iter().map(|&id| self.get(id)).sum()
    }

    /// Sets the products in `ids` so that they total `target`, keeping their
    /// relative split. An all-zero group is filled evenly.
    pub fn distribute(&mut self, ids: &[ProductId], target: f64) {
        if ids.is_empty() {
            return;
        }
        let current = self.sum_of(ids);
        if current > 0.0 {
            self.scale_products(ids, target / current);
        } else {
            let share = target / ids.len() as f64;
            for &id in ids {
                self.set(id, share);
            }
        }
    }

    /// Element-wise product; missing entries on either side count as zero.
    pub fn hadamard(&self, other: &ProductVector) -> ProductVector {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(idx, value)| value * other.values.get(idx).copied().unwrap_or(0.0))
            .collect();
        Self { values }
    }

    /// Element-wise sum; missing entries on either side count as zero.
    pub fn plus(&self, other: &ProductVector) -> ProductVector {
        let len = self.values.len().max(other.values.len());
        let values = (0..len)
            .map(|idx| {
                self.values.get(idx).copied().unwrap_or(0.0)
                    + other.values.get(idx).copied().unwrap_or(0.0)
            })
            .collect();
        Self { values }
    }
}

impl Index<ProductId> for ProductVector {
    type Output = f64;

    fn index(&self, id: ProductId) -> &Self::Output {
        &self.values[id.index()]
    }
}

/// Direct and indirect emission intensity per product (kg CO2e per currency unit).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmissionIntensityMatrix {
    pub direct: ProductVector,
    pub indirect: ProductVector,
}

impl EmissionIntensityMatrix {
    pub fn new(direct: ProductVector, indirect: ProductVector) -> Self {
        Self { direct, indirect }
    }

    pub fn scale(&mut self, factor: f64) {
        self.direct.scale(factor);
        self.indirect.scale(factor);
    }

    pub fn set(&mut self, id: ProductId, direct: f64, indirect: f64) {
        self.direct.set(id, direct);
        self.indirect.set(id, indirect);
    }
}
