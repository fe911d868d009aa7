//! Physical traits expressed from a genotype, stored in destandardized form.

use serde::{Deserialize, Serialize};

/// Mean and standard deviation used to destandardize one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: f32,
    pub sigma: f32,
}

impl Standardizer {
    #[must_use]
    pub const fn new(mean: f32, sigma: f32) -> Self {
        Self { mean, sigma }
    }

    /// Map a standardized value back onto the trait's own scale.
    #[must_use]
    pub fn apply(self, standardized: f32) -> f32 {
        standardized * self.sigma + self.mean
    }
}

/// Population-wide standardization parameters for the five physical traits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeParams {
    pub area_of_influence: Standardizer,
    pub speed: Standardizer,
    pub health_rate: Standardizer,
    pub ideal_temp: Standardizer,
    pub temp_range: Standardizer,
}

/// The five physical traits coded for in an organism's genotype.
///
/// Setters take values in standardized form and destandardize with the
/// population parameters; getters return the trait's natural scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    params: PhenotypeParams,
    area_of_influence: f32,
    speed: f32,
    health_rate: f32,
    ideal_temp: f32,
    temp_range: f32,
}

impl Phenotype {
    #[must_use]
    pub fn new(params: PhenotypeParams) -> Self {
        Self {
            params,
            area_of_influence: 0.0,
            speed: 0.0,
            health_rate: 0.0,
            ideal_temp: 0.0,
            temp_range: 0.0,
        }
    }

    /// Circular interaction and consumption radius.
    #[must_use]
    pub fn area_of_influence(&self) -> f32 {
        self.area_of_influence
    }

    /// Movement speed in cells per timestep.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Per-timestep drain on nutrition and hydration; also scales integrity
    /// gain and loss.
    #[must_use]
    pub fn health_rate(&self) -> f32 {
        self.health_rate
    }

    /// Preferred surface temperature in Kelvin.
    #[must_use]
    pub fn ideal_temp(&self) -> f32 {
        self.ideal_temp
    }

    /// Half-width of the comfortable band around the ideal temperature.
    #[must_use]
    pub fn temp_range(&self) -> f32 {
        self.temp_range
    }

    pub fn set_area_of_influence(&mut self, standardized: f32) {
        self.area_of_influence = self.params.area_of_influence.apply(standardized);
    }

    pub fn set_speed(&mut self, standardized: f32) {
        self.speed = self.params.speed.apply(standardized);
    }

    pub fn set_health_rate(&mut self, standardized: f32) {
        self.health_rate = self.params.health_rate.apply(standardized);
    }

    pub fn set_ideal_temp(&mut self, standardized: f32) {
        self.ideal_temp = self.params.ideal_temp.apply(standardized);
    }

    pub fn set_temp_range(&mut self, standardized: f32) {
        self.temp_range = self.params.temp_range.apply(standardized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PhenotypeParams {
        PhenotypeParams {
            area_of_influence: Standardizer::new(8.0, 2.0),
            speed: Standardizer::new(1.0, 0.1),
            health_rate: Standardizer::new(220.0, 30.0),
            ideal_temp: Standardizer::new(260.0, 30.0),
            temp_range: Standardizer::new(10.0, 2.0),
        }
    }

    #[test]
    fn setters_destandardize_exactly() {
        let mut phenotype = Phenotype::new(params());
        phenotype.set_area_of_influence(1.5);
        phenotype.set_speed(-2.0);
        phenotype.set_health_rate(0.0);
        phenotype.set_ideal_temp(-1.0);
        phenotype.set_temp_range(0.5);
        assert_eq!(phenotype.area_of_influence(), 1.5 * 2.0 + 8.0);
        assert_eq!(phenotype.speed(), -2.0 * 0.1 + 1.0);
        assert_eq!(phenotype.health_rate(), 220.0);
        assert_eq!(phenotype.ideal_temp(), -30.0 + 260.0);
        assert_eq!(phenotype.temp_range(), 0.5 * 2.0 + 10.0);
    }

    #[test]
    fn zero_sigma_pins_trait_to_mean() {
        let standardizer = Standardizer::new(42.0, 0.0);
        assert_eq!(standardizer.apply(-3.0), 42.0);
        assert_eq!(standardizer.apply(3.0), 42.0);
    }
}
