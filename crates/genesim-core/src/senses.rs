//! Sensory channels feeding the behaviour network, stored scaled to
//! `[-1, 1]`.

use std::f32::consts::PI;

use genesim_genetics::SENSORY_INPUTS;

use crate::STAT_CEILING;

const HUNGER: usize = 0;
const THIRST: usize = 1;
const TEMPERATURE_DAMAGE: usize = 2;
const FOOD_HEADING: usize = 3;
const WATER_HEADING: usize = 4;
const TEMPERATURE_HEADING: usize = 5;
const MEMORY: usize = 6;

/// An organism's sensory vector.
///
/// Stat channels are scaled so that a full stat reads −1 and an empty one
/// +1; heading channels are radians divided by π; memory is stored verbatim.
#[derive(Debug, Clone, Default)]
pub struct SensoryData {
    data: [f32; SENSORY_INPUTS],
}

impl SensoryData {
    /// The scaled vector, in network input order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn set_hunger(&mut self, nutrition: i32) {
        self.data[HUNGER] = scale_stat(nutrition);
    }

    pub fn set_thirst(&mut self, hydration: i32) {
        self.data[THIRST] = scale_stat(hydration);
    }

    pub fn set_temperature_damage(&mut self, integrity: i32) {
        self.data[TEMPERATURE_DAMAGE] = scale_stat(integrity);
    }

    pub fn set_food_heading(&mut self, heading: f32) {
        self.data[FOOD_HEADING] = heading / PI;
    }

    pub fn set_water_heading(&mut self, heading: f32) {
        self.data[WATER_HEADING] = heading / PI;
    }

    pub fn set_temperature_heading(&mut self, heading: f32) {
        self.data[TEMPERATURE_HEADING] = heading / PI;
    }

    pub fn set_memory(&mut self, memory: f32) {
        self.data[MEMORY] = memory;
    }

    /// Hunger unscaled to `[0, 1]`, 1 meaning starved.
    #[must_use]
    pub fn hunger(&self) -> f32 {
        self.data[HUNGER] / 2.0 + 0.5
    }

    /// Thirst unscaled to `[0, 1]`, 1 meaning parched.
    #[must_use]
    pub fn thirst(&self) -> f32 {
        self.data[THIRST] / 2.0 + 0.5
    }

    /// Temperature damage unscaled to `[0, 1]`.
    #[must_use]
    pub fn temperature_damage(&self) -> f32 {
        self.data[TEMPERATURE_DAMAGE] / 2.0 + 0.5
    }

    /// Heading to the nearest food, radians.
    #[must_use]
    pub fn food_heading(&self) -> f32 {
        self.data[FOOD_HEADING] * PI
    }

    /// Heading to the nearest water, radians.
    #[must_use]
    pub fn water_heading(&self) -> f32 {
        self.data[WATER_HEADING] * PI
    }

    /// Heading towards the more habitable latitude, radians.
    #[must_use]
    pub fn temperature_heading(&self) -> f32 {
        self.data[TEMPERATURE_HEADING] * PI
    }

    /// Memory carried over from the previous decision.
    #[must_use]
    pub fn memory(&self) -> f32 {
        self.data[MEMORY]
    }
}

fn scale_stat(value: i32) -> f32 {
    ((1.0 - value as f32 / STAT_CEILING as f32) - 0.5) * 2.0
}
