//! Core simulation state for genesim: configuration, synchronization
//! primitives, slot pools, organisms, the population phase operations, and
//! the planetary temperature model.

use serde::{Deserialize, Serialize};

pub mod benchmark;
pub mod config;
pub mod organism;
pub mod planet;
pub mod pool;
pub mod population;
pub mod resource;
pub mod senses;
pub mod sync;

pub use benchmark::{BenchmarkSink, CsvBenchmarkWriter, NullBenchmarkSink};
pub use config::{
    AreaConfig, ComputeConfig, ConfigError, PlanetConfig, PopulationConfig, ResourceConfig,
    RunMode, SimConfig,
};
pub use organism::{Organism, OrganismBody};
pub use planet::Planet;
pub use pool::SlotPool;
pub use population::Population;
pub use resource::{ConsumableResource, ResourcePool};
pub use senses::SensoryData;

/// Ceiling shared by the three health stats (nutrition, hydration,
/// integrity); fitness is their mean over this value.
pub const STAT_CEILING: i32 = 1_000_000;

/// Axis-aligned 2D vector in world cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Velocity vector for a heading in radians and a scalar speed.
    #[must_use]
    pub fn from_heading(heading: f32, speed: f32) -> Self {
        Self {
            x: heading.cos() * speed,
            y: heading.sin() * speed,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

/// World extent in cells. Positions are real-valued within
/// `[0, width) × [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub width: u32,
    pub height: u32,
}

impl Area {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn width_f(self) -> f32 {
        self.width as f32
    }

    #[must_use]
    pub fn height_f(self) -> f32 {
        self.height as f32
    }

    /// Wrap a position toroidally back into the world.
    #[must_use]
    pub fn wrap(self, position: Vec2) -> Vec2 {
        Vec2::new(
            wrap_coordinate(position.x, self.width_f()),
            wrap_coordinate(position.y, self.height_f()),
        )
    }
}

fn wrap_coordinate(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    let mut wrapped = value % extent;
    if wrapped < 0.0 {
        wrapped += extent;
    }
    wrapped
}
