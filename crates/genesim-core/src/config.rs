//! Static configuration for a simulation run.
//!
//! Every option has a default and a documented range; values read from a
//! config file are clamped rather than rejected, and a missing or unreadable
//! file is non-fatal (callers log and fall back to the defaults).

use std::path::{Path, PathBuf};

use genesim_genetics::{MutationParams, PhenotypeParams, Standardizer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Area;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Task selected by `run_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the simulation.
    Run,
    /// Benchmark the simulation frame loop.
    BenchmarkSimulation,
    /// Benchmark the planet temperature precomputation.
    BenchmarkPlanet,
}

/// Top-level configuration record consumed by the core. Read-only after
/// startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub compute: ComputeConfig,
    pub area: AreaConfig,
    pub planet: PlanetConfig,
    pub food: ResourceConfig,
    pub water: ResourceConfig,
    pub population: PopulationConfig,
}

impl SimConfig {
    /// Parse a TOML config file. Missing keys take their defaults; the
    /// result still needs [`SimConfig::clamped`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Clamp every option into its documented range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.compute = self.compute.clamped();
        self.area = self.area.clamped();
        self.planet = self.planet.clamped();
        self.food = self.food.clamped();
        self.water = self.water.clamped();
        self.population = self.population.clamped();
        self
    }

    #[must_use]
    pub fn world_area(&self) -> Area {
        Area::new(self.area.width, self.area.height)
    }
}

/// Compute and benchmark options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// 0 = run, 1 = benchmark simulation, 2 = benchmark planet.
    pub run_mode: u32,
    /// Target framerate while the framerate limit is off.
    pub performance_framerate: u32,
    /// Framerate while the limit is on; also scales effect durations.
    pub standard_framerate: u32,
    /// Simulation worker threads; 0 means hardware concurrency.
    pub simulation_threads: u32,
    /// Planet precompute threads; 0 means hardware concurrency.
    pub precompute_temperatures_cpu_threads: u32,
    /// Frames measured by the simulation benchmark.
    pub simulation_benchmark_timesteps: u32,
    /// Precompute runs measured by the planet benchmark.
    pub planet_benchmark_samples: u32,
    /// Per-thread RNG seeds are `i * factor` for worker `i`, `-factor` for
    /// initialization.
    pub random_seed_factor: i64,
    /// Directory benchmark CSVs are written to.
    pub results_path: String,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            run_mode: 0,
            performance_framerate: 36,
            standard_framerate: 90,
            simulation_threads: 4,
            precompute_temperatures_cpu_threads: 4,
            simulation_benchmark_timesteps: 30_000,
            planet_benchmark_samples: 50,
            random_seed_factor: 1,
            results_path: "./".to_owned(),
        }
    }
}

impl ComputeConfig {
    fn clamped(mut self) -> Self {
        self.performance_framerate = self.performance_framerate.clamp(1, 250);
        self.standard_framerate = self.standard_framerate.clamp(1, 250);
        self.simulation_threads = self.simulation_threads.min(256);
        self.precompute_temperatures_cpu_threads =
            self.precompute_temperatures_cpu_threads.min(256);
        self.simulation_benchmark_timesteps =
            self.simulation_benchmark_timesteps.clamp(1, 1_000_000);
        self.planet_benchmark_samples = self.planet_benchmark_samples.clamp(1, 1_000);
        self.random_seed_factor = self.random_seed_factor.clamp(-1_000_000, 1_000_000);
        self
    }

    #[must_use]
    pub fn mode(&self) -> RunMode {
        match self.run_mode {
            1 => RunMode::BenchmarkSimulation,
            2 => RunMode::BenchmarkPlanet,
            _ => RunMode::Run,
        }
    }

    /// RNG seed for simulation worker `index`.
    #[must_use]
    pub fn worker_seed(&self, index: u32) -> u64 {
        (i64::from(index) * self.random_seed_factor) as u64
    }

    /// RNG seed used while initializing pools and the population.
    #[must_use]
    pub fn init_seed(&self) -> u64 {
        (-self.random_seed_factor) as u64
    }
}

/// World geometry and viewport options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub width: u32,
    pub height: u32,
    /// `y = 0` maps to `+latitude_range` degrees, `y = height - 1` to
    /// `-latitude_range`.
    pub latitude_range: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub title: String,
    /// 3-byte hex string, e.g. `"ffffff"`.
    pub background_color: String,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            width: 1_600,
            height: 1_200,
            latitude_range: 90.0,
            viewport_width: 800,
            viewport_height: 600,
            title: "genesim".to_owned(),
            background_color: "ffffff".to_owned(),
        }
    }
}

impl AreaConfig {
    fn clamped(mut self) -> Self {
        self.width = self.width.clamp(300, 10_000);
        self.height = self.height.clamp(300, 10_000);
        self.latitude_range = self.latitude_range.clamp(1.0, 90.0);
        self.viewport_width = self.viewport_width.clamp(300, 10_000);
        self.viewport_height = self.viewport_height.clamp(300, 10_000);
        self
    }
}

/// Orbital mechanics and atmosphere options for the temperature model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    /// Length of one orbit in timesteps; also the temperature table's time
    /// dimension.
    pub orbital_period: u32,
    pub orbit_center_offset_x: f64,
    pub orbit_center_offset_y: f64,
    pub orbit_radius_x: f64,
    pub orbit_radius_y: f64,
    /// Rotation of the orbital ellipse, radians.
    pub orbit_rotation: f64,
    /// Watts.
    pub star_luminosity: f64,
    pub albedo: f64,
    /// Degrees.
    pub axial_tilt: f64,
    /// Metres.
    pub radius: f64,
    pub atmosphere_optical_thickness: f64,
    pub temperature_moderation_factor: f64,
    pub temperature_moderation_bias: f64,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            orbital_period: 36_000,
            orbit_center_offset_x: 0.0,
            orbit_center_offset_y: 0.0,
            orbit_radius_x: 172e9,
            orbit_radius_y: 138e9,
            orbit_rotation: 0.0,
            star_luminosity: 3.846e26,
            albedo: 0.29,
            axial_tilt: 23.0,
            radius: 6_371e3,
            atmosphere_optical_thickness: 1.3,
            temperature_moderation_factor: 4.0,
            temperature_moderation_bias: 0.8,
        }
    }
}

impl PlanetConfig {
    fn clamped(mut self) -> Self {
        self.orbital_period = self.orbital_period.clamp(1_000, 1_000_000);
        self.orbit_center_offset_x = self.orbit_center_offset_x.max(0.0);
        self.orbit_center_offset_y = self.orbit_center_offset_y.max(0.0);
        self.orbit_radius_x = self.orbit_radius_x.max(1e8);
        self.orbit_radius_y = self.orbit_radius_y.max(1e8);
        self.star_luminosity = self.star_luminosity.max(0.0);
        self.albedo = self.albedo.clamp(0.0, 1.0);
        self.axial_tilt = self.axial_tilt.clamp(0.0, 45.0);
        self.radius = self.radius.clamp(1e3, 1e7);
        self.atmosphere_optical_thickness = self.atmosphere_optical_thickness.clamp(0.0, 10.0);
        self.temperature_moderation_factor = self.temperature_moderation_factor.clamp(1.0, 10.0);
        self.temperature_moderation_bias = self.temperature_moderation_bias.clamp(0.0, 1.0);
        self
    }
}

/// One consumable resource pool (food or water).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub pool_size: u32,
    /// Upper bound of the value rerolled into a consumed item.
    pub max_val: u32,
    /// Margin kept between item positions and the world edge.
    pub pool_pos_margin: f32,
    /// Items existing at startup.
    pub pool_init: u32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            pool_size: 148,
            max_val: 250_000,
            pool_pos_margin: 10.0,
            pool_init: 148,
        }
    }
}

impl ResourceConfig {
    fn clamped(mut self) -> Self {
        self.pool_size = self.pool_size.clamp(1, 8_192);
        self.max_val = self.max_val.clamp(10_000, 1_000_000);
        self.pool_pos_margin = self.pool_pos_margin.clamp(0.0, 150.0);
        self.pool_init = self.pool_init.clamp(1, 8_192);
        self
    }
}

/// Population pool, trait standardization, and genetics options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub pool_size: u32,
    pub pool_pos_margin: f32,
    pub area_of_influence_mean: f32,
    pub area_of_influence_sigma: f32,
    pub speed_mean: f32,
    pub speed_sigma: f32,
    pub health_rate_mean: f32,
    pub health_rate_sigma: f32,
    pub ideal_temp_mean: f32,
    pub ideal_temp_sigma: f32,
    pub temp_range_mean: f32,
    pub temp_range_sigma: f32,
    pub behaviour_net_weight_range: f32,
    pub behaviour_net_weight_range_bias: f32,
    pub behaviour_net_layer_1_units: u32,
    pub behaviour_net_layer_2_units: u32,
    pub pool_init: u32,
    /// Per-tick replication probability is `fitness * replication_rate` once
    /// an organism is old enough.
    pub replication_rate: f32,
    pub behaviour_net_mutation_prob: f32,
    pub behaviour_net_mutation_sigma: f32,
    pub trait_genes_mutation_prob: f32,
    pub trait_genes_mutation_sigma: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            pool_size: 512,
            pool_pos_margin: 20.0,
            area_of_influence_mean: 8.0,
            area_of_influence_sigma: 2.0,
            speed_mean: 1.0,
            speed_sigma: 0.1,
            health_rate_mean: 220.0,
            health_rate_sigma: 30.0,
            ideal_temp_mean: 260.0,
            ideal_temp_sigma: 30.0,
            temp_range_mean: 10.0,
            temp_range_sigma: 2.0,
            behaviour_net_weight_range: 2.0,
            behaviour_net_weight_range_bias: 1.0,
            behaviour_net_layer_1_units: 16,
            behaviour_net_layer_2_units: 8,
            pool_init: 512,
            replication_rate: 0.0001,
            behaviour_net_mutation_prob: 0.1,
            behaviour_net_mutation_sigma: 0.2,
            trait_genes_mutation_prob: 0.1,
            trait_genes_mutation_sigma: 0.01,
        }
    }
}

impl PopulationConfig {
    fn clamped(mut self) -> Self {
        self.pool_size = self.pool_size.clamp(1, 8_192);
        self.pool_pos_margin = self.pool_pos_margin.clamp(0.0, 150.0);
        self.area_of_influence_mean = self.area_of_influence_mean.clamp(1.0, 100.0);
        self.area_of_influence_sigma = self
            .area_of_influence_sigma
            .clamp(0.0, self.area_of_influence_mean / 4.0);
        self.speed_mean = self.speed_mean.clamp(0.1, 100.0);
        self.speed_sigma = self.speed_sigma.clamp(0.0, self.speed_mean / 5.0);
        self.health_rate_mean = self.health_rate_mean.clamp(1.0, 1e6);
        self.health_rate_sigma = self
            .health_rate_sigma
            .clamp(0.0, self.health_rate_mean / 5.0);
        self.ideal_temp_mean = self.ideal_temp_mean.clamp(0.0, 1e3);
        self.ideal_temp_sigma = self.ideal_temp_sigma.clamp(0.0, self.ideal_temp_mean / 5.0);
        self.temp_range_mean = self.temp_range_mean.clamp(0.0, 100.0);
        self.temp_range_sigma = self.temp_range_sigma.clamp(0.0, self.temp_range_mean / 5.0);
        self.behaviour_net_weight_range = self.behaviour_net_weight_range.clamp(1e-4, 10.0);
        self.behaviour_net_weight_range_bias =
            self.behaviour_net_weight_range_bias.clamp(1.0, 10.0);
        self.behaviour_net_layer_1_units = self.behaviour_net_layer_1_units.clamp(1, 128);
        self.behaviour_net_layer_2_units = self.behaviour_net_layer_2_units.clamp(1, 128);
        self.pool_init = self.pool_init.clamp(1, 8_192);
        self.replication_rate = self.replication_rate.clamp(0.0, 1.0);
        self.behaviour_net_mutation_prob = self.behaviour_net_mutation_prob.clamp(0.0, 1.0);
        self.behaviour_net_mutation_sigma = self.behaviour_net_mutation_sigma.clamp(0.0, 10.0);
        self.trait_genes_mutation_prob = self.trait_genes_mutation_prob.clamp(0.0, 1.0);
        self.trait_genes_mutation_sigma = self.trait_genes_mutation_sigma.clamp(0.0, 2.0);
        self
    }

    /// Standardization parameters for expressing phenotypes.
    #[must_use]
    pub fn phenotype_params(&self) -> PhenotypeParams {
        PhenotypeParams {
            area_of_influence: Standardizer::new(
                self.area_of_influence_mean,
                self.area_of_influence_sigma,
            ),
            speed: Standardizer::new(self.speed_mean, self.speed_sigma),
            health_rate: Standardizer::new(self.health_rate_mean, self.health_rate_sigma),
            ideal_temp: Standardizer::new(self.ideal_temp_mean, self.ideal_temp_sigma),
            temp_range: Standardizer::new(self.temp_range_mean, self.temp_range_sigma),
        }
    }

    /// Mutation settings for offspring genotypes.
    #[must_use]
    pub fn mutation_params(&self) -> MutationParams {
        MutationParams {
            net_prob: self.behaviour_net_mutation_prob,
            net_sigma: self.behaviour_net_mutation_sigma,
            genes_prob: self.trait_genes_mutation_prob,
            genes_sigma: self.trait_genes_mutation_sigma,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_clamping_unchanged() {
        let config = SimConfig::default();
        assert_eq!(config.clone().clamped(), config);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = SimConfig::default();
        config.area.width = 5;
        config.area.latitude_range = 400.0;
        config.planet.albedo = 2.0;
        config.population.replication_rate = 7.0;
        config.population.area_of_influence_sigma = 50.0;
        let clamped = config.clamped();
        assert_eq!(clamped.area.width, 300);
        assert_eq!(clamped.area.latitude_range, 90.0);
        assert_eq!(clamped.planet.albedo, 1.0);
        assert_eq!(clamped.population.replication_rate, 1.0);
        assert_eq!(
            clamped.population.area_of_influence_sigma,
            clamped.population.area_of_influence_mean / 4.0
        );
    }

    #[test]
    fn partial_toml_takes_defaults_for_missing_keys() {
        let parsed: SimConfig = toml::from_str(
            r#"
            [area]
            width = 640
            height = 480

            [population]
            pool_size = 32
            "#,
        )
        .expect("partial config parses");
        assert_eq!(parsed.area.width, 640);
        assert_eq!(parsed.area.height, 480);
        assert_eq!(parsed.population.pool_size, 32);
        assert_eq!(parsed.population.pool_init, 512);
        assert_eq!(parsed.planet.orbital_period, 36_000);
    }

    #[test]
    fn run_mode_falls_back_to_run() {
        let mut config = ComputeConfig::default();
        assert_eq!(config.mode(), RunMode::Run);
        config.run_mode = 1;
        assert_eq!(config.mode(), RunMode::BenchmarkSimulation);
        config.run_mode = 2;
        assert_eq!(config.mode(), RunMode::BenchmarkPlanet);
        config.run_mode = 9;
        assert_eq!(config.mode(), RunMode::Run);
    }

    #[test]
    fn seeds_follow_the_seed_factor() {
        let compute = ComputeConfig {
            random_seed_factor: 3,
            ..ComputeConfig::default()
        };
        assert_eq!(compute.worker_seed(0), 0);
        assert_eq!(compute.worker_seed(2), 6);
        assert_eq!(compute.init_seed(), (-3i64) as u64);
    }

    #[test]
    fn load_reports_missing_file() {
        let error = SimConfig::load(Path::new("/nonexistent/genesim.toml"))
            .expect_err("missing file should error");
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
