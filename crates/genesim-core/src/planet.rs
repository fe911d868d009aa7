//! Planetary surface temperature: a deterministic two-pass astronomical
//! model precomputed into a `(latitude row × timestep)` lookup table, then
//! read concurrently without locking.

use std::f64::consts::{PI, TAU};
use std::thread;
use std::time::Instant;

use tracing::info;

use crate::benchmark::BenchmarkSink;
use crate::config::SimConfig;

const STEFAN_BOLTZMANN: f64 = 5.670373e-8;

/// The precomputed temperature table. Immutable after
/// [`Planet::precompute`] returns.
#[derive(Debug, Default)]
pub struct Planet {
    temperatures: Vec<f32>,
    timesteps: u32,
    height: u32,
    initialized: bool,
}

impl Planet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of latitude rows in the table.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Timesteps per orbital period; the table's time dimension.
    #[must_use]
    pub fn timesteps(&self) -> u32 {
        self.timesteps
    }

    /// Temperature in Kelvin at row `y` and timestep `t` (mod the orbital
    /// period), or −1 before the table is built. The driver's startup order
    /// guarantees the table exists before any worker reads it.
    #[must_use]
    pub fn get_temperature(&self, y: u32, t: u32) -> f32 {
        if !self.initialized {
            return -1.0;
        }
        let index = y as usize * self.timesteps as usize + (t % self.timesteps) as usize;
        self.temperatures[index]
    }

    /// Build the table once, split across the configured CPU threads. The
    /// result is bitwise identical for any thread count.
    pub fn precompute(&mut self, config: &SimConfig) {
        let workers = worker_count(config.compute.precompute_temperatures_cpu_threads);
        self.allocate(config);
        self.compute_cpu(workers, config);
        self.initialized = true;
        info!(
            height = self.height,
            timesteps = self.timesteps,
            workers,
            "temperature table built"
        );
    }

    /// Rebuild the table `planet_benchmark_samples` times back-to-back,
    /// reporting per-run microseconds to the sink.
    pub fn benchmark(&mut self, config: &SimConfig, sink: &mut dyn BenchmarkSink) {
        let workers = worker_count(config.compute.precompute_temperatures_cpu_threads);
        self.allocate(config);
        let samples = config.compute.planet_benchmark_samples;
        let mut times = Vec::with_capacity(samples as usize);
        for _ in 0..samples {
            let start = Instant::now();
            self.compute_cpu(workers, config);
            times.push(start.elapsed().as_micros() as u64);
        }
        self.initialized = true;
        let label = format!("time_microseconds_{workers}_threads");
        let filename = format!("planet_benchmark_cpu_{workers}_threads.csv");
        sink.record(&label, &filename, &times);
    }

    fn allocate(&mut self, config: &SimConfig) {
        self.timesteps = config.planet.orbital_period;
        self.height = config.area.height;
        self.temperatures = vec![0.0; self.height as usize * self.timesteps as usize];
    }

    fn compute_cpu(&mut self, workers: usize, config: &SimConfig) {
        let timesteps = self.timesteps as usize;
        let height = self.height as usize;

        // pass 1: equatorial black-body temperature per timestep, split into
        // timestep ranges
        let mut equatorial = vec![0.0f64; timesteps];
        let steps_per_worker = timesteps / workers + 1;
        thread::scope(|scope| {
            for (chunk, slice) in equatorial.chunks_mut(steps_per_worker).enumerate() {
                let start_t = chunk * steps_per_worker;
                scope.spawn(move || pass_equatorial(slice, start_t, config));
            }
        });

        // pass 2: per-(row, timestep) surface temperature, split into
        // latitude-row ranges so each thread owns contiguous rows
        let rows_per_worker = height / workers + 1;
        let equatorial = &equatorial;
        thread::scope(|scope| {
            for (chunk, rows) in self
                .temperatures
                .chunks_mut(rows_per_worker * timesteps)
                .enumerate()
            {
                let first_row = chunk * rows_per_worker;
                scope.spawn(move || pass_surface(rows, first_row, equatorial, config));
            }
        });
    }
}

fn worker_count(requested: u32) -> usize {
    if requested == 0 {
        thread::available_parallelism().map_or(1, std::num::NonZero::get)
    } else {
        requested as usize
    }
}

/// Equatorial black-body temperature for each timestep in the slice's range:
/// the planet's position on the rotated orbital ellipse gives the squared
/// distance from the star, which feeds the Stefan-Boltzmann equilibrium.
fn pass_equatorial(out: &mut [f64], start_t: usize, config: &SimConfig) {
    let planet = &config.planet;
    let period = f64::from(planet.orbital_period);
    for (offset, out_value) in out.iter_mut().enumerate() {
        let angle = (start_t + offset) as f64 / period * TAU;

        let pos_x = planet.orbit_radius_x * angle.cos() * planet.orbit_rotation.cos()
            - planet.orbit_radius_y * angle.sin() * planet.orbit_rotation.sin()
            + planet.orbit_center_offset_x;
        let pos_y = planet.orbit_radius_x * angle.cos() * planet.orbit_rotation.sin()
            + planet.orbit_radius_y * angle.sin() * planet.orbit_rotation.cos()
            + planet.orbit_center_offset_y;
        let squared_dist = pos_x * pos_x + pos_y * pos_y;

        let black_body = ((planet.star_luminosity * (1.0 - planet.albedo))
            / (16.0 * PI * squared_dist * STEFAN_BOLTZMANN))
            .powf(0.25);
        *out_value = black_body / (PI / 6.0).cos();
    }
}

/// Surface temperature for every `(row, timestep)` cell in the slice: the
/// effective axial tilt at the orbital angle shifts the effective latitude
/// and the daylight proportion, and the result is moderated towards the
/// equatorial temperature and scaled by the greenhouse factor.
fn pass_surface(rows: &mut [f32], first_row: usize, equatorial: &[f64], config: &SimConfig) {
    let planet = &config.planet;
    let timesteps = planet.orbital_period as usize;
    let period = f64::from(planet.orbital_period);
    let height = f64::from(config.area.height);
    let latitude_range = f64::from(config.area.latitude_range);
    let greenhouse = (1.0 + 0.75 * planet.atmosphere_optical_thickness).powf(0.25);

    for (row_offset, row) in rows.chunks_mut(timesteps).enumerate() {
        let y = (first_row + row_offset) as f64;
        // y = 0 is the north edge at +latitude_range degrees
        let latitude = latitude_range - y / (height - 1.0) * (2.0 * latitude_range);
        let height_to_latitude = (latitude / 360.0 * TAU).sin() * planet.radius;
        let width_at_latitude = ((latitude / 360.0 * TAU).cos() * planet.radius).max(0.0);

        for (t, cell) in row.iter_mut().enumerate() {
            let angle = t as f64 / period * TAU;
            let angle_from_vernal_equinox = angle + planet.orbit_rotation;
            let effective_axial_tilt = angle_from_vernal_equinox.sin() * planet.axial_tilt;
            let effective_latitude = latitude - effective_axial_tilt;

            // distance between the tilted terminator plane and the day/night
            // plane, travelling along this latitude
            let tilt_plane_dist = (effective_axial_tilt / 360.0 * TAU).tan() * height_to_latitude;
            let plane_dist_ratio = if width_at_latitude == 0.0 {
                sign(tilt_plane_dist)
            } else {
                tilt_plane_dist / width_at_latitude
            };
            let extra_longitude = plane_dist_ratio.clamp(-1.0, 1.0).asin();
            let daylight_proportion = (PI + 2.0 * extra_longitude) / TAU;

            let radiation_strength = (effective_latitude / 360.0 * TAU).cos().max(0.0);

            let equatorial_temp = equatorial[t];
            let base = equatorial_temp * radiation_strength * (daylight_proportion * 2.0);
            let moderated = (base - equatorial_temp * planet.temperature_moderation_bias)
                / planet.temperature_moderation_factor
                + equatorial_temp * planet.temperature_moderation_bias;

            *cell = (moderated * greenhouse) as f32;
        }
    }
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
