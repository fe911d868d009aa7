//! The simulation driver: N long-lived worker threads running the fixed
//! per-timestep phase sequence over index slices of the population and
//! resource pools, interleaved with the render loop on the calling thread
//! through barriers and signal links.

use std::ops::Range;
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use genesim_core::sync::{PhaseBarrier, SignalLink};
use genesim_core::{
    BenchmarkSink, CsvBenchmarkWriter, Planet, Population, ResourcePool, RunMode, SimConfig,
};

pub mod render;

use render::{
    FOOD_FILL, FrameAnnotations, InputEvent, RenderSurface, Rgba, Viewport, WATER_FILL,
    draw_resource_pool, organism_fill, organism_outline, temperature_color,
};

/// Pixels panned per arrow-key event.
const PAN_STEP: i32 = 4;
/// Zoom factor change per zoom-key event.
const ZOOM_STEP: f32 = 0.01;

/// The barriers and signal links that order one timestep across the workers
/// and the render thread.
struct PipelineSync {
    replication_begin: PhaseBarrier,
    replication_end: PhaseBarrier,
    end_of_timestep: PhaseBarrier,
    draw_resources_begin: SignalLink,
    draw_population_begin: SignalLink,
    draw_done: SignalLink,
}

impl PipelineSync {
    fn new(workers: usize) -> Self {
        Self {
            replication_begin: PhaseBarrier::new(workers),
            replication_end: PhaseBarrier::new(workers),
            end_of_timestep: PhaseBarrier::new(workers),
            draw_resources_begin: SignalLink::new(workers, 1, false),
            draw_population_begin: SignalLink::new(workers, 1, false),
            draw_done: SignalLink::new(1, workers, true),
        }
    }

    /// Release every blocked thread with a shutdown outcome; nothing blocks
    /// afterwards.
    fn shutdown(&self) {
        self.replication_begin.close();
        self.replication_end.close();
        self.end_of_timestep.close();
        self.draw_resources_begin.close();
        self.draw_population_begin.close();
        self.draw_done.close();
    }
}

/// One worker's slice of the world plus its RNG seed.
struct WorkerPlan {
    seed: u64,
    organisms: Range<u32>,
    food_items: Range<u32>,
    water_items: Range<u32>,
    fps: u32,
}

/// The whole simulation: world state plus the render surface it is shown
/// through.
pub struct Simulation {
    config: SimConfig,
    planet: Planet,
    food: ResourcePool,
    water: ResourcePool,
    population: Population,
    viewport: Viewport,
    surface: Box<dyn RenderSurface>,
}

impl Simulation {
    /// Build and initialize every component. The planet table is
    /// precomputed here unless this run benchmarks the precompute itself.
    #[must_use]
    pub fn new(config: SimConfig, surface: Box<dyn RenderSurface>) -> Self {
        let config = config.clamped();
        let area = config.world_area();
        let mut rng = SmallRng::seed_from_u64(config.compute.init_seed());

        let mut planet = Planet::new();
        if config.compute.mode() != RunMode::BenchmarkPlanet {
            planet.precompute(&config);
        }

        let mut food = ResourcePool::new(&config.food, area);
        food.init_random(config.food.pool_init, &mut rng);
        let mut water = ResourcePool::new(&config.water, area);
        water.init_random(config.water.pool_init, &mut rng);

        let mut population = Population::new(area, &config.population);
        population.init_random(config.population.pool_init, &mut rng);

        let viewport = Viewport::new(
            area,
            (config.area.viewport_width, config.area.viewport_height),
        );

        Self {
            config,
            planet,
            food,
            water,
            population,
            viewport,
            surface,
        }
    }

    /// Run the task selected by the config's run mode.
    pub fn run(&mut self) {
        let mut sink = CsvBenchmarkWriter::new(&self.config.compute.results_path);
        match self.config.compute.mode() {
            RunMode::Run => self.run_threaded(false, &mut sink),
            RunMode::BenchmarkSimulation => self.run_threaded(true, &mut sink),
            RunMode::BenchmarkPlanet => self.planet.benchmark(&self.config, &mut sink),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[must_use]
    pub fn planet(&self) -> &Planet {
        &self.planet
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn food(&self) -> &ResourcePool {
        &self.food
    }

    #[must_use]
    pub fn water(&self) -> &ResourcePool {
        &self.water
    }

    #[must_use]
    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    /// Spawn the workers, run the render loop on this thread, then shut the
    /// pipeline down and join.
    fn run_threaded(&mut self, benchmark: bool, sink: &mut dyn BenchmarkSink) {
        let workers = worker_count(self.config.compute.simulation_threads);
        let organisms_per_worker = self.population.max_size() / workers + 1;
        let food_per_worker = self.food.max_size() / workers + 1;
        let water_per_worker = self.water.max_size() / workers + 1;

        let sync = PipelineSync::new(workers as usize);
        if benchmark {
            self.viewport.set_limit_framerate(false);
        }
        info!(workers, benchmark, "starting simulation pipeline");

        let config = &self.config;
        let population = &self.population;
        let food = &self.food;
        let water = &self.water;
        let planet = &self.planet;
        let viewport = &mut self.viewport;
        let surface = self.surface.as_mut();

        thread::scope(|scope| {
            for index in 0..workers {
                let plan = WorkerPlan {
                    seed: config.compute.worker_seed(index),
                    organisms: span(index, organisms_per_worker),
                    food_items: span(index, food_per_worker),
                    water_items: span(index, water_per_worker),
                    fps: config.compute.standard_framerate,
                };
                let sync = &sync;
                scope.spawn(move || worker_loop(plan, population, food, water, planet, sync));
            }

            render_loop(
                RenderContext {
                    surface,
                    viewport,
                    population,
                    food,
                    water,
                    planet,
                    config,
                    sink,
                    workers,
                    benchmark,
                },
                &sync,
            );

            // interrupt workers at their next synchronization point and let
            // the scope join them
            sync.shutdown();
        });
    }
}

fn worker_count(requested: u32) -> u32 {
    if requested == 0 {
        thread::available_parallelism().map_or(1, |n| n.get() as u32)
    } else {
        requested
    }
}

fn span(index: u32, per_worker: u32) -> Range<u32> {
    index * per_worker..(index + 1) * per_worker
}

/// The fixed per-timestep phase sequence, repeated until shutdown. Every
/// blocking wait doubles as the interruption point.
fn worker_loop(
    plan: WorkerPlan,
    population: &Population,
    food: &ResourcePool,
    water: &ResourcePool,
    planet: &Planet,
    sync: &PipelineSync,
) {
    let mut rng = SmallRng::seed_from_u64(plan.seed);
    let mut time: u32 = 0;
    loop {
        // interact and react touch only quiesced state, so they may overlap
        // with the renderer finishing the previous frame
        population.interact(plan.organisms.clone(), &mut rng);
        population.react_to_temperature(plan.organisms.clone(), planet, time);

        // the renderer must publish the previous frame before resource
        // positions may change under it
        if sync.draw_done.wait().is_shutdown() {
            break;
        }
        population.nourish(plan.food_items.clone(), food, &mut rng);
        population.hydrate(plan.water_items.clone(), water, &mut rng);
        sync.draw_resources_begin.notify();

        if sync.replication_begin.wait().is_shutdown() {
            break;
        }
        population.replicate(plan.organisms.clone(), &mut rng);
        if sync.replication_end.wait().is_shutdown() {
            break;
        }

        population.update_phenotypes(plan.organisms.clone());
        population.update_fitness(plan.organisms.clone());
        population.search_for_food(plan.organisms.clone(), food);
        population.search_for_water(plan.organisms.clone(), water);
        population.think(plan.organisms.clone());
        population.advance(plan.organisms.clone());
        population.update_effects(plan.organisms.clone(), plan.fps);
        sync.draw_population_begin.notify();

        time = time.wrapping_add(1);
        if sync.end_of_timestep.wait().is_shutdown() {
            break;
        }
    }
}

struct RenderContext<'a> {
    surface: &'a mut dyn RenderSurface,
    viewport: &'a mut Viewport,
    population: &'a Population,
    food: &'a ResourcePool,
    water: &'a ResourcePool,
    planet: &'a Planet,
    config: &'a SimConfig,
    sink: &'a mut dyn BenchmarkSink,
    workers: u32,
    benchmark: bool,
}

/// The render half of the pipeline: draw resources and the population as
/// the workers release them, handle input, pace frames, and in benchmark
/// mode record per-frame times.
fn render_loop(ctx: RenderContext<'_>, sync: &PipelineSync) {
    let RenderContext {
        surface,
        viewport,
        population,
        food,
        water,
        planet,
        config,
        sink,
        workers,
        benchmark,
    } = ctx;

    let background = Rgba::from_hex(&config.area.background_color).unwrap_or_else(|| {
        warn!(
            value = %config.area.background_color,
            "invalid background_color, using white"
        );
        Rgba::WHITE
    });
    let standard_framerate = config.compute.standard_framerate;
    let benchmark_timesteps = u64::from(config.compute.simulation_benchmark_timesteps);

    let mut time: u32 = 0;
    let mut frame_time: u64 = 0;
    let mut non_limited_time_sum: u64 = 0;
    let mut non_limited_count: u32 = 0;
    let mut limit_framerate = !benchmark;
    let mut frame_times: Vec<u64> = if benchmark {
        Vec::with_capacity(benchmark_timesteps as usize)
    } else {
        Vec::new()
    };

    while surface.is_open() {
        let frame_start = Instant::now();

        if time > 0 {
            if benchmark && u64::from(time) <= benchmark_timesteps {
                frame_times.push(frame_time);
            }
            if benchmark && u64::from(time) >= benchmark_timesteps {
                surface.close();
                continue;
            }
            if !limit_framerate {
                non_limited_time_sum += frame_time;
                non_limited_count += 1;
            }
        }

        let events_start = Instant::now();
        for event in surface.poll_events() {
            match event {
                InputEvent::Pan { dx, dy } => {
                    if viewport.limit_framerate() {
                        viewport.pan(dx * PAN_STEP, dy * PAN_STEP);
                    }
                }
                InputEvent::Zoom { delta } => {
                    if viewport.limit_framerate() {
                        viewport.zoom_by(delta * ZOOM_STEP);
                    }
                }
                InputEvent::ToggleFramerateLimit => {
                    if !benchmark {
                        viewport.toggle_limit_framerate();
                    }
                }
                InputEvent::Close => surface.close(),
            }
        }
        let events_elapsed = events_start.elapsed();

        limit_framerate = if benchmark {
            false
        } else {
            viewport.limit_framerate()
        };
        let draw = calculate_draw(
            time,
            limit_framerate,
            non_limited_time_sum,
            non_limited_count,
            config.compute.performance_framerate,
        );

        if draw {
            surface.clear(background);
        }

        // resources may be drawn once every worker finished distributing
        if sync.draw_resources_begin.wait().is_shutdown() {
            break;
        }
        if draw {
            draw_resource_pool(surface, viewport, water, WATER_FILL);
            draw_resource_pool(surface, viewport, food, FOOD_FILL);
        }

        // the population may be drawn once every worker finished its tick
        if sync.draw_population_begin.wait().is_shutdown() {
            break;
        }
        if draw {
            for organism in population.iter() {
                if !organism.exists() {
                    continue;
                }
                if let Some((center, radius)) =
                    viewport.project(organism.position(), organism.size())
                {
                    surface.draw_disc(
                        center,
                        radius,
                        organism_fill(organism),
                        organism_outline(organism, standard_framerate),
                    );
                }
            }
            surface.draw_annotations(&annotations(viewport, planet, time, standard_framerate));
            if limit_framerate {
                pace_frame(frame_start, standard_framerate);
            }
            surface.present();
        }

        sync.draw_done.notify();

        time = time.wrapping_add(1);
        frame_time = frame_start
            .elapsed()
            .saturating_sub(events_elapsed)
            .as_micros() as u64;
    }

    if benchmark && u64::from(time) >= benchmark_timesteps {
        let label = format!("frame_microseconds_{workers}_simulation_threads");
        let filename = format!("benchmark_results_{workers}_simulation_threads.csv");
        sink.record(&label, &filename, &frame_times);
    }
}

fn annotations(
    viewport: &Viewport,
    planet: &Planet,
    time: u32,
    standard_framerate: u32,
) -> FrameAnnotations {
    let origin = viewport.origin();
    let bottom = (origin.1 + viewport.size().1 as i32 - 1)
        .clamp(0, planet.height().saturating_sub(1) as i32);
    let upper_temperature = planet.get_temperature(origin.1.max(0) as u32, time);
    let lower_temperature = planet.get_temperature(bottom as u32, time);
    FrameAnnotations {
        timestep: time,
        elapsed_seconds: time / standard_framerate.max(1),
        viewport_origin: origin,
        zoom_factor: viewport.zoom_factor(),
        upper_temperature,
        upper_color: temperature_color(upper_temperature),
        lower_temperature,
        lower_color: temperature_color(lower_temperature),
    }
}

/// Whether to draw this frame. Always draw while the framerate is limited
/// or no timing data exists; otherwise draw often enough to approximate the
/// performance framerate.
fn calculate_draw(
    timestep: u32,
    limit_framerate: bool,
    frame_time_sum_us: u64,
    frame_count: u32,
    target_framerate: u32,
) -> bool {
    if limit_framerate || frame_time_sum_us == 0 || frame_count == 0 {
        return true;
    }
    let framerate = f64::from(frame_count) / (frame_time_sum_us as f64 / 1e6);
    let draw_every = ((framerate / f64::from(target_framerate.max(1))).round() as u32).max(1);
    timestep % draw_every == 0
}

fn pace_frame(frame_start: Instant, framerate: u32) {
    let target = Duration::from_secs_f64(1.0 / f64::from(framerate.max(1)));
    let elapsed = frame_start.elapsed();
    if elapsed < target {
        thread::sleep(target - elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_every_frame_while_limited_or_unmeasured() {
        assert!(calculate_draw(7, true, 1_000_000, 100, 36));
        assert!(calculate_draw(7, false, 0, 0, 36));
        assert!(calculate_draw(7, false, 1_000_000, 0, 36));
    }

    #[test]
    fn skips_frames_to_hit_the_target_framerate() {
        // 100 frames in 0.1 s is 1000 fps; at a 100 fps target only every
        // tenth frame is drawn
        assert!(calculate_draw(0, false, 100_000, 100, 100));
        assert!(!calculate_draw(1, false, 100_000, 100, 100));
        assert!(!calculate_draw(9, false, 100_000, 100, 100));
        assert!(calculate_draw(10, false, 100_000, 100, 100));
    }

    #[test]
    fn worker_spans_cover_the_pool_without_overlap() {
        let per_worker = 10u32 / 3 + 1;
        let spans: Vec<_> = (0..3).map(|i| span(i, per_worker)).collect();
        for window in spans.windows(2) {
            assert_eq!(window[0].end, window[1].start);
        }
        assert_eq!(spans[0].start, 0);
        assert!(spans[2].end >= 10);
    }

    #[test]
    fn requested_worker_count_is_respected() {
        assert_eq!(worker_count(3), 3);
        assert!(worker_count(0) >= 1);
    }
}
