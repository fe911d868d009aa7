//! A living organism: atomically shared vitals, worker-owned body state, and
//! the per-phase behaviour the population drives over index ranges.

use std::cell::UnsafeCell;
use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{Rng, RngCore};

use genesim_genetics::{DECISION_OUTPUTS, Genotype, Phenotype, SENSORY_INPUTS};

use crate::config::PopulationConfig;
use crate::planet::Planet;
use crate::resource::ResourcePool;
use crate::senses::SensoryData;
use crate::sync::AtomicF32;
use crate::{Area, STAT_CEILING, Vec2};

/// Minimum age before an organism can act as a gene-transfer donor.
const TRANSFER_DONOR_MIN_AGE: u32 = 250;
/// Minimum age before an organism may replicate.
pub(crate) const REPLICATION_MIN_AGE: u32 = 500;

/// One slot of the population pool.
///
/// The shared vitals are atomics: other workers' interact and distribute
/// phases and the renderer read them while the owner may write them in a
/// different phase of the tick. Relaxed ordering suffices because the
/// pipeline barriers provide the cross-phase happens-before edges. The
/// genotype mutex guards horizontal gene transfer only.
pub struct Organism {
    index: u32,
    exists: AtomicBool,
    x: AtomicF32,
    y: AtomicF32,
    size: AtomicF32,
    age: AtomicU32,
    fitness: AtomicF32,
    nutrition: AtomicI32,
    hydration: AtomicI32,
    integrity: AtomicI32,
    /// Ticks the gene-transfer visual effect has been active; −1 when off.
    transfer_effect: AtomicI32,
    genotype: Mutex<Genotype>,
    body: UnsafeCell<OrganismBody>,
}

// SAFETY: `body` is only accessed by the worker that owns this slot's index
// range during a range phase, or by the thread that popped the slot from the
// free queue during replication; the pipeline barriers order those accesses.
// Every other field is an atomic or a mutex.
unsafe impl Sync for Organism {}

/// Worker-owned state, never read across threads.
#[derive(Debug)]
pub struct OrganismBody {
    pub(crate) velocity: Vec2,
    pub(crate) phenotype: Phenotype,
    pub(crate) senses: SensoryData,
    /// Per-pair "currently in contact" flags, indexed by the other
    /// organism's pool index.
    pub(crate) collisions: Vec<u8>,
    pub(crate) genes_transferred: bool,
}

impl OrganismBody {
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[must_use]
    pub fn phenotype(&self) -> &Phenotype {
        &self.phenotype
    }

    #[must_use]
    pub fn senses(&self) -> &SensoryData {
        &self.senses
    }

    #[must_use]
    pub fn collision_with(&self, index: u32) -> bool {
        self.collisions[index as usize] != 0
    }

    #[must_use]
    pub fn genes_transferred(&self) -> bool {
        self.genes_transferred
    }
}

impl Organism {
    pub(crate) fn new(index: u32, config: &PopulationConfig) -> Self {
        Self {
            index,
            exists: AtomicBool::new(false),
            x: AtomicF32::new(0.0),
            y: AtomicF32::new(0.0),
            size: AtomicF32::new(0.0),
            age: AtomicU32::new(0),
            fitness: AtomicF32::new(0.0),
            nutrition: AtomicI32::new(STAT_CEILING),
            hydration: AtomicI32::new(STAT_CEILING),
            integrity: AtomicI32::new(STAT_CEILING),
            transfer_effect: AtomicI32::new(-1),
            genotype: Mutex::new(Genotype::new(
                SENSORY_INPUTS,
                config.behaviour_net_layer_1_units as usize,
                config.behaviour_net_layer_2_units as usize,
                DECISION_OUTPUTS,
            )),
            body: UnsafeCell::new(OrganismBody {
                velocity: Vec2::default(),
                phenotype: Phenotype::new(config.phenotype_params()),
                senses: SensoryData::default(),
                collisions: vec![0; config.pool_size as usize],
                genes_transferred: false,
            }),
        }
    }

    /// Stable identity within the pool; also the column used in every other
    /// organism's collision record.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x.load(), self.y.load())
    }

    #[must_use]
    pub fn size(&self) -> f32 {
        self.size.load()
    }

    #[must_use]
    pub fn age(&self) -> u32 {
        self.age.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn fitness(&self) -> f32 {
        self.fitness.load()
    }

    #[must_use]
    pub fn nutrition(&self) -> i32 {
        self.nutrition.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn hydration(&self) -> i32 {
        self.hydration.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn integrity(&self) -> i32 {
        self.integrity.load(Ordering::Relaxed)
    }

    /// Ticks the gene-transfer effect has been active, −1 when inactive.
    #[must_use]
    pub fn transfer_effect(&self) -> i32 {
        self.transfer_effect.load(Ordering::Relaxed)
    }

    /// Worker-owned body of this organism.
    ///
    /// # Safety
    /// The caller must hold phase ownership of the slot: it is the worker
    /// assigned this index's range during a range phase, or it popped the
    /// slot from the free queue during replication.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn phase_body(&self) -> &mut OrganismBody {
        unsafe { &mut *self.body.get() }
    }

    /// Exclusive access to the body through an exclusive organism borrow.
    #[must_use]
    pub fn body_mut(&mut self) -> &mut OrganismBody {
        self.body.get_mut()
    }

    fn set_position(&self, position: Vec2) {
        self.x.store(position.x);
        self.y.store(position.y);
    }

    /// Clear every stat that is not overwritten each timestep.
    fn reset(&self, body: &mut OrganismBody) {
        self.nutrition.store(STAT_CEILING, Ordering::Relaxed);
        self.hydration.store(STAT_CEILING, Ordering::Relaxed);
        self.integrity.store(STAT_CEILING, Ordering::Relaxed);
        self.fitness.store(1.0);
        self.age.store(0, Ordering::Relaxed);
        self.transfer_effect.store(-1, Ordering::Relaxed);
        body.collisions.fill(0);
        body.genes_transferred = false;
    }

    fn express_and_exist(&self, body: &mut OrganismBody, genotype: &Genotype) {
        genotype.express_traits(&mut body.phenotype);
        self.size.store(body.phenotype.area_of_influence());
        self.exists.store(true, Ordering::Relaxed);
    }

    /// Reset and initialize as a fresh random organism.
    pub(crate) fn init(
        &self,
        body: &mut OrganismBody,
        position: Vec2,
        config: &PopulationConfig,
        rng: &mut dyn RngCore,
    ) {
        self.reset(body);
        self.set_position(position);
        let mut genotype = lock(&self.genotype);
        genotype.randomize(
            config.behaviour_net_weight_range,
            config.behaviour_net_weight_range_bias,
            rng,
        );
        self.express_and_exist(body, &genotype);
    }

    /// Reset and initialize as the offspring of a single parent.
    ///
    /// Runs between the replication barriers, so no interact-phase genotype
    /// locks are live and the nested parent/child locking cannot deadlock.
    pub(crate) fn init_from_parent(
        &self,
        body: &mut OrganismBody,
        parent: &Organism,
        config: &PopulationConfig,
        rng: &mut dyn RngCore,
    ) {
        self.reset(body);
        self.set_position(parent.position());
        let parent_genotype = lock(&parent.genotype);
        let mut genotype = lock(&self.genotype);
        genotype.inherit_from(&parent_genotype, &config.mutation_params(), rng);
        self.express_and_exist(body, &genotype);
    }

    /// Reset and initialize as the offspring of two parents, placed at their
    /// midpoint.
    pub(crate) fn init_from_parents(
        &self,
        body: &mut OrganismBody,
        parent1: &Organism,
        parent2: &Organism,
        config: &PopulationConfig,
        rng: &mut dyn RngCore,
    ) {
        self.reset(body);
        let p1 = parent1.position();
        let p2 = parent2.position();
        self.set_position(Vec2::new((p1.x + p2.x) / 2.0, (p1.y + p2.y) / 2.0));
        let genotype1 = lock(&parent1.genotype);
        let genotype2 = lock(&parent2.genotype);
        let mut genotype = lock(&self.genotype);
        genotype.combine_from(&genotype1, &genotype2, &config.mutation_params(), rng);
        self.express_and_exist(body, &genotype);
    }

    /// Whether an item at `item_position` is within interaction range. With
    /// `center` the check is against this organism's own radius only,
    /// otherwise against the combined radii.
    #[must_use]
    pub fn check_in_range(&self, item_position: Vec2, item_size: f32, center: bool) -> bool {
        let position = self.position();
        let dx = position.x - item_position.x;
        let dy = position.y - item_position.y;
        let range = self.size() + if center { 0.0 } else { item_size };
        dx * dx + dy * dy < range * range
    }

    /// Interact with another organism, possibly receiving genes from it.
    ///
    /// A transfer can only fire on the rising edge of a contact with a donor
    /// past the age gate; the contact flag itself is always refreshed.
    pub(crate) fn interact_with(
        &self,
        body: &mut OrganismBody,
        other: &Organism,
        rng: &mut dyn RngCore,
    ) {
        if !self.exists() {
            return;
        }
        if !other.exists() {
            body.collisions[other.index as usize] = 0;
            return;
        }

        let collision = self.check_in_range(other.position(), other.size(), true);
        if collision
            && !body.collision_with(other.index)
            && other.age() > TRANSFER_DONOR_MIN_AGE
        {
            let chance = (self.fitness() * 0.35 + other.fitness() * 0.65) / 10.0;
            if rng.random::<f32>() < chance {
                let weighting = ((other.fitness() - self.fitness()) / 2.0 + 0.5) / 5.0;
                Genotype::transfer_from(&self.genotype, &other.genotype, weighting);
                body.genes_transferred = true;
                self.transfer_effect.store(0, Ordering::Relaxed);
            }
        }
        body.collisions[other.index as usize] = u8::from(collision);
    }

    /// Adjust integrity from the local temperature and pick the heading
    /// towards the more habitable latitude.
    pub(crate) fn react_to_temperature(
        &self,
        body: &mut OrganismBody,
        planet: &Planet,
        time: u32,
    ) {
        if !self.exists() {
            return;
        }

        let y = self.position().y as u32;
        let ideal = body.phenotype.ideal_temp();
        let rate = body.phenotype.health_rate();
        let temp_d = (planet.get_temperature(y, time) - ideal).abs();
        let integrity = self.integrity.load(Ordering::Relaxed) as f32;
        let updated = if temp_d < body.phenotype.temp_range() {
            (integrity + rate / temp_d.max(1.0)).min(STAT_CEILING as f32)
        } else {
            (integrity - temp_d / (120.0 / (rate / 2.0))).max(0.0)
        };
        self.integrity.store(updated as i32, Ordering::Relaxed);
        body.senses.set_temperature_damage(updated as i32);

        let north_y = y.saturating_sub(5);
        let south_y = (y + 5).min(planet.height().saturating_sub(1));
        let north_d = (planet.get_temperature(north_y, time) - ideal).abs();
        let south_d = (planet.get_temperature(south_y, time) - ideal).abs();
        let heading = if north_d < south_d {
            FRAC_PI_2
        } else {
            -FRAC_PI_2
        };
        body.senses.set_temperature_heading(heading);
    }

    /// Add consumed food value to nutrition. Atomic so that resource ranges
    /// on different workers can award the same organism concurrently.
    pub(crate) fn nourish(&self, amount: u32) {
        self.nutrition.fetch_add(amount as i32, Ordering::Relaxed);
    }

    /// Add consumed water value to hydration; same atomicity as `nourish`.
    pub(crate) fn hydrate(&self, amount: u32) {
        self.hydration.fetch_add(amount as i32, Ordering::Relaxed);
    }

    /// Re-express traits after a gene transfer.
    pub(crate) fn update_phenotype(&self, body: &mut OrganismBody) {
        if !body.genes_transferred {
            return;
        }
        {
            let genotype = lock(&self.genotype);
            genotype.express_traits(&mut body.phenotype);
        }
        self.size.store(body.phenotype.area_of_influence());
        body.genes_transferred = false;
    }

    /// Clamp and decay nutrition and hydration, then either die or refresh
    /// fitness and age. Returns whether the organism is still alive.
    pub(crate) fn update_fitness(&self, body: &mut OrganismBody) -> bool {
        if !self.exists() {
            return false;
        }

        let rate = body.phenotype.health_rate() as i32;
        let nutrition = self.nutrition.load(Ordering::Relaxed).min(STAT_CEILING) - rate;
        self.nutrition.store(nutrition, Ordering::Relaxed);
        let hydration = self.hydration.load(Ordering::Relaxed).min(STAT_CEILING) - rate;
        self.hydration.store(hydration, Ordering::Relaxed);
        let integrity = self.integrity.load(Ordering::Relaxed);

        if nutrition <= 0 || hydration <= 0 || integrity <= 0 {
            self.exists.store(false, Ordering::Relaxed);
        } else {
            self.fitness
                .store((nutrition + hydration + integrity) as f32 / 3e6);
            self.age.fetch_add(1, Ordering::Relaxed);
        }
        self.exists()
    }

    /// Record the heading to the nearest food item and the current hunger.
    pub(crate) fn search_for_food(&self, body: &mut OrganismBody, food: &ResourcePool) {
        if !self.exists() {
            return;
        }
        let heading = self.heading_to_nearest(food);
        body.senses.set_food_heading(heading);
        body.senses.set_hunger(self.nutrition.load(Ordering::Relaxed));
    }

    /// Record the heading to the nearest water item and the current thirst.
    pub(crate) fn search_for_water(&self, body: &mut OrganismBody, water: &ResourcePool) {
        if !self.exists() {
            return;
        }
        let heading = self.heading_to_nearest(water);
        body.senses.set_water_heading(heading);
        body.senses.set_thirst(self.hydration.load(Ordering::Relaxed));
    }

    fn heading_to_nearest(&self, pool: &ResourcePool) -> f32 {
        let position = self.position();
        let mut shortest = f32::MAX;
        let mut heading = 0.0;
        for item in pool.iter() {
            if !item.exists() {
                continue;
            }
            let item_position = item.position();
            let dx = position.x - item_position.x;
            let dy = position.y - item_position.y;
            let squared = dx * dx + dy * dy;
            if squared < shortest {
                shortest = squared;
                heading = dy.atan2(dx);
            }
        }
        heading
    }

    /// Forward-pass the behaviour network over the sensory vector, setting
    /// velocity from the first output and memory from the second.
    pub(crate) fn think(&self, body: &mut OrganismBody) {
        if !self.exists() {
            return;
        }
        let decision = {
            let mut genotype = lock(&self.genotype);
            let outputs = genotype.express_behaviour(body.senses.as_slice());
            [outputs[0], outputs[1]]
        };
        body.velocity = Vec2::from_heading(decision[0] * PI, body.phenotype.speed());
        body.senses.set_memory(decision[1]);
    }

    /// Apply velocity with toroidal wrap.
    pub(crate) fn advance(&self, body: &mut OrganismBody, area: Area) {
        if !self.exists() {
            return;
        }
        self.set_position(area.wrap(self.position() + body.velocity));
    }

    /// Advance the gene-transfer visual effect, switching it off after
    /// 1.5 seconds' worth of timesteps.
    pub(crate) fn update_effects(&self, fps: u32) {
        if !self.exists() {
            return;
        }
        let effect = self.transfer_effect.load(Ordering::Relaxed);
        if effect >= 0 {
            let effect = effect + 1;
            let next = if effect as f32 > fps as f32 * 1.5 {
                -1
            } else {
                effect
            };
            self.transfer_effect.store(next, Ordering::Relaxed);
        }
    }
}

fn lock(genotype: &Mutex<Genotype>) -> MutexGuard<'_, Genotype> {
    genotype.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for Organism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Organism")
            .field("index", &self.index)
            .field("exists", &self.exists())
            .field("position", &self.position())
            .field("age", &self.age())
            .field("fitness", &self.fitness())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn test_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.area.width = 300;
        config.area.height = 300;
        config.planet.orbital_period = 1_000;
        config.compute.precompute_temperatures_cpu_threads = 2;
        config.population.area_of_influence_sigma = 0.0;
        config.population.speed_sigma = 0.0;
        config.population.health_rate_sigma = 0.0;
        config.population.ideal_temp_sigma = 0.0;
        config.population.temp_range_sigma = 0.0;
        config
    }

    fn live_organism(config: &SimConfig, position: Vec2) -> Organism {
        let mut rng = SmallRng::seed_from_u64(0xA11CE);
        let organism = Organism::new(0, &config.population);
        let body = unsafe { organism.phase_body() };
        organism.init(body, position, &config.population, &mut rng);
        organism
    }

    #[test]
    fn advance_wraps_toroidally_at_the_east_edge() {
        let config = test_config();
        let area = Area::new(300, 300);
        let organism = live_organism(&config, Vec2::new(299.0, 150.0));
        let body = unsafe { organism.phase_body() };
        body.velocity = Vec2::new(2.0, 0.0);
        organism.advance(body, area);
        let position = organism.position();
        assert_eq!(position.x, 1.0);
        assert_eq!(position.y, 150.0);
    }

    #[test]
    fn comfortable_band_restores_integrity_to_the_ceiling() {
        let mut config = test_config();
        let mut planet = Planet::new();
        planet.precompute(&config);
        let local = planet.get_temperature(150, 0);
        // sit exactly at the ideal temperature, well inside the band
        config.population.ideal_temp_mean = local;
        config.population.temp_range_mean = 50.0;
        let organism = live_organism(&config, Vec2::new(10.0, 150.0));
        let body = unsafe { organism.phase_body() };
        organism.react_to_temperature(body, &planet, 0);
        assert_eq!(organism.integrity(), STAT_CEILING);
    }

    #[test]
    fn mismatch_equal_to_temp_range_takes_the_losing_branch() {
        let mut config = test_config();
        let mut planet = Planet::new();
        planet.precompute(&config);
        let local = planet.get_temperature(150, 0);
        // Δ is exactly 0 and temp_range is 0: the gain branch requires a
        // strictly smaller mismatch, so this must lose (by zero)
        config.population.ideal_temp_mean = local;
        config.population.temp_range_mean = 0.0;
        config.population.health_rate_mean = 220.0;
        let organism = live_organism(&config, Vec2::new(10.0, 150.0));
        organism.integrity.store(500_000, Ordering::Relaxed);
        let body = unsafe { organism.phase_body() };
        organism.react_to_temperature(body, &planet, 0);
        assert_eq!(organism.integrity(), 500_000);

        // widening the band to make Δ strictly inside flips it to a gain
        config.population.temp_range_mean = 1.0;
        let gaining = live_organism(&config, Vec2::new(10.0, 150.0));
        gaining.integrity.store(500_000, Ordering::Relaxed);
        let gaining_body = unsafe { gaining.phase_body() };
        gaining.react_to_temperature(gaining_body, &planet, 0);
        assert_eq!(gaining.integrity(), 500_000 + 220);
    }

    #[test]
    fn temperature_probes_clamp_at_the_world_edges() {
        let mut config = test_config();
        let mut planet = Planet::new();
        planet.precompute(&config);
        config.population.ideal_temp_mean = 260.0;
        for y in [0u32, 299] {
            let organism = live_organism(&config, Vec2::new(10.0, y as f32));
            let body = unsafe { organism.phase_body() };
            organism.react_to_temperature(body, &planet, 0);
            let ideal = body.phenotype.ideal_temp();
            let north = (planet.get_temperature(y.saturating_sub(5), 0) - ideal).abs();
            let south = (planet.get_temperature((y + 5).min(299), 0) - ideal).abs();
            let expected = if north < south { FRAC_PI_2 } else { -FRAC_PI_2 };
            assert!((body.senses.temperature_heading() - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn update_fitness_clamps_overfed_stats_before_decay() {
        let config = test_config();
        let organism = live_organism(&config, Vec2::new(10.0, 10.0));
        organism.nourish(500_000);
        assert_eq!(organism.nutrition(), STAT_CEILING + 500_000);
        let body = unsafe { organism.phase_body() };
        assert!(organism.update_fitness(body));
        let rate = body.phenotype.health_rate() as i32;
        assert_eq!(organism.nutrition(), STAT_CEILING - rate);
        assert_eq!(organism.hydration(), STAT_CEILING - rate);
        assert_eq!(organism.age(), 1);
    }

    #[test]
    fn concurrent_awards_accumulate_exactly() {
        let config = test_config();
        let organism = live_organism(&config, Vec2::new(10.0, 10.0));
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        organism.nourish(1_000);
                        organism.hydrate(500);
                    }
                });
            }
        });
        assert_eq!(organism.nutrition(), STAT_CEILING + 1_000_000);
        assert_eq!(organism.hydration(), STAT_CEILING + 500_000);
    }

    #[test]
    fn dead_organisms_skip_every_phase_step() {
        let config = test_config();
        let mut rng = SmallRng::seed_from_u64(2);
        let organism = Organism::new(0, &config.population);
        let body = unsafe { organism.phase_body() };
        assert!(!organism.exists());
        organism.think(body);
        organism.advance(body, Area::new(300, 300));
        organism.update_effects(90);
        assert!(!organism.update_fitness(body));
        assert_eq!(organism.position(), Vec2::new(0.0, 0.0));
        // a fresh init brings the slot back with full stats
        organism.init(body, Vec2::new(5.0, 5.0), &config.population, &mut rng);
        assert!(organism.exists());
        assert_eq!(organism.nutrition(), STAT_CEILING);
        assert_eq!(organism.fitness(), 1.0);
        assert_eq!(organism.age(), 0);
    }

    #[test]
    fn transfer_effect_expires_after_one_and_a_half_seconds() {
        let config = test_config();
        let organism = live_organism(&config, Vec2::new(10.0, 10.0));
        organism.transfer_effect.store(0, Ordering::Relaxed);
        let fps = 10;
        for _ in 0..15 {
            organism.update_effects(fps);
        }
        assert_eq!(organism.transfer_effect(), 15);
        organism.update_effects(fps);
        assert_eq!(organism.transfer_effect(), -1);
    }

    #[test]
    fn two_parent_offspring_lands_at_the_midpoint() {
        let config = test_config();
        let mut rng = SmallRng::seed_from_u64(41);
        let parent1 = live_organism(&config, Vec2::new(10.0, 20.0));
        let parent2 = live_organism(&config, Vec2::new(30.0, 60.0));
        let child = Organism::new(1, &config.population);
        let child_body = unsafe { child.phase_body() };
        child.init_from_parents(child_body, &parent1, &parent2, &config.population, &mut rng);
        assert!(child.exists());
        assert_eq!(child.position(), Vec2::new(20.0, 40.0));
        assert_eq!(child.size(), child_body.phenotype.area_of_influence());
    }
}
