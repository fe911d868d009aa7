//! The organism pool plus the per-phase operations of the simulation
//! pipeline.

use std::ops::Range;

use rand::{Rng, RngCore};
use tracing::debug;

use crate::config::PopulationConfig;
use crate::organism::{Organism, OrganismBody, REPLICATION_MIN_AGE};
use crate::planet::Planet;
use crate::pool::SlotPool;
use crate::resource::ResourcePool;
use crate::{Area, Vec2};

enum ResourceKind {
    Food,
    Water,
}

/// A population of organisms over a fixed slot pool.
///
/// Phase methods operate on the caller's owned index range. The simulation
/// driver partitions `[0, max_size)` disjointly across its workers and
/// orders the phases with barriers and signal links; phase methods rely on
/// that discipline for their single-writer access to each organism's body.
pub struct Population {
    pool: SlotPool<Organism>,
    area: Area,
    config: PopulationConfig,
}

impl Population {
    #[must_use]
    pub fn new(area: Area, config: &PopulationConfig) -> Self {
        Self {
            pool: SlotPool::new(config.pool_size),
            area,
            config: config.clone(),
        }
    }

    /// Fill the pool with organisms, initializing the first `count` at
    /// random positions and queueing the rest as free slots.
    pub fn init_random(&mut self, count: u32, rng: &mut dyn RngCore) {
        if self.pool.initialized() {
            return;
        }
        let count = count.min(self.pool.max_size());
        let margin = self.config.pool_pos_margin;
        let x_max = (self.area.width_f() - margin - 1.0).max(margin + 1.0);
        let y_max = (self.area.height_f() - margin - 1.0).max(margin + 1.0);
        for i in 0..self.pool.max_size() {
            self.pool.add_item(Organism::new(i, &self.config));
            if i < count {
                let position = Vec2::new(
                    rng.random_range(margin..x_max),
                    rng.random_range(margin..y_max),
                );
                let organism = self.pool.get_mut(i);
                // SAFETY: initialization runs before any worker exists.
                let body = unsafe { organism.phase_body() };
                organism.init(body, position, &self.config, rng);
            } else {
                self.pool.release_slot(i);
            }
        }
        self.pool.set_initialized();
        debug!(count, max_size = self.pool.max_size(), "population initialized");
    }

    /// Pairwise interaction of each owned organism with the whole pool.
    pub fn interact(&self, range: Range<u32>, rng: &mut dyn RngCore) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            for j in 0..self.pool.max_size() {
                if i != j {
                    organism.interact_with(body, self.pool.get(j), rng);
                }
            }
        }
    }

    /// Sample the temperature table and update integrity and the
    /// temperature heading for each owned organism.
    pub fn react_to_temperature(&self, range: Range<u32>, planet: &Planet, time: u32) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.react_to_temperature(body, planet, time);
        }
    }

    /// Distribute the owned range of the food pool to organisms in range.
    pub fn nourish(&self, pool_range: Range<u32>, food: &ResourcePool, rng: &mut dyn RngCore) {
        self.distribute(pool_range, food, ResourceKind::Food, rng);
    }

    /// Distribute the owned range of the water pool to organisms in range.
    pub fn hydrate(&self, pool_range: Range<u32>, water: &ResourcePool, rng: &mut dyn RngCore) {
        self.distribute(pool_range, water, ResourceKind::Water, rng);
    }

    fn distribute(
        &self,
        pool_range: Range<u32>,
        pool: &ResourcePool,
        kind: ResourceKind,
        rng: &mut dyn RngCore,
    ) {
        if !self.pool.initialized() {
            return;
        }
        let end = pool_range.end.min(pool.max_size());
        for i in pool_range.start..end {
            if !pool.get(i).exists() {
                continue;
            }
            for j in 0..self.pool.max_size() {
                let organism = self.pool.get(j);
                let item = pool.get(i);
                if organism.exists()
                    && organism.check_in_range(item.position(), item.size(), false)
                {
                    let amount = pool.consume_and_reset(i, rng);
                    match kind {
                        ResourceKind::Food => organism.nourish(amount),
                        ResourceKind::Water => organism.hydrate(amount),
                    }
                    // only one organism may consume an item
                    break;
                }
            }
        }
    }

    /// Let each owned live organism replicate with probability
    /// `fitness * replication_rate` once past the age gate. Children claim
    /// free slots; an empty queue means the population is full and the loop
    /// breaks for this worker.
    pub fn replicate(&self, range: Range<u32>, rng: &mut dyn RngCore) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            if !organism.exists() {
                continue;
            }
            let probability = if organism.age() < REPLICATION_MIN_AGE {
                0.0
            } else {
                organism.fitness() * self.config.replication_rate
            };
            if rng.random::<f32>() < probability {
                let claimed = self.pool.claim_slot(|slot| {
                    let child = self.pool.get(slot);
                    // SAFETY: popping the free queue grants exclusive
                    // ownership of `slot` until the replication barrier.
                    let child_body = unsafe { child.phase_body() };
                    child.init_from_parent(child_body, organism, &self.config, &mut *rng);
                    // parent and child start in contact; suppress the
                    // immediate interaction between them
                    child_body.collisions[i as usize] = 1;
                    // SAFETY: the caller owns `i`'s range during the phase.
                    let parent_body = unsafe { organism.phase_body() };
                    parent_body.collisions[slot as usize] = 1;
                });
                if !claimed {
                    break;
                }
            }
        }
    }

    /// Re-express traits for owned organisms whose genes changed this tick.
    pub fn update_phenotypes(&self, range: Range<u32>) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.update_phenotype(body);
        }
    }

    /// Decay and clamp stats for owned organisms, queueing slots of the ones
    /// that died.
    pub fn update_fitness(&self, range: Range<u32>) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            if !organism.exists() {
                continue;
            }
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            if !organism.update_fitness(body) {
                self.pool.release_slot(i);
            }
        }
    }

    /// Record heading and hunger towards the nearest food for owned
    /// organisms.
    pub fn search_for_food(&self, range: Range<u32>, food: &ResourcePool) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.search_for_food(body, food);
        }
    }

    /// Record heading and thirst towards the nearest water for owned
    /// organisms.
    pub fn search_for_water(&self, range: Range<u32>, water: &ResourcePool) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.search_for_water(body, water);
        }
    }

    /// Run the behaviour network for owned organisms, setting velocities.
    pub fn think(&self, range: Range<u32>) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.think(body);
        }
    }

    /// Apply velocities with toroidal wrap for owned organisms.
    pub fn advance(&self, range: Range<u32>) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            let organism = self.pool.get(i);
            // SAFETY: the caller owns this index range during the phase.
            let body = unsafe { organism.phase_body() };
            organism.advance(body, self.area);
        }
    }

    /// Advance visual-effect timers for owned organisms.
    pub fn update_effects(&self, range: Range<u32>, fps: u32) {
        if !self.pool.initialized() {
            return;
        }
        let end = range.end.min(self.pool.max_size());
        for i in range.start..end {
            self.pool.get(i).update_effects(fps);
        }
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    #[must_use]
    pub fn organism(&self, index: u32) -> &Organism {
        self.pool.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Organism> {
        self.pool.iter()
    }

    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.iter().filter(|organism| organism.exists()).count() as u32
    }

    #[must_use]
    pub fn free_slot_count(&self) -> usize {
        self.pool.free_slot_count()
    }

    /// Exclusive access to one organism's body, for inspection and setup.
    #[must_use]
    pub fn body_mut(&mut self, index: u32) -> &mut OrganismBody {
        self.pool.get_mut(index).body_mut()
    }
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("max_size", &self.pool.max_size())
            .field("live", &self.live_count())
            .field("free_slots", &self.pool.free_slot_count())
            .finish()
    }
}
