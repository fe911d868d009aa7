//! Consumable resources (food and water items) and their pools.

use rand::{Rng, RngCore};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::ResourceConfig;
use crate::pool::SlotPool;
use crate::sync::AtomicF32;
use crate::{Area, Vec2};

/// One food or water item. A consumed item is re-randomized in place rather
/// than removed from its pool, so the pool's occupancy is steady.
///
/// Fields are atomics because search and render phases read items while the
/// distribute phase of another tick rewrites them; the pipeline barriers
/// order those accesses.
#[derive(Debug, Default)]
pub struct ConsumableResource {
    exists: AtomicBool,
    x: AtomicF32,
    y: AtomicF32,
    size: AtomicF32,
    value: AtomicU32,
}

impl ConsumableResource {
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
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Give the item a value and a position and bring it into existence.
    /// Size is proportional to the value's share of the pool maximum.
    fn init(&self, value: u32, max_val: u32, position: Vec2) {
        self.value.store(value, Ordering::Relaxed);
        self.x.store(position.x);
        self.y.store(position.y);
        self.size.store(value as f32 / max_val as f32 * 6.0);
        self.exists.store(true, Ordering::Relaxed);
    }

    /// Take the item's value and mark it consumed.
    fn consume(&self) -> u32 {
        self.exists.store(false, Ordering::Relaxed);
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed pool of consumable resources scattered over the area.
#[derive(Debug)]
pub struct ResourcePool {
    pool: SlotPool<ConsumableResource>,
    max_val: u32,
    margin: f32,
    area: Area,
}

impl ResourcePool {
    #[must_use]
    pub fn new(config: &ResourceConfig, area: Area) -> Self {
        Self {
            pool: SlotPool::new(config.pool_size),
            max_val: config.max_val,
            margin: config.pool_pos_margin,
            area,
        }
    }

    /// Fill the pool, randomizing the first `count` items and queueing the
    /// rest as free slots.
    pub fn init_random(&mut self, count: u32, rng: &mut dyn RngCore) {
        if self.pool.initialized() {
            return;
        }
        let count = count.min(self.pool.max_size());
        for i in 0..self.pool.max_size() {
            self.pool.add_item(ConsumableResource::default());
            if i < count {
                self.reset_item(i, rng);
            } else {
                self.pool.release_slot(i);
            }
        }
        self.pool.set_initialized();
    }

    /// Consume item `i` and re-randomize it in place, returning the consumed
    /// value. The caller must own index `i`'s pool range during the
    /// distribute phase.
    pub fn consume_and_reset(&self, i: u32, rng: &mut dyn RngCore) -> u32 {
        let value = self.pool.get(i).consume();
        self.reset_item(i, rng);
        value
    }

    fn reset_item(&self, i: u32, rng: &mut dyn RngCore) {
        let x_max = (self.area.width_f() - self.margin).max(self.margin + 1.0);
        let y_max = (self.area.height_f() - self.margin).max(self.margin + 1.0);
        let position = Vec2::new(
            rng.random_range(self.margin..x_max),
            rng.random_range(self.margin..y_max),
        );
        let value = rng.random_range(10_000..=self.max_val);
        self.pool.get(i).init(value, self.max_val, position);
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    #[must_use]
    pub fn get(&self, index: u32) -> &ConsumableResource {
        self.pool.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConsumableResource> {
        self.pool.iter()
    }

    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.iter().filter(|item| item.exists()).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn pool() -> ResourcePool {
        let config = ResourceConfig {
            pool_size: 8,
            max_val: 50_000,
            pool_pos_margin: 10.0,
            pool_init: 5,
        };
        let mut pool = ResourcePool::new(&config, Area::new(400, 300));
        let mut rng = SmallRng::seed_from_u64(0xF00D);
        pool.init_random(config.pool_init, &mut rng);
        pool
    }

    #[test]
    fn init_randomizes_first_count_items_only() {
        let pool = pool();
        assert_eq!(pool.live_count(), 5);
        for item in pool.iter().take(5) {
            assert!(item.exists());
            assert!((10_000..=50_000).contains(&item.value()));
            let position = item.position();
            assert!((10.0..390.0).contains(&position.x));
            assert!((10.0..290.0).contains(&position.y));
        }
        for item in pool.iter().skip(5) {
            assert!(!item.exists());
        }
    }

    #[test]
    fn item_size_tracks_value_share() {
        let pool = pool();
        let item = pool.get(0);
        let expected = item.value() as f32 / 50_000.0 * 6.0;
        assert!((item.size() - expected).abs() < 1e-6);
    }

    #[test]
    fn consume_and_reset_rerolls_in_place() {
        let pool = pool();
        let before = pool.get(2).value();
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let consumed = pool.consume_and_reset(2, &mut rng);
        assert_eq!(consumed, before);
        let item = pool.get(2);
        assert!(item.exists(), "reset items come back alive");
        assert!((10_000..=50_000).contains(&item.value()));
    }
}
