use crate::config::ScatterSettings;
use crate::pool::InstancePool;
use crate::procgen::heightfield::TerrainSampler;
use glam::{EulerRot, Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::f32::consts::TAU;
use std::ops::BitXor;
use tracing::{debug, warn};

/// Counters from the most recent refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScatterStats {
    pub candidates: usize,
    pub rejected_by_road: usize,
    pub accepted: usize,
    pub committed: usize,
    pub overflow: usize,
}

/// One category of scattered props (trees, rocks) around the observer.
///
/// The population is regenerated from scratch on every refresh. Candidate
/// cells are anchored to the world grid and each draws from its own seeded
/// RNG, so the same observer position always yields the same instances.
pub struct ScatterStreamer {
    settings: ScatterSettings,
    sampler: TerrainSampler,
    seed: u32,
    pool: InstancePool,
    stats: ScatterStats,
}

impl ScatterStreamer {
    pub fn new(settings: ScatterSettings, sampler: TerrainSampler, seed: u32) -> Self {
        let pool = InstancePool::new(settings.capacity);
        Self {
            settings,
            sampler,
            seed,
            pool,
            stats: ScatterStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ScatterSettings {
        &self.settings
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn stats(&self) -> ScatterStats {
        self.stats
    }

    /// Inclusive cell index range covering `[center - radius, center + radius]`
    fn cell_range(&self, center: f32) -> (i32, i32) {
        let cell = self.settings.cell_size;
        let r = self.settings.window_radius;
        (
            ((center - r) / cell).floor() as i32,
            ((center + r) / cell).floor() as i32,
        )
    }

    /// Rebuild the population around `(x, z)` and commit it to the pool.
    pub fn refresh(&mut self, observer_x: f32, observer_z: f32) -> ScatterStats {
        let mut stats = ScatterStats::default();
        let cell = self.settings.cell_size;
        let clearance = self.settings.road_clearance;
        let (ix0, ix1) = self.cell_range(observer_x);
        let (iz0, iz1) = self.cell_range(observer_z);

        self.pool.reset();

        for iz in iz0..=iz1 {
            for ix in ix0..=ix1 {
                stats.candidates += 1;

                let cx = (ix as f32 + 0.5) * cell;
                let cz = (iz as f32 + 0.5) * cell;
                if self.sampler.corridor().excludes(cx, cz, clearance) {
                    stats.rejected_by_road += 1;
                    continue;
                }

                let mut rng = ChaCha8Rng::seed_from_u64(cell_seed(self.seed, self.settings.salt, ix, iz));
                if rng.gen::<f32>() >= self.settings.accept_probability {
                    continue;
                }

                let spread = self.settings.jitter * cell;
                let x = cx + (rng.gen::<f32>() - 0.5) * spread;
                let z = cz + (rng.gen::<f32>() - 0.5) * spread;
                // Jitter can push a candidate back toward the road.
                if self.sampler.corridor().excludes(x, z, clearance) {
                    stats.rejected_by_road += 1;
                    continue;
                }

                let y = self.sampler.height_at(x, z) + self.settings.ground_offset;
                let rotation = self.random_rotation(&mut rng);
                let scale = self.random_scale(&mut rng);
                let variant = if self.settings.color_variants > 1 {
                    rng.gen_range(0..self.settings.color_variants)
                } else {
                    0
                };

                stats.accepted += 1;
                if let Some(index) = self.pool.add_instance(Vec3::new(x, y, z), rotation, scale) {
                    self.pool.set_color_variant(index, variant);
                }
            }
        }

        self.pool.finalize();
        stats.committed = self.pool.visible_count();
        stats.overflow = self.pool.cycle_overflow();

        if stats.overflow > 0 {
            warn!(
                "{} pool full: {} of {} accepted instances dropped (capacity {})",
                self.settings.name,
                stats.overflow,
                stats.accepted,
                self.pool.capacity()
            );
        }
        debug!(
            "{} refresh at ({:.1}, {:.1}): {} candidates, {} placed, {} on road",
            self.settings.name, observer_x, observer_z, stats.candidates, stats.committed, stats.rejected_by_road
        );

        self.stats = stats;
        stats
    }

    fn random_rotation(&self, rng: &mut ChaCha8Rng) -> Quat {
        let yaw = rng.gen_range(0.0..TAU);
        if self.settings.yaw_only {
            Quat::from_rotation_y(yaw)
        } else {
            let pitch = rng.gen_range(0.0..TAU);
            let roll = rng.gen_range(0.0..TAU);
            Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll)
        }
    }

    fn random_scale(&self, rng: &mut ChaCha8Rng) -> Vec3 {
        let [lo, hi] = self.settings.scale_range;
        let base = if hi > lo { rng.gen_range(lo..hi) } else { lo };
        let mut axes = [base; 3];
        for (axis, variation) in axes.iter_mut().zip(self.settings.axis_variation) {
            if variation > 0.0 {
                *axis *= 1.0 + rng.gen_range(-variation..variation);
            }
        }
        Vec3::from_array(axes)
    }

    /// Empty the pool.
    pub fn dispose(&mut self) {
        self.pool.dispose();
        self.stats = ScatterStats::default();
    }
}

pub(super) fn mix(a: u64, b: u64) -> u64 {
    a.rotate_left(5).bitxor(b).wrapping_mul(0x517c_c1b7_2722_0a95)
}

/// RNG seed for one grid cell of one category
fn cell_seed(seed: u32, salt: u64, ix: i32, iz: i32) -> u64 {
    let h = mix(seed as u64, salt);
    let h = mix(h, ix as i64 as u64);
    mix(h, iz as i64 as u64)
}
