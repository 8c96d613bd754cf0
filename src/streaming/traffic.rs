//! Cars driving along the road window in both directions.
//!
//! Cars live in arc-length: each has a distance along the path and moves
//! with or against the observer. Every update evicts cars that drifted
//! too far, tops each direction up by at most one car, advances them and
//! commits their world transforms to an [`InstancePool`].
use super::road::RoadStreamer;
use super::scatter::mix;
use crate::config::TrafficSettings;
use crate::pool::InstancePool;
use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::f32::consts::PI;
use tracing::{debug, trace, warn};

/// Lane slots a car can pick, in units of `lane_width`
const LANES: [f32; 2] = [-0.5, 0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Travelling the same way as the observer
    Forward,
    Oncoming,
}

impl Direction {
    fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Oncoming => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficCar {
    pub distance: f32,
    /// Meters per second, always positive
    pub speed: f32,
    pub lane: f32,
    pub direction: Direction,
    pub color_variant: u8,
}

impl TrafficCar {
    /// Signed lateral offset from the centre-line. Oncoming cars mirror
    /// their lane to the other side.
    pub fn lateral_offset(&self, lane_width: f32) -> f32 {
        self.lane * lane_width * self.direction.sign()
    }
}

/// What one update changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    pub spawned: usize,
    pub evicted: usize,
    /// Cars inside the road window and committed to the pool
    pub placed: usize,
}

pub struct TrafficStreamer {
    settings: TrafficSettings,
    seed: u32,
    rng: ChaCha8Rng,
    cars: Vec<TrafficCar>,
    pool: InstancePool,
}

impl TrafficStreamer {
    /// Seed the RNG and lay out the opening traffic ahead of arc-length 0.
    pub fn new(settings: TrafficSettings, seed: u32) -> Self {
        let pool = InstancePool::new(settings.max_cars);
        let mut traffic = Self {
            rng: ChaCha8Rng::seed_from_u64(mix(seed as u64, settings.salt)),
            settings,
            seed,
            cars: Vec::new(),
            pool,
        };
        traffic.populate();
        traffic
    }

    pub fn settings(&self) -> &TrafficSettings {
        &self.settings
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn cars(&self) -> &[TrafficCar] {
        &self.cars
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.cars.iter().filter(|c| c.direction == direction).count()
    }

    fn per_direction(&self) -> usize {
        self.settings.max_cars / 2
    }

    fn populate(&mut self) {
        if !self.settings.enabled {
            return;
        }
        let opening = 3.min(self.per_direction());
        for i in 0..opening {
            self.spawn(20.0 + i as f32 * 30.0, Direction::Forward);
        }
        for i in 0..opening {
            self.spawn(50.0 + i as f32 * 40.0, Direction::Oncoming);
        }
    }

    fn spawn(&mut self, distance: f32, direction: Direction) {
        let [slow, fast] = self.settings.speed_range;
        let car = TrafficCar {
            distance,
            speed: self.rng.gen_range(slow..fast),
            lane: LANES[self.rng.gen_range(0..LANES.len())],
            direction,
            color_variant: self.rng.gen_range(0..self.settings.color_variants.max(1)),
        };
        trace!("Spawned {:?} car at {:.1}m", direction, distance);
        self.cars.push(car);
    }

    /// Evict, spawn, advance by `dt` seconds and commit positions.
    pub fn update(&mut self, dt: f32, road: &RoadStreamer, observer_distance: f32) -> TrafficReport {
        let mut report = TrafficReport::default();
        if !self.settings.enabled {
            report.evicted = self.cars.len();
            self.cars.clear();
            self.pool.reset();
            self.pool.finalize();
            return report;
        }

        let reach = self.settings.despawn_distance;
        let before = self.cars.len();
        self.cars.retain(|car| (car.distance - observer_distance).abs() <= reach);
        report.evicted = before - self.cars.len();

        for (direction, [near, far]) in [
            (Direction::Forward, self.settings.forward_spawn),
            (Direction::Oncoming, self.settings.oncoming_spawn),
        ] {
            if self.count(direction) < self.per_direction() {
                let distance = observer_distance + self.rng.gen_range(near..far);
                self.spawn(distance, direction);
                report.spawned += 1;
            }
        }

        for car in &mut self.cars {
            car.distance += car.speed * car.direction.sign() * dt;
        }

        report.placed = self.place(road);
        if report.spawned + report.evicted > 0 {
            debug!(
                "Traffic: +{} -{} cars, {} placed around {:.1}m",
                report.spawned, report.evicted, report.placed, observer_distance
            );
        }
        report
    }

    fn place(&mut self, road: &RoadStreamer) -> usize {
        self.pool.reset();
        for car in &self.cars {
            // Cars outside the road window stay simulated but are not drawn.
            let Some(frame) = road.frame_at_distance(car.distance) else {
                continue;
            };
            let position = frame.position
                + frame.binormal * car.lateral_offset(self.settings.lane_width)
                + frame.normal * self.settings.ride_height;
            let mut yaw = frame.tangent.x.atan2(frame.tangent.z);
            if car.direction == Direction::Oncoming {
                yaw += PI;
            }
            if let Some(index) = self.pool.add_instance(position, Quat::from_rotation_y(yaw), Vec3::ONE) {
                self.pool.set_color_variant(index, car.color_variant);
            }
        }
        self.pool.finalize();

        if self.pool.cycle_overflow() > 0 {
            warn!(
                "Traffic pool full: {} cars dropped (capacity {})",
                self.pool.cycle_overflow(),
                self.pool.capacity()
            );
        }
        self.pool.visible_count()
    }

    /// Remove every car. The opening traffic is not respawned; the next
    /// update tops each direction up one car at a time.
    pub fn dispose(&mut self) {
        self.cars.clear();
        self.pool.dispose();
        self.rng = ChaCha8Rng::seed_from_u64(mix(self.seed as u64, self.settings.salt));
    }
}
