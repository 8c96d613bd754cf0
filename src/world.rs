//! Per-tick orchestration of every streamer.
//!
//! One `tick` runs, in order: road window slide, railing posts, traffic,
//! terrain refresh, tree refresh, rock refresh. Terrain and scatter
//! refreshes are throttled by their own cadences; the first tick refreshes
//! everything.
use crate::config::WorldConfig;
use crate::procgen::corridor::RoadCorridor;
use crate::procgen::heightfield::TerrainSampler;
use crate::procgen::noise::{NoiseField, SharedNoise};
use crate::procgen::path::{PathGenerator, PathProfile};
use crate::streaming::{
    RailingStreamer, RefreshReport, RoadStreamer, ScatterStats, ScatterStreamer, TerrainStreamer,
    TrafficReport, TrafficStreamer,
};
use crate::timing::Cadence;
use glam::Vec3;
use serde::Serialize;
use tracing::{debug, info};

/// Where the camera is and how far along the road it has travelled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observer {
    pub position: Vec3,
    pub distance_along_path: f32,
}

impl Observer {
    pub fn new(position: Vec3, distance_along_path: f32) -> Self {
        Self {
            position,
            distance_along_path,
        }
    }
}

/// What one tick changed
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub road_slid: bool,
    pub railings_rebuilt: bool,
    pub traffic: TrafficReport,
    pub terrain: Option<RefreshReport>,
    pub trees: Option<ScatterStats>,
    pub rocks: Option<ScatterStats>,
}

/// Serializable snapshot of the world's resident state
#[derive(Debug, Clone, Serialize)]
pub struct WorldStats {
    pub seed: u32,
    pub ticks: u64,
    pub road_segments: usize,
    pub road_revision: u64,
    pub road_front: f32,
    pub road_back: f32,
    pub path_resident_points: usize,
    pub terrain_chunks: usize,
    pub terrain_vertices: usize,
    pub trees_visible: usize,
    pub rocks_visible: usize,
    pub railings_visible: usize,
    pub traffic_visible: usize,
    pub instance_overflow: u64,
    pub trees: ScatterStats,
    pub rocks: ScatterStats,
}

pub struct World {
    seed: u32,
    road: RoadStreamer,
    railings: RailingStreamer,
    traffic: TrafficStreamer,
    terrain: TerrainStreamer,
    trees: ScatterStreamer,
    rocks: ScatterStreamer,
    terrain_cadence: Cadence,
    trees_cadence: Cadence,
    rocks_cadence: Cadence,
    ticks: u64,
}

impl World {
    /// Build every streamer from one seed so they agree on noise and road
    /// exclusion.
    pub fn new(config: &WorldConfig) -> Self {
        let seed = config.resolve_seed();
        Self::with_noise(config, seed, NoiseField::shared(seed))
    }

    /// Same as `new` with an explicit noise source.
    pub fn with_noise(config: &WorldConfig, seed: u32, noise: SharedNoise) -> Self {
        let profile = PathProfile::new(noise.clone(), config.path.clone());
        let corridor = RoadCorridor::new(config.road.corridor, profile.clone());
        let sampler = TerrainSampler::new(noise, config.terrain.clone(), corridor);

        let road = RoadStreamer::new(config.road.clone(), PathGenerator::new(profile));
        let railings = RailingStreamer::new(config.railings.clone());
        let traffic = TrafficStreamer::new(config.traffic.clone(), seed);
        let terrain = TerrainStreamer::new(sampler.clone());
        let trees = ScatterStreamer::new(config.trees.clone(), sampler.clone(), seed);
        info!(
            "World created with seed {} ({} road segments, {:?} corridor)",
            seed,
            road.len(),
            sampler.corridor().mode()
        );
        let rocks = ScatterStreamer::new(config.rocks.clone(), sampler, seed);

        Self {
            seed,
            road,
            railings,
            traffic,
            terrain,
            trees,
            rocks,
            terrain_cadence: Cadence::from_millis(config.terrain.refresh_interval_ms),
            trees_cadence: Cadence::from_millis(config.trees.refresh_interval_ms),
            rocks_cadence: Cadence::from_millis(config.rocks.refresh_interval_ms),
            ticks: 0,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn road(&self) -> &RoadStreamer {
        &self.road
    }

    pub fn railings(&self) -> &RailingStreamer {
        &self.railings
    }

    pub fn traffic(&self) -> &TrafficStreamer {
        &self.traffic
    }

    pub fn terrain(&self) -> &TerrainStreamer {
        &self.terrain
    }

    pub fn trees(&self) -> &ScatterStreamer {
        &self.trees
    }

    pub fn rocks(&self) -> &ScatterStreamer {
        &self.rocks
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance every streamer by one fixed step of `dt` seconds.
    pub fn tick(&mut self, dt: f32, observer: &Observer) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            road_slid: self.road.extend(observer.distance_along_path),
            ..TickReport::default()
        };
        report.railings_rebuilt = self.railings.refresh(&self.road, observer.distance_along_path);
        report.traffic = self.traffic.update(dt, &self.road, observer.distance_along_path);

        let (x, z) = (observer.position.x, observer.position.z);
        if self.terrain_cadence.advance(dt) {
            report.terrain = Some(self.terrain.refresh(x, z));
        }
        if self.trees_cadence.advance(dt) {
            report.trees = Some(self.trees.refresh(x, z));
        }
        if self.rocks_cadence.advance(dt) {
            report.rocks = Some(self.rocks.refresh(x, z));
        }

        report
    }

    /// Observer standing on the road centre at `distance`, if it is inside
    /// the road window.
    pub fn observer_at(&self, distance: f32) -> Option<Observer> {
        let frame = self.road.frame_at_distance(distance)?;
        Some(Observer::new(frame.position, distance))
    }

    /// Surface height anywhere, loaded or not
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.terrain.height_at(x, z)
    }

    pub fn stats(&self) -> WorldStats {
        let front = self.road.segments().next().map(|s| s.distance_along_path);
        let back = self.road.segments().last().map(|s| s.distance_along_path);
        let pools = [
            self.trees.pool(),
            self.rocks.pool(),
            self.railings.pool(),
            self.traffic.pool(),
        ];

        WorldStats {
            seed: self.seed,
            ticks: self.ticks,
            road_segments: self.road.len(),
            road_revision: self.road.revision(),
            road_front: front.unwrap_or(0.0),
            road_back: back.unwrap_or(0.0),
            path_resident_points: self.road.path().resident_points().count(),
            terrain_chunks: self.terrain.len(),
            terrain_vertices: self.terrain.chunks().map(|c| c.mesh.vertex_count()).sum(),
            trees_visible: self.trees.pool().visible_count(),
            rocks_visible: self.rocks.pool().visible_count(),
            railings_visible: self.railings.pool().visible_count(),
            traffic_visible: self.traffic.pool().visible_count(),
            instance_overflow: pools.iter().map(|p| p.overflow_count()).sum(),
            trees: self.trees.stats(),
            rocks: self.rocks.stats(),
        }
    }

    /// Release everything the streamers hold. Cadences are primed so a
    /// later tick repopulates immediately; the road refills around the
    /// observer's distance on that tick.
    pub fn dispose(&mut self) {
        self.road.dispose();
        self.railings.dispose();
        self.traffic.dispose();
        self.terrain.dispose();
        self.trees.dispose();
        self.rocks.dispose();
        self.terrain_cadence.prime();
        self.trees_cadence.prime();
        self.rocks_cadence.prime();
        debug!("World disposed after {} ticks", self.ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorridorMode;
    use crate::timing::FixedTimestep;

    fn small_config(seed: u32) -> WorldConfig {
        let mut config = WorldConfig {
            seed: Some(seed),
            ..WorldConfig::default()
        };
        config.road.max_segments = 40;
        config.terrain.view_distance = 100.0;
        config.terrain.chunk_segments = 8;
        config.terrain.lod_segments = 4;
        config
    }

    #[test]
    fn test_first_tick_refreshes_everything() {
        let mut world = World::new(&small_config(1));
        let observer = world.observer_at(0.0).unwrap();
        let report = world.tick(FixedTimestep::DEFAULT_STEP, &observer);

        assert!(report.railings_rebuilt);
        assert_eq!(report.terrain.unwrap().created.len(), 25);
        assert!(report.trees.is_some());
        assert!(report.rocks.is_some());
    }

    #[test]
    fn test_refreshes_are_throttled() {
        let mut world = World::new(&small_config(1));
        let observer = world.observer_at(0.0).unwrap();
        world.tick(FixedTimestep::DEFAULT_STEP, &observer);

        let report = world.tick(FixedTimestep::DEFAULT_STEP, &observer);
        assert!(report.terrain.is_none());
        assert!(report.trees.is_none());
        assert!(report.rocks.is_none());
        assert!(!report.railings_rebuilt);

        // 0.3s later scatter fires, terrain (0.5s) does not
        let report = world.tick(0.3, &observer);
        assert!(report.trees.is_some());
        assert!(report.terrain.is_none());
    }

    #[test]
    fn test_same_seed_same_world() {
        let mut a = World::new(&small_config(77));
        let mut b = World::new(&small_config(77));
        let observer = Observer::new(Vec3::new(0.0, 0.0, 40.0), 40.0);
        a.tick(0.1, &observer);
        b.tick(0.1, &observer);

        assert_eq!(a.trees().pool().visible(), b.trees().pool().visible());
        assert_eq!(a.height_at(13.0, 71.0).to_bits(), b.height_at(13.0, 71.0).to_bits());
    }

    #[test]
    fn test_dispose_then_tick_repopulates_everything() {
        let mut world = World::new(&small_config(3));
        let observer = world.observer_at(0.0).unwrap();
        world.tick(0.1, &observer);
        world.dispose();

        let stats = world.stats();
        assert_eq!(stats.road_segments, 0);
        assert_eq!(stats.terrain_chunks, 0);
        assert_eq!(stats.trees_visible, 0);
        assert!(world.observer_at(0.0).is_none());

        let report = world.tick(0.1, &observer);
        assert!(report.road_slid);
        assert!(report.railings_rebuilt);
        assert!(report.terrain.is_some());
        let stats = world.stats();
        assert_eq!(stats.road_segments, 40);
        assert!(stats.terrain_chunks > 0);
        assert!(stats.railings_visible > 0);
        assert!(stats.traffic_visible > 0);
        assert!(world.observer_at(0.0).is_some());
    }

    #[test]
    fn test_dispose_far_along_refills_road_around_observer() {
        let mut world = World::new(&small_config(8));
        let observer = world.observer_at(50.0).unwrap();
        world.tick(0.1, &observer);
        world.dispose();

        let far = Observer::new(observer.position, 900.0);
        world.tick(0.1, &far);
        let stats = world.stats();
        assert_eq!(stats.road_segments, 40);
        assert!(stats.road_front <= 900.0 && 900.0 <= stats.road_back);
        assert!(world.observer_at(900.0).is_some());
    }

    #[test]
    fn test_corridor_mode_reaches_terrain() {
        let mut config = small_config(4);
        config.road.corridor = CorridorMode::Centerline;
        let world = World::new(&config);
        assert_eq!(world.terrain().sampler().corridor().mode(), CorridorMode::Centerline);
    }

    #[test]
    fn test_traffic_runs_each_tick() {
        let mut world = World::new(&small_config(2));
        let observer = world.observer_at(0.0).unwrap();
        let report = world.tick(0.1, &observer);

        let traffic = world.traffic();
        assert_eq!(report.traffic.placed, traffic.pool().visible_count());
        assert!(traffic.cars().len() <= traffic.settings().max_cars);
        assert_eq!(world.stats().traffic_visible, report.traffic.placed);
    }

    #[test]
    fn test_stats_serialize() {
        let mut world = World::new(&small_config(5));
        let observer = world.observer_at(0.0).unwrap();
        world.tick(0.1, &observer);

        let json = serde_json::to_value(world.stats()).unwrap();
        assert_eq!(json["seed"], 5);
        assert_eq!(json["road_segments"], 40);
        assert_eq!(json["terrain_chunks"], 25);
    }
}
