use drivestream::config::{
    CorridorMode, PathSettings, RoadSettings, ScatterSettings, TerrainSettings,
};
use drivestream::procgen::{NoiseField, PathGenerator, PathProfile, RoadCorridor, TerrainSampler};
use drivestream::streaming::{ChunkKey, RoadStreamer, ScatterStreamer, TerrainStreamer};
use proptest::prelude::*;
use std::collections::HashSet;

fn sampler(seed: u32, mode: CorridorMode, settings: TerrainSettings) -> TerrainSampler {
    let noise = NoiseField::shared(seed);
    let profile = PathProfile::new(noise.clone(), PathSettings::default());
    TerrainSampler::new(noise, settings, RoadCorridor::new(mode, profile))
}

fn small_terrain() -> TerrainSettings {
    TerrainSettings {
        view_distance: 100.0,
        chunk_segments: 2,
        lod_segments: 1,
        ..TerrainSettings::default()
    }
}

fn corridor_mode() -> impl Strategy<Value = CorridorMode> {
    prop_oneof![Just(CorridorMode::Fixed), Just(CorridorMode::Centerline)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_height_is_deterministic(
        seed in any::<u32>(),
        mode in corridor_mode(),
        x in -5000.0f32..5000.0,
        z in -5000.0f32..5000.0,
    ) {
        let a = sampler(seed, mode, TerrainSettings::default());
        let b = sampler(seed, mode, TerrainSettings::default());
        prop_assert_eq!(a.height_at(x, z).to_bits(), b.height_at(x, z).to_bits());
        prop_assert!(a.height_at(x, z) >= a.settings().water_level);
    }

    #[test]
    fn test_road_window_bounded_and_ordered(
        seed in 0u32..1000,
        max_segments in 2usize..24,
        steps in proptest::collection::vec(0.0f32..40.0, 1..30),
    ) {
        let settings = RoadSettings {
            max_segments,
            ..RoadSettings::default()
        };
        let profile = PathProfile::new(NoiseField::shared(seed), PathSettings::default());
        let mut road = RoadStreamer::new(settings, PathGenerator::new(profile));

        let mut observer = 0.0;
        for step in steps {
            observer += step;
            road.extend(observer);

            prop_assert!(road.len() <= max_segments);
            let distances: Vec<f32> = road.segments().map(|s| s.distance_along_path).collect();
            for pair in distances.windows(2) {
                prop_assert!(pair[0] < pair[1]);
                prop_assert!(pair[1] - pair[0] <= road.settings().segment_length + 1e-3);
            }
        }
    }

    #[test]
    fn test_chunk_set_is_exact_square(
        x in -2000.0f32..2000.0,
        z in -2000.0f32..2000.0,
        moves in proptest::collection::vec((-120.0f32..120.0, -120.0f32..120.0), 0..4),
    ) {
        let mut terrain = TerrainStreamer::new(sampler(7, CorridorMode::Fixed, small_terrain()));
        let (mut ox, mut oz) = (x, z);
        terrain.refresh(ox, oz);
        for (dx, dz) in moves {
            ox += dx;
            oz += dz;
            terrain.refresh(ox, oz);
        }

        let size = terrain.settings().chunk_size;
        let center = ChunkKey::containing(ox, oz, size);
        let radius = terrain.radius();
        let loaded: HashSet<ChunkKey> = terrain.keys().into_iter().collect();
        let expected: HashSet<ChunkKey> = terrain.required_keys(ox, oz).into_iter().collect();

        prop_assert_eq!(&loaded, &expected);
        prop_assert_eq!(loaded.len(), ((2 * radius + 1) * (2 * radius + 1)) as usize);
        prop_assert!(loaded.iter().all(|k| k.chebyshev(&center) <= radius));
    }

    #[test]
    fn test_scatter_respects_road_and_capacity(
        seed in any::<u32>(),
        mode in corridor_mode(),
        x in -300.0f32..300.0,
        z in 0.0f32..3000.0,
        capacity in 1usize..80,
    ) {
        let settings = ScatterSettings {
            capacity,
            ..ScatterSettings::rocks()
        };
        let sampler = sampler(seed, mode, TerrainSettings::default());
        let corridor = sampler.corridor().clone();
        let clearance = settings.road_clearance;
        let mut rocks = ScatterStreamer::new(settings, sampler, seed);

        let stats = rocks.refresh(x, z);

        prop_assert_eq!(stats.committed, stats.accepted.min(capacity));
        prop_assert_eq!(rocks.pool().visible_count(), stats.committed);
        for instance in rocks.pool().visible() {
            let p = instance.position;
            prop_assert!(corridor.lateral_distance(p.x, p.z) >= clearance);
        }
    }
}
