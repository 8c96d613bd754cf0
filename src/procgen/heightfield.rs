//! Terrain height synthesis and road carving.
use super::corridor::RoadCorridor;
use super::noise::SharedNoise;
use crate::config::TerrainSettings;

/// Pure height function over world coordinates.
///
/// Everything a chunk bakes and everything `height_at` answers comes from
/// here, so loaded and unloaded terrain agree bit for bit.
#[derive(Clone)]
pub struct TerrainSampler {
    noise: SharedNoise,
    settings: TerrainSettings,
    corridor: RoadCorridor,
}

impl TerrainSampler {
    pub fn new(noise: SharedNoise, settings: TerrainSettings, corridor: RoadCorridor) -> Self {
        Self {
            noise,
            settings,
            corridor,
        }
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn corridor(&self) -> &RoadCorridor {
        &self.corridor
    }

    /// Noise height before carving and the water floor
    pub fn raw_height(&self, x: f32, z: f32) -> f32 {
        let s = &self.settings;
        let base = s.height_scale * self.noise.height_at(x, z, s.low_freq_scale);
        let detail = s.detail_weight
            * self.noise.fractal(
                x * s.detail_frequency,
                z * s.detail_frequency,
                s.detail_octaves,
                s.detail_persistence,
                s.detail_lacunarity,
            );
        base + detail
    }

    /// Final surface height at `(x, z)`
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let raw = self.raw_height(x, z);
        let distance = self.corridor.lateral_distance(x, z);
        let carved = carve(raw, distance, &self.settings);
        carved.max(self.settings.water_level)
    }

    /// Surface normal by central differences over `step`.
    ///
    /// Sampled from the height function rather than the chunk grid so
    /// neighbouring chunks agree along shared edges.
    pub fn normal_at(&self, x: f32, z: f32, step: f32) -> [f32; 3] {
        let dx = self.height_at(x - step, z) - self.height_at(x + step, z);
        let dz = self.height_at(x, z - step) - self.height_at(x, z + step);
        let n = glam::Vec3::new(dx, 2.0 * step, dz)
            .try_normalize()
            .unwrap_or(glam::Vec3::Y);
        n.to_array()
    }
}

/// Blend `raw` toward the trench height inside the road clearance.
///
/// 0 at the centre line, 1 at the clearance edge, shaped by a power curve
/// and smoothstep so the bank meets untouched terrain without a crease.
pub fn carve(raw: f32, distance_from_road: f32, settings: &TerrainSettings) -> f32 {
    if settings.road_clearance <= 0.0 || distance_from_road >= settings.road_clearance {
        return raw;
    }

    let blend = (distance_from_road / settings.road_clearance).clamp(0.0, 1.0);
    let shaped = blend.powf(settings.carve_falloff);
    let blend_smooth = shaped * shaped * (3.0 - 2.0 * shaped);

    let target = settings.trench_height.min(raw);
    target * (1.0 - blend_smooth) + raw * blend_smooth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorridorMode, PathSettings};
    use crate::procgen::noise::NoiseField;
    use crate::procgen::path::PathProfile;

    fn sampler(seed: u32) -> TerrainSampler {
        let noise = NoiseField::shared(seed);
        let profile = PathProfile::new(noise.clone(), PathSettings::default());
        let corridor = RoadCorridor::new(CorridorMode::Fixed, profile);
        TerrainSampler::new(noise, TerrainSettings::default(), corridor)
    }

    #[test]
    fn test_height_deterministic() {
        let a = sampler(12345);
        let b = sampler(12345);
        for i in 0..100 {
            let x = i as f32 * 13.7 - 400.0;
            let z = i as f32 * 7.1;
            assert_eq!(a.height_at(x, z).to_bits(), b.height_at(x, z).to_bits());
        }
    }

    #[test]
    fn test_height_floored_at_water() {
        let s = sampler(3);
        let water = s.settings().water_level;
        for i in 0..200 {
            let h = s.height_at(i as f32 * 9.0 - 900.0, i as f32 * 4.0);
            assert!(h >= water);
        }
    }

    #[test]
    fn test_road_corridor_carved() {
        let s = sampler(77);
        let settings = s.settings().clone();
        for i in 0..100 {
            let z = i as f32 * 25.0;
            let h = s.height_at(0.0, z);
            assert!(
                h <= settings.water_level.max(settings.trench_height) + 1e-5,
                "centre line not carved: {} at z {}",
                h,
                z
            );
        }
    }

    #[test]
    fn test_carve_blend_profile() {
        let settings = TerrainSettings::default();
        let raw = 10.0;

        assert_eq!(carve(raw, 0.0, &settings), settings.trench_height);
        assert_eq!(carve(raw, settings.road_clearance, &settings), raw);
        assert_eq!(carve(raw, settings.road_clearance * 3.0, &settings), raw);

        let near = carve(raw, settings.road_clearance * 0.25, &settings);
        let far = carve(raw, settings.road_clearance * 0.75, &settings);
        assert!(near < far);
        assert!(far < raw);
    }

    #[test]
    fn test_carve_never_raises_low_ground() {
        let settings = TerrainSettings::default();
        let raw = settings.trench_height - 3.0;
        assert!((carve(raw, 1.0, &settings) - raw).abs() < 1e-5);
    }

    #[test]
    fn test_normals_point_up() {
        let s = sampler(9);
        for i in 0..50 {
            let n = s.normal_at(i as f32 * 17.0 + 60.0, i as f32 * 11.0, 1.0);
            assert!(n[1] > 0.0);
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }
}
