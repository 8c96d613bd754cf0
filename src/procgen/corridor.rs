//! Road-exclusion geometry shared by terrain carving and scatter placement.
use super::path::PathProfile;
use crate::config::CorridorMode;

#[derive(Clone)]
pub struct RoadCorridor {
    mode: CorridorMode,
    profile: PathProfile,
}

impl RoadCorridor {
    pub fn new(mode: CorridorMode, profile: PathProfile) -> Self {
        Self { mode, profile }
    }

    pub fn mode(&self) -> CorridorMode {
        self.mode
    }

    /// Horizontal distance from `(x, z)` to the road centre.
    pub fn lateral_distance(&self, x: f32, z: f32) -> f32 {
        match self.mode {
            CorridorMode::Fixed => x.abs(),
            CorridorMode::Centerline => (x - self.profile.lateral_offset_at(z)).abs(),
        }
    }

    /// True when `(x, z)` lies inside a corridor of half-width `clearance`.
    pub fn excludes(&self, x: f32, z: f32, clearance: f32) -> bool {
        self.lateral_distance(x, z) < clearance
    }
}
