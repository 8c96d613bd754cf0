use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed; drawn at random when absent
    pub seed: Option<u32>,
    pub path: PathSettings,
    pub road: RoadSettings,
    pub terrain: TerrainSettings,
    #[serde(deserialize_with = "trees_section")]
    pub trees: ScatterSettings,
    #[serde(deserialize_with = "rocks_section")]
    pub rocks: ScatterSettings,
    pub railings: RailingSettings,
    pub traffic: TrafficSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Forward distance between control points (meters)
    pub control_spacing: f32,
    /// Leading control points laid straight along +Z
    pub initial_straight: usize,
    /// Control points over which curvature eases in after the straight
    pub ramp_points: usize,
    /// Maximum sideways step between consecutive control points (meters)
    pub curvature_scale: f32,
    /// Noise frequency per meter of travel
    pub curvature_frequency: f32,
    /// Half-width of the arc-length window used to estimate curvature
    pub bank_window: f32,
    /// Bank radians per unit curvature (1/m)
    pub bank_gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorridorMode {
    /// Corridor centred on world X = 0
    Fixed,
    /// Corridor follows the path's lateral offset at each Z
    Centerline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadSettings {
    pub segment_length: f32,
    pub width: f32,
    pub max_segments: usize,
    /// Bank angle limit in radians
    pub max_bank: f32,
    pub corridor: CorridorMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub chunk_size: f32,
    /// Quads per chunk edge for near chunks
    pub chunk_segments: u32,
    /// Quads per chunk edge for far chunks
    pub lod_segments: u32,
    pub view_distance: f32,
    /// Fraction of view distance past which chunks use the far tier
    pub lod_threshold: f32,
    pub height_scale: f32,
    pub low_freq_scale: f32,
    pub detail_weight: f32,
    pub detail_frequency: f32,
    pub detail_octaves: u32,
    pub detail_persistence: f32,
    pub detail_lacunarity: f32,
    pub road_clearance: f32,
    pub trench_height: f32,
    /// Exponent of the carve falloff
    pub carve_falloff: f32,
    pub water_level: f32,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterSettings {
    pub name: String,
    pub capacity: usize,
    pub cell_size: f32,
    pub window_radius: f32,
    pub road_clearance: f32,
    /// Probability a candidate cell receives an instance
    pub accept_probability: f32,
    /// Jitter as a fraction of the cell size
    pub jitter: f32,
    /// Rotate about Y only; otherwise all three axes
    pub yaw_only: bool,
    /// Uniform base scale range
    pub scale_range: [f32; 2],
    /// Per-axis +/- fraction applied on top of the base scale
    pub axis_variation: [f32; 3],
    pub ground_offset: f32,
    pub color_variants: u8,
    /// Mixed into the per-cell RNG seed so categories don't align
    pub salt: u64,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RailingSettings {
    pub enabled: bool,
    pub spacing: f32,
    /// Distance beyond the road edge
    pub edge_margin: f32,
    pub behind: f32,
    pub ahead: f32,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSettings {
    pub enabled: bool,
    /// Cars on the road at once, split evenly between directions
    pub max_cars: usize,
    /// Lateral distance between lane centres (meters)
    pub lane_width: f32,
    /// Spawn window ahead of the observer for cars travelling with it
    pub forward_spawn: [f32; 2],
    /// Spawn window ahead of the observer for oncoming cars
    pub oncoming_spawn: [f32; 2],
    /// Cars further than this from the observer are removed
    pub despawn_distance: f32,
    /// Speed range in meters per second
    pub speed_range: [f32; 2],
    /// Height of the car origin above the road surface
    pub ride_height: f32,
    pub color_variants: u8,
    pub salt: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            path: PathSettings::default(),
            road: RoadSettings::default(),
            terrain: TerrainSettings::default(),
            trees: ScatterSettings::trees(),
            rocks: ScatterSettings::rocks(),
            railings: RailingSettings::default(),
            traffic: TrafficSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            control_spacing: 10.0,
            initial_straight: 10,
            ramp_points: 6,
            curvature_scale: 15.0,
            curvature_frequency: 0.01,
            bank_window: 2.0,
            bank_gain: 5.0,
        }
    }
}

impl Default for RoadSettings {
    fn default() -> Self {
        Self {
            segment_length: 5.0,
            width: 8.0,
            max_segments: 256,
            max_bank: std::f32::consts::FRAC_PI_6,
            corridor: CorridorMode::Fixed,
        }
    }
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            chunk_size: 50.0,
            chunk_segments: 32,
            lod_segments: 16,
            view_distance: 200.0,
            lod_threshold: 0.6,
            height_scale: 15.0,
            low_freq_scale: 0.03,
            detail_weight: 2.0,
            detail_frequency: 0.1,
            detail_octaves: 2,
            detail_persistence: 0.4,
            detail_lacunarity: 2.5,
            road_clearance: 12.0,
            trench_height: -0.5,
            carve_falloff: 2.0,
            water_level: 0.0,
            refresh_interval_ms: 500,
        }
    }
}

impl Default for ScatterSettings {
    fn default() -> Self {
        Self::trees()
    }
}

impl ScatterSettings {
    /// Sparse, tall, kept well clear of the road
    pub fn trees() -> Self {
        Self {
            name: "trees".to_string(),
            capacity: 200,
            cell_size: 15.0,
            window_radius: 150.0,
            road_clearance: 50.0,
            accept_probability: 0.15,
            jitter: 0.5,
            yaw_only: true,
            scale_range: [1.0, 1.0],
            axis_variation: [0.2, 0.2, 0.2],
            ground_offset: 0.0,
            color_variants: 4,
            salt: 0x7265_6573,
            refresh_interval_ms: 300,
        }
    }

    /// Denser boulders that may sit closer to the shoulder
    pub fn rocks() -> Self {
        Self {
            name: "rocks".to_string(),
            capacity: 150,
            cell_size: 20.0,
            window_radius: 160.0,
            road_clearance: 15.0,
            accept_probability: 0.3,
            jitter: 0.7,
            yaw_only: false,
            scale_range: [0.5, 2.0],
            axis_variation: [0.0, 0.2, 0.0],
            ground_offset: 0.5,
            color_variants: 1,
            salt: 0x726f_636b,
            refresh_interval_ms: 300,
        }
    }
}

impl Default for RailingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            spacing: 5.0,
            edge_margin: 0.6,
            behind: 50.0,
            ahead: 100.0,
            capacity: 96,
        }
    }
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cars: 8,
            lane_width: 2.5,
            forward_spawn: [50.0, 100.0],
            oncoming_spawn: [80.0, 140.0],
            despawn_distance: 100.0,
            speed_range: [20.0, 30.0],
            ride_height: 0.55,
            color_variants: 5,
            salt: 0x6361_7273,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl WorldConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}, using defaults", e);
            Self::default()
        })
    }

    /// Seed from config, or a fresh random one.
    pub fn resolve_seed(&self) -> u32 {
        self.seed.unwrap_or_else(rand::random)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.path;
        positive("path.control_spacing", p.control_spacing)?;
        non_negative("path.curvature_scale", p.curvature_scale)?;
        positive("path.bank_window", p.bank_window)?;

        let r = &self.road;
        positive("road.segment_length", r.segment_length)?;
        positive("road.width", r.width)?;
        non_negative("road.max_bank", r.max_bank)?;
        if r.max_segments < 2 {
            return Err(ConfigError::Invalid(format!(
                "road.max_segments must be at least 2, got {}",
                r.max_segments
            )));
        }

        let t = &self.terrain;
        positive("terrain.chunk_size", t.chunk_size)?;
        positive("terrain.view_distance", t.view_distance)?;
        positive("terrain.carve_falloff", t.carve_falloff)?;
        non_negative("terrain.road_clearance", t.road_clearance)?;
        if t.chunk_segments == 0 || t.lod_segments == 0 {
            return Err(ConfigError::Invalid(
                "terrain chunk segments must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&t.lod_threshold) {
            return Err(ConfigError::Invalid(format!(
                "terrain.lod_threshold must be in [0, 1], got {}",
                t.lod_threshold
            )));
        }
        if t.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "terrain.refresh_interval_ms must be non-zero".to_string(),
            ));
        }

        self.trees.validate("trees")?;
        self.rocks.validate("rocks")?;

        let rail = &self.railings;
        if rail.enabled {
            positive("railings.spacing", rail.spacing)?;
            non_negative("railings.behind", rail.behind)?;
            non_negative("railings.ahead", rail.ahead)?;
            if rail.capacity == 0 {
                return Err(ConfigError::Invalid(
                    "railings.capacity must be non-zero".to_string(),
                ));
            }
        }

        let traffic = &self.traffic;
        if traffic.enabled {
            positive("traffic.lane_width", traffic.lane_width)?;
            positive("traffic.despawn_distance", traffic.despawn_distance)?;
            non_negative("traffic.ride_height", traffic.ride_height)?;
            if traffic.max_cars < 2 {
                return Err(ConfigError::Invalid(format!(
                    "traffic.max_cars must be at least 2, got {}",
                    traffic.max_cars
                )));
            }
            for (field, range) in [
                ("traffic.forward_spawn", traffic.forward_spawn),
                ("traffic.oncoming_spawn", traffic.oncoming_spawn),
            ] {
                if range[0] < 0.0 || range[0] >= range[1] || range[1] > traffic.despawn_distance {
                    return Err(ConfigError::Invalid(format!(
                        "{field} must be ordered and inside despawn_distance, got {range:?}"
                    )));
                }
            }
            if traffic.speed_range[0] < 0.0 || traffic.speed_range[0] >= traffic.speed_range[1] {
                return Err(ConfigError::Invalid(format!(
                    "traffic.speed_range must be non-negative and ordered, got {:?}",
                    traffic.speed_range
                )));
            }
        }

        Ok(())
    }
}

impl ScatterSettings {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        positive(&format!("{section}.cell_size"), self.cell_size)?;
        non_negative(&format!("{section}.window_radius"), self.window_radius)?;
        non_negative(&format!("{section}.road_clearance"), self.road_clearance)?;
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(format!("{section}.capacity must be non-zero")));
        }
        if !(0.0..=1.0).contains(&self.accept_probability) {
            return Err(ConfigError::Invalid(format!(
                "{section}.accept_probability must be in [0, 1], got {}",
                self.accept_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "{section}.jitter must be in [0, 1], got {}",
                self.jitter
            )));
        }
        if self.scale_range[0] <= 0.0 || self.scale_range[0] > self.scale_range[1] {
            return Err(ConfigError::Invalid(format!(
                "{section}.scale_range must be positive and ordered, got {:?}",
                self.scale_range
            )));
        }
        if self.axis_variation.iter().any(|v| !(0.0..1.0).contains(v)) {
            return Err(ConfigError::Invalid(format!(
                "{section}.axis_variation entries must be in [0, 1)"
            )));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(format!(
                "{section}.refresh_interval_ms must be non-zero"
            )));
        }
        Ok(())
    }
}

fn trees_section<'de, D: Deserializer<'de>>(d: D) -> Result<ScatterSettings, D::Error> {
    overlay_section(ScatterSettings::trees(), d)
}

fn rocks_section<'de, D: Deserializer<'de>>(d: D) -> Result<ScatterSettings, D::Error> {
    overlay_section(ScatterSettings::rocks(), d)
}

/// Partial scatter sections fill in from their own category, not from
/// `ScatterSettings::default()`.
fn overlay_section<'de, D: Deserializer<'de>>(
    base: ScatterSettings,
    d: D,
) -> Result<ScatterSettings, D::Error> {
    let overrides = toml::Value::deserialize(d)?;
    let mut merged = toml::Value::try_from(base).map_err(D::Error::custom)?;

    match (&mut merged, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }
        (_, other) => {
            return Err(D::Error::custom(format!(
                "scatter section must be a table, got {}",
                other.type_str()
            )))
        }
    }

    merged.try_into().map_err(D::Error::custom)
}

fn positive(field: &str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be non-negative, got {value}")))
    }
}
