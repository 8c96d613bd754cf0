//! Procedural synthesis: noise, centre-line, corridor and height field.
//!
//! Everything here is a pure function of the seed and configuration; the
//! streamers in `crate::streaming` decide what is resident.

pub mod corridor;
pub mod heightfield;
pub mod noise;
pub mod path;

pub use corridor::RoadCorridor;
pub use heightfield::TerrainSampler;
pub use noise::{NoiseField, NoiseSource, SharedNoise};
pub use path::{PathFrame, PathGenerator, PathProfile};
