//! Endless driving-world streaming.
//!
//! A seeded noise field drives an unbounded road centre-line. Streamers keep
//! a bounded window of road geometry, terrain chunks and scattered props
//! around a moving observer, all reproducible from the seed.

pub mod config;
pub mod mesh;
pub mod pool;
pub mod procgen;
pub mod streaming;
pub mod timing;
pub mod world;

pub use config::{ConfigError, WorldConfig};
pub use mesh::MeshBuffers;
pub use pool::{InstancePool, InstanceTransform};
pub use world::{Observer, TickReport, World, WorldStats};
