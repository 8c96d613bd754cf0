pub mod railings;
pub mod road;
pub mod scatter;
pub mod terrain;
pub mod traffic;

pub use railings::RailingStreamer;
pub use road::{RoadSegment, RoadStreamer};
pub use scatter::{ScatterStats, ScatterStreamer};
pub use terrain::{ChunkKey, RefreshReport, TerrainChunk, TerrainStreamer};
pub use traffic::{Direction, TrafficCar, TrafficReport, TrafficStreamer};
