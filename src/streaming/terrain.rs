//! Chunked terrain around the observer.
//!
//! Chunks live on a square grid of `chunk_size` metres, keyed by integer
//! coordinates. Each refresh loads every key within the Chebyshev radius
//! `ceil(view_distance / chunk_size)` of the observer's chunk and evicts the
//! rest. Vertex density is chosen once, when a chunk is created.
use crate::config::TerrainSettings;
use crate::mesh::MeshBuffers;
use crate::procgen::heightfield::TerrainSampler;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// Key of the chunk containing world `(x, z)`
    pub fn containing(x: f32, z: f32, chunk_size: f32) -> Self {
        Self {
            cx: (x / chunk_size).floor() as i32,
            cz: (z / chunk_size).floor() as i32,
        }
    }

    /// World-space corner with the smallest coordinates
    pub fn origin(&self, chunk_size: f32) -> (f32, f32) {
        (self.cx as f32 * chunk_size, self.cz as f32 * chunk_size)
    }

    pub fn center(&self, chunk_size: f32) -> (f32, f32) {
        let (x, z) = self.origin(chunk_size);
        (x + chunk_size * 0.5, z + chunk_size * 0.5)
    }

    /// Grid distance in chunks
    pub fn chebyshev(&self, other: &ChunkKey) -> i32 {
        (self.cx - other.cx).abs().max((self.cz - other.cz).abs())
    }
}

/// One loaded tile of terrain.
#[derive(Debug, Clone)]
pub struct TerrainChunk {
    pub key: ChunkKey,
    /// Quads per edge; the grid holds `(segments + 1)^2` heights
    pub segments: u32,
    /// Row-major heights, `z` rows of `x` samples
    pub heights: Vec<f32>,
    pub mesh: MeshBuffers,
    /// Distance from the observer to the chunk centre at the last refresh
    pub distance: f32,
}

impl TerrainChunk {
    /// Sample the grid for `key` at `segments` quads per edge.
    pub fn build(key: ChunkKey, segments: u32, sampler: &TerrainSampler) -> Self {
        let size = sampler.settings().chunk_size;
        let n = segments.max(1);
        let row = (n + 1) as usize;
        let cell = size / n as f32;
        let (x0, z0) = key.origin(size);

        let mut heights = Vec::with_capacity(row * row);
        let mut mesh = MeshBuffers::with_capacity(row * row, (n * n * 6) as usize);

        for j in 0..=n {
            let z = z0 + j as f32 * cell;
            for i in 0..=n {
                let x = x0 + i as f32 * cell;
                let y = sampler.height_at(x, z);
                heights.push(y);
                mesh.push_vertex(
                    [x, y, z],
                    sampler.normal_at(x, z, cell),
                    [i as f32 / n as f32, j as f32 / n as f32],
                );
            }
        }

        let stride = n + 1;
        for j in 0..n {
            for i in 0..n {
                let a = j * stride + i;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                mesh.push_triangle(a, c, b);
                mesh.push_triangle(b, c, d);
            }
        }

        Self {
            key,
            segments: n,
            heights,
            mesh,
            distance: 0.0,
        }
    }

    /// Baked height at grid vertex `(i, j)`
    pub fn height(&self, i: u32, j: u32) -> Option<f32> {
        if i > self.segments || j > self.segments {
            return None;
        }
        let row = (self.segments + 1) as usize;
        self.heights.get(j as usize * row + i as usize).copied()
    }
}

/// Keys that appeared and disappeared in one refresh, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub created: Vec<ChunkKey>,
    pub evicted: Vec<ChunkKey>,
}

impl RefreshReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.evicted.is_empty()
    }
}

pub struct TerrainStreamer {
    sampler: TerrainSampler,
    chunks: HashMap<ChunkKey, TerrainChunk>,
}

impl TerrainStreamer {
    pub fn new(sampler: TerrainSampler) -> Self {
        Self {
            sampler,
            chunks: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &TerrainSettings {
        self.sampler.settings()
    }

    pub fn sampler(&self) -> &TerrainSampler {
        &self.sampler
    }

    /// Chebyshev radius of the loaded square, in chunks
    pub fn radius(&self) -> i32 {
        let s = self.settings();
        (s.view_distance / s.chunk_size).ceil() as i32
    }

    /// Every key that should be loaded for an observer at `(x, z)`
    pub fn required_keys(&self, x: f32, z: f32) -> Vec<ChunkKey> {
        let center = ChunkKey::containing(x, z, self.settings().chunk_size);
        let r = self.radius();
        let mut keys = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dz in -r..=r {
            for dx in -r..=r {
                keys.push(ChunkKey::new(center.cx + dx, center.cz + dz));
            }
        }
        keys
    }

    /// Load missing chunks around `(x, z)` and evict the ones out of range.
    pub fn refresh(&mut self, observer_x: f32, observer_z: f32) -> RefreshReport {
        let required: HashSet<ChunkKey> = self.required_keys(observer_x, observer_z).into_iter().collect();
        let size = self.settings().chunk_size;
        let far_at = self.settings().lod_threshold * self.settings().view_distance;
        let mut report = RefreshReport::default();

        let mut stale: Vec<ChunkKey> = self
            .chunks
            .keys()
            .filter(|key| !required.contains(*key))
            .copied()
            .collect();
        stale.sort();
        for key in stale {
            if let Some(mut chunk) = self.chunks.remove(&key) {
                chunk.mesh.release();
                trace!("Evicted terrain chunk ({}, {})", key.cx, key.cz);
            }
            report.evicted.push(key);
        }

        let mut missing: Vec<ChunkKey> = required
            .iter()
            .filter(|key| !self.chunks.contains_key(*key))
            .copied()
            .collect();
        missing.sort();
        for key in missing {
            let distance = center_distance(&key, size, observer_x, observer_z);
            let segments = if distance > far_at {
                self.settings().lod_segments
            } else {
                self.settings().chunk_segments
            };
            let chunk = TerrainChunk::build(key, segments, &self.sampler);
            trace!(
                "Created terrain chunk ({}, {}) with {} segments at {:.1}m",
                key.cx,
                key.cz,
                segments,
                distance
            );
            self.chunks.insert(key, chunk);
            report.created.push(key);
        }

        for chunk in self.chunks.values_mut() {
            chunk.distance = center_distance(&chunk.key, size, observer_x, observer_z);
        }

        if !report.is_empty() {
            debug!(
                "Terrain refresh at ({:.1}, {:.1}): +{} -{} chunks, {} loaded",
                observer_x,
                observer_z,
                report.created.len(),
                report.evicted.len(),
                self.chunks.len()
            );
        }
        report
    }

    /// Surface height anywhere, loaded or not
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.sampler.height_at(x, z)
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&TerrainChunk> {
        self.chunks.get(&key)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    /// Loaded keys, sorted
    pub fn keys(&self) -> Vec<ChunkKey> {
        let mut keys: Vec<ChunkKey> = self.chunks.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drop every chunk and its geometry.
    pub fn dispose(&mut self) {
        for chunk in self.chunks.values_mut() {
            chunk.mesh.release();
        }
        let count = self.chunks.len();
        self.chunks.clear();
        debug!("Terrain disposed: {} chunks released", count);
    }
}

fn center_distance(key: &ChunkKey, chunk_size: f32, x: f32, z: f32) -> f32 {
    let (cx, cz) = key.center(chunk_size);
    ((cx - x).powi(2) + (cz - z).powi(2)).sqrt()
}
