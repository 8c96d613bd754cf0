//! Deterministic scalar noise shared by every streamer.
use noise::{NoiseFn, Simplex};
use std::sync::Arc;

/// Handle passed to each streamer at construction.
pub type SharedNoise = Arc<dyn NoiseSource>;

/// A deterministic 2D noise source.
///
/// Implementors only provide [`NoiseSource::sample_2d`]; the fractal and
/// height helpers are layered on top of it so a stub source (tests) gets
/// the same combinators as the real field.
pub trait NoiseSource: Send + Sync {
    /// Sample the base noise at `(x, z)`. Must return a value in [-1, 1].
    fn sample_2d(&self, x: f32, z: f32) -> f32;

    /// Fractal Brownian motion over `octaves` layers of [`Self::sample_2d`].
    ///
    /// Each octave multiplies frequency by `lacunarity` and amplitude by
    /// `persistence`. The sum is normalised by the total amplitude so the
    /// result stays in [-1, 1]. Zero octaves yields 0.
    fn fractal(&self, x: f32, z: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            total += self.sample_2d(x * frequency, z * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        if max_value > 0.0 {
            (total / max_value).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Terrain height in [0, 1]: four octaves at `base_scale`, remapped.
    fn height_at(&self, x: f32, z: f32, base_scale: f32) -> f32 {
        let n = self.fractal(x * base_scale, z * base_scale, 4, 0.5, 2.0);
        (n + 1.0) * 0.5
    }
}

/// Seeded simplex noise field
pub struct NoiseField {
    seed: u32,
    simplex: Simplex,
}

impl NoiseField {
    /// Create a new noise field with the given seed
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            simplex: Simplex::new(seed),
        }
    }

    /// Wrap in the shared handle streamers expect.
    pub fn shared(seed: u32) -> SharedNoise {
        Arc::new(Self::new(seed))
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl NoiseSource for NoiseField {
    fn sample_2d(&self, x: f32, z: f32) -> f32 {
        // Simplex can overshoot the unit range by a hair.
        (self.simplex.get([x as f64, z as f64]) as f32).clamp(-1.0, 1.0)
    }
}
