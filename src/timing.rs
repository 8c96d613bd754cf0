//! Tick pacing: the fixed simulation step and per-streamer refresh throttles.
use std::time::Duration;

/// Fires at most once per `interval` of accumulated tick time.
///
/// Starts primed so the first `advance` fires immediately.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: f32,
    elapsed: f32,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        let interval = interval.as_secs_f32();
        Self {
            interval,
            elapsed: interval,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Add `dt` seconds; true when a refresh is due.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }

    /// Make the next `advance` fire regardless of elapsed time.
    pub fn prime(&mut self) {
        self.elapsed = self.interval;
    }
}

/// Fixed-step accumulator for the outer loop
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    max_frame: f32,
    accumulator: f32,
}

impl FixedTimestep {
    /// 60 Hz
    pub const DEFAULT_STEP: f32 = 1.0 / 60.0;
    /// Longest frame fed to the accumulator, so a stall can't queue
    /// hundreds of catch-up ticks
    pub const DEFAULT_MAX_FRAME: f32 = 0.25;

    pub fn new(step: f32, max_frame: f32) -> Self {
        Self {
            step,
            max_frame,
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Feed a frame's wall time; returns how many fixed ticks to run.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.clamp(0.0, self.max_frame);
        let mut ticks = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ticks += 1;
        }
        ticks
    }

    /// Interpolation factor between the last two ticks
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP, Self::DEFAULT_MAX_FRAME)
    }
}
