//! Endless road centre-line.
//!
//! Control points are a pure function of their index (see [`PathProfile`]),
//! joined by a uniform Catmull-Rom spline and re-parametrised by arc-length
//! through a per-span lookup table.
use super::noise::SharedNoise;
use crate::config::PathSettings;
use glam::Vec3;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Samples per span in the arc-length table
const ARC_SAMPLES: usize = 16;

pub const WORLD_UP: Vec3 = Vec3::Y;
pub const WORLD_FORWARD: Vec3 = Vec3::Z;

/// Orthonormal frame on the centre-line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFrame {
    pub position: Vec3,
    pub tangent: Vec3,
    pub normal: Vec3,
    pub binormal: Vec3,
}

impl PathFrame {
    /// Returned when the curve has fewer than two control points.
    pub const DEGENERATE: PathFrame = PathFrame {
        position: Vec3::ZERO,
        tangent: WORLD_FORWARD,
        normal: WORLD_UP,
        binormal: Vec3::X,
    };

    /// Build the frame from a tangent and fixed world-up. No history, so
    /// no accumulated twist.
    pub fn from_tangent(position: Vec3, tangent: Vec3) -> Self {
        let tangent = tangent.try_normalize().unwrap_or(WORLD_FORWARD);
        let binormal = WORLD_UP.cross(tangent).try_normalize().unwrap_or(Vec3::X);
        let normal = tangent.cross(binormal).normalize();
        Self {
            position,
            tangent,
            normal,
            binormal,
        }
    }
}

/// Where control point `i` lives, independent of any generator state.
///
/// Each point sits one `control_spacing` ahead of the previous one and is
/// shifted sideways by a noise-driven step, so lateral offsets accumulate
/// and the road wanders freely. The running sum is cached and shared
/// between clones; it is always built in index order, so every clone
/// sees bit-identical offsets.
#[derive(Clone)]
pub struct PathProfile {
    noise: SharedNoise,
    settings: PathSettings,
    /// `offsets[i]` is the lateral position of control point `i`
    offsets: Arc<RwLock<Vec<f32>>>,
}

impl PathProfile {
    pub fn new(noise: SharedNoise, settings: PathSettings) -> Self {
        Self {
            noise,
            settings,
            offsets: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &PathSettings {
        &self.settings
    }

    pub fn control_point(&self, index: usize) -> Vec3 {
        let z = index as f32 * self.settings.control_spacing;
        Vec3::new(self.lateral_offset(index), 0.0, z)
    }

    /// Sideways move from point `index - 1` to point `index`
    pub fn lateral_step(&self, index: usize) -> f32 {
        let straight = self.settings.initial_straight;
        if index < straight {
            return 0.0;
        }
        let ramp = if self.settings.ramp_points == 0 {
            1.0
        } else {
            smoothstep(((index - straight) as f32 / self.settings.ramp_points as f32).min(1.0))
        };
        let traveled = index as f32 * self.settings.control_spacing;
        let n = self.noise.sample_2d(traveled * self.settings.curvature_frequency, 0.0);
        ramp * n * self.settings.curvature_scale
    }

    fn lateral_offset(&self, index: usize) -> f32 {
        {
            let offsets = self.offsets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(x) = offsets.get(index) {
                return *x;
            }
        }

        let mut offsets = self.offsets.write().unwrap_or_else(PoisonError::into_inner);
        while offsets.len() <= index {
            let i = offsets.len();
            let previous = offsets.last().copied().unwrap_or(0.0);
            offsets.push(previous + self.lateral_step(i));
        }
        offsets[index]
    }

    /// Lateral centre of the road at world `z`.
    ///
    /// Z is linear in the spline parameter away from the clamped first span,
    /// so the span and local parameter come straight from `z`.
    pub fn lateral_offset_at(&self, z: f32) -> f32 {
        let spacing = self.settings.control_spacing;
        if z <= 0.0 {
            return 0.0;
        }
        let span = (z / spacing).floor();
        let t = z / spacing - span;
        let i = span as usize;
        let x0 = self.lateral_offset(i.saturating_sub(1));
        let x1 = self.lateral_offset(i);
        let x2 = self.lateral_offset(i + 1);
        let x3 = self.lateral_offset(i + 2);
        catmull_rom(x0, x1, x2, x3, t)
    }
}

/// Arc-length table for one span (between control points `index` and `index + 1`)
#[derive(Debug, Clone)]
struct SpanArc {
    index: usize,
    start: f32,
    cumulative: [f32; ARC_SAMPLES + 1],
}

impl SpanArc {
    fn length(&self) -> f32 {
        self.cumulative[ARC_SAMPLES]
    }

    fn end(&self) -> f32 {
        self.start + self.length()
    }

    /// Spline parameter for a distance measured from the span start
    fn param_at(&self, local: f32) -> f32 {
        let k = self.cumulative.partition_point(|&c| c <= local).clamp(1, ARC_SAMPLES);
        let lo = self.cumulative[k - 1];
        let hi = self.cumulative[k];
        let frac = if hi > lo { ((local - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 };
        ((k - 1) as f32 + frac) / ARC_SAMPLES as f32
    }
}

/// Ever-growing centre-line with a bounded resident tail.
pub struct PathGenerator {
    profile: PathProfile,
    /// Resident control points; `points[0]` has global index `base_index`
    points: VecDeque<Vec3>,
    base_index: usize,
    spans: VecDeque<SpanArc>,
}

impl PathGenerator {
    /// Create a generator seeded with the profile's initial straight.
    pub fn new(profile: PathProfile) -> Self {
        let initial = profile.settings.initial_straight;
        let mut path = Self {
            profile,
            points: VecDeque::new(),
            base_index: 0,
            spans: VecDeque::new(),
        };
        for _ in 0..initial {
            path.extend();
        }
        path
    }

    pub fn profile(&self) -> &PathProfile {
        &self.profile
    }

    /// Append the next control point.
    pub fn extend(&mut self) {
        let index = self.base_index + self.points.len();
        self.points.push_back(self.profile.control_point(index));

        if self.points.len() < 2 {
            return;
        }

        // The previous final span had its far support clamped; now it has
        // the real one.
        if let Some(last) = self.spans.pop_back() {
            let rebuilt = self.build_span(last.index, last.start);
            self.spans.push_back(rebuilt);
        }
        let start = self.spans.back().map(SpanArc::end).unwrap_or(0.0);
        let span = self.build_span(index - 1, start);
        self.spans.push_back(span);
    }

    /// Total global control points ever generated.
    pub fn control_point_count(&self) -> usize {
        self.base_index + self.points.len()
    }

    /// Control points currently resident.
    pub fn resident_points(&self) -> impl Iterator<Item = &Vec3> {
        self.points.iter()
    }

    pub fn first_control_point(&self) -> Option<Vec3> {
        self.points.front().copied()
    }

    /// Arc-length at the start of the resident curve.
    pub fn start_distance(&self) -> f32 {
        self.spans.front().map(|s| s.start).unwrap_or(0.0)
    }

    /// Arc-length at the end of the curve.
    pub fn length(&self) -> f32 {
        self.spans.back().map(SpanArc::end).unwrap_or(0.0)
    }

    /// Arc-length below which the curve will not change shape again.
    pub fn stable_length(&self) -> f32 {
        self.spans.back().map(|s| s.start).unwrap_or(0.0)
    }

    /// Drop control points whose spans lie wholly behind `distance`.
    ///
    /// One point before the first kept span stays resident as its spline
    /// support. Returns the number of points dropped.
    pub fn retire_before(&mut self, distance: f32) -> usize {
        let mut dropped = 0;
        // Keep at least the final two spans so the curve never empties.
        while self.spans.len() > 2 {
            if self.spans[0].end() > distance {
                break;
            }
            self.spans.pop_front();
            let first_needed = self.spans[0].index.saturating_sub(1);
            while self.base_index < first_needed {
                self.points.pop_front();
                self.base_index += 1;
                dropped += 1;
            }
        }
        dropped
    }

    /// Orthonormal frame at arc-length `distance`, clamped to the resident curve.
    pub fn frame_at_distance(&self, distance: f32) -> PathFrame {
        match self.locate(distance) {
            Some((span, t)) => {
                let (p0, p1, p2, p3) = self.supports(span.index);
                let position = catmull_rom_point(p0, p1, p2, p3, t);
                let tangent = catmull_rom_derivative(p0, p1, p2, p3, t);
                PathFrame::from_tangent(position, tangent)
            }
            None => PathFrame::DEGENERATE,
        }
    }

    /// Bank angle from local curvature at `distance`, clamped to `max_bank`.
    ///
    /// Positive when the curve turns toward +binormal.
    pub fn banking_angle(&self, distance: f32, max_bank: f32) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let half = self.profile.settings.bank_window;
        let d1 = (distance - half).max(self.start_distance());
        let d2 = (distance + half).min(self.length());
        let arc = d2 - d1;
        if arc <= 1e-4 {
            return 0.0;
        }

        let t1 = self.frame_at_distance(d1).tangent;
        let t2 = self.frame_at_distance(d2).tangent;
        let turn = t1.cross(t2).dot(WORLD_UP).atan2(t1.dot(t2));
        let curvature = turn / arc;

        (curvature * self.profile.settings.bank_gain).clamp(-max_bank, max_bank)
    }

    fn locate(&self, distance: f32) -> Option<(&SpanArc, f32)> {
        if self.points.len() < 2 || self.spans.is_empty() {
            return None;
        }
        let d = distance.clamp(self.start_distance(), self.length());
        let idx = self
            .spans
            .partition_point(|s| s.start <= d)
            .saturating_sub(1);
        let span = &self.spans[idx];
        Some((span, span.param_at(d - span.start)))
    }

    fn point(&self, global: usize) -> Vec3 {
        let last = self.base_index + self.points.len() - 1;
        let clamped = global.clamp(self.base_index, last);
        self.points[clamped - self.base_index]
    }

    fn supports(&self, span: usize) -> (Vec3, Vec3, Vec3, Vec3) {
        (
            self.point(span.saturating_sub(1)),
            self.point(span),
            self.point(span + 1),
            self.point(span + 2),
        )
    }

    fn build_span(&self, index: usize, start: f32) -> SpanArc {
        let (p0, p1, p2, p3) = self.supports(index);
        let mut cumulative = [0.0; ARC_SAMPLES + 1];
        let mut prev = p1;
        for k in 1..=ARC_SAMPLES {
            let t = k as f32 / ARC_SAMPLES as f32;
            let p = catmull_rom_point(p0, p1, p2, p3, t);
            cumulative[k] = cumulative[k - 1] + prev.distance(p);
            prev = p;
        }
        SpanArc {
            index,
            start,
            cumulative,
        }
    }
}

fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn catmull_rom_point(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn catmull_rom_derivative(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    0.5 * ((-p0 + p2)
        + 2.0 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t
        + 3.0 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::noise::{NoiseField, NoiseSource};

    struct Constant(f32);

    impl NoiseSource for Constant {
        fn sample_2d(&self, _x: f32, _z: f32) -> f32 {
            self.0
        }
    }

    fn generator(seed: u32) -> PathGenerator {
        PathGenerator::new(PathProfile::new(NoiseField::shared(seed), PathSettings::default()))
    }

    #[test]
    fn test_initial_frame_is_straight() {
        let path = generator(1);
        let frame = path.frame_at_distance(0.0);

        assert!(frame.position.distance(Vec3::ZERO) < 1e-4);
        assert!(frame.tangent.distance(WORLD_FORWARD) < 1e-4);
        assert!(frame.normal.distance(WORLD_UP) < 1e-4);
        assert!(frame.binormal.distance(Vec3::X) < 1e-4);
        assert!(path.banking_angle(0.0, 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_path_returns_fixed_frame() {
        let settings = PathSettings {
            initial_straight: 1,
            ..PathSettings::default()
        };
        let path = PathGenerator::new(PathProfile::new(NoiseField::shared(3), settings));

        assert_eq!(path.frame_at_distance(12.0), PathFrame::DEGENERATE);
        assert_eq!(path.banking_angle(12.0, 0.5), 0.0);
        assert_eq!(path.length(), 0.0);
    }

    #[test]
    fn test_frames_are_orthonormal() {
        let mut path = generator(99);
        for _ in 0..40 {
            path.extend();
        }

        let mut d = 0.0;
        while d < path.length() {
            let f = path.frame_at_distance(d);
            assert!((f.tangent.length() - 1.0).abs() < 1e-4);
            assert!((f.normal.length() - 1.0).abs() < 1e-4);
            assert!((f.binormal.length() - 1.0).abs() < 1e-4);
            assert!(f.tangent.dot(f.normal).abs() < 1e-4);
            assert!(f.tangent.dot(f.binormal).abs() < 1e-4);
            assert!(f.normal.dot(f.binormal).abs() < 1e-4);
            d += 7.3;
        }
    }

    #[test]
    fn test_arc_length_is_consistent() {
        let mut path = generator(5);
        for _ in 0..20 {
            path.extend();
        }

        // Points 1m apart in arc-length should be ~1m apart in space.
        let mut d = 3.0;
        while d + 1.0 < path.stable_length() {
            let a = path.frame_at_distance(d).position;
            let b = path.frame_at_distance(d + 1.0).position;
            let gap = a.distance(b);
            assert!((gap - 1.0).abs() < 0.02, "gap {} at {}", gap, d);
            d += 11.0;
        }
    }

    #[test]
    fn test_stable_region_unchanged_by_extend() {
        let mut path = generator(11);
        for _ in 0..15 {
            path.extend();
        }
        let stable = path.stable_length();
        let before: Vec<Vec3> = (0..20)
            .map(|i| path.frame_at_distance(stable * i as f32 / 20.0).position)
            .collect();

        path.extend();
        path.extend();

        for (i, p) in before.iter().enumerate() {
            let after = path.frame_at_distance(stable * i as f32 / 20.0).position;
            assert!(after.distance(*p) < 1e-3);
        }
    }

    #[test]
    fn test_retire_keeps_distances() {
        let mut path = generator(21);
        for _ in 0..60 {
            path.extend();
        }
        let mark = path.length() - 50.0;
        let before = path.frame_at_distance(mark);
        let count = path.control_point_count();

        let dropped = path.retire_before(mark - 20.0);

        assert!(dropped > 0);
        assert_eq!(path.control_point_count(), count);
        assert!(path.start_distance() <= mark - 20.0);
        let after = path.frame_at_distance(mark);
        assert!(after.position.distance(before.position) < 1e-3);
    }

    #[test]
    fn test_lateral_steps_bounded() {
        let path = generator(8);
        let profile = path.profile();
        let scale = profile.settings().curvature_scale;
        for i in 1..500 {
            let p = profile.control_point(i);
            let prev = profile.control_point(i - 1);
            assert!((p.x - prev.x).abs() <= scale + 1e-3);
            assert!((p.x - prev.x - profile.lateral_step(i)).abs() < 1e-2);
            assert_eq!(p.z, i as f32 * profile.settings().control_spacing);
        }
    }

    #[test]
    fn test_extend_accumulates_lateral_offsets() {
        let settings = PathSettings {
            initial_straight: 2,
            ramp_points: 0,
            ..PathSettings::default()
        };
        let mut path = PathGenerator::new(PathProfile::new(Arc::new(Constant(1.0)), settings));
        for _ in 0..4 {
            path.extend();
        }

        let xs: Vec<f32> = path.resident_points().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 0.0, 15.0, 30.0, 45.0, 60.0]);
    }

    #[test]
    fn test_offsets_independent_of_query_order() {
        let a = PathProfile::new(NoiseField::shared(17), PathSettings::default());
        let b = PathProfile::new(NoiseField::shared(17), PathSettings::default());
        let far = b.control_point(300);
        for i in 0..=300 {
            a.control_point(i);
        }
        assert_eq!(a.control_point(300).x.to_bits(), far.x.to_bits());
        assert_eq!(a.lateral_offset_at(1234.5).to_bits(), b.lateral_offset_at(1234.5).to_bits());
    }

    #[test]
    fn test_profile_matches_generated_centreline() {
        let mut path = generator(31);
        for _ in 0..30 {
            path.extend();
        }
        let profile = path.profile().clone();
        let mut d = 150.0;
        while d < path.stable_length() {
            let p = path.frame_at_distance(d).position;
            let x = profile.lateral_offset_at(p.z);
            assert!((x - p.x).abs() < 0.05, "profile {} vs path {} at z {}", x, p.x, p.z);
            d += 13.0;
        }
    }

    #[test]
    fn test_banking_sign_follows_turn() {
        // Constant positive noise pushes the road toward +X after the straight.
        let profile = PathProfile::new(Arc::new(Constant(1.0)), PathSettings::default());
        let mut path = PathGenerator::new(profile);
        for _ in 0..10 {
            path.extend();
        }
        // The ramp bends toward +X right after the straight.
        let bend = path.frame_at_distance(100.0 + 10.0);
        assert!(bend.tangent.x > 0.0);
        assert!(path.banking_angle(105.0, 1.0) > 0.0);
        assert!(path.banking_angle(105.0, 0.01) <= 0.01);
    }
}
