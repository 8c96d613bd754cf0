use crate::config::RoadSettings;
use crate::mesh::MeshBuffers;
use crate::procgen::path::{PathFrame, PathGenerator};
use glam::{Quat, Vec3};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Furthest arc-length the road is streamed to. Past this an `f32`
/// distance can no longer resolve one segment step reliably.
pub const MAX_PATH_DISTANCE: f32 = 1.0e7;

/// One cross-section of the road strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSegment {
    pub center: Vec3,
    pub tangent: Vec3,
    pub normal: Vec3,
    pub binormal: Vec3,
    /// Roll about the tangent in radians, positive into a +binormal turn
    pub bank_angle: f32,
    pub width: f32,
    pub distance_along_path: f32,
}

impl RoadSegment {
    /// Binormal and normal after applying the bank roll.
    ///
    /// The roll lowers the inside edge of the curve.
    pub fn banked_axes(&self) -> (Vec3, Vec3) {
        let roll = Quat::from_axis_angle(self.tangent, -self.bank_angle);
        (roll * self.binormal, roll * self.normal)
    }

    /// Left and right edge points
    pub fn edges(&self) -> (Vec3, Vec3) {
        let (right, _) = self.banked_axes();
        let half = self.width * 0.5;
        (self.center - right * half, self.center + right * half)
    }
}

/// Sliding window of road segments over an endless path.
pub struct RoadStreamer {
    settings: RoadSettings,
    path: PathGenerator,
    segments: VecDeque<RoadSegment>,
    mesh: MeshBuffers,
    revision: u64,
}

impl RoadStreamer {
    /// Fill the initial window from arc-length 0.
    pub fn new(settings: RoadSettings, path: PathGenerator) -> Self {
        let mut road = Self {
            settings,
            path,
            segments: VecDeque::new(),
            mesh: MeshBuffers::default(),
            revision: 0,
        };

        for i in 0..road.settings.max_segments {
            let distance = i as f32 * road.settings.segment_length;
            let segment = road.sample_segment(distance);
            road.segments.push_back(segment);
        }
        road.rebuild_mesh();

        debug!(
            "Road window initialised: {} segments over {:.1}m",
            road.segments.len(),
            road.window_length()
        );
        road
    }

    pub fn settings(&self) -> &RoadSettings {
        &self.settings
    }

    pub fn path(&self) -> &PathGenerator {
        &self.path
    }

    /// Arc-length span the full window covers
    pub fn window_length(&self) -> f32 {
        self.settings.max_segments as f32 * self.settings.segment_length
    }

    /// Slide the window so it keeps half its length ahead of the observer.
    ///
    /// Appends as many segments as needed (bounded by the window size) and
    /// evicts from the back in FIFO order. An empty window (after `dispose`)
    /// is refilled around the observer. Returns true when the window
    /// changed and the mesh was rebuilt.
    pub fn extend(&mut self, observer_distance: f32) -> bool {
        if self.segments.is_empty() {
            return self.refill(observer_distance);
        }

        let lead_margin = self.window_length() * 0.5;
        let step = self.settings.segment_length;
        let mut appended = 0;
        let mut evicted = 0;

        while appended < self.settings.max_segments {
            let Some(last) = self.segments.back() else {
                break;
            };
            if last.distance_along_path - observer_distance >= lead_margin {
                break;
            }

            let Some(distance) = next_distance(last.distance_along_path, step) else {
                warn!(
                    "Road reached the {:.0}m streaming limit at {:.1}m",
                    MAX_PATH_DISTANCE, last.distance_along_path
                );
                break;
            };
            let segment = self.sample_segment(distance);
            self.segments.push_back(segment);
            appended += 1;

            while self.segments.len() > self.settings.max_segments {
                self.segments.pop_front();
                evicted += 1;
            }
        }

        if appended == 0 {
            return false;
        }

        if let Some(oldest) = self.segments.front() {
            let retired = self.path.retire_before(oldest.distance_along_path - step);
            if retired > 0 {
                trace!("Retired {} control points behind {:.1}m", retired, oldest.distance_along_path);
            }
        }

        self.rebuild_mesh();
        debug!(
            "Road window slid: +{} -{} segments, now {:.1}m..{:.1}m",
            appended,
            evicted,
            self.segments.front().map(|s| s.distance_along_path).unwrap_or(0.0),
            self.segments.back().map(|s| s.distance_along_path).unwrap_or(0.0)
        );
        true
    }

    /// Lay a full window starting half a window behind the observer, or at
    /// the oldest resident path distance if that is further along.
    fn refill(&mut self, observer_distance: f32) -> bool {
        let step = self.settings.segment_length;
        let start = (observer_distance - self.window_length() * 0.5)
            .max(self.path.start_distance())
            .max(0.0)
            .min(MAX_PATH_DISTANCE);
        let first = (start / step).ceil() as u64;

        for k in first..first + self.settings.max_segments as u64 {
            let distance = k as f32 * step;
            if distance > MAX_PATH_DISTANCE {
                break;
            }
            let segment = self.sample_segment(distance);
            self.segments.push_back(segment);
        }
        if self.segments.is_empty() {
            return false;
        }

        self.rebuild_mesh();
        debug!(
            "Road window refilled: {} segments from {:.1}m",
            self.segments.len(),
            first as f32 * step
        );
        true
    }

    /// Segment nearest to arc-length `distance`, clamped to the window.
    ///
    /// `None` only when the window is empty.
    pub fn segment_at_distance(&self, distance: f32) -> Option<&RoadSegment> {
        let first = self.segments.front()?;
        let offset = (distance - first.distance_along_path) / self.settings.segment_length;
        let last = self.segments.len() - 1;
        let index = if offset <= 0.0 {
            0
        } else {
            (offset.round() as usize).min(last)
        };
        self.segments.get(index)
    }

    /// Exact centre-line frame when `distance` lies inside the window.
    pub fn frame_at_distance(&self, distance: f32) -> Option<PathFrame> {
        let first = self.segments.front()?.distance_along_path;
        let last = self.segments.back()?.distance_along_path;
        if distance < first || distance > last {
            return None;
        }
        Some(self.path.frame_at_distance(distance))
    }

    pub fn segments(&self) -> impl ExactSizeIterator<Item = &RoadSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn mesh(&self) -> &MeshBuffers {
        &self.mesh
    }

    /// Bumped each time the mesh is rebuilt
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Release the window and its geometry.
    pub fn dispose(&mut self) {
        self.segments.clear();
        self.mesh.release();
        self.revision += 1;
    }

    fn sample_segment(&mut self, distance: f32) -> RoadSegment {
        // Only sample where later control points can no longer bend the
        // curve, including the banking window ahead.
        let reach = distance + self.path.profile().settings().bank_window;
        while self.path.control_point_count() < 2 || self.path.stable_length() < reach {
            self.path.extend();
        }

        let frame = self.path.frame_at_distance(distance);
        RoadSegment {
            center: frame.position,
            tangent: frame.tangent,
            normal: frame.normal,
            binormal: frame.binormal,
            bank_angle: self.path.banking_angle(distance, self.settings.max_bank),
            width: self.settings.width,
            distance_along_path: distance,
        }
    }

    fn rebuild_mesh(&mut self) {
        let count = self.segments.len();
        let mut mesh = MeshBuffers::with_capacity(count * 2, count.saturating_sub(1) * 6);

        for (i, segment) in self.segments.iter().enumerate() {
            let (left, right) = segment.edges();
            let (_, up) = segment.banked_axes();
            let v = i as f32 / count as f32;

            mesh.push_vertex(left.to_array(), up.to_array(), [0.0, v]);
            mesh.push_vertex(right.to_array(), up.to_array(), [1.0, v]);

            if i + 1 < count {
                let l0 = (i * 2) as u32;
                let r0 = l0 + 1;
                let l1 = l0 + 2;
                let r1 = l0 + 3;
                mesh.push_triangle(l0, l1, r0);
                mesh.push_triangle(r0, l1, r1);
            }
        }

        self.mesh = mesh;
        self.revision += 1;
    }
}

/// Arc-length of the segment after `last`, or `None` once `f32` can no
/// longer advance by `step` or the streaming limit is reached.
fn next_distance(last: f32, step: f32) -> Option<f32> {
    let next = last + step;
    (next > last && next <= MAX_PATH_DISTANCE).then_some(next)
}
