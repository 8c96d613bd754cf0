use super::road::{RoadSegment, RoadStreamer};
use crate::config::RailingSettings;
use crate::pool::InstancePool;
use glam::{Quat, Vec3};
use tracing::{debug, warn};

/// Colour variant of posts on the left edge
pub const LEFT_VARIANT: u8 = 0;
/// Colour variant of posts on the right edge
pub const RIGHT_VARIANT: u8 = 1;

/// Guard-rail posts along both road edges near the observer.
pub struct RailingStreamer {
    settings: RailingSettings,
    pool: InstancePool,
    last_anchor: Option<i64>,
    last_road_revision: Option<u64>,
}

impl RailingStreamer {
    pub fn new(settings: RailingSettings) -> Self {
        let pool = InstancePool::new(settings.capacity);
        Self {
            settings,
            pool,
            last_anchor: None,
            last_road_revision: None,
        }
    }

    pub fn settings(&self) -> &RailingSettings {
        &self.settings
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    /// Rebuild posts when the observer crosses a spacing boundary or the
    /// road window has moved. Returns true when the pool was rebuilt.
    pub fn refresh(&mut self, road: &RoadStreamer, observer_distance: f32) -> bool {
        let anchor = (observer_distance / self.settings.spacing).floor() as i64;
        if self.last_anchor == Some(anchor) && self.last_road_revision == Some(road.revision()) {
            return false;
        }
        self.last_anchor = Some(anchor);
        self.last_road_revision = Some(road.revision());

        self.pool.reset();
        if self.settings.enabled {
            self.place_posts(road, observer_distance);
        }
        self.pool.finalize();

        if self.pool.cycle_overflow() > 0 {
            warn!(
                "Railing pool full: {} posts dropped (capacity {})",
                self.pool.cycle_overflow(),
                self.pool.capacity()
            );
        }
        debug!("Railings rebuilt: {} posts around {:.1}m", self.pool.visible_count(), observer_distance);
        true
    }

    fn place_posts(&mut self, road: &RoadStreamer, observer_distance: f32) {
        let (Some(front), Some(back)) = (road.segments().next(), road.segments().last()) else {
            return;
        };
        let spacing = self.settings.spacing;
        let start = (observer_distance - self.settings.behind).max(front.distance_along_path);
        let end = (observer_distance + self.settings.ahead).min(back.distance_along_path);
        if end < start {
            return;
        }

        let first = (start / spacing).ceil() as i64;
        let last = (end / spacing).floor() as i64;
        for k in first..=last {
            let distance = k as f32 * spacing;
            let (Some(frame), Some(nearest)) = (road.frame_at_distance(distance), road.segment_at_distance(distance))
            else {
                continue;
            };
            let section = RoadSegment {
                center: frame.position,
                tangent: frame.tangent,
                normal: frame.normal,
                binormal: frame.binormal,
                bank_angle: nearest.bank_angle,
                width: nearest.width,
                distance_along_path: distance,
            };
            let (left, right) = section.edges();
            let (outward, _) = section.banked_axes();
            let rotation = Quat::from_rotation_y(frame.tangent.x.atan2(frame.tangent.z));
            let margin = outward * self.settings.edge_margin;

            self.add_post(left - margin, rotation, LEFT_VARIANT);
            self.add_post(right + margin, rotation, RIGHT_VARIANT);
        }
    }

    fn add_post(&mut self, position: Vec3, rotation: Quat, variant: u8) {
        if let Some(index) = self.pool.add_instance(position, rotation, Vec3::ONE) {
            self.pool.set_color_variant(index, variant);
        }
    }

    pub fn dispose(&mut self) {
        self.pool.dispose();
        self.last_anchor = None;
        self.last_road_revision = None;
    }
}
