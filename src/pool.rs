//! Fixed-capacity instance transform buffer.
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Index into the renderer's palette for this category
    pub color_variant: u8,
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            color_variant: 0,
        }
    }
}

/// Reusable slot array with a live count.
///
/// Filling is a `reset` / `add_instance`* / `finalize` cycle. The renderer
/// only reads the committed prefix, so a half-filled cycle is never visible.
/// Adds past capacity are dropped and counted.
#[derive(Debug)]
pub struct InstancePool {
    slots: Vec<InstanceTransform>,
    count: usize,
    visible: usize,
    overflow: u64,
    cycle_overflow: usize,
    revision: u64,
}

impl InstancePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![InstanceTransform::default(); capacity],
            count: 0,
            visible: 0,
            overflow: 0,
            cycle_overflow: 0,
            revision: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Start a new fill cycle.
    pub fn reset(&mut self) {
        self.count = 0;
        self.visible = 0;
        self.cycle_overflow = 0;
    }

    /// Write the next slot. `None` means the pool is full and the instance
    /// was dropped.
    pub fn add_instance(&mut self, position: Vec3, rotation: Quat, scale: Vec3) -> Option<usize> {
        if self.count >= self.slots.len() {
            self.overflow += 1;
            self.cycle_overflow += 1;
            return None;
        }

        let index = self.count;
        self.slots[index] = InstanceTransform {
            position,
            rotation,
            scale,
            color_variant: 0,
        };
        self.count += 1;
        Some(index)
    }

    pub fn set_color_variant(&mut self, index: usize, variant: u8) {
        if index < self.count {
            self.slots[index].color_variant = variant;
        }
    }

    /// Commit the live count as what the renderer draws.
    pub fn finalize(&mut self) {
        self.visible = self.count;
        self.revision += 1;
    }

    /// Slots written in the current cycle
    pub fn live_count(&self) -> usize {
        self.count
    }

    /// Slots committed by the last `finalize`
    pub fn visible_count(&self) -> usize {
        self.visible
    }

    pub fn visible(&self) -> &[InstanceTransform] {
        &self.slots[..self.visible]
    }

    /// Dropped adds over the pool's lifetime
    pub fn overflow_count(&self) -> u64 {
        self.overflow
    }

    /// Dropped adds since the last `reset`
    pub fn cycle_overflow(&self) -> usize {
        self.cycle_overflow
    }

    /// Bumped on every `finalize`
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Forget all instances. Capacity is kept so the pool can be refilled.
    pub fn dispose(&mut self) {
        self.reset();
        self.revision += 1;
    }
}
