//! Live obstacle bookkeeping
//!
//! An obstacle is registered the moment its body is created (while it still
//! waits at the neutral spawn location) and stays registered until it is
//! removed, cleared or cleaned up. The registry never touches bodies itself:
//! operations that drop entries hand the body ids back so the caller can
//! destroy them.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::placement::BodyId;

/// A registered obstacle
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleEntry {
    /// Obstacle type name (e.g. "Rockslide")
    pub kind: String,
    /// Last known world position
    pub position: Vec3,
}

/// Every live obstacle, keyed by body
#[derive(Debug, Clone, Default)]
pub struct ObstacleRegistry {
    entries: BTreeMap<BodyId, ObstacleEntry>,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body. Returns false if it was already registered (the entry is refreshed).
    pub fn add(&mut self, body: BodyId, kind: impl Into<String>, position: Vec3) -> bool {
        let entry = ObstacleEntry {
            kind: kind.into(),
            position,
        };
        self.entries.insert(body, entry).is_none()
    }

    pub fn remove(&mut self, body: BodyId) -> Option<ObstacleEntry> {
        self.entries.remove(&body)
    }

    /// Drop everything, returning the bodies to destroy
    pub fn clear(&mut self) -> Vec<BodyId> {
        let bodies = self.entries.keys().copied().collect();
        self.entries.clear();
        bodies
    }

    /// Record where a body ended up. Returns false for unknown bodies.
    pub fn set_position(&mut self, body: BodyId, position: Vec3) -> bool {
        match self.entries.get_mut(&body) {
            Some(entry) => {
                entry.position = position;
                true
            }
            None => false,
        }
    }

    /// Refresh positions from the host (bodies move under physics)
    ///
    /// Bodies the host no longer knows (`None`) keep their last position.
    pub fn sync_positions(&mut self, mut position_of: impl FnMut(BodyId) -> Option<Vec3>) {
        for (body, entry) in self.entries.iter_mut() {
            if let Some(position) = position_of(*body) {
                entry.position = position;
            }
        }
    }

    pub fn get(&self, body: BodyId) -> Option<&ObstacleEntry> {
        self.entries.get(&body)
    }

    pub fn contains(&self, body: BodyId) -> bool {
        self.entries.contains_key(&body)
    }

    /// Whether any obstacle lies within `threshold` of `position`
    pub fn is_near(&self, position: Vec3, threshold: f32) -> bool {
        let threshold_sq = threshold * threshold;
        self.entries
            .values()
            .any(|entry| entry.position.distance_squared(position) <= threshold_sq)
    }

    /// Whether any of `positions` has an obstacle within `threshold`
    pub fn is_near_any(&self, positions: &[Vec3], threshold: f32) -> bool {
        positions.iter().any(|p| self.is_near(*p, threshold))
    }

    /// Unregister every obstacle farther than `max_distance` from `reference`
    ///
    /// Returns the removed bodies in id order; the caller destroys them.
    pub fn cleanup_far_from(&mut self, reference: Vec3, max_distance: f32) -> Vec<BodyId> {
        let max_sq = max_distance * max_distance;
        let far: Vec<BodyId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.position.distance_squared(reference) > max_sq)
            .map(|(body, _)| *body)
            .collect();

        for body in &far {
            self.entries.remove(body);
        }

        if !far.is_empty() {
            log::info!(
                "Cleaned up {} obstacles farther than {}m, {} remain",
                far.len(),
                max_distance,
                self.entries.len()
            );
        }
        far
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &ObstacleEntry)> {
        self.entries.iter().map(|(body, entry)| (*body, entry))
    }

    /// Number of live obstacles of one type
    pub fn count_of(&self, kind: &str) -> usize {
        self.entries.values().filter(|e| e.kind == kind).count()
    }
}
