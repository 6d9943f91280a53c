//! Collaborators the placement search talks to
//!
//! The physics engine and the thing that actually creates bodies live
//! outside this crate; they are reached through `PhysicsOracle` and
//! `ItemFactory`. `BoxWorld` is an in-memory implementation of both where
//! every body is an oriented box.

use std::cell::Cell;
use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::obb::Obb;
use crate::consts::{NEUTRAL_SPAWN_POSITION, TRAIN_BIG_COLLIDER_LAYER};

/// Opaque handle to a physical body owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Bit set of collision layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    /// Mask containing just `layer`
    pub const fn layer(layer: u32) -> Self {
        LayerMask(1 << layer)
    }

    pub fn contains(self, layer: u32) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }

    pub fn with(self, layer: u32) -> Self {
        LayerMask(self.0 | LayerMask::layer(layer).0)
    }
}

impl Default for LayerMask {
    /// Layer the train's big colliders (and obstacles) live on
    fn default() -> Self {
        LayerMask::layer(TRAIN_BIG_COLLIDER_LAYER)
    }
}

/// Black-box collision query
pub trait PhysicsOracle {
    /// Bodies on `mask` whose volume intersects the given box; trigger volumes are ignored
    fn overlap(&self, center: Vec3, half_extents: Vec3, rotation: Quat, mask: LayerMask) -> Vec<BodyId>;
}

/// A freshly created body and its footprint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instantiated {
    pub body: BodyId,
    /// World-space half-extents of the body's bounds (before any margin)
    pub half_extents: Vec3,
}

/// Creates, moves and destroys the bodies being placed
pub trait ItemFactory<T> {
    /// Create the body for `token` somewhere out of the way; `None` if it cannot be made
    fn instantiate(&mut self, token: &T) -> Option<Instantiated>;

    fn set_transform(&mut self, body: BodyId, position: Vec3, rotation: Quat);

    fn destroy(&mut self, body: BodyId);
}

/// Something that knows how big its box is
pub trait Footprint {
    fn half_extents(&self) -> Vec3;
}

/// One box in a `BoxWorld`
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBody {
    pub obb: Obb,
    pub layer: u32,
    /// Triggers never block placement
    pub trigger: bool,
}

/// In-memory physics world made of oriented boxes
///
/// Bodies created through `ItemFactory` appear at the neutral spawn location
/// on the train collider layer until moved.
#[derive(Debug, Clone, Default)]
pub struct BoxWorld {
    bodies: BTreeMap<BodyId, BoxBody>,
    next_id: u64,
    /// Number of overlap queries served
    probes: Cell<usize>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, body: BoxBody) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id, body);
        id
    }

    /// Add a solid box
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, rotation: Quat, layer: u32) -> BodyId {
        self.insert(BoxBody {
            obb: Obb::new(center, half_extents, rotation),
            layer,
            trigger: false,
        })
    }

    /// Add a trigger volume (detects, never blocks)
    pub fn add_trigger(&mut self, center: Vec3, half_extents: Vec3, rotation: Quat, layer: u32) -> BodyId {
        self.insert(BoxBody {
            obb: Obb::new(center, half_extents, rotation),
            layer,
            trigger: true,
        })
    }

    pub fn body(&self, id: BodyId) -> Option<&BoxBody> {
        self.bodies.get(&id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &BoxBody)> {
        self.bodies.iter().map(|(id, body)| (*id, body))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Overlap queries answered so far
    pub fn probe_count(&self) -> usize {
        self.probes.get()
    }
}

impl PhysicsOracle for BoxWorld {
    fn overlap(&self, center: Vec3, half_extents: Vec3, rotation: Quat, mask: LayerMask) -> Vec<BodyId> {
        self.probes.set(self.probes.get() + 1);
        let probe = Obb::new(center, half_extents, rotation);
        self.bodies
            .iter()
            .filter(|(_, body)| !body.trigger && mask.contains(body.layer))
            .filter(|(_, body)| body.obb.overlaps(&probe))
            .map(|(id, _)| *id)
            .collect()
    }
}

impl<T: Footprint> ItemFactory<T> for BoxWorld {
    fn instantiate(&mut self, token: &T) -> Option<Instantiated> {
        let half_extents = token.half_extents().abs();
        if !half_extents.is_finite() {
            log::warn!("Refusing to create a body with non-finite extents {}", half_extents);
            return None;
        }
        let body = self.add_box(NEUTRAL_SPAWN_POSITION, half_extents, Quat::IDENTITY, TRAIN_BIG_COLLIDER_LAYER);
        Some(Instantiated { body, half_extents })
    }

    fn set_transform(&mut self, body: BodyId, position: Vec3, rotation: Quat) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.obb.center = position;
            b.obb.rotation = rotation;
        }
    }

    fn destroy(&mut self, body: BodyId) {
        self.bodies.remove(&body);
    }
}
