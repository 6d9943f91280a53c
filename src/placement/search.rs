//! Ring-by-ring placement search
//!
//! Items are placed one after another around an anchor. For each item the
//! body is created first (at the neutral spawn location, so it takes part in
//! later items' overlap tests once moved), then candidate spots are probed on
//! rings of growing radius. The first ring that yields any free spot ends
//! that item's search; the spot with the smallest rotation error wins, ties
//! going to the earliest probe.
//!
//! The search is a state machine: every `step()` performs at most one overlap
//! probe so the host can let its physics settle between probes.

use std::collections::VecDeque;

use glam::{Quat, Vec3};

use super::obb::Obb;
use super::world::{BodyId, ItemFactory, LayerMask, PhysicsOracle};
use crate::consts::{
    DEFAULT_ANGLE_STEP_DEG, DEFAULT_SEARCH_STEP, FREE_ROTATION_STEP_DEG, JITTER_MARGIN, NEUTRAL_SPAWN_POSITION,
    SPAWN_CLEARANCE,
};
use crate::registry::ObstacleRegistry;
use crate::settings::RadiusPolicy;
use crate::{rotation_angle_deg, yaw_rotation};

/// Desired orientation of an item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Use exactly this rotation (rotation error is always 0)
    Fixed(Quat),
    /// Any yaw will do; prefer the one closest to `reference`
    Free { reference: Quat },
}

/// One thing to place
#[derive(Debug, Clone)]
pub struct PlacementItem<T> {
    /// Handed to the factory to create the body
    pub token: T,
    pub orientation: Orientation,
}

/// A collision-free candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeSpot {
    pub position: Vec3,
    pub rotation: Quat,
    /// Degrees away from the desired orientation
    pub rotation_error: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub anchor: Vec3,
    pub max_radius: f32,
    /// Radial distance between rings
    pub step: f32,
    /// Angle between candidates on one ring (degrees)
    pub angle_step_deg: f32,
    /// Yaw step for free-orientation items (degrees)
    pub free_rotation_step_deg: f32,
    /// Added to every half-extent before probing
    pub margin: f32,
    /// Gap between the anchor height and the bottom of a probe box
    pub clearance: f32,
    pub mask: LayerMask,
    pub radius_policy: RadiusPolicy,
}

impl SearchConfig {
    pub fn new(anchor: Vec3, max_radius: f32) -> Self {
        Self {
            anchor,
            max_radius,
            step: DEFAULT_SEARCH_STEP,
            angle_step_deg: DEFAULT_ANGLE_STEP_DEG,
            free_rotation_step_deg: FREE_ROTATION_STEP_DEG,
            margin: JITTER_MARGIN,
            clearance: SPAWN_CLEARANCE,
            mask: LayerMask::default(),
            radius_policy: RadiusPolicy::default(),
        }
    }

    /// Index of the outermost ring within `max_radius`
    fn max_ring(&self) -> usize {
        if !(self.step > 0.0) || !(self.max_radius > 0.0) {
            return 0;
        }
        // Small slack so that e.g. 10.0 / 0.5 lands on ring 20, not 19
        (self.max_radius / self.step + 1e-4).floor() as usize
    }

    /// Ring 0 is probed once: every angle at radius 0 is the anchor itself
    fn angles_in_ring(&self, ring: usize) -> usize {
        if ring == 0 {
            return 1;
        }
        steps_in_circle(self.angle_step_deg)
    }

    fn rotations_for(&self, orientation: &Orientation) -> usize {
        match orientation {
            Orientation::Fixed(_) => 1,
            Orientation::Free { .. } => steps_in_circle(self.free_rotation_step_deg),
        }
    }
}

/// Number of `step_deg` increments starting at 0 that stay below 360
fn steps_in_circle(step_deg: f32) -> usize {
    if !(step_deg > 0.0) {
        return 1;
    }
    ((360.0 / step_deg).ceil() as usize).max(1)
}

/// How one item's placement ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemOutcome {
    Placed(FreeSpot),
    /// No free spot within the max radius; the body was destroyed
    Exhausted,
    /// The factory could not create a body
    NotCreated,
    /// The search was aborted while this item was being placed
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemReport {
    /// Position of the item in the batch
    pub index: usize,
    pub body: Option<BodyId>,
    pub outcome: ItemOutcome,
    /// Overlap probes spent on this item
    pub probes: usize,
}

/// What a single `step()` did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchStep {
    /// A body was created at the neutral location; probing starts next step
    Instantiated { index: usize, body: BodyId },
    /// One candidate was tested
    Probed { index: usize, free: bool },
    /// An item is settled (this step may also have probed)
    ItemDone(ItemReport),
    /// Nothing left to do
    Finished,
}

/// Batch result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub kind: String,
    pub requested: usize,
    pub placed: Vec<(BodyId, FreeSpot)>,
    pub reports: Vec<ItemReport>,
}

impl SearchSummary {
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.requested - self.placed.len()
    }
}

/// The item currently being placed
#[derive(Debug, Clone)]
struct ActiveItem {
    index: usize,
    body: BodyId,
    /// Including the margin
    half_extents: Vec3,
    orientation: Orientation,
    ring: usize,
    angle: usize,
    rotation: usize,
    spots: Vec<FreeSpot>,
    probes: usize,
}

/// Incremental placement of a batch of items of one obstacle kind
#[derive(Debug)]
pub struct PlacementSearch<T> {
    kind: String,
    config: SearchConfig,
    pending: VecDeque<(usize, PlacementItem<T>)>,
    active: Option<ActiveItem>,
    reports: Vec<ItemReport>,
    requested: usize,
    /// Ring the previous item stopped at (used by `RadiusPolicy::CarryForward`)
    carried_ring: usize,
    finished: bool,
}

impl<T> PlacementSearch<T> {
    pub fn new(kind: impl Into<String>, items: Vec<PlacementItem<T>>, config: SearchConfig) -> Self {
        let requested = items.len();
        Self {
            kind: kind.into(),
            config,
            pending: items.into_iter().enumerate().collect(),
            active: None,
            reports: Vec::with_capacity(requested),
            requested,
            carried_ring: 0,
            finished: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Candidate (position, rotation) the active item would probe next
    fn candidate(&self, item: &ActiveItem) -> (Vec3, Quat) {
        let radius = item.ring as f32 * self.config.step;
        let angle = (item.angle as f32 * self.config.angle_step_deg).to_radians();
        let offset = Vec3::new(
            angle.cos() * radius,
            item.half_extents.y + self.config.clearance,
            angle.sin() * radius,
        );
        let rotation = match item.orientation {
            Orientation::Fixed(rotation) => rotation,
            Orientation::Free { .. } => yaw_rotation(item.rotation as f32 * self.config.free_rotation_step_deg),
        };
        (self.config.anchor + offset, rotation)
    }

    /// Box the next probe will test, if an item is being placed
    pub fn current_probe(&self) -> Option<Obb> {
        self.active.as_ref().map(|item| {
            let (center, rotation) = self.candidate(item);
            Obb::new(center, item.half_extents, rotation)
        })
    }

    /// Advance by one step: create the next body, or probe one candidate
    pub fn step<W>(&mut self, world: &mut W, registry: &mut ObstacleRegistry) -> SearchStep
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        if self.finished {
            return SearchStep::Finished;
        }
        match self.active.take() {
            Some(item) => self.probe(item, world, registry),
            None => self.start_next(world, registry),
        }
    }

    fn start_next<W>(&mut self, world: &mut W, registry: &mut ObstacleRegistry) -> SearchStep
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        let Some((index, item)) = self.pending.pop_front() else {
            self.finished = true;
            log::info!(
                "Placement of {} finished: {}/{} placed",
                self.kind,
                self.reports.iter().filter(|r| matches!(r.outcome, ItemOutcome::Placed(_))).count(),
                self.requested
            );
            return SearchStep::Finished;
        };

        let Some(made) = world.instantiate(&item.token) else {
            log::warn!("Could not create {} #{}", self.kind, index);
            return self.report(ItemReport {
                index,
                body: None,
                outcome: ItemOutcome::NotCreated,
                probes: 0,
            });
        };

        registry.add(made.body, self.kind.as_str(), NEUTRAL_SPAWN_POSITION);

        let ring = match self.config.radius_policy {
            RadiusPolicy::ResetPerItem => 0,
            RadiusPolicy::CarryForward => self.carried_ring,
        };
        let active = ActiveItem {
            index,
            body: made.body,
            half_extents: made.half_extents + Vec3::splat(self.config.margin),
            orientation: item.orientation,
            ring,
            angle: 0,
            rotation: 0,
            spots: Vec::new(),
            probes: 0,
        };

        log::debug!(
            "Placing {} #{} body={:?} half_extents={} starting ring={}",
            self.kind,
            index,
            made.body,
            active.half_extents,
            ring
        );

        if ring > self.config.max_ring() {
            // Carried past the limit by an earlier exhausted item
            return self.exhaust(active, world, registry);
        }

        self.active = Some(active);
        SearchStep::Instantiated { index, body: made.body }
    }

    fn probe<W>(&mut self, mut item: ActiveItem, world: &mut W, registry: &mut ObstacleRegistry) -> SearchStep
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        let (position, rotation) = self.candidate(&item);
        let hits = world.overlap(position, item.half_extents, rotation, self.config.mask);
        item.probes += 1;

        let free = hits.is_empty();
        if free {
            let rotation_error = match item.orientation {
                Orientation::Fixed(_) => 0.0,
                Orientation::Free { reference } => rotation_angle_deg(reference, rotation),
            };
            item.spots.push(FreeSpot {
                position,
                rotation,
                rotation_error,
            });
        }

        let index = item.index;

        item.rotation += 1;
        if item.rotation < self.config.rotations_for(&item.orientation) {
            self.active = Some(item);
            return SearchStep::Probed { index, free };
        }
        item.rotation = 0;

        item.angle += 1;
        if item.angle < self.config.angles_in_ring(item.ring) {
            self.active = Some(item);
            return SearchStep::Probed { index, free };
        }
        item.angle = 0;

        // Full ring scanned
        if !item.spots.is_empty() {
            return self.settle(item, world, registry);
        }

        item.ring += 1;
        if item.ring > self.config.max_ring() {
            return self.exhaust(item, world, registry);
        }

        self.active = Some(item);
        SearchStep::Probed { index, free }
    }

    /// Move the body to its best spot
    fn settle<W>(&mut self, item: ActiveItem, world: &mut W, registry: &mut ObstacleRegistry) -> SearchStep
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        let mut best = item.spots[0];
        for spot in &item.spots[1..] {
            if spot.rotation_error < best.rotation_error {
                best = *spot;
            }
        }

        self.carried_ring = item.ring;
        if !registry.set_position(item.body, best.position) {
            // Cleared by the host while its spot was being searched
            log::warn!("{} #{} was removed before it could be placed", self.kind, item.index);
            world.destroy(item.body);
            return self.report(ItemReport {
                index: item.index,
                body: None,
                outcome: ItemOutcome::Aborted,
                probes: item.probes,
            });
        }
        world.set_transform(item.body, best.position, best.rotation);

        log::debug!(
            "Placed {} #{} at {} (ring {}, {} free spots, error {:.1} deg, {} probes)",
            self.kind,
            item.index,
            best.position,
            item.ring,
            item.spots.len(),
            best.rotation_error,
            item.probes
        );

        self.report(ItemReport {
            index: item.index,
            body: Some(item.body),
            outcome: ItemOutcome::Placed(best),
            probes: item.probes,
        })
    }

    /// Give up on an item, destroying its body
    fn exhaust<W>(&mut self, item: ActiveItem, world: &mut W, registry: &mut ObstacleRegistry) -> SearchStep
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        world.destroy(item.body);
        registry.remove(item.body);
        self.carried_ring = item.ring;

        log::warn!(
            "No free spot for {} #{} within {}m of {} ({} probes)",
            self.kind,
            item.index,
            self.config.max_radius,
            self.config.anchor,
            item.probes
        );

        self.report(ItemReport {
            index: item.index,
            body: None,
            outcome: ItemOutcome::Exhausted,
            probes: item.probes,
        })
    }

    fn report(&mut self, report: ItemReport) -> SearchStep {
        self.reports.push(report);
        SearchStep::ItemDone(report)
    }

    /// Drop the item in flight if it is `body`, leaving the rest of the batch running
    pub fn abort_item<W>(&mut self, body: BodyId, world: &mut W, registry: &mut ObstacleRegistry) -> bool
    where
        W: ItemFactory<T>,
    {
        let Some(item) = self.active.take_if(|item| item.body == body) else {
            return false;
        };
        world.destroy(item.body);
        registry.remove(item.body);
        log::info!("{} #{} dropped while being placed", self.kind, item.index);
        self.reports.push(ItemReport {
            index: item.index,
            body: None,
            outcome: ItemOutcome::Aborted,
            probes: item.probes,
        });
        true
    }

    /// Stop searching. Placed items stay; the item in flight is destroyed and
    /// items not yet started are dropped.
    pub fn abort<W>(&mut self, world: &mut W, registry: &mut ObstacleRegistry) -> SearchSummary
    where
        W: ItemFactory<T>,
    {
        if let Some(item) = self.active.take() {
            world.destroy(item.body);
            registry.remove(item.body);
            self.reports.push(ItemReport {
                index: item.index,
                body: None,
                outcome: ItemOutcome::Aborted,
                probes: item.probes,
            });
        }
        if !self.finished {
            log::info!(
                "Placement of {} aborted with {} items not started",
                self.kind,
                self.pending.len()
            );
        }
        self.pending.clear();
        self.finished = true;
        self.summary()
    }

    /// Drive the search to the end in one go
    pub fn run<W>(&mut self, world: &mut W, registry: &mut ObstacleRegistry) -> SearchSummary
    where
        W: PhysicsOracle + ItemFactory<T>,
    {
        while self.step(world, registry) != SearchStep::Finished {}
        self.summary()
    }

    pub fn summary(&self) -> SearchSummary {
        let placed = self
            .reports
            .iter()
            .filter_map(|r| match (r.body, r.outcome) {
                (Some(body), ItemOutcome::Placed(spot)) => Some((body, spot)),
                _ => None,
            })
            .collect();
        SearchSummary {
            kind: self.kind.clone(),
            requested: self.requested,
            placed,
            reports: self.reports.clone(),
        }
    }
}
