//! Timed obstacle events
//!
//! The director is driven by the host once per frame. It rolls for random
//! events, walks the rails ahead of the train to find where an event goes,
//! builds the batch of bodies to place and feeds the placement search one
//! step per frame. Obstacles left far behind are cleaned up periodically.

use std::collections::{HashMap, VecDeque};

use glam::{Quat, Vec3};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::error::{EventError, SettingsError};
use crate::obstacle::{Biome, Impact, Obstacle, ObstacleCatalog};
use crate::placement::{
    BodyId, Footprint, ItemFactory, Obb, Orientation, PhysicsOracle, PlacementItem, PlacementSearch, SearchConfig,
    SearchStep,
};
use crate::registry::ObstacleRegistry;
use crate::settings::Settings;
use crate::track::{DirectionInput, TrackGraph, WalkStop, is_forward_on_track, walk_ahead};
use crate::yaw_rotation;

/// One visual/physical variant of an obstacle (a prefab in an asset bundle)
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    /// Half-extents at scale 1
    pub half_extents: Vec3,
}

/// Loads the variants stored in an asset bundle
pub trait VariantSource {
    fn load(&mut self, bundle: &str) -> Vec<Variant>;
}

impl VariantSource for HashMap<String, Vec<Variant>> {
    fn load(&mut self, bundle: &str) -> Vec<Variant> {
        self.get(bundle).cloned().unwrap_or_default()
    }
}

/// Variants already loaded, by bundle name
#[derive(Debug, Clone, Default)]
pub struct VariantCache {
    bundles: HashMap<String, Vec<Variant>>,
}

impl VariantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variants of `bundle`, loading them on first use
    ///
    /// Empty loads are not cached so a bundle that shows up later is picked up.
    pub fn get_or_load<V: VariantSource>(&mut self, bundle: &str, source: &mut V) -> &[Variant] {
        if !self.bundles.contains_key(bundle) {
            let variants = source.load(bundle);
            if variants.is_empty() {
                log::warn!("Bundle '{}' has no variants", bundle);
                return &[];
            }
            log::debug!("Loaded {} variants from bundle '{}'", variants.len(), bundle);
            self.bundles.insert(bundle.to_string(), variants);
        }
        self.bundles.get(bundle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Everything the host's factory needs to build one obstacle body
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnToken {
    pub kind: String,
    pub variant: String,
    pub scale: Vec3,
    pub mass: f32,
    /// Scaled half-extents
    pub half_extents: Vec3,
}

impl Footprint for SpawnToken {
    fn half_extents(&self) -> Vec3 {
        self.half_extents
    }
}

/// The train as the host sees it this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Where the car's nose points
    pub forward: Vec3,
    pub biome: Option<Biome>,
}

/// Host collaborators for one `update`
pub struct TrainContext<'a, W, V> {
    pub graph: &'a TrackGraph,
    pub world: &'a mut W,
    pub variants: &'a mut V,
    /// `None` while the player is not on a train
    pub train: Option<TrainState>,
}

/// Ask for a specific event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRequest {
    /// Obstacle type; random when `None`
    pub kind: Option<String>,
    /// Biome to pick for; the train's biome when `None`
    pub biome: Option<Biome>,
    /// Metres ahead; the configured spawn distance when `None`
    pub distance: Option<f32>,
    /// Spawn behind instead of ahead
    pub flip_direction: bool,
    pub ignore_nearby: bool,
    pub ignore_biome: bool,
    /// Also consider obstacles kept out of the random pool
    pub everything_in_pool: bool,
}

impl EventRequest {
    /// Request a specific obstacle type, anywhere
    pub fn obstacle(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ignore_biome: true,
            everything_in_pool: true,
            ..Self::default()
        }
    }
}

/// An event whose placement search has begun
#[derive(Debug, Clone, PartialEq)]
pub struct StartedEvent {
    pub kind: String,
    pub count: usize,
    pub position: Vec3,
    /// Why the walk ahead stopped (anything but `Completed` means it fell short)
    pub walk_stop: WalkStop,
}

/// A finished event
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedEvent {
    pub kind: String,
    /// Requested distance ahead of the train
    pub distance: f32,
    pub requested: usize,
    pub bodies: Vec<BodyId>,
    /// Anchor of the placement search
    pub position: Vec3,
    /// Track rotation at the anchor
    pub rotation: Quat,
}

impl SpawnedEvent {
    pub fn count(&self) -> usize {
        self.bodies.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectorEvent {
    Started(StartedEvent),
    Spawned(SpawnedEvent),
    Skipped(EventError),
    CleanedUp { removed: usize },
}

#[derive(Debug)]
struct ActiveEvent {
    search: PlacementSearch<SpawnToken>,
    distance: f32,
    rotation: Quat,
}

/// Schedules obstacle events and owns everything they spawn
#[derive(Debug)]
pub struct EventDirector {
    settings: Settings,
    catalog: ObstacleCatalog,
    registry: ObstacleRegistry,
    variants: VariantCache,
    rng: Pcg32,
    active: Option<ActiveEvent>,
    requests: VecDeque<EventRequest>,
    started: bool,
    next_check: f32,
    next_eligible: f32,
    next_cleanup: f32,
}

impl EventDirector {
    pub fn new(settings: Settings, catalog: ObstacleCatalog) -> Result<Self, SettingsError> {
        settings.validate()?;
        let rng = Pcg32::seed_from_u64(settings.seed);
        Ok(Self {
            settings,
            catalog,
            registry: ObstacleRegistry::new(),
            variants: VariantCache::new(),
            rng,
            active: None,
            requests: VecDeque::new(),
            started: false,
            next_check: 0.0,
            next_eligible: 0.0,
            next_cleanup: 0.0,
        })
    }

    /// Arm the timers; called by the first `update` if not called explicitly
    pub fn start(&mut self, now: f32) {
        log::info!("Event director starting at t={now}");
        self.next_check = now + self.settings.check_interval_secs;
        self.next_eligible = now + self.settings.initial_delay_secs;
        self.next_cleanup = now + self.settings.cleanup_interval_secs;
        self.started = true;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &ObstacleCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ObstacleRegistry {
        &self.registry
    }

    /// Host access for syncing positions after physics moved bodies
    pub fn registry_mut(&mut self) -> &mut ObstacleRegistry {
        &mut self.registry
    }

    pub fn is_searching(&self) -> bool {
        self.active.is_some()
    }

    /// Box being probed right now (for debug drawing)
    pub fn current_probe(&self) -> Option<Obb> {
        self.active.as_ref().and_then(|a| a.search.current_probe())
    }

    /// Queue an event; it starts on a later `update` once no search is running
    pub fn request_event(&mut self, request: EventRequest) {
        log::info!("Event requested: {:?}", request);
        self.requests.push_back(request);
    }

    /// Advance by one host frame
    pub fn update<W, V>(&mut self, now: f32, ctx: &mut TrainContext<'_, W, V>) -> Vec<DirectorEvent>
    where
        W: PhysicsOracle + ItemFactory<SpawnToken>,
        V: VariantSource,
    {
        if !self.started {
            self.start(now);
        }
        let mut events = Vec::new();

        if now >= self.next_cleanup {
            // Bodies of a running search wait at the neutral location and would be swept
            if self.active.is_none() {
                self.next_cleanup = now + self.settings.cleanup_interval_secs;
                if let Some(train) = ctx.train {
                    let removed = self.registry.cleanup_far_from(train.position, self.settings.cleanup_distance);
                    for body in &removed {
                        ctx.world.destroy(*body);
                    }
                    if !removed.is_empty() {
                        events.push(DirectorEvent::CleanedUp { removed: removed.len() });
                    }
                }
            } else {
                log::debug!("Cleanup postponed while placing");
            }
        }

        if let Some(active) = self.active.as_mut() {
            if active.search.step(ctx.world, &mut self.registry) == SearchStep::Finished {
                if let Some(done) = self.active.take() {
                    events.push(DirectorEvent::Spawned(self.finish(done)));
                }
            }
            return events;
        }

        if let Some(request) = self.requests.pop_front() {
            events.push(self.emit_reported(&request, ctx));
            return events;
        }

        if now < self.next_check {
            return events;
        }
        self.next_check = now + self.settings.check_interval_secs;

        if now < self.next_eligible || !self.settings.random_events {
            return events;
        }
        if self.rng.random::<f32>() >= self.settings.random_chance {
            return events;
        }

        log::info!("Emitting random event at t={now}");
        events.push(self.emit_reported(&EventRequest::default(), ctx));
        self.next_eligible = now + self.random_interval();
        log::debug!("Next random event eligible at t={}", self.next_eligible);

        events
    }

    fn random_interval(&mut self) -> f32 {
        let (min, max) = (self.settings.min_interval_secs, self.settings.max_interval_secs);
        if max > min { self.rng.random_range(min..=max) } else { min }
    }

    fn emit_reported<W, V>(&mut self, request: &EventRequest, ctx: &mut TrainContext<'_, W, V>) -> DirectorEvent
    where
        W: PhysicsOracle + ItemFactory<SpawnToken>,
        V: VariantSource,
    {
        match self.emit_event(request, ctx) {
            Ok(started) => DirectorEvent::Started(started),
            Err(err) => {
                log::info!("Event skipped: {err}");
                DirectorEvent::Skipped(err)
            }
        }
    }

    /// Start an event right now
    pub fn emit_event<W, V>(
        &mut self,
        request: &EventRequest,
        ctx: &mut TrainContext<'_, W, V>,
    ) -> Result<StartedEvent, EventError>
    where
        W: PhysicsOracle + ItemFactory<SpawnToken>,
        V: VariantSource,
    {
        if self.active.is_some() {
            return Err(EventError::Busy);
        }
        let train = ctx.train.ok_or(EventError::NoTrain)?;

        let on_track = ctx.graph.closest_segment(train.position).ok_or(EventError::NoTrack)?;
        let curve = ctx.graph.curve(on_track.segment).ok_or(EventError::NoTrack)?;

        let facing_forward = is_forward_on_track(curve, train.position, train.forward);
        let (velocity, fallback) = if request.flip_direction {
            (-train.velocity, !facing_forward)
        } else {
            (train.velocity, facing_forward)
        };
        let distance = request.distance.unwrap_or(self.settings.spawn_distance);

        let walk = walk_ahead(
            ctx.graph,
            on_track.segment,
            train.position,
            DirectionInput::VelocityOr { velocity, fallback },
            distance,
        )?;

        log::debug!(
            "Train at {} on {:?}, event point {} on {:?} ({:?})",
            train.position,
            on_track.segment,
            walk.position,
            walk.segment,
            walk.stop
        );

        if !request.ignore_nearby && self.registry.is_near(walk.position, self.settings.nearby_threshold) {
            return Err(EventError::TooClose {
                threshold: self.settings.nearby_threshold,
            });
        }

        let obstacle = self.pick_obstacle(request, train.biome)?.clone();
        let items = self.build_items(&obstacle, walk.rotation, ctx.variants)?;

        let mut config = SearchConfig::new(walk.position, obstacle.search_radius(self.settings.default_max_radius));
        config.step = self.settings.search_step;
        config.angle_step_deg = self.settings.search_angle_step_deg;
        config.radius_policy = self.settings.radius_policy;

        let started = StartedEvent {
            kind: obstacle.kind.clone(),
            count: items.len(),
            position: walk.position,
            walk_stop: walk.stop,
        };
        log::info!(
            "Spawning {} x{} at {} ({}m ahead)",
            started.kind,
            started.count,
            started.position,
            distance
        );

        self.active = Some(ActiveEvent {
            search: PlacementSearch::new(obstacle.kind, items, config),
            distance,
            rotation: walk.rotation,
        });
        Ok(started)
    }

    fn pick_obstacle(&mut self, request: &EventRequest, train_biome: Option<Biome>) -> Result<&Obstacle, EventError> {
        if let Some(kind) = &request.kind {
            return self
                .catalog
                .get(kind)
                .ok_or_else(|| EventError::UnknownObstacle(kind.clone()));
        }

        let biome = if request.ignore_biome {
            None
        } else {
            request.biome.or(train_biome)
        };
        self.catalog
            .choose(&mut self.rng, biome, request.everything_in_pool)
            .ok_or(EventError::NoEligibleObstacle)
    }

    fn build_items<V: VariantSource>(
        &mut self,
        obstacle: &Obstacle,
        track_rotation: Quat,
        source: &mut V,
    ) -> Result<Vec<PlacementItem<SpawnToken>>, EventError> {
        let variants: Vec<Variant> = {
            let all = self.variants.get_or_load(&obstacle.asset_bundle, source);
            match &obstacle.prefab {
                Some(prefab) => all.iter().filter(|v| &v.name == prefab).cloned().collect(),
                None => all.to_vec(),
            }
        };
        if variants.is_empty() {
            return Err(EventError::NoVariants(obstacle.kind.clone()));
        }

        let count = obstacle.random_count(&mut self.rng);
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(variant) = variants.choose(&mut self.rng) else {
                break;
            };
            let scale = obstacle.random_scale(&mut self.rng);
            let mass = obstacle.random_mass(&mut self.rng);

            let desired = obstacle.desired_rotation(track_rotation);
            let orientation = if obstacle.free_orientation {
                Orientation::Free {
                    reference: desired.unwrap_or(track_rotation),
                }
            } else {
                let rotation = match desired {
                    Some(rotation) => rotation,
                    None => yaw_rotation(self.rng.random_range(0.0..360.0)),
                };
                Orientation::Fixed(rotation)
            };

            items.push(PlacementItem {
                token: SpawnToken {
                    kind: obstacle.kind.clone(),
                    variant: variant.name.clone(),
                    scale,
                    mass,
                    half_extents: variant.half_extents * scale,
                },
                orientation,
            });
        }
        Ok(items)
    }

    fn finish(&mut self, done: ActiveEvent) -> SpawnedEvent {
        let summary = done.search.summary();
        let bodies: Vec<BodyId> = summary.placed.iter().map(|(body, _)| *body).collect();

        if summary.failed_count() > 0 {
            log::warn!(
                "{}: placed {} of {} ({} failed)",
                summary.kind,
                bodies.len(),
                summary.requested,
                summary.failed_count()
            );
        }
        if let Some(obstacle) = self.catalog.get(&summary.kind) {
            for body in &bodies {
                log::debug!("Spawned '{}'", obstacle.label(body.0));
            }
        }

        SpawnedEvent {
            kind: summary.kind.clone(),
            distance: done.distance,
            requested: summary.requested,
            bodies,
            position: done.search.config().anchor,
            rotation: done.rotation,
        }
    }

    /// What hitting `body` with `impulse` does, if it is one of ours
    pub fn evaluate_impact(&self, body: BodyId, impulse: f32) -> Option<Impact> {
        let entry = self.registry.get(body)?;
        let obstacle = self.catalog.get(&entry.kind)?;
        Some(obstacle.evaluate_impact(impulse))
    }

    /// Remove one obstacle
    pub fn clear_obstacle<W: ItemFactory<SpawnToken>>(&mut self, world: &mut W, body: BodyId) -> bool {
        if let Some(active) = self.active.as_mut() {
            if active.search.abort_item(body, world, &mut self.registry) {
                return true;
            }
        }
        if self.registry.remove(body).is_none() {
            return false;
        }
        world.destroy(body);
        true
    }

    /// Abort any running search and remove every obstacle
    pub fn clear_all<W: ItemFactory<SpawnToken>>(&mut self, world: &mut W) -> usize {
        if let Some(mut active) = self.active.take() {
            active.search.abort(world, &mut self.registry);
        }
        self.requests.clear();

        let bodies = self.registry.clear();
        for body in &bodies {
            world.destroy(*body);
        }
        log::info!("Cleared {} obstacles", bodies.len());
        bodies.len()
    }
}
