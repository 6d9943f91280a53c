//! End-to-end event flow: director, walker, placement and registry together

use std::collections::HashMap;

use glam::Vec3;

use rail_hazards::placement::{BodyId, BoxWorld};
use rail_hazards::track::{CurveSegment, TrackGraph};
use rail_hazards::{
    Biome, DirectorEvent, EventDirector, EventError, EventRequest, Obstacle, ObstacleCatalog, Settings, SpawnedEvent,
    TrainContext, TrainState, Variant,
};

fn track() -> TrackGraph {
    let mut graph = TrackGraph::new();
    graph.add_segment("main", CurveSegment::line(Vec3::ZERO, Vec3::new(0.0, 0.0, 5000.0)));
    graph
}

fn catalog() -> ObstacleCatalog {
    let mut catalog = ObstacleCatalog::builtin();
    catalog.obstacles.push(Obstacle {
        kind: "Crates".to_string(),
        asset_bundle: "crates".to_string(),
        in_pool: false,
        min_count: 4,
        max_count: 4,
        max_radius: Some(10.0),
        ..Obstacle::default()
    });
    catalog
}

fn variants() -> HashMap<String, Vec<Variant>> {
    HashMap::from([
        (
            "crates".to_string(),
            vec![Variant {
                name: "Crate".to_string(),
                half_extents: Vec3::splat(0.5),
            }],
        ),
        (
            "bloodsplat".to_string(),
            vec![Variant {
                name: "Cow".to_string(),
                half_extents: Vec3::new(0.4, 0.7, 1.0),
            }],
        ),
    ])
}

fn train_at(z: f32, biome: Biome) -> TrainState {
    TrainState {
        position: Vec3::new(0.0, 0.0, z),
        velocity: Vec3::new(0.0, 0.0, 12.0),
        forward: Vec3::Z,
        biome: Some(biome),
    }
}

fn quiet_settings() -> Settings {
    Settings {
        random_events: false,
        seed: 3,
        ..Settings::default()
    }
}

struct Harness {
    graph: TrackGraph,
    world: BoxWorld,
    source: HashMap<String, Vec<Variant>>,
    director: EventDirector,
}

impl Harness {
    fn new(settings: Settings) -> Self {
        Self {
            graph: track(),
            world: BoxWorld::new(),
            source: variants(),
            director: EventDirector::new(settings, catalog()).unwrap(),
        }
    }

    fn tick(&mut self, now: f32, train: TrainState) -> Vec<DirectorEvent> {
        let mut ctx = TrainContext {
            graph: &self.graph,
            world: &mut self.world,
            variants: &mut self.source,
            train: Some(train),
        };
        self.director.update(now, &mut ctx)
    }

    /// Tick (with time standing still) until the running event finishes
    fn run_until_spawned(&mut self, now: f32, train: TrainState) -> SpawnedEvent {
        for _ in 0..10_000 {
            for event in self.tick(now, train) {
                if let DirectorEvent::Spawned(spawned) = event {
                    return spawned;
                }
            }
        }
        panic!("event never finished");
    }
}

#[test]
fn test_requested_event_places_cluster_ahead() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    let events = h.tick(0.0, train);
    let started = match events.as_slice() {
        [DirectorEvent::Started(started)] => started.clone(),
        other => panic!("expected a started event, got {other:?}"),
    };
    assert_eq!(started.kind, "Crates");
    assert_eq!(started.count, 4);
    assert!((started.position - Vec3::new(0.0, 0.0, 600.0)).length() < 0.5);

    let spawned = h.run_until_spawned(0.0, train);
    assert_eq!(spawned.kind, "Crates");
    assert_eq!(spawned.requested, 4);
    assert_eq!(spawned.count(), 4);
    assert_eq!(spawned.distance, 500.0);
    assert!(!h.director.is_searching());
    assert!(h.director.current_probe().is_none());

    assert_eq!(h.director.registry().len(), 4);
    assert_eq!(h.world.len(), 4);

    for body in &spawned.bodies {
        let placed = h.world.body(*body).unwrap();
        let entry = h.director.registry().get(*body).unwrap();
        assert_eq!(entry.kind, "Crates");
        assert!((entry.position - placed.obb.center).length() < 1e-4);

        let horizontal = Vec3::new(placed.obb.center.x, 0.0, placed.obb.center.z) - started.position;
        assert!(horizontal.length() <= 10.0 + 1e-3);
        assert!(placed.obb.center.y > 0.0);
    }

    for (i, a) in spawned.bodies.iter().enumerate() {
        for b in &spawned.bodies[i + 1..] {
            let a = h.world.body(*a).unwrap();
            let b = h.world.body(*b).unwrap();
            assert!(!a.obb.overlaps(&b.obb));
        }
    }
}

#[test]
fn test_second_event_too_close_is_skipped() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);
    h.run_until_spawned(0.0, train);

    h.director.request_event(EventRequest::obstacle("Crates"));
    let events = h.tick(0.0, train);
    assert_eq!(
        events,
        vec![DirectorEvent::Skipped(EventError::TooClose { threshold: 100.0 })]
    );
    assert_eq!(h.director.registry().len(), 4);
}

#[test]
fn test_random_event_waits_for_initial_delay() {
    let settings = Settings {
        random_chance: 1.0,
        initial_delay_secs: 5.0,
        check_interval_secs: 1.0,
        min_interval_secs: 100.0,
        max_interval_secs: 100.0,
        ..Settings::default()
    };
    let mut h = Harness::new(settings);
    let train = train_at(100.0, Biome::Field);

    for second in 0..5 {
        assert!(h.tick(second as f32, train).is_empty(), "event at {second}s");
    }

    let events = h.tick(5.0, train);
    match events.as_slice() {
        [DirectorEvent::Started(started)] => assert_eq!(started.kind, "Cows"),
        other => panic!("expected cows, got {other:?}"),
    }
    let spawned = h.run_until_spawned(5.0, train);
    assert!(spawned.count() >= 1);

    // Next one is not eligible until t=105
    for second in 6..100 {
        let events = h.tick(second as f32, train);
        assert!(!events.iter().any(|e| matches!(e, DirectorEvent::Started(_))));
    }
}

#[test]
fn test_random_events_disabled() {
    let settings = Settings {
        random_events: false,
        random_chance: 1.0,
        initial_delay_secs: 0.0,
        ..Settings::default()
    };
    let mut h = Harness::new(settings);
    let train = train_at(100.0, Biome::Rock);

    for second in 0..60 {
        assert!(h.tick(second as f32, train).is_empty());
    }
    assert!(h.director.registry().is_empty());
}

#[test]
fn test_cleanup_removes_obstacles_left_behind() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);
    h.run_until_spawned(0.0, train);
    assert_eq!(h.world.len(), 4);

    // Close enough: cleanup runs but keeps everything
    assert!(h.tick(31.0, train_at(1500.0, Biome::Rock)).is_empty());
    assert_eq!(h.director.registry().len(), 4);

    // Next cleanup is due at t=61
    assert!(h.tick(45.0, train_at(3000.0, Biome::Rock)).is_empty());

    let events = h.tick(61.0, train_at(3000.0, Biome::Rock));
    assert_eq!(events, vec![DirectorEvent::CleanedUp { removed: 4 }]);
    assert!(h.director.registry().is_empty());
    assert!(h.world.is_empty());
}

#[test]
fn test_cleanup_waits_for_running_search() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);

    // Cleanup is due and the train is far away, but bodies are still being placed
    let far = train_at(4000.0, Biome::Rock);
    let events = h.tick(40.0, far);
    assert!(!events.iter().any(|e| matches!(e, DirectorEvent::CleanedUp { .. })));
    assert!(h.director.is_searching());

    h.run_until_spawned(40.0, far);
    assert_eq!(h.director.registry().len(), 4);

    let events = h.tick(40.0, far);
    assert_eq!(events, vec![DirectorEvent::CleanedUp { removed: 4 }]);
    assert!(h.world.is_empty());
}

#[test]
fn test_clear_all_aborts_search() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);
    for _ in 0..3 {
        h.tick(0.0, train);
    }
    assert!(h.director.is_searching());
    assert!(!h.world.is_empty());

    h.director.clear_all(&mut h.world);
    assert!(!h.director.is_searching());
    assert!(h.director.registry().is_empty());
    assert!(h.world.is_empty());

    // Nothing left running, so the next tick is quiet
    assert!(h.tick(0.0, train).is_empty());
}

#[test]
fn test_clear_single_obstacle_and_impacts() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);
    let spawned = h.run_until_spawned(0.0, train);

    let first = spawned.bodies[0];
    let impact = h.director.evaluate_impact(first, 200_000.0).unwrap();
    assert!(impact.derail);
    assert!(!impact.explode);

    assert!(h.director.clear_obstacle(&mut h.world, first));
    assert!(!h.director.clear_obstacle(&mut h.world, first));
    assert!(!h.director.clear_obstacle(&mut h.world, BodyId(12345)));
    assert_eq!(h.director.registry().len(), 3);
    assert_eq!(h.world.len(), 3);
    assert!(h.director.evaluate_impact(first, 200_000.0).is_none());
}

#[test]
fn test_clearing_body_being_placed_drops_it() {
    let mut h = Harness::new(quiet_settings());
    let train = train_at(100.0, Biome::Rock);

    h.director.request_event(EventRequest::obstacle("Crates"));
    h.tick(0.0, train);
    let events = h.tick(0.0, train);
    assert!(events.is_empty());
    assert!(h.director.is_searching());

    // The only body in the world is the first crate, still waiting for its spot
    let in_flight = h.world.bodies().next().map(|(id, _)| id).unwrap();
    assert!(h.director.registry().contains(in_flight));
    assert!(h.director.clear_obstacle(&mut h.world, in_flight));
    assert!(!h.director.clear_obstacle(&mut h.world, in_flight));

    let spawned = h.run_until_spawned(0.0, train);
    assert_eq!(spawned.requested, 4);
    assert_eq!(spawned.count(), 3);
    assert!(!spawned.bodies.contains(&in_flight));
    for body in &spawned.bodies {
        assert!(h.world.body(*body).is_some());
        assert!(h.director.registry().contains(*body));
    }
    assert_eq!(h.world.len(), 3);
    assert_eq!(h.director.registry().len(), 3);
}

#[test]
fn test_no_train_skips_request() {
    let mut h = Harness::new(quiet_settings());
    h.director.request_event(EventRequest::default());

    let mut ctx = TrainContext {
        graph: &h.graph,
        world: &mut h.world,
        variants: &mut h.source,
        train: None,
    };
    let events = h.director.update(0.0, &mut ctx);
    assert_eq!(events, vec![DirectorEvent::Skipped(EventError::NoTrain)]);
}
