//! Rail Hazards demo
//!
//! Drives a train down a small rail network with a switch and lets the event
//! director drop obstacles ahead of it. Pass a settings JSON path to override
//! the defaults.

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::collections::HashMap;

    use glam::{Quat, Vec3};

    use rail_hazards::consts::TRAIN_BIG_COLLIDER_LAYER;
    use rail_hazards::placement::BoxWorld;
    use rail_hazards::track::{CurveSegment, DirectionInput, SegmentId, TrackEnd, TrackGraph, WalkStop, walk_ahead};
    use rail_hazards::{
        Biome, DirectorEvent, EventDirector, EventRequest, ObstacleCatalog, Settings, TrainContext, TrainState,
        Variant,
    };

    const FRAME_SECS: f32 = 1.0 / 30.0;
    const TRAIN_SPEED: f32 = 15.0;
    const MAX_SIM_SECS: f32 = 900.0;

    fn network() -> Result<(TrackGraph, SegmentId), rail_hazards::GraphError> {
        let mut graph = TrackGraph::new();
        let main = graph.add_segment("main", CurveSegment::line(Vec3::ZERO, Vec3::new(0.0, 0.0, 3000.0)));
        let west = graph.add_segment(
            "west",
            CurveSegment::cubic_bezier(
                Vec3::new(0.0, 0.0, 3000.0),
                Vec3::new(0.0, 0.0, 3800.0),
                Vec3::new(-800.0, 0.0, 4200.0),
                Vec3::new(-2000.0, 0.0, 4200.0),
            ),
        );
        let east = graph.add_segment(
            "east",
            CurveSegment::polyline(vec![
                Vec3::new(0.0, 0.0, 3000.0),
                Vec3::new(400.0, 0.0, 3800.0),
                Vec3::new(1500.0, 0.0, 4400.0),
            ]),
        );
        let junction = graph.add_junction((main, TrackEnd::Out), &[(west, TrackEnd::In), (east, TrackEnd::In)])?;
        graph.set_switch(junction, Some(1))?;
        Ok((graph, main))
    }

    fn variants() -> HashMap<String, Vec<Variant>> {
        let v = |name: &str, half_extents: Vec3| Variant {
            name: name.to_string(),
            half_extents,
        };
        HashMap::from([
            (
                "rocks".to_string(),
                vec![v("Boulder", Vec3::splat(0.6)), v("Slab", Vec3::new(1.0, 0.3, 0.7))],
            ),
            ("trees".to_string(), vec![v("Pine", Vec3::new(0.3, 3.0, 0.3))]),
            ("fun".to_string(), vec![v("ObstacleRamp", Vec3::new(2.0, 0.8, 3.0))]),
            ("bloodsplat".to_string(), vec![v("Animal", Vec3::new(0.4, 0.6, 0.9))]),
        ])
    }

    fn biome_at(position: Vec3) -> Biome {
        match position.z {
            z if z < 1000.0 => Biome::Meadow,
            z if z < 2500.0 => Biome::Rock,
            _ => Biome::Forest,
        }
    }

    pub fn run() {
        env_logger::init();
        log::info!("Rail Hazards demo starting...");

        let settings = match std::env::args().nth(1) {
            Some(path) => Settings::load_or_default(path),
            None => Settings {
                initial_delay_secs: 10.0,
                min_interval_secs: 30.0,
                max_interval_secs: 60.0,
                ..Settings::default()
            },
        };

        let (graph, start) = match network() {
            Ok(network) => network,
            Err(err) => {
                log::error!("Failed to build track: {err}");
                return;
            }
        };
        let mut director = match EventDirector::new(settings, ObstacleCatalog::builtin()) {
            Ok(director) => director,
            Err(err) => {
                log::error!("{err}");
                return;
            }
        };

        let mut world = BoxWorld::new();
        // A shed right next to the line for placement to steer around
        world.add_box(
            Vec3::new(3.0, 2.0, 820.0),
            Vec3::new(2.0, 2.0, 4.0),
            Quat::IDENTITY,
            TRAIN_BIG_COLLIDER_LAYER,
        );
        let mut source = variants();

        director.request_event(EventRequest {
            distance: Some(300.0),
            ..EventRequest::obstacle("Cows")
        });

        let mut now = 0.0;
        let mut spawned = 0;
        while now < MAX_SIM_SECS {
            let travelled = now * TRAIN_SPEED;
            let Ok(train) = walk_ahead(&graph, start, Vec3::ZERO, DirectionInput::Explicit(true), travelled) else {
                break;
            };

            // Physics owns the bodies; cleanup measures from where they are now
            director
                .registry_mut()
                .sync_positions(|body| world.body(body).map(|b| b.obb.center));

            let mut ctx = TrainContext {
                graph: &graph,
                world: &mut world,
                variants: &mut source,
                train: Some(TrainState {
                    position: train.position,
                    velocity: train.heading() * TRAIN_SPEED,
                    forward: train.heading(),
                    biome: Some(biome_at(train.position)),
                }),
            };

            for event in director.update(now, &mut ctx) {
                match event {
                    DirectorEvent::Started(started) => {
                        log::info!("[{now:>6.1}s] {} x{} heading for {}", started.kind, started.count, started.position)
                    }
                    DirectorEvent::Spawned(done) => {
                        spawned += done.count();
                        log::info!(
                            "[{now:>6.1}s] {} placed {}/{} near {}",
                            done.kind,
                            done.count(),
                            done.requested,
                            done.position
                        );
                    }
                    DirectorEvent::Skipped(reason) => log::info!("[{now:>6.1}s] skipped: {reason}"),
                    DirectorEvent::CleanedUp { removed } => log::info!("[{now:>6.1}s] cleaned up {removed}"),
                }
            }

            if train.stop == WalkStop::DeadEnd {
                log::info!("Train reached the end of the line at {}", train.position);
                break;
            }
            now += FRAME_SECS;
        }

        log::info!(
            "Done after {:.0}s: {} obstacles spawned, {} still on the map, {} probes",
            now,
            spawned,
            director.registry().len(),
            world.probe_count()
        );
        for obstacle in &director.catalog().obstacles {
            let left = director.registry().count_of(&obstacle.kind);
            if left > 0 {
                log::info!("  {}: {}", obstacle.kind, left);
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    demo::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by a host engine; there is no standalone wasm demo
}
