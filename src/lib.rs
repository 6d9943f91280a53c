//! Rail Hazards - obstacle spawning along a branching rail network
//!
//! Core modules:
//! - `track`: Curve sampling, junction-aware graph traversal, walking ahead of a train
//! - `placement`: Collision-free, ring-by-ring placement search (one probe per tick)
//! - `registry`: Live obstacle bookkeeping and distance-based cleanup
//! - `obstacle`: Obstacle catalog and impact evaluation
//! - `director`: Timed random events that tie the pieces together
//! - `settings`: Data-driven configuration

pub mod director;
pub mod error;
pub mod obstacle;
pub mod placement;
pub mod registry;
pub mod settings;
pub mod track;

pub use director::{
    DirectorEvent, EventDirector, EventRequest, SpawnToken, SpawnedEvent, StartedEvent, TrainContext, TrainState,
    Variant, VariantCache, VariantSource,
};
pub use error::{EventError, GraphError, SettingsError, WalkError};
pub use obstacle::{Biome, Obstacle, ObstacleCatalog};
pub use registry::ObstacleRegistry;
pub use settings::{RadiusPolicy, Settings};

use glam::{EulerRot, Mat3, Quat, Vec3};

/// Tuning constants shared by the subsystems
pub mod consts {
    use glam::Vec3;

    /// Collision layer obstacles live on (the layer trains collide with)
    pub const TRAIN_BIG_COLLIDER_LAYER: u32 = 10;

    /// Closest-parameter sampling: samples per unit of curve length
    pub const CLOSEST_T_SAMPLES_PER_UNIT: f32 = 10.0;
    /// Closest-parameter sampling bounds
    pub const CLOSEST_T_MIN_SAMPLES: usize = 50;
    pub const CLOSEST_T_MAX_SAMPLES: usize = 2000;

    /// Segments shorter than this are treated as malformed
    pub const MIN_SEGMENT_LENGTH: f32 = 1e-4;
    /// Upper bound on junction hops per walk (guards cyclic graphs)
    pub const MAX_WALK_HOPS: usize = 32;
    /// Velocities slower than this cannot infer a walking direction
    pub const MIN_DIRECTION_SPEED: f32 = 0.01;

    /// Radial expansion step of the placement spiral
    pub const DEFAULT_SEARCH_STEP: f32 = 0.5;
    /// Angular step between candidates on one ring (degrees)
    pub const DEFAULT_ANGLE_STEP_DEG: f32 = 30.0;
    /// Yaw step for free-orientation items (degrees)
    pub const FREE_ROTATION_STEP_DEG: f32 = 10.0;
    /// Extra margin added to every half-extent before probing
    pub const JITTER_MARGIN: f32 = 0.5;
    /// Gap left between the ground and the bottom of a probe box
    pub const SPAWN_CLEARANCE: f32 = 0.1;
    /// Where bodies wait while their spot is being searched
    pub const NEUTRAL_SPAWN_POSITION: Vec3 = Vec3::new(0.0, -10_000.0, 0.0);
    /// Fallback search radius when an obstacle does not define one
    pub const DEFAULT_MAX_RADIUS: f32 = 10.0;

    /// Seconds between distance-based cleanups
    pub const CLEANUP_INTERVAL_SECS: f32 = 30.0;
}

/// Rotation whose local +Z points along `forward`, keeping local +Y as close to `up` as possible
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let right = up.cross(forward);
    if right.length_squared() < 1e-8 {
        // Looking straight up/down - any roll is as good as another
        return Quat::from_rotation_arc(Vec3::Z, forward);
    }
    let right = right.normalize();
    let up = forward.cross(right);

    Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize()
}

/// Rotation of `degrees` around the world up axis
#[inline]
pub fn yaw_rotation(degrees: f32) -> Quat {
    Quat::from_rotation_y(degrees.to_radians())
}

/// Angular distance between two rotations in degrees, in [0, 180]
#[inline]
pub fn rotation_angle_deg(a: Quat, b: Quat) -> f32 {
    a.angle_between(b).to_degrees()
}

/// Rotation from euler angles in degrees, applied Z then X then Y
#[inline]
pub fn euler_degrees(angles: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        angles.y.to_radians(),
        angles.x.to_radians(),
        angles.z.to_radians(),
    )
}
