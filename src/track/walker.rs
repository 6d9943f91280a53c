//! Walking a distance along the rails
//!
//! Given where the train is and which way it is heading, find the point a
//! given distance ahead, hopping segment to segment through junctions. The
//! walk never guesses: a dead end, an unresolved switch or a malformed
//! segment truncates it and the best known point is returned.

use glam::{Quat, Vec3};

use super::curve::CurveSegment;
use super::graph::{Continuation, SegmentId, TrackGraph, continuation, direction_from_previous};
use crate::consts::{MAX_WALK_HOPS, MIN_DIRECTION_SPEED, MIN_SEGMENT_LENGTH};
use crate::error::WalkError;
use crate::look_rotation;

/// How the walking direction is chosen on the start segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionInput {
    /// true = towards increasing t
    Explicit(bool),
    /// Infer from a velocity; a zero velocity is an error
    Velocity(Vec3),
    /// Infer from a velocity, using `fallback` when it is (nearly) zero
    VelocityOr { velocity: Vec3, fallback: bool },
}

impl DirectionInput {
    /// Resolve to "towards increasing t" on `curve`, with `t` the start parameter
    ///
    /// Velocities are compared against the chord from the t = 0 to the t = 1
    /// point; closed segments (coincident ends) use the local tangent instead.
    pub fn resolve(self, curve: &CurveSegment, t: f32) -> Result<bool, WalkError> {
        let (velocity, fallback) = match self {
            DirectionInput::Explicit(direction) => return Ok(direction),
            DirectionInput::Velocity(velocity) => (velocity, None),
            DirectionInput::VelocityOr { velocity, fallback } => (velocity, Some(fallback)),
        };

        if !(velocity.length() >= MIN_DIRECTION_SPEED) {
            return fallback.ok_or(WalkError::ZeroVelocity);
        }

        let mut reference = (curve.point_at(1.0) - curve.point_at(0.0)).normalize_or_zero();
        if reference == Vec3::ZERO {
            reference = curve.tangent_at(t);
        }
        Ok(velocity.dot(reference) > 0.0)
    }
}

/// Why a walk ended where it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    /// Covered the full distance
    Completed,
    /// Ran out of track
    DeadEnd,
    /// Reached a switch with no usable selection
    Split,
    /// Start or next segment has no usable geometry
    MalformedSegment,
    /// Too many hops (cyclic or pathological graph)
    HopLimit,
}

/// Where a walk ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkResult {
    pub segment: SegmentId,
    /// Normalized parameter on `segment`
    pub t: f32,
    pub position: Vec3,
    /// Looks along the segment's tangent (towards increasing t), up is world up
    pub rotation: Quat,
    /// Travel direction on `segment` when the walk ended (true = increasing t)
    pub direction: bool,
    pub hops: usize,
    pub stop: WalkStop,
}

impl WalkResult {
    fn at(segment: SegmentId, curve: &CurveSegment, t: f32, direction: bool, hops: usize, stop: WalkStop) -> Self {
        Self {
            segment,
            t,
            position: curve.point_at(t),
            rotation: look_rotation(curve.tangent_at(t), Vec3::Y),
            direction,
            hops,
            stop,
        }
    }

    /// Whether the full distance was covered
    pub fn is_complete(&self) -> bool {
        self.stop == WalkStop::Completed
    }

    /// Unit vector pointing the way the walk was travelling
    pub fn heading(&self) -> Vec3 {
        let forward = self.rotation * Vec3::Z;
        if self.direction { forward } else { -forward }
    }
}

/// Walk `distance` along the rails from `start_pos` on `start`
///
/// The start position is snapped to the segment with
/// `CurveSegment::closest_parameter`. Negative distances are treated as zero.
pub fn walk_ahead(
    graph: &TrackGraph,
    start: SegmentId,
    start_pos: Vec3,
    direction: DirectionInput,
    distance: f32,
) -> Result<WalkResult, WalkError> {
    let curve = graph.curve(start).ok_or(WalkError::UnknownSegment(start))?;
    let t0 = curve.closest_parameter(start_pos);
    let mut direction = direction.resolve(curve, t0)?;
    let distance = if distance > 0.0 { distance } else { 0.0 };

    let length = curve.length();
    if !(length >= MIN_SEGMENT_LENGTH) {
        log::warn!("Walk aborted: start segment {:?} has no length", start);
        return Ok(WalkResult::at(start, curve, t0, direction, 0, WalkStop::MalformedSegment));
    }

    let start_arc = t0 * length;
    let mut remaining = distance - if direction { length - start_arc } else { start_arc };

    log::debug!(
        "Walk start segment={:?} length={} at={} direction={} remaining={}",
        start,
        length,
        start_arc,
        direction,
        remaining
    );

    let mut current = start;
    let mut current_curve = curve;
    let mut hops = 0;
    let mut stop = WalkStop::Completed;

    while remaining >= 0.0 {
        if hops >= MAX_WALK_HOPS {
            stop = WalkStop::HopLimit;
            break;
        }

        let next = match continuation(graph, current, direction) {
            Continuation::Next(next) => next,
            Continuation::DeadEnd => {
                stop = WalkStop::DeadEnd;
                break;
            }
            Continuation::Split => {
                stop = WalkStop::Split;
                break;
            }
        };

        let next_curve = match graph.curve(next) {
            Some(c) if c.length() >= MIN_SEGMENT_LENGTH => c,
            _ => {
                stop = WalkStop::MalformedSegment;
                break;
            }
        };

        direction = direction_from_previous(graph, next, current);
        current = next;
        current_curve = next_curve;
        remaining -= next_curve.length();
        hops += 1;

        log::debug!(
            "Walk hop {} -> {:?} length={} direction={} remaining={}",
            hops,
            current,
            next_curve.length(),
            direction,
            remaining
        );
    }

    let length = current_curve.length();
    let span = if direction { length + remaining } else { -remaining };
    let t = span.clamp(0.0, length) / length;

    if stop != WalkStop::Completed {
        log::warn!(
            "Walk truncated ({:?}) on {:?} after {} hops, {} short",
            stop,
            current,
            hops,
            remaining.max(0.0)
        );
    }

    Ok(WalkResult::at(current, current_curve, t, direction, hops, stop))
}

/// Whether `forward` points towards increasing t where `position` sits on `curve`
pub fn is_forward_on_track(curve: &CurveSegment, position: Vec3, forward: Vec3) -> bool {
    let t = curve.closest_parameter(position);
    forward.dot(curve.tangent_at(t)) > 0.0
}
