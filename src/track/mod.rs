//! Track-following spatial reasoning
//!
//! Curves are sampled, the graph resolves continuations through junctions,
//! and the walker turns "this far ahead of the train" into a point on the rails.

pub mod curve;
pub mod graph;
pub mod walker;

pub use curve::{CurveSegment, CurveShape};
pub use graph::{
    Continuation, EndLink, Junction, JunctionId, Segment, SegmentId, TrackEnd, TrackGraph,
    TrackPoint, continuation, direction_from_previous, is_out_branch, next_segment, out_branches,
};
pub use walker::{DirectionInput, WalkResult, WalkStop, is_forward_on_track, walk_ahead};
