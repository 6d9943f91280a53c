//! Rail network: segments joined end-to-end directly or through junctions
//!
//! Graph nodes are plain data addressed by index; traversal is a set of free
//! functions over `(&TrackGraph, SegmentId)`. Junction switch state is live
//! and read on every call, never cached by a traversal.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::curve::CurveSegment;
use crate::error::GraphError;

/// Index of a segment in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u32);

/// Index of a junction in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionId(pub u32);

/// One end of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackEnd {
    /// The t = 0 end
    In,
    /// The t = 1 end
    Out,
}

/// What a segment end is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndLink {
    /// Buffer stop / unconnected
    #[default]
    Open,
    /// Exactly one neighbouring segment, no switch
    Direct(SegmentId),
    /// A switch; which side continues depends on live selection
    Junction(JunctionId),
}

/// A rail piece and what its two ends connect to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub curve: CurveSegment,
    #[serde(default)]
    pub in_link: EndLink,
    #[serde(default)]
    pub out_link: EndLink,
}

impl Segment {
    pub fn link(&self, end: TrackEnd) -> EndLink {
        match end {
            TrackEnd::In => self.in_link,
            TrackEnd::Out => self.out_link,
        }
    }

    fn link_mut(&mut self, end: TrackEnd) -> &mut EndLink {
        match end {
            TrackEnd::In => &mut self.in_link,
            TrackEnd::Out => &mut self.out_link,
        }
    }
}

/// A switch joining one "in" branch to several "out" branches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Junction {
    in_branch: SegmentId,
    out_branches: Vec<SegmentId>,
    /// Currently thrown branch; `None` while the switch is unresolved
    selected: Option<usize>,
}

impl Junction {
    pub fn in_branch(&self) -> SegmentId {
        self.in_branch
    }

    pub fn out_branches(&self) -> &[SegmentId] {
        &self.out_branches
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Segment the switch currently routes the in branch to
    pub fn selected_branch(&self) -> Option<SegmentId> {
        self.selected.and_then(|i| self.out_branches.get(i).copied())
    }
}

/// Result of asking which segment follows the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Next(SegmentId),
    /// Nothing attached in that direction
    DeadEnd,
    /// A junction with no usable selection: more than one way on
    Split,
}

impl Continuation {
    pub fn next(self) -> Option<SegmentId> {
        match self {
            Continuation::Next(id) => Some(id),
            Continuation::DeadEnd | Continuation::Split => None,
        }
    }
}

/// Closest point on the network to some world position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub segment: SegmentId,
    pub t: f32,
    pub position: Vec3,
    pub distance: f32,
}

/// Read-only snapshot of a rail network (apart from switch state)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackGraph {
    segments: Vec<Segment>,
    junctions: Vec<Junction>,
}

impl TrackGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, name: impl Into<String>, curve: CurveSegment) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(Segment {
            name: name.into(),
            curve,
            in_link: EndLink::Open,
            out_link: EndLink::Open,
        });
        id
    }

    /// Connect two segment ends with a plain (switchless) link
    pub fn link_direct(
        &mut self,
        a: SegmentId,
        a_end: TrackEnd,
        b: SegmentId,
        b_end: TrackEnd,
    ) -> Result<(), GraphError> {
        self.segment(b).ok_or(GraphError::UnknownSegment(b))?;
        *self.segment_mut(a)?.link_mut(a_end) = EndLink::Direct(b);
        *self.segment_mut(b)?.link_mut(b_end) = EndLink::Direct(a);
        Ok(())
    }

    /// Create a switch. The first out branch starts selected.
    pub fn add_junction(
        &mut self,
        in_branch: (SegmentId, TrackEnd),
        out_branches: &[(SegmentId, TrackEnd)],
    ) -> Result<JunctionId, GraphError> {
        if out_branches.is_empty() {
            return Err(GraphError::NoOutBranches);
        }
        for &(seg, _) in std::iter::once(&in_branch).chain(out_branches) {
            self.segment(seg).ok_or(GraphError::UnknownSegment(seg))?;
        }

        let id = JunctionId(self.junctions.len() as u32);
        self.junctions.push(Junction {
            in_branch: in_branch.0,
            out_branches: out_branches.iter().map(|&(seg, _)| seg).collect(),
            selected: Some(0),
        });

        for &(seg, end) in std::iter::once(&in_branch).chain(out_branches) {
            *self.segment_mut(seg)?.link_mut(end) = EndLink::Junction(id);
        }
        Ok(id)
    }

    /// Throw a switch; `None` leaves it unresolved
    pub fn set_switch(&mut self, junction: JunctionId, branch: Option<usize>) -> Result<(), GraphError> {
        let j = self
            .junctions
            .get_mut(junction.0 as usize)
            .ok_or(GraphError::UnknownJunction(junction))?;
        if let Some(requested) = branch {
            if requested >= j.out_branches.len() {
                return Err(GraphError::BranchOutOfRange {
                    junction,
                    branches: j.out_branches.len(),
                    requested,
                });
            }
        }
        j.selected = branch;
        Ok(())
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0 as usize)
    }

    fn segment_mut(&mut self, id: SegmentId) -> Result<&mut Segment, GraphError> {
        self.segments
            .get_mut(id.0 as usize)
            .ok_or(GraphError::UnknownSegment(id))
    }

    pub fn curve(&self, id: SegmentId) -> Option<&CurveSegment> {
        self.segment(id).map(|s| &s.curve)
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id.0 as usize)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        (0..self.segments.len() as u32).map(SegmentId)
    }

    /// Nearest point on any segment (sampled, see `CurveSegment::closest_parameter`)
    pub fn closest_segment(&self, world_pos: Vec3) -> Option<TrackPoint> {
        let mut best: Option<TrackPoint> = None;
        for (i, seg) in self.segments.iter().enumerate() {
            let t = seg.curve.closest_parameter(world_pos);
            let position = seg.curve.point_at(t);
            let distance = position.distance(world_pos);
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(TrackPoint {
                    segment: SegmentId(i as u32),
                    t,
                    position,
                    distance,
                });
            }
        }
        best
    }
}

/// What follows `current` when travelling in `direction` (true = increasing t)
///
/// A junction is usable from either side: arriving on its in branch continues
/// onto the live selection, arriving on any out branch returns to the in branch.
pub fn continuation(graph: &TrackGraph, current: SegmentId, direction: bool) -> Continuation {
    let Some(segment) = graph.segment(current) else {
        return Continuation::DeadEnd;
    };
    let link = if direction {
        segment.out_link
    } else {
        segment.in_link
    };

    match link {
        EndLink::Open => Continuation::DeadEnd,
        EndLink::Direct(next) => Continuation::Next(next),
        EndLink::Junction(jid) => match graph.junction(jid) {
            None => Continuation::DeadEnd,
            Some(junction) if junction.in_branch == current => match junction.selected_branch() {
                Some(next) => Continuation::Next(next),
                None => Continuation::Split,
            },
            Some(junction) => Continuation::Next(junction.in_branch),
        },
    }
}

/// Next segment in `direction`, or `None` at a dead end or unresolved split
pub fn next_segment(graph: &TrackGraph, current: SegmentId, direction: bool) -> Option<SegmentId> {
    continuation(graph, current, direction).next()
}

/// Every segment attached to the t = 1 end of `current`, regardless of switch state
pub fn out_branches(graph: &TrackGraph, current: SegmentId) -> Vec<SegmentId> {
    let Some(segment) = graph.segment(current) else {
        return Vec::new();
    };
    match segment.out_link {
        EndLink::Open => Vec::new(),
        EndLink::Direct(next) => vec![next],
        EndLink::Junction(jid) => match graph.junction(jid) {
            None => Vec::new(),
            Some(junction) if junction.in_branch == current => junction.out_branches.clone(),
            Some(junction) => vec![junction.in_branch],
        },
    }
}

pub fn is_out_branch(graph: &TrackGraph, current: SegmentId, candidate: SegmentId) -> bool {
    out_branches(graph, current).contains(&candidate)
}

/// Travel direction on `current` after arriving from `previous`
///
/// Neighbouring segments need not share parametric orientation: arriving
/// through the t = 1 end means we now travel towards decreasing t.
pub fn direction_from_previous(graph: &TrackGraph, current: SegmentId, previous: SegmentId) -> bool {
    !is_out_branch(graph, current, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x0: f32, x1: f32) -> CurveSegment {
        CurveSegment::line(Vec3::new(x0, 0.0, 0.0), Vec3::new(x1, 0.0, 0.0))
    }

    /// main --(junction)--> left | right
    fn wye() -> (TrackGraph, SegmentId, SegmentId, SegmentId, JunctionId) {
        let mut graph = TrackGraph::new();
        let main = graph.add_segment("main", line(0.0, 50.0));
        let left = graph.add_segment(
            "left",
            CurveSegment::line(Vec3::new(50.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 10.0)),
        );
        let right = graph.add_segment(
            "right",
            CurveSegment::line(Vec3::new(50.0, 0.0, 0.0), Vec3::new(100.0, 0.0, -10.0)),
        );
        let j = graph
            .add_junction(
                (main, TrackEnd::Out),
                &[(left, TrackEnd::In), (right, TrackEnd::In)],
            )
            .unwrap();
        (graph, main, left, right, j)
    }

    #[test]
    fn test_dead_end_returns_none() {
        let mut graph = TrackGraph::new();
        let a = graph.add_segment("a", line(0.0, 10.0));
        assert_eq!(next_segment(&graph, a, true), None);
        assert_eq!(next_segment(&graph, a, false), None);
        assert_eq!(continuation(&graph, a, true), Continuation::DeadEnd);
    }

    #[test]
    fn test_direct_link_both_ways() {
        let mut graph = TrackGraph::new();
        let a = graph.add_segment("a", line(0.0, 50.0));
        let b = graph.add_segment("b", line(50.0, 100.0));
        graph.link_direct(a, TrackEnd::Out, b, TrackEnd::In).unwrap();

        assert_eq!(next_segment(&graph, a, true), Some(b));
        assert_eq!(next_segment(&graph, b, false), Some(a));
        assert_eq!(next_segment(&graph, a, false), None);
        assert!(direction_from_previous(&graph, b, a));
        assert!(!direction_from_previous(&graph, a, b));
    }

    #[test]
    fn test_reversed_neighbour_flips_direction() {
        // b is drawn backwards: its t = 1 end touches a's t = 1 end
        let mut graph = TrackGraph::new();
        let a = graph.add_segment("a", line(0.0, 50.0));
        let b = graph.add_segment("b", line(100.0, 50.0));
        graph.link_direct(a, TrackEnd::Out, b, TrackEnd::Out).unwrap();

        assert_eq!(next_segment(&graph, a, true), Some(b));
        assert!(!direction_from_previous(&graph, b, a));
        assert_eq!(next_segment(&graph, b, true), Some(a));
    }

    #[test]
    fn test_junction_follows_live_selection() {
        let (mut graph, main, left, right, j) = wye();
        assert_eq!(next_segment(&graph, main, true), Some(left));

        graph.set_switch(j, Some(1)).unwrap();
        assert_eq!(next_segment(&graph, main, true), Some(right));

        // Out branches always lead back to the in branch
        assert_eq!(next_segment(&graph, left, false), Some(main));
        assert_eq!(next_segment(&graph, right, false), Some(main));
    }

    #[test]
    fn test_resolved_junction_never_none() {
        let (mut graph, main, left, right, j) = wye();
        for branch in 0..2 {
            graph.set_switch(j, Some(branch)).unwrap();
            for seg in [main, left, right] {
                let dir = seg == main;
                assert!(next_segment(&graph, seg, dir).is_some());
            }
        }
    }

    #[test]
    fn test_unresolved_junction_is_split() {
        let (mut graph, main, left, _, j) = wye();
        graph.set_switch(j, None).unwrap();
        assert_eq!(continuation(&graph, main, true), Continuation::Split);
        assert_eq!(next_segment(&graph, main, true), None);
        // Other side is still deterministic
        assert_eq!(next_segment(&graph, left, false), Some(main));
    }

    #[test]
    fn test_out_branch_membership() {
        let (graph, main, left, right, _) = wye();
        assert_eq!(out_branches(&graph, main), vec![left, right]);
        assert!(is_out_branch(&graph, main, right));
        // left's out end is open; main joins at its in end
        assert!(!is_out_branch(&graph, left, main));
        assert!(direction_from_previous(&graph, left, main));
    }

    #[test]
    fn test_switch_errors() {
        let (mut graph, _, _, _, j) = wye();
        assert_eq!(
            graph.set_switch(j, Some(5)),
            Err(GraphError::BranchOutOfRange {
                junction: j,
                branches: 2,
                requested: 5
            })
        );
        assert_eq!(
            graph.set_switch(JunctionId(9), Some(0)),
            Err(GraphError::UnknownJunction(JunctionId(9)))
        );
        assert_eq!(
            graph.add_junction((SegmentId(0), TrackEnd::Out), &[]),
            Err(GraphError::NoOutBranches)
        );
        assert_eq!(
            graph.link_direct(SegmentId(0), TrackEnd::In, SegmentId(42), TrackEnd::In),
            Err(GraphError::UnknownSegment(SegmentId(42)))
        );
    }

    #[test]
    fn test_closest_segment() {
        let (graph, _, left, right, _) = wye();
        let hit = graph.closest_segment(Vec3::new(90.0, 0.0, -9.0)).unwrap();
        assert_eq!(hit.segment, right);
        let hit = graph.closest_segment(Vec3::new(90.0, 0.0, 9.0)).unwrap();
        assert_eq!(hit.segment, left);
        assert!(TrackGraph::new().closest_segment(Vec3::ZERO).is_none());
    }

    #[test]
    fn test_graph_json_round_trip_keeps_links() {
        let (graph, main, left, _, _) = wye();
        let json = serde_json::to_string(&graph).unwrap();
        let back: TrackGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(next_segment(&back, main, true), Some(left));
        assert_eq!(back.segment_count(), 3);
    }
}
