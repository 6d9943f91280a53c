//! Arc-length parameterized rail curves
//!
//! A segment is built once from its shape and never mutated. Construction
//! precomputes an arc-length table so that the normalized parameter `t`
//! is proportional to distance along the rail: `t * length` metres from
//! the segment's start.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{CLOSEST_T_MAX_SAMPLES, CLOSEST_T_MIN_SAMPLES, CLOSEST_T_SAMPLES_PER_UNIT};

/// Number of parameter steps used to tabulate a Bézier's arc length
const BEZIER_TABLE_STEPS: usize = 256;

/// Geometric description of a rail piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CurveShape {
    /// Straight pieces joined at vertices (a two-point polyline is a line)
    Polyline(Vec<Vec3>),
    /// Single cubic Bézier: start, start handle, end handle, end
    CubicBezier([Vec3; 4]),
}

impl CurveShape {
    /// Evaluate position at the shape's own parameter `u`
    ///
    /// Polylines use vertex index space `[0, n-1]`, Béziers use `[0, 1]`.
    fn position(&self, u: f32) -> Vec3 {
        match self {
            CurveShape::Polyline(points) => {
                if points.len() < 2 {
                    return points.first().copied().unwrap_or(Vec3::ZERO);
                }
                let (i, frac) = polyline_piece(points.len(), u);
                points[i].lerp(points[i + 1], frac)
            }
            CurveShape::CubicBezier([p0, p1, p2, p3]) => {
                let u = u.clamp(0.0, 1.0);
                let v = 1.0 - u;
                *p0 * (v * v * v) + *p1 * (3.0 * v * v * u) + *p2 * (3.0 * v * u * u) + *p3 * (u * u * u)
            }
        }
    }

    /// Derivative direction at the shape's own parameter `u` (not normalized)
    fn derivative(&self, u: f32) -> Vec3 {
        match self {
            CurveShape::Polyline(points) => {
                if points.len() < 2 {
                    return Vec3::ZERO;
                }
                let (i, _) = polyline_piece(points.len(), u);
                points[i + 1] - points[i]
            }
            CurveShape::CubicBezier([p0, p1, p2, p3]) => {
                let u = u.clamp(0.0, 1.0);
                let v = 1.0 - u;
                (*p1 - *p0) * (3.0 * v * v) + (*p2 - *p1) * (6.0 * v * u) + (*p3 - *p2) * (3.0 * u * u)
            }
        }
    }
}

/// Piece index and fraction for a polyline parameter, clamped to the last piece
fn polyline_piece(point_count: usize, u: f32) -> (usize, f32) {
    let last_piece = point_count - 2;
    let u = u.clamp(0.0, (point_count - 1) as f32);
    let i = (u.floor() as usize).min(last_piece);
    (i, u - i as f32)
}

/// One entry of the arc-length table
#[derive(Debug, Clone, Copy, PartialEq)]
struct ArcSample {
    /// Distance from the start of the segment
    arc: f32,
    /// Shape parameter at that distance
    u: f32,
}

/// An immutable rail curve with arc length `length`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CurveShape", into = "CurveShape")]
pub struct CurveSegment {
    shape: CurveShape,
    table: Vec<ArcSample>,
    length: f32,
}

impl From<CurveShape> for CurveSegment {
    fn from(shape: CurveShape) -> Self {
        Self::new(shape)
    }
}

impl From<CurveSegment> for CurveShape {
    fn from(segment: CurveSegment) -> Self {
        segment.shape
    }
}

impl CurveSegment {
    pub fn new(shape: CurveShape) -> Self {
        let table = build_arc_table(&shape);
        let length = table.last().map(|s| s.arc).unwrap_or(0.0);
        Self {
            shape,
            table,
            length,
        }
    }

    /// Straight segment from `start` to `end`
    pub fn line(start: Vec3, end: Vec3) -> Self {
        Self::new(CurveShape::Polyline(vec![start, end]))
    }

    pub fn polyline(points: Vec<Vec3>) -> Self {
        Self::new(CurveShape::Polyline(points))
    }

    pub fn cubic_bezier(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self::new(CurveShape::CubicBezier([p0, p1, p2, p3]))
    }

    pub fn shape(&self) -> &CurveShape {
        &self.shape
    }

    /// Arc length in world units
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Position at normalized arc length `t` (clamped to [0, 1])
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.shape.position(self.param_at_arc(self.clamped_arc(t)))
    }

    /// Unit tangent at normalized arc length `t` (clamped to [0, 1])
    ///
    /// Zero for degenerate curves.
    pub fn tangent_at(&self, t: f32) -> Vec3 {
        self.shape
            .derivative(self.param_at_arc(self.clamped_arc(t)))
            .normalize_or_zero()
    }

    /// How many intervals `closest_parameter` samples for this curve
    pub fn closest_sample_count(&self) -> usize {
        let wanted = (self.length * CLOSEST_T_SAMPLES_PER_UNIT).ceil();
        if !wanted.is_finite() || wanted <= 0.0 {
            return CLOSEST_T_MIN_SAMPLES;
        }
        (wanted as usize).clamp(CLOSEST_T_MIN_SAMPLES, CLOSEST_T_MAX_SAMPLES)
    }

    /// Normalized parameter of the sampled point nearest to `world_pos`
    ///
    /// Brute force over `closest_sample_count() + 1` evenly spaced samples, so
    /// the answer is only as precise as the sampling density. Ties keep the
    /// earliest sample.
    pub fn closest_parameter(&self, world_pos: Vec3) -> f32 {
        let samples = self.closest_sample_count();

        let mut best_t = 0.0;
        let mut best_dist = f32::MAX;

        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            let dist = self.point_at(t).distance_squared(world_pos);
            if dist < best_dist {
                best_dist = dist;
                best_t = t;
            }
        }

        best_t
    }

    /// Distance from `world_pos` to the nearest sampled point
    pub fn distance_to(&self, world_pos: Vec3) -> f32 {
        self.point_at(self.closest_parameter(world_pos))
            .distance(world_pos)
    }

    fn clamped_arc(&self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        t * self.length
    }

    /// Shape parameter at a distance along the curve
    /// Uses binary search to find the bracketing samples, then linearly interpolates.
    fn param_at_arc(&self, arc: f32) -> f32 {
        let table = &self.table;
        let Some(first) = table.first() else {
            return 0.0;
        };
        if arc <= first.arc {
            return first.u;
        }

        let last = table.len() - 1;
        if arc >= table[last].arc {
            return table[last].u;
        }

        // Find segment [lo, lo+1] where table[lo].arc <= arc < table[lo+1].arc
        let mut lo = 0usize;
        let mut hi = last;
        while lo < hi - 1 {
            let mid = (lo + hi) / 2;
            if table[mid].arc <= arc {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let a = table[lo];
        let b = table[lo + 1];
        let span = b.arc - a.arc;
        let f = if span > 0.0 { (arc - a.arc) / span } else { 0.0 };
        a.u + (b.u - a.u) * f
    }
}

fn build_arc_table(shape: &CurveShape) -> Vec<ArcSample> {
    match shape {
        CurveShape::Polyline(points) => {
            if points.len() < 2 {
                return vec![ArcSample { arc: 0.0, u: 0.0 }];
            }
            let mut arc = 0.0;
            let mut table = Vec::with_capacity(points.len());
            table.push(ArcSample { arc, u: 0.0 });
            for (i, pair) in points.windows(2).enumerate() {
                arc += pair[0].distance(pair[1]);
                table.push(ArcSample {
                    arc,
                    u: (i + 1) as f32,
                });
            }
            table
        }
        CurveShape::CubicBezier(_) => {
            let mut arc = 0.0;
            let mut prev = shape.position(0.0);
            let mut table = Vec::with_capacity(BEZIER_TABLE_STEPS + 1);
            table.push(ArcSample { arc, u: 0.0 });
            for i in 1..=BEZIER_TABLE_STEPS {
                let u = i as f32 / BEZIER_TABLE_STEPS as f32;
                let p = shape.position(u);
                arc += prev.distance(p);
                prev = p;
                table.push(ArcSample { arc, u });
            }
            table
        }
    }
}
