//! Oriented bounding boxes
//!
//! Boxes are axis-aligned in their local frame and rotated into the world.
//! Overlap uses the separating axis theorem over the 15 candidate axes
//! (3 face normals each, 9 edge cross products).

use glam::{Mat3, Quat, Vec3};

/// Cross products shorter than this come from (nearly) parallel edges and are skipped
const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

impl Obb {
    pub fn new(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
            rotation,
        }
    }

    /// World-space local axes (columns)
    fn axes(&self) -> [Vec3; 3] {
        let m = Mat3::from_quat(self.rotation);
        [m.x_axis, m.y_axis, m.z_axis]
    }

    /// Half the length of this box's shadow on `axis`
    fn projected_radius(&self, axes: &[Vec3; 3], axis: Vec3) -> f32 {
        self.half_extents.x * axes[0].dot(axis).abs()
            + self.half_extents.y * axes[1].dot(axis).abs()
            + self.half_extents.z * axes[2].dot(axis).abs()
    }

    /// The 8 world-space corners
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes();
        let (hx, hy, hz) = (ax * self.half_extents.x, ay * self.half_extents.y, az * self.half_extents.z);
        let mut out = [Vec3::ZERO; 8];
        for (i, corner) in out.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
            *corner = self.center + hx * sx + hy * sy + hz * sz;
        }
        out
    }

    /// Whether `point` lies inside (or on) the box
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.rotation.inverse() * (point - self.center);
        local.abs().cmple(self.half_extents + Vec3::splat(1e-5)).all()
    }

    /// Whether the two boxes share interior volume
    ///
    /// Boxes that merely touch along a face, edge or corner do not overlap.
    pub fn overlaps(&self, other: &Obb) -> bool {
        let a_axes = self.axes();
        let b_axes = other.axes();
        let offset = other.center - self.center;

        let separated_on = |axis: Vec3| -> bool {
            let len_sq = axis.length_squared();
            if len_sq < PARALLEL_EPSILON {
                return false;
            }
            let axis = axis / len_sq.sqrt();
            let distance = offset.dot(axis).abs();
            distance >= self.projected_radius(&a_axes, axis) + other.projected_radius(&b_axes, axis) - 1e-5
        };

        for axis in a_axes.iter().chain(b_axes.iter()) {
            if separated_on(*axis) {
                return false;
            }
        }
        for a in &a_axes {
            for b in &b_axes {
                if separated_on(a.cross(*b)) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaw_rotation;

    fn cube(center: Vec3) -> Obb {
        Obb::new(center, Vec3::ONE, Quat::IDENTITY)
    }

    #[test]
    fn test_identical_boxes_overlap() {
        assert!(cube(Vec3::ZERO).overlaps(&cube(Vec3::ZERO)));
    }

    #[test]
    fn test_separated_boxes() {
        assert!(!cube(Vec3::ZERO).overlaps(&cube(Vec3::new(3.0, 0.0, 0.0))));
        assert!(!cube(Vec3::ZERO).overlaps(&cube(Vec3::new(0.0, 2.5, 0.0))));
    }

    #[test]
    fn test_touching_is_not_overlap() {
        assert!(!cube(Vec3::ZERO).overlaps(&cube(Vec3::new(2.0, 0.0, 0.0))));
        assert!(cube(Vec3::ZERO).overlaps(&cube(Vec3::new(1.9, 0.0, 0.0))));
    }

    #[test]
    fn test_rotated_box_reaches_further() {
        // A cube yawed 45 degrees pokes sqrt(2) out along X
        let rotated = Obb::new(Vec3::ZERO, Vec3::ONE, yaw_rotation(45.0));
        assert!(rotated.overlaps(&cube(Vec3::new(2.3, 0.0, 0.0))));
        assert!(!rotated.overlaps(&cube(Vec3::new(2.5, 0.0, 0.0))));
    }

    #[test]
    fn test_edge_axis_separation() {
        // Boxes whose face axes all overlap but that are split by an edge-edge axis
        let a = Obb::new(Vec3::ZERO, Vec3::new(2.0, 0.2, 0.2), yaw_rotation(45.0));
        let b = Obb::new(Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.2, 0.2), yaw_rotation(-45.0));
        let overlap_ab = a.overlaps(&b);
        assert_eq!(overlap_ab, b.overlaps(&a));
    }

    #[test]
    fn test_contains_and_corners() {
        let b = Obb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0), yaw_rotation(30.0));
        for corner in b.corners() {
            assert!(b.contains(corner));
        }
        assert!(b.contains(b.center));
        assert!(!b.contains(Vec3::new(10.0, 0.0, 0.0)));
    }
}
