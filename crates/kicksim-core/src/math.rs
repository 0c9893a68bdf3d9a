use crate::{Vector2, Vector3};

/// An upright cylinder standing on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UprightCylinder {
    pub center: Vector2,
    pub radius: f64,
    pub height: f64,
}

impl UprightCylinder {
    /// Returns true if the segment from `from` to `to` passes through the
    /// cylinder volume. Touching the surface does not count.
    pub fn intersects_segment(&self, from: &Vector3, to: &Vector3) -> bool {
        let d = to - from;
        let o = from.xy() - self.center;
        let dxy = d.xy();

        let a = dxy.norm_squared();
        let r2 = self.radius * self.radius;
        // Parameter range where the segment is within the infinite cylinder
        let (t0, t1) = if a < 1e-12 {
            if o.norm_squared() >= r2 {
                return false;
            }
            (0.0, 1.0)
        } else {
            let b = 2.0 * o.dot(&dxy);
            let c = o.norm_squared() - r2;
            let disc = b * b - 4.0 * a * c;
            if disc <= 0.0 {
                return false;
            }
            let sq = disc.sqrt();
            ((-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a))
        };
        let t0 = t0.max(0.0);
        let t1 = t1.min(1.0);
        if t0 >= t1 {
            return false;
        }

        // Clip against the height slab
        let (mut lo, mut hi) = (t0, t1);
        if d.z.abs() < 1e-12 {
            if from.z < 0.0 || from.z > self.height {
                return false;
            }
        } else {
            let ta = (0.0 - from.z) / d.z;
            let tb = (self.height - from.z) / d.z;
            lo = lo.max(ta.min(tb));
            hi = hi.min(ta.max(tb));
        }
        lo < hi
    }
}

/// Finds the intersection of the line through `from` and `to` with the
/// horizontal plane at height `z`. Returns None if the line is parallel to
/// the plane.
pub fn intersect_horizontal_plane(from: &Vector3, to: &Vector3, z: f64) -> Option<Vector3> {
    let d = to - from;
    if d.z.abs() < 1e-10 {
        return None;
    }
    let t = (z - from.z) / d.z;
    Some(from + d * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cylinder() -> UprightCylinder {
        UprightCylinder {
            center: Vector2::new(0.0, 0.0),
            radius: 90.0,
            height: 150.0,
        }
    }

    #[test]
    fn test_segment_through_cylinder() {
        let from = Vector3::new(-500.0, 0.0, 50.0);
        let to = Vector3::new(500.0, 0.0, 50.0);
        assert!(cylinder().intersects_segment(&from, &to));
    }

    #[test]
    fn test_segment_above_cylinder() {
        let from = Vector3::new(-500.0, 0.0, 200.0);
        let to = Vector3::new(500.0, 0.0, 200.0);
        assert!(!cylinder().intersects_segment(&from, &to));
    }

    #[test]
    fn test_segment_from_camera_over_robot() {
        // camera high above, target just behind the robot seen at a steep angle
        let camera = Vector3::new(0.0, 0.0, 4000.0);
        let target = Vector3::new(120.0, 0.0, 21.5);
        assert!(!cylinder().intersects_segment(&camera, &target));

        // flat angle hits the robot
        let camera = Vector3::new(-3000.0, 0.0, 400.0);
        let target = Vector3::new(120.0, 0.0, 21.5);
        assert!(cylinder().intersects_segment(&camera, &target));
    }

    #[test]
    fn test_segment_ending_before_cylinder() {
        let from = Vector3::new(-500.0, 0.0, 50.0);
        let to = Vector3::new(-200.0, 0.0, 50.0);
        assert!(!cylinder().intersects_segment(&from, &to));
    }

    #[test]
    fn test_plane_intersection() {
        let camera = Vector3::new(0.0, 0.0, 4000.0);
        let ball = Vector3::new(1000.0, 0.0, 2021.5);
        let p = intersect_horizontal_plane(&camera, &ball, 21.5).unwrap();
        assert_relative_eq!(p.x, 2000.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 21.5, epsilon = 1e-9);

        let flat = Vector3::new(1000.0, 0.0, 4000.0);
        assert!(intersect_horizontal_plane(&camera, &flat, 0.0).is_none());
    }
}
