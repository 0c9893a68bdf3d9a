use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::Vector2;

/// An angle in radians, always in (-pi, pi]. This type supports safe arithmetic
/// operations:
///
/// ```
/// # use kicksim_core::Angle;
/// let a = Angle::from_degrees(90.0);
/// let b = Angle::from_degrees(45.0);
/// let c = a + b;
/// assert!((c.degrees() - 135.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const PI: Angle = Angle(PI);
    pub const PI_2: Angle = Angle(PI / 2.0);

    /// Create a new angle from radians.
    pub fn from_radians(radians: f64) -> Self {
        Angle(wrap_angle(radians))
    }

    /// Create a new angle from degrees.
    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    /// Direction of the vector from `a` to `b`.
    pub fn between_points(a: Vector2, b: Vector2) -> Self {
        Self::from_radians((b.y - a.y).atan2(b.x - a.x))
    }

    /// Get the angle in radians.
    pub fn radians(&self) -> f64 {
        self.0
    }

    /// Get the angle in degrees.
    pub fn degrees(&self) -> f64 {
        self.0.to_degrees()
    }

    /// Rotate a vector by this angle.
    pub fn rotate_vector(&self, v: &Vector2) -> Vector2 {
        let rot = nalgebra::Rotation2::new(self.0);
        rot * v
    }

    /// Unit vector pointing in the direction of this angle.
    pub fn to_unit_vector(&self) -> Vector2 {
        Vector2::new(self.0.cos(), self.0.sin())
    }

    /// The angle rotated by half a turn, as seen from a flipped field.
    pub fn flipped(&self) -> Self {
        *self + Angle::PI
    }
}

impl std::ops::Add for Angle {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Angle::from_radians(self.0 + other.0)
    }
}

impl std::ops::Sub for Angle {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Angle::from_radians(self.0 - other.0)
    }
}

impl std::ops::Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self {
        Angle::from_radians(-self.0)
    }
}

impl std::ops::Mul<Vector2> for Angle {
    type Output = Vector2;

    fn mul(self, v: Vector2) -> Vector2 {
        self.rotate_vector(&v)
    }
}

impl std::fmt::Display for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} rad", self.0)
    }
}

impl Default for Angle {
    fn default() -> Self {
        Self::from_radians(0.0)
    }
}

impl PartialEq for Angle {
    fn eq(&self, other: &Self) -> bool {
        let diff: f64 = (self.radians() - other.radians()).abs();
        const TOLERANCE: f64 = 1e-9;
        !(TOLERANCE..=(2.0 * PI - TOLERANCE)).contains(&diff)
    }
}

fn wrap_angle(angle: f64) -> f64 {
    let mut angle = angle % (2.0 * PI);
    if angle <= -PI {
        angle += 2.0 * PI;
    } else if angle > PI {
        angle -= 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert_eq!(wrap_angle(3.0 * PI), PI);
        assert_relative_eq!(wrap_angle(2.5 * PI), 0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_flipped() {
        let a = Angle::from_degrees(30.0);
        assert_relative_eq!(a.flipped().degrees(), -150.0, epsilon = 1e-9);
        assert_relative_eq!(a.flipped().flipped().degrees(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unit_vector_matches_rotation() {
        let a = Angle::from_degrees(-120.0);
        let rotated = a * Vector2::new(1.0, 0.0);
        assert_relative_eq!(rotated, a.to_unit_vector(), epsilon = 1e-12);
    }

    #[test]
    fn test_between_points() {
        let angle = Angle::between_points(Vector2::new(1.0, 1.0), Vector2::new(0.0, 0.0));
        assert_relative_eq!(angle.degrees(), -135.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equality_across_wrap() {
        assert_eq!(Angle::from_degrees(180.0), Angle::from_degrees(-180.0));
        assert_ne!(Angle::from_degrees(10.0), Angle::from_degrees(11.0));
    }
}
