//! The rigid body engine behind the simulation.
//!
//! Bodies only hold [`BodyHandle`]s; everything else goes through the
//! [`PhysicsWorld`] trait. Units follow the rest of the simulator: mm, kg, s.

use kicksim_core::Vector3;
use nalgebra::{Isometry3, UnitQuaternion};

mod ideal;
mod rapier;

pub use ideal::IdealWorld;
pub use rapier::RapierWorld;

pub type Pose = Isometry3<f64>;

/// Standard gravity in mm/s^2.
pub const GRAVITY: f64 = 9810.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Velocity {
    pub fn new(linear: Vector3, angular: Vector3) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Collision shape of a body, centered at the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Ball { radius: f64 },
    /// Upright cylinder, axis along z.
    Cylinder { radius: f64, half_height: f64 },
    Cuboid { half_extents: Vector3 },
}

impl Shape {
    /// Principal moments of inertia for a solid body of the given mass.
    pub fn principal_inertia(&self, mass: f64) -> Vector3 {
        match *self {
            Shape::Ball { radius } => Vector3::repeat(0.4 * mass * radius * radius),
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let h = 2.0 * half_height;
                let side = mass * (3.0 * radius * radius + h * h) / 12.0;
                Vector3::new(side, side, 0.5 * mass * radius * radius)
            }
            Shape::Cuboid { half_extents: e } => {
                let (x, y, z) = (2.0 * e.x, 2.0 * e.y, 2.0 * e.z);
                Vector3::new(
                    mass * (y * y + z * z) / 12.0,
                    mass * (x * x + z * z) / 12.0,
                    mass * (x * x + y * y) / 12.0,
                )
            }
        }
    }

    /// Distance from the body origin to the lowest point of the shape.
    pub fn bottom_offset(&self) -> f64 {
        match *self {
            Shape::Ball { radius } => radius,
            Shape::Cylinder { half_height, .. } => half_height,
            Shape::Cuboid { half_extents } => half_extents.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Fixed,
}

/// Everything needed to create a body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub shape: Shape,
    pub pose: Pose,
    /// Mass in kg, ignored for fixed bodies
    pub mass: f64,
    pub restitution: f64,
    pub friction: f64,
    /// Keep the body on its plane: no z translation, rotation about z only.
    pub planar: bool,
    /// Continuous collision detection for fast bodies.
    pub ccd: bool,
}

impl BodyDesc {
    pub fn fixed(shape: Shape, translation: Vector3) -> Self {
        Self {
            kind: BodyKind::Fixed,
            shape,
            pose: Pose::translation(translation.x, translation.y, translation.z),
            mass: 0.0,
            restitution: 0.0,
            friction: 0.0,
            planar: false,
            ccd: false,
        }
    }

    pub fn dynamic(shape: Shape, pose: Pose, mass: f64) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape,
            pose,
            mass,
            restitution: 0.0,
            friction: 0.0,
            planar: false,
            ccd: false,
        }
    }

    pub fn with_rotation(mut self, yaw: f64) -> Self {
        self.pose.rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw);
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn planar(mut self) -> Self {
        self.planar = true;
        self
    }

    pub fn with_ccd(mut self) -> Self {
        self.ccd = true;
        self
    }
}

/// Index-style reference to a body. A removed body's handle never resolves
/// to a newer body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle {
    pub index: u32,
    pub generation: u32,
}

/// The capabilities the simulation needs from a rigid body engine.
///
/// Operations on unknown handles are no-ops (queries return `None`).
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Removes a body along with its constraints.
    fn remove_body(&mut self, body: BodyHandle);

    fn contains(&self, body: BodyHandle) -> bool;

    fn pose(&self, body: BodyHandle) -> Option<Pose>;

    fn velocity(&self, body: BodyHandle) -> Option<Velocity>;

    fn mass(&self, body: BodyHandle) -> Option<f64>;

    fn set_pose(&mut self, body: BodyHandle, pose: Pose);

    fn set_velocity(&mut self, body: BodyHandle, velocity: Velocity);

    /// Adds a force and torque acting during the next step only.
    fn apply_force(&mut self, body: BodyHandle, force: Vector3, torque: Vector3);

    /// Instantly changes the momentum of a body.
    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vector3);

    /// Ties `anchor_b` (in `b`'s frame) to `anchor_a` (in `a`'s frame),
    /// leaving rotations free.
    fn add_constraint(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vector3,
        anchor_b: Vector3,
    ) -> Option<ConstraintHandle>;

    fn remove_constraint(&mut self, constraint: ConstraintHandle);

    /// Advances the world by `dt` seconds.
    fn step(&mut self, dt: f64);
}

/// Yaw of a pose about the z axis.
pub fn yaw_of(pose: &Pose) -> f64 {
    pose.rotation.euler_angles().2
}

/// Pose at `translation` rotated by `yaw` about the z axis.
pub fn planar_pose(translation: Vector3, yaw: f64) -> Pose {
    Pose::from_parts(
        translation.into(),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cylinder_inertia() {
        let shape = Shape::Cylinder {
            radius: 90.0,
            half_height: 75.0,
        };
        let inertia = shape.principal_inertia(2.0);
        assert_relative_eq!(inertia.z, 0.5 * 2.0 * 90.0 * 90.0);
        assert_eq!(shape.bottom_offset(), 75.0);
    }

    #[test]
    fn test_planar_pose_roundtrip_yaw() {
        let pose = planar_pose(Vector3::new(1.0, 2.0, 3.0), 2.5);
        assert_relative_eq!(yaw_of(&pose), 2.5, epsilon = 1e-12);
        assert_relative_eq!(pose.translation.vector, Vector3::new(1.0, 2.0, 3.0));
    }
}
