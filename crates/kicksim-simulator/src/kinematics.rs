//! Omni-wheel kinematics of the robot chassis.
//!
//! Local velocities and accelerations are ordered `(forward, left, angular)`.
//! Wheel `i` mounted at angle `phi_i` from the forward axis contributes the
//! row `[-sin phi_i, cos phi_i, R]` to the coupling matrix.

use kicksim_core::{AccelerationLimits, Vector3};
use nalgebra::{Matrix3x4, Matrix4x3, Vector4};
use thiserror::Error;

const RANK_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("wheel coupling matrix is degenerate (rank {0} < 3)")]
    Degenerate(usize),
    #[error("could not invert the wheel coupling matrix: {0}")]
    Inversion(&'static str),
}

#[derive(Debug, Clone)]
pub struct WheelCoupling {
    matrix: Matrix4x3<f64>,
    pseudo_inverse: Matrix3x4<f64>,
    speedup: Vector4<f64>,
    brake: Vector4<f64>,
}

impl WheelCoupling {
    pub fn new(
        wheel_angles: &[f64; 4],
        radius: f64,
        limits: &AccelerationLimits,
    ) -> Result<Self, KinematicsError> {
        let mut matrix = Matrix4x3::zeros();
        for (i, phi) in wheel_angles.iter().enumerate() {
            matrix[(i, 0)] = -phi.sin();
            matrix[(i, 1)] = phi.cos();
            matrix[(i, 2)] = radius;
        }

        let svd = matrix.svd(true, true);
        let rank = svd.rank(RANK_EPSILON);
        if rank < 3 {
            return Err(KinematicsError::Degenerate(rank));
        }
        let pseudo_inverse = svd
            .pseudo_inverse(RANK_EPSILON)
            .map_err(KinematicsError::Inversion)?;

        // The bound of a wheel is what it needs to reach the strongest pure
        // axis acceleration.
        let axis_bound = |axis: &Vector3| -> Vector4<f64> {
            Vector4::from_fn(|i, _| {
                (0..3)
                    .map(|j| (matrix[(i, j)] * axis[j]).abs())
                    .fold(0.0, f64::max)
            })
        };
        let speedup = axis_bound(&Vector3::new(
            limits.speedup_forward,
            limits.speedup_sideward,
            limits.speedup_angular,
        ));
        let brake = axis_bound(&Vector3::new(
            limits.brake_forward,
            limits.brake_sideward,
            limits.brake_angular,
        ));

        Ok(Self {
            matrix,
            pseudo_inverse,
            speedup,
            brake,
        })
    }

    pub fn wheel_speeds(&self, local: &Vector3) -> Vector4<f64> {
        self.matrix * local
    }

    pub fn local_from_wheels(&self, wheels: &Vector4<f64>) -> Vector3 {
        self.pseudo_inverse * wheels
    }

    /// Bounds of each wheel for the given wheel acceleration and speed.
    fn wheel_bounds(&self, wheel_acc: &Vector4<f64>, wheel_vel: &Vector4<f64>) -> Vector4<f64> {
        Vector4::from_fn(|i, _| {
            if wheel_acc[i] * wheel_vel[i] >= 0.0 {
                self.speedup[i]
            } else {
                self.brake[i]
            }
        })
    }

    /// Limits a local acceleration so that no wheel exceeds its bound.
    ///
    /// Accelerations within the bounds are returned unchanged, others are
    /// scaled down as a whole so the direction is kept.
    pub fn limit_acceleration(&self, acceleration: &Vector3, velocity: &Vector3) -> Vector3 {
        let wheel_acc = self.matrix * acceleration;
        let wheel_vel = self.matrix * velocity;
        let bounds = self.wheel_bounds(&wheel_acc, &wheel_vel);

        let mut scale: f64 = 1.0;
        for i in 0..4 {
            let a = wheel_acc[i].abs();
            if a > bounds[i] {
                scale = scale.min(bounds[i] / a);
            }
        }
        if scale >= 1.0 {
            return *acceleration;
        }
        self.pseudo_inverse * (wheel_acc * scale)
    }

    /// Returns true if every wheel is within its bound, up to `tolerance`.
    pub fn within_limits(&self, acceleration: &Vector3, velocity: &Vector3, tolerance: f64) -> bool {
        let wheel_acc = self.matrix * acceleration;
        let wheel_vel = self.matrix * velocity;
        let bounds = self.wheel_bounds(&wheel_acc, &wheel_vel);
        (0..4).all(|i| wheel_acc[i].abs() <= bounds[i] * (1.0 + tolerance) + tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kicksim_core::RobotSpecs;
    use proptest::prelude::*;

    fn coupling() -> WheelCoupling {
        let specs = RobotSpecs::default();
        WheelCoupling::new(&specs.wheel_angles, specs.radius, &specs.acceleration).unwrap()
    }

    #[test]
    fn test_zero_radius_is_degenerate() {
        let specs = RobotSpecs::default();
        let result = WheelCoupling::new(&specs.wheel_angles, 0.0, &specs.acceleration);
        assert_eq!(result.err(), Some(KinematicsError::Degenerate(2)));
    }

    #[test]
    fn test_wheels_roundtrip() {
        let c = coupling();
        let local = Vector3::new(1000.0, -300.0, 2.0);
        let back = c.local_from_wheels(&c.wheel_speeds(&local));
        assert_relative_eq!(back, local, epsilon = 1e-6);
    }

    #[test]
    fn test_small_acceleration_unchanged() {
        let c = coupling();
        let a = Vector3::new(100.0, 50.0, 1.0);
        assert_eq!(c.limit_acceleration(&a, &Vector3::zeros()), a);
    }

    #[test]
    fn test_brake_allows_more_than_speedup() {
        let c = coupling();
        let a = Vector3::new(5000.0, 0.0, 0.0);
        let speeding_up = c.limit_acceleration(&a, &Vector3::new(1000.0, 0.0, 0.0));
        let braking = c.limit_acceleration(&a, &Vector3::new(-1000.0, 0.0, 0.0));
        // the 60 degree wheels saturate first at R * speedup_angular
        let expected = 90.0 * 30.0 / 60f64.to_radians().sin();
        assert_relative_eq!(speeding_up.x, expected, epsilon = 1e-6);
        assert_relative_eq!(speeding_up.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(braking.x, 5000.0, epsilon = 1e-6);
    }

    proptest! {
        #[test]
        fn limited_acceleration_respects_wheel_bounds(
            af in -20000.0..20000.0f64,
            as_ in -20000.0..20000.0f64,
            aphi in -200.0..200.0f64,
            vf in -3000.0..3000.0f64,
            vs in -3000.0..3000.0f64,
            omega in -10.0..10.0f64,
        ) {
            let c = coupling();
            let a = Vector3::new(af, as_, aphi);
            let v = Vector3::new(vf, vs, omega);
            let limited = c.limit_acceleration(&a, &v);

            // Scaling keeps the sign pattern of the wheels, so the bounds
            // used for the check are the same ones used for limiting.
            prop_assert!(c.within_limits(&limited, &v, 1e-9));

            if c.within_limits(&a, &v, 0.0) {
                prop_assert_eq!(limited, a);
            } else {
                // Same direction, smaller magnitude
                let cross = a.normalize().cross(&limited.normalize()).norm();
                prop_assert!(cross < 1e-6);
                prop_assert!(a.dot(&limited) > 0.0);
                prop_assert!(limited.norm() <= a.norm() + 1e-9);
            }
        }
    }
}
