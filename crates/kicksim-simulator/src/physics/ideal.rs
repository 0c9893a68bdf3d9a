use kicksim_core::Vector3;
use nalgebra::UnitQuaternion;

use super::{
    BodyDesc, BodyHandle, BodyKind, ConstraintHandle, PhysicsWorld, Pose, Velocity, GRAVITY,
};

#[derive(Debug, Clone)]
struct IdealBody {
    desc: BodyDesc,
    pose: Pose,
    velocity: Velocity,
    inertia: Vector3,
    force: Vector3,
    torque: Vector3,
}

#[derive(Debug, Clone, Copy)]
struct Constraint {
    a: BodyHandle,
    b: BodyHandle,
    anchor_a: Vector3,
    anchor_b: Vector3,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational arena so that handles of removed entries stay invalid.
#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(index) = self.slots.iter().position(|s| s.value.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.value = Some(value);
            (index as u32, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            ((self.slots.len() - 1) as u32, 0)
        }
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        self.slots
            .get_mut(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.take())
    }

    fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| (i as u32, s.generation, v)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|s| s.value.as_mut())
    }
}

/// Frictionless in-memory world without contacts between bodies.
///
/// Dynamic bodies integrate forces with semi-implicit Euler and rest on the
/// ground plane `z = 0`. Planar bodies ignore gravity and only rotate about z.
/// Constraints are enforced exactly after every step. Useful for tests that
/// need exact, contact-free kinematics.
#[derive(Debug, Clone)]
pub struct IdealWorld {
    gravity: Vector3,
    bodies: Arena<IdealBody>,
    constraints: Arena<Constraint>,
}

impl IdealWorld {
    pub fn new() -> Self {
        Self {
            gravity: Vector3::new(0.0, 0.0, -GRAVITY),
            bodies: Arena::new(),
            constraints: Arena::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().count()
    }

    fn body(&self, handle: BodyHandle) -> Option<&IdealBody> {
        self.bodies.get(handle.index, handle.generation)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut IdealBody> {
        self.bodies.get_mut(handle.index, handle.generation)
    }

    fn integrate(body: &mut IdealBody, gravity: &Vector3, dt: f64) {
        let desc = &body.desc;
        let mut linear = body.velocity.linear;
        let mut angular = body.velocity.angular;

        let mut acceleration = body.force / desc.mass;
        if !desc.planar {
            acceleration += gravity;
        }
        linear += acceleration * dt;
        angular += body.torque.component_div(&body.inertia.map(|i| i.max(1e-12))) * dt;

        if desc.planar {
            linear.z = 0.0;
            angular.x = 0.0;
            angular.y = 0.0;
        }

        body.pose.translation.vector += linear * dt;
        body.pose.rotation = UnitQuaternion::from_scaled_axis(angular * dt) * body.pose.rotation;

        let bottom = desc.shape.bottom_offset();
        if !desc.planar && body.pose.translation.z < bottom {
            body.pose.translation.z = bottom;
            if linear.z < 0.0 {
                let bounce = -linear.z * desc.restitution;
                // Bounces smaller than one step of gravity would never settle
                linear.z = if bounce > gravity.norm() * dt {
                    bounce
                } else {
                    0.0
                };
            }
        }

        body.velocity = Velocity::new(linear, angular);
        body.force = Vector3::zeros();
        body.torque = Vector3::zeros();
    }

    fn enforce(&mut self, constraint: Constraint) {
        let Some(a) = self.body(constraint.a).cloned() else {
            return;
        };
        let target = a.pose * nalgebra::Point3::from(constraint.anchor_a);
        let anchor_velocity = a.velocity.linear
            + a.velocity
                .angular
                .cross(&(target.coords - a.pose.translation.vector));
        if let Some(b) = self.body_mut(constraint.b) {
            let offset = b.pose.rotation * constraint.anchor_b;
            b.pose.translation.vector = target.coords - offset;
            b.velocity.linear = anchor_velocity;
        }
    }
}

impl Default for IdealWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for IdealWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let inertia = desc.shape.principal_inertia(desc.mass);
        let (index, generation) = self.bodies.insert(IdealBody {
            desc: desc.clone(),
            pose: desc.pose,
            velocity: Velocity::zero(),
            inertia,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        });
        BodyHandle { index, generation }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if self.bodies.remove(body.index, body.generation).is_none() {
            return;
        }
        let attached: Vec<(u32, u32)> = self
            .constraints
            .iter()
            .filter(|(_, _, c)| c.a == body || c.b == body)
            .map(|(i, g, _)| (i, g))
            .collect();
        for (index, generation) in attached {
            self.constraints.remove(index, generation);
        }
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.body(body).is_some()
    }

    fn pose(&self, body: BodyHandle) -> Option<Pose> {
        self.body(body).map(|b| b.pose)
    }

    fn velocity(&self, body: BodyHandle) -> Option<Velocity> {
        self.body(body).map(|b| b.velocity)
    }

    fn mass(&self, body: BodyHandle) -> Option<f64> {
        self.body(body).map(|b| match b.desc.kind {
            BodyKind::Dynamic => b.desc.mass,
            BodyKind::Fixed => 0.0,
        })
    }

    fn set_pose(&mut self, body: BodyHandle, pose: Pose) {
        if let Some(b) = self.body_mut(body) {
            b.pose = pose;
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Velocity) {
        if let Some(b) = self.body_mut(body) {
            if b.desc.kind == BodyKind::Dynamic {
                b.velocity = velocity;
            }
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vector3, torque: Vector3) {
        if let Some(b) = self.body_mut(body) {
            b.force += force;
            b.torque += torque;
        }
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vector3) {
        if let Some(b) = self.body_mut(body) {
            if b.desc.kind == BodyKind::Dynamic && b.desc.mass > 0.0 {
                b.velocity.linear += impulse / b.desc.mass;
            }
        }
    }

    fn add_constraint(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vector3,
        anchor_b: Vector3,
    ) -> Option<ConstraintHandle> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (index, generation) = self.constraints.insert(Constraint {
            a,
            b,
            anchor_a,
            anchor_b,
        });
        Some(ConstraintHandle { index, generation })
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints
            .remove(constraint.index, constraint.generation);
    }

    fn step(&mut self, dt: f64) {
        let gravity = self.gravity;
        for body in self.bodies.iter_mut() {
            if body.desc.kind == BodyKind::Dynamic {
                Self::integrate(body, &gravity, dt);
            }
        }
        let constraints: Vec<Constraint> = self.constraints.iter().map(|(_, _, c)| *c).collect();
        for constraint in constraints {
            self.enforce(constraint);
        }
    }
}
