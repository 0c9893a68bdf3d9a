use rapier3d_f64::prelude::*;

use super::{
    BodyDesc, BodyHandle, BodyKind, ConstraintHandle, PhysicsWorld, Pose, Shape, Velocity,
    GRAVITY,
};
use kicksim_core::Vector3;

/// [`PhysicsWorld`] backed by rapier with full contact handling.
pub struct RapierWorld {
    gravity: Vector<f64>,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl RapierWorld {
    pub fn new() -> Self {
        Self {
            gravity: Vector::z() * -GRAVITY,
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(to_rapier(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(to_rapier(handle))
    }
}

impl std::fmt::Debug for RapierWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapierWorld")
            .field("bodies", &self.rigid_body_set.len())
            .field("colliders", &self.collider_set.len())
            .finish()
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rapier(handle: BodyHandle) -> RigidBodyHandle {
    RigidBodyHandle::from_raw_parts(handle.index, handle.generation)
}

fn from_rapier(handle: RigidBodyHandle) -> BodyHandle {
    let (index, generation) = handle.into_raw_parts();
    BodyHandle { index, generation }
}

fn collider_for(desc: &BodyDesc) -> ColliderBuilder {
    let builder = match desc.shape {
        Shape::Ball { radius } => ColliderBuilder::ball(radius),
        // rapier cylinders stand on the y axis
        Shape::Cylinder {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(half_height, radius)
            .rotation(Vector::x() * std::f64::consts::FRAC_PI_2),
        Shape::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
    };
    let builder = builder
        .restitution(desc.restitution)
        .restitution_combine_rule(CoefficientCombineRule::Min)
        .friction(desc.friction)
        .friction_combine_rule(CoefficientCombineRule::Min);
    match desc.kind {
        BodyKind::Dynamic => builder.mass(desc.mass),
        BodyKind::Fixed => builder,
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let builder = match desc.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .ccd_enabled(desc.ccd)
                .can_sleep(false),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        let builder = builder.position(desc.pose);
        let builder = if desc.planar {
            builder.locked_axes(
                LockedAxes::TRANSLATION_LOCKED_Z
                    | LockedAxes::ROTATION_LOCKED_X
                    | LockedAxes::ROTATION_LOCKED_Y,
            )
        } else {
            builder
        };
        let handle = self.rigid_body_set.insert(builder.build());
        self.collider_set.insert_with_parent(
            collider_for(desc).build(),
            handle,
            &mut self.rigid_body_set,
        );
        from_rapier(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.rigid_body_set.remove(
            to_rapier(body),
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.body(body).is_some()
    }

    fn pose(&self, body: BodyHandle) -> Option<Pose> {
        self.body(body).map(|b| *b.position())
    }

    fn velocity(&self, body: BodyHandle) -> Option<Velocity> {
        self.body(body)
            .map(|b| Velocity::new(*b.linvel(), *b.angvel()))
    }

    fn mass(&self, body: BodyHandle) -> Option<f64> {
        self.body(body).map(|b| b.mass())
    }

    fn set_pose(&mut self, body: BodyHandle, pose: Pose) {
        if let Some(b) = self.body_mut(body) {
            b.set_position(pose, true);
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Velocity) {
        if let Some(b) = self.body_mut(body) {
            b.set_linvel(velocity.linear, true);
            b.set_angvel(velocity.angular, true);
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vector3, torque: Vector3) {
        if let Some(b) = self.body_mut(body) {
            b.add_force(force, true);
            b.add_torque(torque, true);
        }
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vector3) {
        if let Some(b) = self.body_mut(body) {
            b.apply_impulse(impulse, true);
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
        let joint = SphericalJointBuilder::new()
            .local_anchor1(anchor_a.into())
            .local_anchor2(anchor_b.into());
        let handle = self
            .impulse_joint_set
            .insert(to_rapier(a), to_rapier(b), joint, true);
        let (index, generation) = handle.into_raw_parts();
        Some(ConstraintHandle { index, generation })
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        let handle = ImpulseJointHandle::from_raw_parts(constraint.index, constraint.generation);
        self.impulse_joint_set.remove(handle, true);
    }

    fn step(&mut self, dt: f64) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // Forces only act for a single step
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }
}
