use std::f64::consts::PI;

use kicksim_core::{
    intersect_horizontal_plane, DetectionBall, SimTime, UprightCylinder, Vector2, Vector3,
};

use crate::{
    physics::{planar_pose, BodyDesc, BodyHandle, PhysicsWorld, Shape, Velocity},
    rng::RandomSource,
    state::BallState,
};

/// Mass of a golf ball in kg
pub const BALL_MASS: f64 = 0.046;
/// Deceleration of a rolling ball in mm/s^2
pub const BALL_DECELERATION: f64 = 500.0;
/// Focal length of the simulated cameras, in pixels per unit of distance ratio
pub const FOCAL_LENGTH: f64 = 390.0;
/// Fastest ball the simulation accepts from a kick, in mm/s
pub const MAX_KICK_SPEED: f64 = 10000.0;

const BALL_RESTITUTION: f64 = 0.5;
/// Sample rays on the ball silhouette used for occlusion
const VISIBILITY_SAMPLES: usize = 8;
/// Extra space around the boundary before the ball counts as lost
const INVALID_MARGIN: f64 = 500.0;

/// Pending ball teleport, in simulator coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallMove {
    pub position: Vector2,
    pub z: Option<f64>,
    pub velocity: Option<Vector3>,
}

/// Settings for sampling a ball detection from one camera.
#[derive(Debug, Clone, Copy)]
pub struct BallDetectionParams {
    pub stddev: f64,
    pub stddev_area: f64,
    pub camera_position: Vector3,
    pub enable_invisible_ball: bool,
    pub visibility_threshold: f64,
    pub position_offset: Vector2,
    pub missing_probability: f64,
    pub min_interval: SimTime,
}

/// The physics backed ball.
#[derive(Debug)]
pub struct BallBody {
    handle: BodyHandle,
    radius: f64,
    bounds: Vector2,
    pending_move: Option<BallMove>,
    last_send_time: Option<SimTime>,
}

impl BallBody {
    /// Creates a ball resting at the center of the field. `bounds` are the
    /// half extents of the area enclosed by the walls.
    pub fn new(world: &mut dyn PhysicsWorld, radius: f64, bounds: Vector2) -> Self {
        let desc = BodyDesc::dynamic(
            Shape::Ball { radius },
            planar_pose(Vector3::new(0.0, 0.0, radius), 0.0),
            BALL_MASS,
        )
        .with_restitution(BALL_RESTITUTION)
        .with_ccd();
        Self {
            handle: world.create_body(&desc),
            radius,
            bounds,
            pending_move: None,
            last_send_time: None,
        }
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_bounds(&mut self, bounds: Vector2) {
        self.bounds = bounds;
    }

    pub fn position(&self, world: &dyn PhysicsWorld) -> Vector3 {
        world
            .pose(self.handle)
            .map(|p| p.translation.vector)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn velocity(&self, world: &dyn PhysicsWorld) -> Vector3 {
        world
            .velocity(self.handle)
            .map(|v| v.linear)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Position of a pending teleport, if any.
    pub fn pending_position(&self) -> Option<Vector2> {
        self.pending_move.map(|m| m.position)
    }

    /// Schedules a teleport applied by the next [`BallBody::begin`].
    pub fn move_to(&mut self, target: BallMove) {
        self.pending_move = Some(target);
    }

    /// Applies a pending teleport and the rolling friction for the next step.
    pub fn begin(&mut self, world: &mut dyn PhysicsWorld, dt: f64) {
        if let Some(target) = self.pending_move.take() {
            let z = target.z.unwrap_or(self.radius).max(self.radius);
            world.set_pose(
                self.handle,
                planar_pose(Vector3::new(target.position.x, target.position.y, z), 0.0),
            );
            world.set_velocity(
                self.handle,
                Velocity::new(target.velocity.unwrap_or_else(Vector3::zeros), Vector3::zeros()),
            );
        }

        let position = self.position(world);
        let velocity = self.velocity(world);
        let on_ground = position.z <= self.radius + 1.0;
        let speed = velocity.xy().norm();
        if on_ground && speed > 0.0 && dt > 0.0 {
            let deceleration = BALL_DECELERATION.min(speed / dt);
            let direction = velocity.xy() / speed;
            let force = -direction * deceleration * BALL_MASS;
            world.apply_force(
                self.handle,
                Vector3::new(force.x, force.y, 0.0),
                Vector3::zeros(),
            );
        }
    }

    /// Gives the ball the velocity `velocity`, clamped to the fastest kick the
    /// simulation accepts.
    pub fn kick(&mut self, world: &mut dyn PhysicsWorld, velocity: Vector3) {
        let velocity = velocity.cap_magnitude(MAX_KICK_SPEED);
        let delta = velocity - self.velocity(world);
        let mass = world.mass(self.handle).unwrap_or(BALL_MASS);
        world.apply_impulse(self.handle, delta * mass);
    }

    /// Non-finite state or a ball far outside the walls.
    pub fn is_invalid(&self, world: &dyn PhysicsWorld) -> bool {
        let (Some(pose), Some(velocity)) = (world.pose(self.handle), world.velocity(self.handle))
        else {
            return true;
        };
        let p = pose.translation.vector;
        let finite = p.iter().all(|v| v.is_finite())
            && velocity.linear.iter().all(|v| v.is_finite())
            && velocity.angular.iter().all(|v| v.is_finite());
        !finite
            || p.x.abs() > self.bounds.x + INVALID_MARGIN
            || p.y.abs() > self.bounds.y + INVALID_MARGIN
            || p.z < -INVALID_MARGIN
    }

    /// Fraction of the ball silhouette seen from `camera` that is not hidden
    /// behind robots.
    pub fn visibility(
        &self,
        world: &dyn PhysicsWorld,
        camera: &Vector3,
        occluders: &[UprightCylinder],
    ) -> f64 {
        let center = self.position(world);
        if center.z >= camera.z {
            return 0.0;
        }
        let view = (center - camera).normalize();
        // Two directions spanning the silhouette disc
        let side = if view.x.abs() < 0.9 {
            view.cross(&Vector3::x()).normalize()
        } else {
            view.cross(&Vector3::y()).normalize()
        };
        let up = view.cross(&side);

        let mut samples = Vec::with_capacity(VISIBILITY_SAMPLES + 1);
        samples.push(center);
        for i in 0..VISIBILITY_SAMPLES {
            let a = 2.0 * PI * i as f64 / VISIBILITY_SAMPLES as f64;
            samples.push(center + (side * a.cos() + up * a.sin()) * self.radius * 0.9);
        }
        let visible = samples
            .iter()
            .filter(|s| !occluders.iter().any(|o| o.intersects_segment(camera, s)))
            .count();
        visible as f64 / samples.len() as f64
    }

    /// Samples a detection of the ball from one camera at `time`.
    pub fn update_detection(
        &mut self,
        world: &dyn PhysicsWorld,
        rng: &mut RandomSource,
        params: &BallDetectionParams,
        occluders: &[UprightCylinder],
        time: SimTime,
    ) -> Option<DetectionBall> {
        if let Some(last) = self.last_send_time {
            if time != last && time - last < params.min_interval {
                return None;
            }
        }

        let camera = params.camera_position;
        let position = self.position(world);
        if position.z >= camera.z {
            return None;
        }
        if params.enable_invisible_ball
            && self.visibility(world, &camera, occluders) < params.visibility_threshold
        {
            return None;
        }
        if params.missing_probability > 0.0 && rng.uniform() < params.missing_probability {
            return None;
        }

        // Vision assumes the ball lies on the ground
        let projected = intersect_horizontal_plane(&camera, &position, self.radius)?;
        let noise = rng.normal_vector(params.stddev);
        let detected = projected.xy() + noise + params.position_offset;

        let distance = (position - camera).norm();
        let pixel_radius = FOCAL_LENGTH * self.radius / distance;
        let area = (PI * pixel_radius * pixel_radius + rng.normal(params.stddev_area)).max(0.0);
        let depth = camera.z - self.radius;

        self.last_send_time = Some(time);
        Some(DetectionBall {
            confidence: 1.0,
            area,
            x: detected.x,
            y: detected.y,
            pixel_x: FOCAL_LENGTH * (projected.x - camera.x) / depth,
            pixel_y: FOCAL_LENGTH * (projected.y - camera.y) / depth,
        })
    }

    pub fn write_state(&self, world: &dyn PhysicsWorld) -> BallState {
        let velocity = world.velocity(self.handle).unwrap_or_default();
        BallState {
            position: self.position(world),
            velocity: velocity.linear,
            angular_velocity: velocity.angular,
        }
    }

    pub fn restore_state(&mut self, world: &mut dyn PhysicsWorld, state: &BallState) {
        self.pending_move = None;
        world.set_pose(self.handle, planar_pose(state.position, 0.0));
        world.set_velocity(
            self.handle,
            Velocity::new(state.velocity, state.angular_velocity),
        );
    }

    /// Puts the ball back to rest at the field center.
    pub fn reset(&mut self, world: &mut dyn PhysicsWorld) {
        self.restore_state(
            world,
            &BallState {
                position: Vector3::new(0.0, 0.0, self.radius),
                velocity: Vector3::zeros(),
                angular_velocity: Vector3::zeros(),
            },
        );
    }

    pub fn remove(self, world: &mut dyn PhysicsWorld) {
        world.remove_body(self.handle);
    }
}
