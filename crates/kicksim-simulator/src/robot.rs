use kicksim_core::{
    Angle, DetectionRobot, ErrorSource, MoveCommand, RadioResponse, RobotCommand, RobotMode,
    RobotSpecs, SimError, SimTime, TeamColor, UprightCylinder, Vector2, Vector3,
};

use crate::{
    ball::{BallBody, FOCAL_LENGTH},
    error_aggregator::ErrorAggregator,
    kinematics::{KinematicsError, WheelCoupling},
    physics::{
        planar_pose, yaw_of, BodyDesc, BodyHandle, ConstraintHandle, PhysicsWorld, Shape, Velocity,
    },
    rng::RandomSource,
    state::RobotState,
};

/// Time after which a robot without new commands goes to standby, in s
pub const COMMAND_TIMEOUT: f64 = 0.1;

// Velocity controller gains, critically damped
const K_P: f64 = 20.0;
const K_I: f64 = 100.0;
const K_P_PHI: f64 = 30.0;
const K_I_PHI: f64 = 225.0;

/// Gain of the by-force position controller, in 1/s
const DRIVE_GAIN: f64 = 5.0;
const DRIVE_TOLERANCE: f64 = 1.0;
const DRIVE_ANGLE_TOLERANCE: f64 = 0.01;

/// How far in front of the dribbler bar the ball still counts as captured, in mm
const CAPTURE_DEPTH: f64 = 10.0;
/// Spring and damper of the physical dribbler, in 1/s^2 and 1/s
const DRIBBLE_STIFFNESS: f64 = 400.0;
const DRIBBLE_DAMPING: f64 = 40.0;
/// Strongest acceleration the dribbler can give the ball, in mm/s^2
const DRIBBLE_MAX_ACCELERATION: f64 = 5000.0;
/// Gap between the chassis and the ground
const GROUND_CLEARANCE: f64 = 1.0;

/// Pending robot teleport, in simulator coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotMove {
    pub position: Vector2,
    pub yaw: Option<f64>,
    /// Global velocity (x, y in mm/s, angular in rad/s)
    pub velocity: Option<Vector3>,
    pub by_force: bool,
}

/// Settings for sampling a robot detection from one camera.
#[derive(Debug, Clone, Copy)]
pub struct RobotDetectionParams {
    pub stddev_p: f64,
    pub stddev_phi: f64,
    pub camera_position: Vector3,
    pub position_offset: Vector2,
    pub min_interval: SimTime,
}

/// A physics backed robot.
#[derive(Debug)]
pub struct RobotBody {
    specs: RobotSpecs,
    team: TeamColor,
    generation: u32,
    handle: BodyHandle,
    coupling: Result<WheelCoupling, KinematicsError>,
    inertia: f64,

    command: RobotCommand,
    /// Commanded local velocity (forward, left, angular)
    target: Vector3,
    time_since_command: f64,
    error_sum: Vector3,
    mode: RobotMode,

    charge: bool,
    is_charged: bool,
    time_since_shot: f64,

    perfect_dribbler: bool,
    hold: Option<ConstraintHandle>,

    pending_move: Option<RobotMove>,
    drive_target: Option<RobotMove>,
    last_send_time: Option<SimTime>,
}

impl RobotBody {
    pub fn new(
        world: &mut dyn PhysicsWorld,
        specs: RobotSpecs,
        team: TeamColor,
        generation: u32,
        position: Vector2,
        yaw: f64,
    ) -> Self {
        let half_height = specs.height / 2.0;
        let desc = BodyDesc::dynamic(
            Shape::Cylinder {
                radius: specs.radius,
                half_height,
            },
            planar_pose(
                Vector3::new(position.x, position.y, half_height + GROUND_CLEARANCE),
                yaw,
            ),
            specs.mass,
        )
        .planar();
        let handle = world.create_body(&desc);
        let coupling = WheelCoupling::new(&specs.wheel_angles, specs.radius, &specs.acceleration);
        if let Err(err) = &coupling {
            log::warn!("robot {} {}: {}", team, specs.id, err);
        }
        let inertia = 0.5 * specs.mass * specs.radius * specs.radius;

        Self {
            command: RobotCommand::new(specs.id),
            specs,
            team,
            generation,
            handle,
            coupling,
            inertia,
            target: Vector3::zeros(),
            time_since_command: f64::INFINITY,
            error_sum: Vector3::zeros(),
            mode: RobotMode::Standby,
            charge: true,
            is_charged: true,
            time_since_shot: f64::INFINITY,
            perfect_dribbler: false,
            hold: None,
            pending_move: None,
            drive_target: None,
            last_send_time: None,
        }
    }

    pub fn specs(&self) -> &RobotSpecs {
        &self.specs
    }

    pub fn team(&self) -> TeamColor {
        self.team
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    pub fn is_charged(&self) -> bool {
        self.is_charged
    }

    pub fn holds_ball(&self) -> bool {
        self.hold.is_some()
    }

    pub fn position(&self, world: &dyn PhysicsWorld) -> Vector2 {
        world
            .pose(self.handle)
            .map(|p| p.translation.vector.xy())
            .unwrap_or_else(Vector2::zeros)
    }

    pub fn yaw(&self, world: &dyn PhysicsWorld) -> f64 {
        world.pose(self.handle).map(|p| yaw_of(&p)).unwrap_or(0.0)
    }

    /// Position of a pending teleport, if any, else the current position.
    pub fn planned_position(&self, world: &dyn PhysicsWorld) -> Vector2 {
        self.pending_move
            .map(|m| m.position)
            .unwrap_or_else(|| self.position(world))
    }

    /// The chassis as an obstacle for line of sight checks.
    pub fn cylinder(&self, world: &dyn PhysicsWorld) -> UprightCylinder {
        UprightCylinder {
            center: self.position(world),
            radius: self.specs.radius,
            height: self.specs.height + GROUND_CLEARANCE,
        }
    }

    /// Local velocity (forward, left, angular) as measured by the robot.
    pub fn local_velocity(&self, world: &dyn PhysicsWorld) -> Vector3 {
        let velocity = world.velocity(self.handle).unwrap_or_default();
        let yaw = self.yaw(world);
        let (s, c) = yaw.sin_cos();
        let v = velocity.linear;
        Vector3::new(c * v.x + s * v.y, -s * v.x + c * v.y, velocity.angular.z)
    }

    pub fn set_dribble_mode(&mut self, world: &mut dyn PhysicsWorld, perfect: bool) {
        if !perfect {
            self.stop_dribbling(world);
        }
        self.perfect_dribbler = perfect;
    }

    /// Receives a command over the radio. With probability `rx_loss` the
    /// packet is lost and the previous command stays active.
    #[allow(clippy::too_many_arguments)]
    pub fn set_command(
        &mut self,
        world: &dyn PhysicsWorld,
        rng: &mut RandomSource,
        command: &RobotCommand,
        ball: &BallBody,
        charge: bool,
        rx_loss: f64,
        tx_loss: f64,
        time: SimTime,
    ) -> RadioResponse {
        self.charge = charge;
        if rng.uniform() >= rx_loss {
            self.command = *command;
            self.time_since_command = 0.0;
            self.target = match command.move_command {
                Some(MoveCommand::Local {
                    forward,
                    left,
                    angular,
                }) => Vector3::new(forward, left, angular),
                Some(MoveCommand::Wheel { speeds }) => match &self.coupling {
                    Ok(coupling) => coupling.local_from_wheels(&speeds.into()),
                    Err(_) => Vector3::zeros(),
                },
                // Global commands are resolved against the current heading
                // in every sub-step
                Some(MoveCommand::Global { .. }) | None => Vector3::zeros(),
            };
            if self.mode == RobotMode::Standby {
                self.mode = RobotMode::Active;
            }
        }

        let estimate = self.local_velocity(world);
        RadioResponse {
            id: self.specs.id,
            generation: self.generation,
            time,
            battery: 1.0,
            ball_detected: self.can_kick_ball(world, ball),
            cap_charged: self.is_charged,
            packet_loss_rx: rx_loss,
            packet_loss_tx: tx_loss,
            estimated_forward: estimate.x,
            estimated_left: estimate.y,
            estimated_angular: estimate.z,
        }
    }

    /// Schedules a teleport applied by the next [`RobotBody::begin`].
    pub fn move_to(&mut self, target: RobotMove) {
        self.pending_move = Some(target);
    }

    /// Returns true if the ball is in front of the dribbler or held by it.
    pub fn can_kick_ball(&self, world: &dyn PhysicsWorld, ball: &BallBody) -> bool {
        if self.hold.is_some() {
            return true;
        }
        let local = self.ball_in_local_frame(world, ball);
        let d = self.specs.center_to_dribbler();
        local.x >= d
            && local.x <= d + ball.radius() + CAPTURE_DEPTH
            && local.y.abs() <= self.specs.dribbler_width / 2.0
            && local.z <= 3.0 * ball.radius()
    }

    fn ball_in_local_frame(&self, world: &dyn PhysicsWorld, ball: &BallBody) -> Vector3 {
        let ball_position = ball.position(world);
        let robot_position = self.position(world);
        let (s, c) = self.yaw(world).sin_cos();
        let d = ball_position.xy() - robot_position;
        Vector3::new(c * d.x + s * d.y, -s * d.x + c * d.y, ball_position.z)
    }

    /// Point at the center of the dribbler bar where a held ball sits, in the
    /// robot frame.
    fn dribbler_anchor(&self, ball: &BallBody) -> Vector3 {
        Vector3::new(
            self.specs.center_to_dribbler() + ball.radius(),
            0.0,
            ball.radius() - self.specs.height / 2.0 - GROUND_CLEARANCE,
        )
    }

    /// Pulls the ball to the dribbler. `speed` is the dribbler speed in [0, 1].
    pub fn dribble(&mut self, world: &mut dyn PhysicsWorld, ball: &BallBody, speed: f64) {
        if self.perfect_dribbler {
            if self.hold.is_none() {
                self.hold = world.add_constraint(
                    self.handle,
                    ball.handle(),
                    self.dribbler_anchor(ball),
                    Vector3::zeros(),
                );
            }
            return;
        }

        let Some(pose) = world.pose(self.handle) else {
            return;
        };
        let anchor = pose * nalgebra::Point3::from(self.dribbler_anchor(ball));
        let robot_velocity = world.velocity(self.handle).unwrap_or_default();
        let anchor_velocity = robot_velocity.linear
            + robot_velocity
                .angular
                .cross(&(anchor.coords - pose.translation.vector));

        let offset = (anchor.coords - ball.position(world)).xy();
        let relative = (ball.velocity(world) - anchor_velocity).xy();
        let acceleration = ((offset * DRIBBLE_STIFFNESS - relative * DRIBBLE_DAMPING) * speed)
            .cap_magnitude(DRIBBLE_MAX_ACCELERATION);
        let force = acceleration * world.mass(ball.handle()).unwrap_or(0.0);
        world.apply_force(
            ball.handle(),
            Vector3::new(force.x, force.y, 0.0),
            Vector3::zeros(),
        );
    }

    pub fn stop_dribbling(&mut self, world: &mut dyn PhysicsWorld) {
        if let Some(hold) = self.hold.take() {
            world.remove_constraint(hold);
        }
    }

    /// Applies pending teleports, runs the velocity controller and the
    /// dribbler/kicker for the next sub-step of `dt` seconds.
    pub fn begin(
        &mut self,
        world: &mut dyn PhysicsWorld,
        ball: &mut BallBody,
        errors: &mut ErrorAggregator,
        dt: f64,
    ) {
        if let Some(target) = self.pending_move.take() {
            self.apply_move(world, target);
        }

        self.time_since_command += dt;
        self.time_since_shot += dt;
        if self.charge
            && !self.is_charged
            && self.time_since_shot >= self.specs.kicker_recharge_time
        {
            self.is_charged = true;
        }
        if self.time_since_command > COMMAND_TIMEOUT && self.mode != RobotMode::Standby {
            log::debug!("robot {} {} timed out", self.team, self.specs.id);
            self.mode = RobotMode::Standby;
            self.command = RobotCommand::new(self.specs.id);
            self.target = Vector3::zeros();
        }
        if self.mode == RobotMode::Kicking {
            self.mode = RobotMode::Active;
        }

        let current = self.local_velocity(world);
        let target = self.control_target(world);
        match &self.coupling {
            Ok(coupling) => {
                let error = target - current;
                self.error_sum += error * dt;
                // Anti-windup: the integral alone never asks for more than
                // the speed-up limit of its axis
                let limits = &self.specs.acceleration;
                let max_sum = Vector3::new(
                    limits.speedup_forward / K_I,
                    limits.speedup_sideward / K_I,
                    limits.speedup_angular / K_I_PHI,
                );
                self.error_sum = self.error_sum.zip_map(&max_sum, |e, m| e.clamp(-m, m));

                let acceleration = Vector3::new(
                    K_P * error.x + K_I * self.error_sum.x,
                    K_P * error.y + K_I * self.error_sum.y,
                    K_P_PHI * error.z + K_I_PHI * self.error_sum.z,
                );
                let acceleration = coupling.limit_acceleration(&acceleration, &current);

                let (s, c) = self.yaw(world).sin_cos();
                let global = Vector2::new(
                    c * acceleration.x - s * acceleration.y,
                    s * acceleration.x + c * acceleration.y,
                ) * self.specs.mass;
                world.apply_force(
                    self.handle,
                    Vector3::new(global.x, global.y, 0.0),
                    Vector3::new(0.0, 0.0, self.inertia * acceleration.z),
                );
            }
            Err(err) => {
                errors.aggregate(
                    SimError::new(
                        "ROBOT_KINEMATICS",
                        format!("{} robot {}: {}", self.team, self.specs.id, err),
                    ),
                    ErrorSource::Config,
                );
            }
        }

        let dribbler_speed = if self.mode == RobotMode::Standby {
            0.0
        } else {
            self.command.dribbler_speed
        };
        if dribbler_speed > 0.0 {
            if self.can_kick_ball(world, ball) {
                self.dribble(world, ball, dribbler_speed);
            }
        } else {
            self.stop_dribbling(world);
        }

        if self.mode != RobotMode::Standby
            && self.command.wants_kick()
            && self.is_charged
            && self.can_kick_ball(world, ball)
        {
            self.kick(world, ball);
        }
    }

    fn kick(&mut self, world: &mut dyn PhysicsWorld, ball: &mut BallBody) {
        self.stop_dribbling(world);
        let angle = self.command.kick_angle.clamp(0.0, std::f64::consts::FRAC_PI_2);
        let max = if angle > 0.0 {
            self.specs.shot_chip_max
        } else {
            self.specs.shot_linear_max
        };
        let speed = self.command.kick_speed.min(max);
        let (s, c) = self.yaw(world).sin_cos();
        let direction = Vector3::new(c * angle.cos(), s * angle.cos(), angle.sin());
        log::debug!(
            "robot {} {} kicks with {:.0} mm/s",
            self.team,
            self.specs.id,
            speed
        );
        ball.kick(world, direction * speed);
        self.is_charged = false;
        self.time_since_shot = 0.0;
        self.mode = RobotMode::Kicking;
    }

    fn apply_move(&mut self, world: &mut dyn PhysicsWorld, target: RobotMove) {
        self.stop_dribbling(world);
        self.error_sum = Vector3::zeros();
        self.target = Vector3::zeros();
        self.command = RobotCommand::new(self.specs.id);
        self.mode = RobotMode::Active;
        self.time_since_command = 0.0;

        if target.by_force {
            self.drive_target = Some(target);
            return;
        }
        self.drive_target = None;

        let yaw = target.yaw.unwrap_or_else(|| self.yaw(world));
        let z = self.specs.height / 2.0 + GROUND_CLEARANCE;
        world.set_pose(
            self.handle,
            planar_pose(Vector3::new(target.position.x, target.position.y, z), yaw),
        );
        let velocity = target.velocity.unwrap_or_else(Vector3::zeros);
        world.set_velocity(
            self.handle,
            Velocity::new(
                Vector3::new(velocity.x, velocity.y, 0.0),
                Vector3::new(0.0, 0.0, velocity.z),
            ),
        );
    }

    /// Local target velocity for this sub-step.
    fn control_target(&mut self, world: &dyn PhysicsWorld) -> Vector3 {
        let yaw = self.yaw(world);
        let to_local = |global: Vector2, angular: f64| {
            let (s, c) = yaw.sin_cos();
            Vector3::new(
                c * global.x + s * global.y,
                -s * global.x + c * global.y,
                angular,
            )
        };

        let target = if let Some(drive) = self.drive_target {
            // Keep the robot active while it drives to the teleport target
            self.time_since_command = 0.0;
            let offset = drive.position - self.position(world);
            let angle_error = drive
                .yaw
                .map(|y| Angle::from_radians(y - yaw).radians())
                .unwrap_or(0.0);
            if offset.norm() < DRIVE_TOLERANCE && angle_error.abs() < DRIVE_ANGLE_TOLERANCE {
                self.drive_target = None;
            }
            to_local(offset * DRIVE_GAIN, angle_error * DRIVE_GAIN)
        } else if self.mode == RobotMode::Standby {
            Vector3::zeros()
        } else {
            match self.command.move_command {
                Some(MoveCommand::Global { x, y, angular }) => {
                    to_local(Vector2::new(x, y), angular)
                }
                _ => self.target,
            }
        };

        // Respect the speed limits
        let linear = target.xy().cap_magnitude(self.specs.v_max);
        let angular = target
            .z
            .clamp(-self.specs.omega_max, self.specs.omega_max);
        Vector3::new(linear.x, linear.y, angular)
    }

    /// Samples a detection of the robot from one camera at `time`.
    pub fn update_detection(
        &mut self,
        world: &dyn PhysicsWorld,
        rng: &mut RandomSource,
        params: &RobotDetectionParams,
        time: SimTime,
    ) -> Option<DetectionRobot> {
        if let Some(last) = self.last_send_time {
            if time != last && time - last < params.min_interval {
                return None;
            }
        }
        let position = self.position(world);
        let camera = params.camera_position;
        let depth = camera.z - self.specs.height;
        if depth <= 0.0 {
            return None;
        }
        let detected = position + rng.normal_vector(params.stddev_p) + params.position_offset;
        let orientation = Angle::from_radians(
            self.yaw(world) + rng.normal(params.stddev_phi),
        );

        self.last_send_time = Some(time);
        Some(DetectionRobot {
            confidence: 1.0,
            robot_id: self.specs.id,
            x: detected.x,
            y: detected.y,
            orientation: orientation.radians(),
            pixel_x: pixel_offset(position.x - camera.x, depth),
            pixel_y: pixel_offset(position.y - camera.y, depth),
            height: self.specs.height,
        })
    }

    pub fn write_state(&self, world: &dyn PhysicsWorld) -> RobotState {
        let velocity = world.velocity(self.handle).unwrap_or_default();
        let pose = world.pose(self.handle);
        RobotState {
            team: self.team,
            id: self.specs.id,
            generation: self.generation,
            position: pose
                .map(|p| p.translation.vector)
                .unwrap_or_else(Vector3::zeros),
            yaw: pose.map(|p| yaw_of(&p)).unwrap_or(0.0),
            velocity: velocity.linear,
            angular_velocity: velocity.angular.z,
            mode: self.mode,
            dribbler_speed: self.command.dribbler_speed,
            is_charged: self.is_charged,
            holds_ball: self.hold.is_some(),
        }
    }

    pub fn restore_state(
        &mut self,
        world: &mut dyn PhysicsWorld,
        ball: &BallBody,
        state: &RobotState,
    ) {
        self.stop_dribbling(world);
        self.pending_move = None;
        self.drive_target = None;
        self.error_sum = Vector3::zeros();
        world.set_pose(self.handle, planar_pose(state.position, state.yaw));
        world.set_velocity(
            self.handle,
            Velocity::new(state.velocity, Vector3::new(0.0, 0.0, state.angular_velocity)),
        );
        self.mode = state.mode;
        self.command.dribbler_speed = state.dribbler_speed;
        self.is_charged = state.is_charged;
        if state.holds_ball && self.perfect_dribbler {
            self.hold = world.add_constraint(
                self.handle,
                ball.handle(),
                self.dribbler_anchor(ball),
                Vector3::zeros(),
            );
        }
    }

    pub fn remove(mut self, world: &mut dyn PhysicsWorld) {
        self.stop_dribbling(world);
        world.remove_body(self.handle);
    }
}

/// Offset on the image plane of a point `offset` mm from the camera axis.
fn pixel_offset(offset: f64, depth: f64) -> f64 {
    FOCAL_LENGTH * offset / depth
}
