use std::{collections::VecDeque, f64::consts::PI};

use kicksim_core::{
    secs_to_nanos, Angle, Command, ConfigCommand, DetectionBall, DetectionFrame, DetectionRobot,
    ErrorReport, ErrorSource, FieldGeometry, MoveCommand, PlayerId, RadioResponse,
    RealismConfig, RobotCommand, RobotSpecs, SideAssignment, SimError, SimTime, TeamColor,
    TeamCommand, TeleportBall, TeleportRobot, UprightCylinder, Vector2, Vector3, VisionPacket,
};
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::{
    ball::{BallBody, BallDetectionParams, BallMove},
    config::{
        validate_geometry, validate_realism, validate_team, CameraSetup, SetupError,
        SimulatorSetup, TimingConfig,
    },
    error_aggregator::ErrorAggregator,
    field::FieldBody,
    physics::{PhysicsWorld, RapierWorld},
    rng::RandomSource,
    robot::{RobotBody, RobotDetectionParams, RobotMove},
    robot_map::{RobotHandle, RobotMap},
    state::{RobotState, SimulatorState},
    vision::{geometry_frame, VisionPipeline},
};

/// Duration of one physics step in seconds
pub const SUB_TIMESTEP: f64 = 1.0 / 200.0;
/// Most sub-steps a single tick may run, one second of simulated time
pub const MAX_SUB_STEPS: u64 = 200;

/// Stream of the generator shuffling robot detections, independent of the
/// noise stream
const SHUFFLE_STREAM: u64 = 0xda3e_39cb_94b9_5bdb;
/// Distance between two candidate rings when moving robots away from the ball
const SEARCH_STEP: f64 = 50.0;
const SEARCH_RINGS: u32 = 120;
/// Gap kept between a relocated robot and other objects
const CLEARANCE: f64 = 10.0;

/// Everything a tick produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickOutput {
    /// Packets whose release time has passed, oldest first
    pub vision_packets: Vec<VisionPacket>,
    pub radio_responses: Vec<(TeamColor, RadioResponse)>,
    /// At most one report per error origin
    pub errors: Vec<ErrorReport>,
}

#[derive(Debug, Clone)]
struct QueuedCommand {
    due: SimTime,
    processing_start: SimTime,
    team: TeamColor,
    command: TeamCommand,
    /// Generation of each addressed robot when the command arrived
    generations: Vec<Option<u32>>,
}

#[derive(Debug)]
struct Teams {
    blue: RobotMap,
    yellow: RobotMap,
}

impl Teams {
    fn get(&self, team: TeamColor) -> &RobotMap {
        match team {
            TeamColor::Blue => &self.blue,
            TeamColor::Yellow => &self.yellow,
        }
    }

    fn get_mut(&mut self, team: TeamColor) -> &mut RobotMap {
        match team {
            TeamColor::Blue => &mut self.blue,
            TeamColor::Yellow => &mut self.yellow,
        }
    }

    /// Blue robots by ascending id, then yellow ones
    fn iter(&self) -> impl Iterator<Item = &RobotBody> {
        self.blue.iter().chain(self.yellow.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut RobotBody> {
        self.blue.iter_mut().chain(self.yellow.iter_mut())
    }
}

/// A deterministic simulation of a robot soccer match.
///
/// ## Usage
///
/// ```no_run
/// use kicksim_core::{Command, RobotCommand, PlayerId, TeamColor, TeamCommand};
/// use kicksim_simulator::{Simulation, SimulatorSetup};
///
/// let mut simulation = Simulation::new(SimulatorSetup::default()).unwrap();
/// let command = TeamCommand::new(vec![
///     RobotCommand::new(PlayerId::new(0)).with_local_velocity(1000.0, 0.0, 0.0),
/// ]);
/// simulation.handle_command(
///     Command::Team { team: TeamColor::Blue, command },
///     simulation.time(),
/// );
/// loop {
///     let output = simulation.handle_tick(0.01);
///     for packet in output.vision_packets {
///         // ...
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Simulation<W: PhysicsWorld = RapierWorld> {
    world: W,
    field: Option<FieldBody>,
    ball: BallBody,
    teams: Teams,
    /// Specs to use when a robot is added by a teleport
    team_specs: [Vec<RobotSpecs>; 2],

    rng: RandomSource,
    shuffle_rng: Pcg32,
    errors: ErrorAggregator,
    vision: VisionPipeline,
    command_queue: VecDeque<QueuedCommand>,

    geometry: FieldGeometry,
    cameras: CameraSetup,
    realism: RealismConfig,
    timing: TimingConfig,

    time: SimTime,
    time_scaling: f64,
    flipped: bool,
    side_assignment: SideAssignment,
    charge: bool,
    perfect_dribbler: bool,
}

impl Simulation<RapierWorld> {
    /// Creates a simulation backed by rapier.
    pub fn new(setup: SimulatorSetup) -> Result<Self, SetupError> {
        Self::with_world(RapierWorld::new(), setup)
    }
}

impl<W: PhysicsWorld> Simulation<W> {
    pub fn with_world(mut world: W, setup: SimulatorSetup) -> Result<Self, SetupError> {
        setup.validate()?;

        let field = FieldBody::new(&mut world, &setup.geometry);
        let ball = BallBody::new(
            &mut world,
            setup.geometry.ball_radius,
            setup.geometry.boundary_half_extents(),
        );
        let mut simulation = Self {
            field: Some(field),
            ball,
            teams: Teams {
                blue: RobotMap::new(TeamColor::Blue),
                yellow: RobotMap::new(TeamColor::Yellow),
            },
            team_specs: [Vec::new(), Vec::new()],
            rng: RandomSource::new(setup.seed),
            shuffle_rng: Pcg32::new(setup.seed, SHUFFLE_STREAM),
            errors: ErrorAggregator::new(),
            vision: VisionPipeline::new(
                &setup.geometry,
                &setup.cameras,
                setup.timing.geometry_interval,
            ),
            command_queue: VecDeque::new(),
            geometry: setup.geometry.clone(),
            cameras: setup.cameras.clone(),
            realism: setup.realism.clone(),
            timing: setup.timing.clone(),
            time: 0,
            time_scaling: 1.0,
            flipped: setup.flip,
            side_assignment: SideAssignment::from_flipped(setup.flip),
            charge: setup.charge,
            perfect_dribbler: setup.perfect_dribbler,
            world,
        };
        simulation
            .vision
            .sample_position_errors(&mut simulation.rng, setup.realism.camera_position_error);
        simulation.set_team(TeamColor::Blue, setup.blue_team);
        simulation.set_team(TeamColor::Yellow, setup.yellow_team);

        log::info!(
            "simulation ready: {} blue and {} yellow robots, {} cameras",
            simulation.teams.blue.len(),
            simulation.teams.yellow.len(),
            simulation.vision.cameras().len()
        );
        Ok(simulation)
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn time_scaling(&self) -> f64 {
        self.time_scaling
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn side_assignment(&self) -> SideAssignment {
        self.side_assignment
    }

    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    pub fn realism(&self) -> &RealismConfig {
        &self.realism
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn robots(&self, team: TeamColor) -> &RobotMap {
        self.teams.get(team)
    }

    pub fn pending_vision_packets(&self) -> usize {
        self.vision.pending()
    }

    pub fn pending_commands(&self) -> usize {
        self.command_queue.len()
    }

    /// Advances the simulation by `time_step` seconds of caller time.
    ///
    /// The scaled time is rounded to the closest whole number of
    /// [`SUB_TIMESTEP`] sub-steps, at most [`MAX_SUB_STEPS`]. Longer ticks
    /// drop the excess time.
    pub fn handle_tick(&mut self, time_step: f64) -> TickOutput {
        let mut output = TickOutput::default();

        let steps = if time_step.is_finite() && time_step >= 0.0 {
            let steps = (time_step * self.time_scaling / SUB_TIMESTEP).round();
            if steps > MAX_SUB_STEPS as f64 {
                self.errors.aggregate(
                    SimError::new(
                        "TICK_TOO_LONG",
                        format!(
                            "time step {} s at scaling {} needs more than {} sub-steps, dropping the rest",
                            time_step, self.time_scaling, MAX_SUB_STEPS
                        ),
                    ),
                    ErrorSource::Config,
                );
                MAX_SUB_STEPS
            } else {
                steps as u64
            }
        } else {
            self.errors.aggregate(
                SimError::new("INVALID_TIME_STEP", format!("time step {}", time_step)),
                ErrorSource::Config,
            );
            0
        };

        let step_nanos = secs_to_nanos(SUB_TIMESTEP);
        for _ in 0..steps {
            output.radio_responses.extend(self.apply_due_commands());
            self.step(SUB_TIMESTEP);
            self.time += step_nanos;
        }

        if steps > 0 {
            if self.ball.is_invalid(&self.world) {
                self.errors.aggregate(
                    SimError::new(
                        "BALL_INVALID",
                        "ball left the field or has an invalid state, resetting",
                    ),
                    ErrorSource::Config,
                );
                self.release_ball();
                self.ball.reset(&mut self.world);
            }
            let packet = self.create_vision_packet();
            self.vision.enqueue(packet);
        }
        output.vision_packets = self.vision.release(self.time);

        for source in ErrorSource::ALL {
            let errors = self.errors.take_aggregates(source);
            if !errors.is_empty() {
                log::debug!("{} errors from {}", errors.len(), source);
                output.errors.push(ErrorReport { source, errors });
            }
        }
        output
    }

    fn step(&mut self, dt: f64) {
        self.ball.begin(&mut self.world, dt);
        for robot in self.teams.iter_mut() {
            robot.begin(&mut self.world, &mut self.ball, &mut self.errors, dt);
        }
        self.world.step(dt);
    }

    /// Takes a command from the outside. Team commands are delivered to the
    /// robots once `timestamp` plus the command delay is reached; everything
    /// else applies immediately.
    pub fn handle_command(&mut self, command: Command, timestamp: SimTime) {
        match command {
            Command::Team { team, command } => self.enqueue_team_command(team, command, timestamp),
            Command::TeleportRobot(teleport) => self.teleport_robot(&teleport),
            Command::TeleportBall(teleport) => self.teleport_ball(&teleport),
            Command::Config(config) => self.apply_config(config),
        }
    }

    fn enqueue_team_command(&mut self, team: TeamColor, command: TeamCommand, timestamp: SimTime) {
        let generations = self.generations_of(team, &command);
        let due = timestamp.saturating_add(secs_to_nanos(self.timing.command_delay));
        // Behind everything due at the same time or earlier
        let index = self
            .command_queue
            .iter()
            .rposition(|c| c.due <= due)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.command_queue.insert(
            index,
            QueuedCommand {
                due,
                processing_start: timestamp,
                team,
                command,
                generations,
            },
        );
    }

    fn generations_of(&self, team: TeamColor, command: &TeamCommand) -> Vec<Option<u32>> {
        let robots = self.teams.get(team);
        command
            .commands
            .iter()
            .map(|c| robots.get(c.id).map(|r| r.generation()))
            .collect()
    }

    fn apply_due_commands(&mut self) -> Vec<(TeamColor, RadioResponse)> {
        let mut responses = Vec::new();
        while self
            .command_queue
            .front()
            .map_or(false, |c| c.due <= self.time)
        {
            let Some(queued) = self.command_queue.pop_front() else {
                break;
            };
            let team = queued.team;
            let team_responses = self.apply_radio_commands(
                team,
                &queued.command,
                &queued.generations,
                queued.processing_start,
            );
            responses.extend(team_responses.into_iter().map(|r| (team, r)));
        }
        responses
    }

    /// Delivers a team command to the robots right away and returns the
    /// responses that made it back.
    pub fn handle_radio_commands(
        &mut self,
        team: TeamColor,
        command: &TeamCommand,
        processing_start: SimTime,
    ) -> Vec<RadioResponse> {
        let generations = self.generations_of(team, command);
        self.apply_radio_commands(team, command, &generations, processing_start)
    }

    fn apply_radio_commands(
        &mut self,
        team: TeamColor,
        command: &TeamCommand,
        generations: &[Option<u32>],
        processing_start: SimTime,
    ) -> Vec<RadioResponse> {
        let mut responses = Vec::new();
        let sign = self.flip_sign();
        for (robot_command, generation) in command.commands.iter().zip(generations) {
            let id = robot_command.id;
            let Some(robot) = self.teams.get_mut(team).get_mut(id) else {
                self.errors.aggregate(
                    SimError::new("UNKNOWN_ROBOT", format!("{} robot {} does not exist", team, id)),
                    team.into(),
                );
                continue;
            };
            if *generation != Some(robot.generation()) {
                self.errors.aggregate(
                    SimError::new(
                        "STALE_COMMAND",
                        format!("{} robot {} was replaced before the command arrived", team, id),
                    ),
                    team.into(),
                );
                continue;
            }

            let robot_command = to_simulator_command(robot_command, sign);
            let response = robot.set_command(
                &self.world,
                &mut self.rng,
                &robot_command,
                &self.ball,
                self.charge,
                self.realism.robot_command_loss,
                self.realism.robot_response_loss,
                processing_start,
            );
            if self.rng.uniform() >= self.realism.robot_response_loss {
                responses.push(response);
            }
        }
        responses
    }

    /// Changes how much simulated time a second of caller time is worth. Zero
    /// pauses the simulation.
    pub fn set_scaling(&mut self, factor: f64) {
        if !factor.is_finite() || factor < 0.0 {
            self.errors.aggregate(
                SimError::new("INVALID_SCALING", format!("time scaling {} rejected", factor)),
                ErrorSource::Config,
            );
            return;
        }
        self.time_scaling = factor;
    }

    /// Swaps the sides of the teams. Bodies stay where they are; only the
    /// frame of vision output and incoming coordinates changes.
    pub fn set_flipped(&mut self, flipped: bool) {
        if flipped != self.flipped {
            log::info!("field flipped: {}", flipped);
        }
        self.flipped = flipped;
        self.side_assignment = SideAssignment::from_flipped(flipped);
    }

    pub fn set_charge(&mut self, charge: bool) {
        self.charge = charge;
    }

    pub fn set_dribble_mode(&mut self, perfect: bool) {
        self.perfect_dribbler = perfect;
        for robot in self.teams.iter_mut() {
            robot.set_dribble_mode(&mut self.world, perfect);
        }
    }

    pub fn set_realism(&mut self, realism: RealismConfig) {
        if let Err(err) = validate_realism(&realism) {
            self.config_error("INVALID_REALISM", err);
            return;
        }
        if realism.camera_position_error != self.realism.camera_position_error {
            self.vision
                .sample_position_errors(&mut self.rng, realism.camera_position_error);
        }
        if realism.total_vision_delay() != self.realism.total_vision_delay() {
            self.drop_pending_vision();
        }
        self.realism = realism;
    }

    /// Rebuilds the field for new geometry and sends the geometry again.
    pub fn set_geometry(&mut self, geometry: FieldGeometry) {
        if let Err(err) = validate_geometry(&geometry) {
            self.config_error("INVALID_GEOMETRY", err);
            return;
        }
        if let Some(field) = self.field.take() {
            field.remove(&mut self.world);
        }
        self.field = Some(FieldBody::new(&mut self.world, &geometry));

        if geometry.ball_radius != self.ball.radius() {
            self.release_ball();
            let state = self.ball.write_state(&self.world);
            let ball = BallBody::new(
                &mut self.world,
                geometry.ball_radius,
                geometry.boundary_half_extents(),
            );
            std::mem::replace(&mut self.ball, ball).remove(&mut self.world);
            self.ball.restore_state(&mut self.world, &state);
        }
        self.ball.set_bounds(geometry.boundary_half_extents());
        self.vision.set_layout(&geometry, &self.cameras);
        self.drop_pending_vision();
        self.geometry = geometry;
    }

    /// Discards queued vision packets captured under old parameters.
    fn drop_pending_vision(&mut self) {
        let dropped = self.vision.reset();
        if dropped > 0 {
            log::debug!("dropped {} pending vision packets", dropped);
        }
    }

    /// Makes the team consist of exactly the given robots. Unchanged robots
    /// stay, changed ones are replaced in place with a new generation and new
    /// ones are placed on the team's own half.
    pub fn set_team(&mut self, team: TeamColor, specs: Vec<RobotSpecs>) {
        if let Err(err) = validate_team(team, &specs) {
            self.config_error("INVALID_TEAM", err);
            return;
        }

        let stale: Vec<PlayerId> = self
            .teams
            .get(team)
            .ids()
            .filter(|id| !specs.iter().any(|s| s.id == *id))
            .collect();
        for id in stale {
            self.teams.get_mut(team).remove(&mut self.world, id);
        }

        for spec in &specs {
            let placement = match self.teams.get(team).get(spec.id) {
                Some(robot) if robot.specs() == spec => continue,
                Some(robot) => (robot.position(&self.world), robot.yaw(&self.world)),
                None => self.default_placement(team, spec),
            };
            self.teams
                .get_mut(team)
                .insert(&mut self.world, spec.clone(), placement.0, placement.1);
            if let Some(robot) = self.teams.get_mut(team).get_mut(spec.id) {
                robot.set_dribble_mode(&mut self.world, self.perfect_dribbler);
            }
        }
        self.team_specs[team_index(team)] = specs;
    }

    /// Reseeds all randomness of the simulation.
    pub fn seed_prng(&mut self, seed: u64) {
        self.rng.seed(seed);
        self.shuffle_rng = Pcg32::new(seed, SHUFFLE_STREAM);
    }

    pub fn robot_handle(&self, team: TeamColor, id: PlayerId) -> Option<RobotHandle> {
        self.teams.get(team).handle(id)
    }

    /// State of the robot, if the handle still refers to it.
    pub fn robot_state(&self, handle: RobotHandle) -> Option<RobotState> {
        self.teams
            .get(handle.team)
            .resolve(handle)
            .map(|r| r.write_state(&self.world))
    }

    /// Checkpoint of the simulation, in simulator coordinates.
    pub fn state(&self) -> SimulatorState {
        SimulatorState {
            time: self.time,
            ball: self.ball.write_state(&self.world),
            robots: self.teams.iter().map(|r| r.write_state(&self.world)).collect(),
        }
    }

    /// Restores a checkpoint taken by [`Simulation::state`]. Robots missing in
    /// the simulation are reported and skipped.
    pub fn restore_state(&mut self, state: &SimulatorState) {
        self.release_ball();
        self.time = state.time;
        self.ball.restore_state(&mut self.world, &state.ball);
        for robot_state in &state.robots {
            match self.teams.get_mut(robot_state.team).get_mut(robot_state.id) {
                Some(robot) => robot.restore_state(&mut self.world, &self.ball, robot_state),
                None => self.errors.aggregate(
                    SimError::new(
                        "UNKNOWN_ROBOT",
                        format!(
                            "cannot restore {} robot {}: it does not exist",
                            robot_state.team, robot_state.id
                        ),
                    ),
                    ErrorSource::Config,
                ),
            }
        }
    }

    fn apply_config(&mut self, config: ConfigCommand) {
        if let Some(seed) = config.seed {
            self.seed_prng(seed);
        }
        if let Some(scaling) = config.time_scaling {
            self.set_scaling(scaling);
        }
        if let Some(flip) = config.flip {
            self.set_flipped(flip);
        }
        if let Some(charge) = config.charge {
            self.set_charge(charge);
        }
        if let Some(geometry) = config.geometry {
            self.set_geometry(geometry);
        }
        if let Some(realism) = config.realism {
            self.set_realism(realism);
        }
        if let Some(perfect) = config.perfect_dribbler {
            self.set_dribble_mode(perfect);
        }
        if let Some(specs) = config.blue_team {
            self.set_team(TeamColor::Blue, specs);
        }
        if let Some(specs) = config.yellow_team {
            self.set_team(TeamColor::Yellow, specs);
        }
    }

    fn teleport_robot(&mut self, teleport: &TeleportRobot) {
        let team = teleport.team;
        let id = teleport.id;
        if teleport.present == Some(false) {
            if self.teams.get_mut(team).remove(&mut self.world, id) {
                log::debug!("removed {} robot {}", team, id);
            }
            return;
        }

        if !self.teams.get(team).contains(id) {
            if teleport.present != Some(true) {
                self.errors.aggregate(
                    SimError::new(
                        "UNKNOWN_ROBOT",
                        format!("cannot teleport {} robot {}: it does not exist", team, id),
                    ),
                    ErrorSource::Config,
                );
                return;
            }
            let specs = self.team_specs[team_index(team)]
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .unwrap_or_else(|| RobotSpecs::with_id(id));
            let (position, yaw) = self.default_placement(team, &specs);
            let robots = self.teams.get_mut(team);
            robots.insert(&mut self.world, specs, position, yaw);
            if let Some(robot) = robots.get_mut(id) {
                robot.set_dribble_mode(&mut self.world, self.perfect_dribbler);
            }
        }

        let sign = self.flip_sign();
        let flipped = self.flipped;
        let Some(robot) = self.teams.get_mut(team).get_mut(id) else {
            return;
        };
        let current = robot.planned_position(&self.world) * sign;
        let position = Vector2::new(
            teleport.x.unwrap_or(current.x),
            teleport.y.unwrap_or(current.y),
        ) * sign;
        let yaw = teleport.orientation.map(|o| flip_angle(o, flipped));
        let velocity = if teleport.v_x.is_some() || teleport.v_y.is_some() || teleport.v_angular.is_some() {
            Some(Vector3::new(
                teleport.v_x.unwrap_or(0.0) * sign,
                teleport.v_y.unwrap_or(0.0) * sign,
                teleport.v_angular.unwrap_or(0.0),
            ))
        } else {
            None
        };
        robot.move_to(RobotMove {
            position,
            yaw,
            velocity,
            by_force: teleport.by_force,
        });
    }

    fn teleport_ball(&mut self, teleport: &TeleportBall) {
        let sign = self.flip_sign();
        let current = self
            .ball
            .pending_position()
            .unwrap_or_else(|| self.ball.position(&self.world).xy())
            * sign;
        let position = Vector2::new(
            teleport.x.unwrap_or(current.x),
            teleport.y.unwrap_or(current.y),
        ) * sign;
        let velocity = if teleport.v_x.is_some() || teleport.v_y.is_some() || teleport.v_z.is_some() {
            Some(Vector3::new(
                teleport.v_x.unwrap_or(0.0) * sign,
                teleport.v_y.unwrap_or(0.0) * sign,
                teleport.v_z.unwrap_or(0.0),
            ))
        } else {
            None
        };

        if teleport.teleport_safely {
            self.clear_area_around(&position);
        }
        self.release_ball();
        self.ball.move_to(BallMove {
            position,
            z: teleport.z,
            velocity,
        });
    }

    /// Puts the ball at rest at `(x, y)` (external coordinates) and moves every
    /// robot that would overlap it to the closest free spot.
    pub fn safely_teleport_ball(&mut self, x: f64, y: f64) {
        self.teleport_ball(&TeleportBall {
            teleport_safely: true,
            ..TeleportBall::to(x, y)
        });
    }

    /// Moves robots overlapping a ball at `target` out of the way.
    ///
    /// Each robot searches rings of growing radius around its own position,
    /// starting in the direction away from the ball and alternating sides,
    /// until a spot free of the ball, the field walls and every other robot
    /// is found. Robots are handled blue first, by ascending id.
    fn clear_area_around(&mut self, target: &Vector2) {
        let ball_radius = self.ball.radius();
        let field = self.field.as_ref();
        let extents = self.geometry.boundary_half_extents();
        let mut occupied: Vec<(TeamColor, PlayerId, Vector2, f64)> = self
            .teams
            .iter()
            .map(|r| {
                (
                    r.team(),
                    r.specs().id,
                    r.planned_position(&self.world),
                    r.specs().radius,
                )
            })
            .collect();

        for i in 0..occupied.len() {
            let (team, id, position, radius) = occupied[i];
            if (position - target).norm() >= radius + ball_radius {
                continue;
            }

            let is_free = |candidate: &Vector2, occupied: &[(TeamColor, PlayerId, Vector2, f64)]| {
                candidate.x.abs() <= extents.x - radius
                    && candidate.y.abs() <= extents.y - radius
                    && field.map_or(true, |f| f.is_clear(candidate, radius + CLEARANCE))
                    && (candidate - target).norm() >= radius + ball_radius + CLEARANCE
                    && occupied.iter().enumerate().all(|(j, other)| {
                        j == i || (candidate - other.2).norm() >= radius + other.3 + CLEARANCE
                    })
            };

            let away = position - target;
            let base = if away.norm() > 1e-9 {
                away.y.atan2(away.x)
            } else {
                0.0
            };
            let mut found = None;
            'search: for ring in 1..=SEARCH_RINGS {
                let distance = ring as f64 * SEARCH_STEP;
                let count = ((2.0 * PI * distance / SEARCH_STEP).ceil() as u32).max(6);
                let step = 2.0 * PI / count as f64;
                for k in 0..count {
                    // 0, +1, -1, +2, -2, ...
                    let j = ((k + 1) / 2) as f64;
                    let angle = if k % 2 == 1 { base + j * step } else { base - j * step };
                    let candidate = position + Vector2::new(angle.cos(), angle.sin()) * distance;
                    if is_free(&candidate, &occupied) {
                        found = Some(candidate);
                        break 'search;
                    }
                }
            }

            match found {
                Some(free) => {
                    log::debug!("moving {} robot {} away from the ball", team, id);
                    occupied[i].2 = free;
                    if let Some(robot) = self.teams.get_mut(team).get_mut(id) {
                        robot.move_to(RobotMove {
                            position: free,
                            yaw: None,
                            velocity: None,
                            by_force: false,
                        });
                    }
                }
                None => self.errors.aggregate(
                    SimError::new(
                        "TELEPORT_FAILED",
                        format!("no free spot for {} robot {} near the ball", team, id),
                    ),
                    ErrorSource::Config,
                ),
            }
        }
    }

    /// Samples one vision capture at the current time.
    pub fn create_vision_packet(&mut self) -> VisionPacket {
        let time = self.time;
        let sign = self.flip_sign();
        let flipped = self.flipped;
        let processing = secs_to_nanos(self.realism.vision_processing_time);
        let release = time + secs_to_nanos(self.realism.total_vision_delay());
        let overlap = self.realism.camera_overlap;

        let occluders: Vec<UprightCylinder> =
            self.teams.iter().map(|r| r.cylinder(&self.world)).collect();
        let ball_position = self.ball.position(&self.world).xy();
        let cameras = self.vision.cameras().to_vec();

        let mut frames = Vec::with_capacity(cameras.len());
        for camera in &cameras {
            let mut frame = DetectionFrame {
                frame_number: self.vision.next_frame_number(camera.id),
                t_capture: time,
                t_sent: time + processing,
                camera_id: camera.id,
                balls: Vec::new(),
                robots_yellow: Vec::new(),
                robots_blue: Vec::new(),
            };

            if camera.covers(&ball_position, overlap) {
                let params = BallDetectionParams {
                    stddev: self.realism.stddev_ball_p,
                    stddev_area: self.realism.stddev_ball_area,
                    camera_position: camera.position,
                    enable_invisible_ball: self.realism.enable_invisible_ball,
                    visibility_threshold: self.realism.ball_visibility_threshold,
                    position_offset: camera.position_error,
                    missing_probability: self.realism.missing_ball_detections,
                    min_interval: secs_to_nanos(self.realism.min_ball_detection_time),
                };
                if let Some(detection) =
                    self.ball
                        .update_detection(&self.world, &mut self.rng, &params, &occluders, time)
                {
                    frame.balls.push(flip_ball(detection, sign));
                }
            }

            let params = RobotDetectionParams {
                stddev_p: self.realism.stddev_robot_p,
                stddev_phi: self.realism.stddev_robot_phi,
                camera_position: camera.position,
                position_offset: camera.position_error,
                min_interval: secs_to_nanos(self.realism.min_robot_detection_time),
            };
            for robot in self.teams.iter_mut() {
                if !camera.covers(&robot.position(&self.world), overlap) {
                    continue;
                }
                let Some(detection) =
                    robot.update_detection(&self.world, &mut self.rng, &params, time)
                else {
                    continue;
                };
                let detection = flip_robot(detection, sign, flipped);
                match robot.team() {
                    TeamColor::Blue => frame.robots_blue.push(detection),
                    TeamColor::Yellow => frame.robots_yellow.push(detection),
                }
            }
            frame.robots_blue.shuffle(&mut self.shuffle_rng);
            frame.robots_yellow.shuffle(&mut self.shuffle_rng);
            frames.push(frame);
        }

        let geometry = if self.vision.geometry_due(time) {
            self.vision.mark_geometry_sent();
            let mut frame = geometry_frame(&self.geometry, &cameras);
            for calibration in &mut frame.calibrations {
                calibration.position.x *= sign;
                calibration.position.y *= sign;
            }
            Some(frame)
        } else {
            None
        };

        VisionPacket {
            frames,
            geometry,
            time_capture: time,
            time_sent: time + processing,
            time_release: release,
        }
    }

    /// Detaches the ball from every perfect dribbler so it can be moved.
    fn release_ball(&mut self) {
        for robot in self.teams.iter_mut() {
            robot.stop_dribbling(&mut self.world);
        }
    }

    fn config_error(&mut self, code: &str, err: SetupError) {
        log::warn!("rejected configuration: {}", err);
        self.errors
            .aggregate(SimError::new(code, err.to_string()), ErrorSource::Config);
    }

    fn flip_sign(&self) -> f64 {
        if self.flipped {
            -1.0
        } else {
            1.0
        }
    }

    /// Spot for a robot joining the team: a grid on the team's own half,
    /// facing the opponent, moved to the nearest free spot if taken.
    fn default_placement(&self, team: TeamColor, specs: &RobotSpecs) -> (Vector2, f64) {
        let own = self.side_assignment.own_half_sign(team);
        let id = specs.id.as_u32();
        let column = (id / 6) as f64;
        let row = (id % 6) as f64 - 2.5;
        let external = Vector2::new(own * (1000.0 + 500.0 * column), row * 500.0);
        let external_yaw = if own < 0.0 { 0.0 } else { PI };

        let sign = self.flip_sign();
        let mut position = external * sign;
        let extents = self.geometry.boundary_half_extents();
        position.x = position.x.clamp(-extents.x + specs.radius, extents.x - specs.radius);
        position.y = position.y.clamp(-extents.y + specs.radius, extents.y - specs.radius);

        let taken = |p: &Vector2| {
            self.teams
                .iter()
                .any(|r| (r.position(&self.world) - p).norm() < r.specs().radius + specs.radius)
        };
        if taken(&position) {
            for ring in 1..=SEARCH_RINGS {
                let candidate = position + Vector2::new(0.0, ring as f64 * SEARCH_STEP);
                if !taken(&candidate) && candidate.y.abs() <= extents.y - specs.radius {
                    position = candidate;
                    break;
                }
            }
        }
        (position, flip_angle(external_yaw, self.flipped))
    }
}

fn team_index(team: TeamColor) -> usize {
    match team {
        TeamColor::Blue => 0,
        TeamColor::Yellow => 1,
    }
}

fn flip_angle(angle: f64, flipped: bool) -> f64 {
    if flipped {
        Angle::from_radians(angle + PI).radians()
    } else {
        angle
    }
}

/// Converts global velocities of a command into the simulator frame.
fn to_simulator_command(command: &RobotCommand, sign: f64) -> RobotCommand {
    let mut command = *command;
    if let Some(MoveCommand::Global { x, y, angular }) = command.move_command {
        command.move_command = Some(MoveCommand::Global {
            x: x * sign,
            y: y * sign,
            angular,
        });
    }
    command
}

fn flip_ball(mut detection: DetectionBall, sign: f64) -> DetectionBall {
    detection.x *= sign;
    detection.y *= sign;
    detection
}

fn flip_robot(mut detection: DetectionRobot, sign: f64, flipped: bool) -> DetectionRobot {
    detection.x *= sign;
    detection.y *= sign;
    detection.orientation = flip_angle(detection.orientation, flipped);
    detection
}
