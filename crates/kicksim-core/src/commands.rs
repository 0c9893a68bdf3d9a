use serde::{Deserialize, Serialize};

use crate::{FieldGeometry, PlayerId, RealismConfig, RobotSpecs, TeamColor};

/// How a robot should move. Velocities in mm/s and rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MoveCommand {
    /// Velocity in the robot frame. `forward` points along the dribbler.
    Local {
        forward: f64,
        left: f64,
        angular: f64,
    },
    /// Velocity in the field frame, as seen by the commanding team.
    Global { x: f64, y: f64, angular: f64 },
    /// Individual wheel speeds in mm/s, in wheel order.
    Wheel { speeds: [f64; 4] },
}

impl Default for MoveCommand {
    fn default() -> Self {
        MoveCommand::Local {
            forward: 0.0,
            left: 0.0,
            angular: 0.0,
        }
    }
}

/// A single robot command, as sent over the radio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotCommand {
    pub id: PlayerId,
    #[serde(default)]
    pub move_command: Option<MoveCommand>,
    /// Requested ball speed for the next kick in mm/s, zero for no kick.
    #[serde(default)]
    pub kick_speed: f64,
    /// Elevation of the kick in radians. Zero is a flat kick, positive values
    /// chip the ball.
    #[serde(default)]
    pub kick_angle: f64,
    /// Dribbler speed as a fraction of its maximum, in [-1, 1].
    #[serde(default)]
    pub dribbler_speed: f64,
}

impl RobotCommand {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            move_command: None,
            kick_speed: 0.0,
            kick_angle: 0.0,
            dribbler_speed: 0.0,
        }
    }

    pub fn with_local_velocity(mut self, forward: f64, left: f64, angular: f64) -> Self {
        self.move_command = Some(MoveCommand::Local {
            forward,
            left,
            angular,
        });
        self
    }

    pub fn with_global_velocity(mut self, x: f64, y: f64, angular: f64) -> Self {
        self.move_command = Some(MoveCommand::Global { x, y, angular });
        self
    }

    pub fn with_kick(mut self, speed: f64, angle: f64) -> Self {
        self.kick_speed = speed;
        self.kick_angle = angle;
        self
    }

    pub fn with_dribbler(mut self, speed: f64) -> Self {
        self.dribbler_speed = speed;
        self
    }

    pub fn wants_kick(&self) -> bool {
        self.kick_speed > 0.0
    }
}

/// All robot commands a team sends in one radio cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamCommand {
    pub commands: Vec<RobotCommand>,
}

impl TeamCommand {
    pub fn new(commands: Vec<RobotCommand>) -> Self {
        Self { commands }
    }
}

/// Moves a robot, optionally adding or removing it. Coordinates are in the
/// (possibly flipped) external frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportRobot {
    pub team: TeamColor,
    pub id: PlayerId,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub orientation: Option<f64>,
    #[serde(default)]
    pub v_x: Option<f64>,
    #[serde(default)]
    pub v_y: Option<f64>,
    #[serde(default)]
    pub v_angular: Option<f64>,
    /// Adds (true) or removes (false) the robot.
    #[serde(default)]
    pub present: Option<bool>,
    /// Drive to the target through the controller instead of setting the pose.
    #[serde(default)]
    pub by_force: bool,
}

impl TeleportRobot {
    pub fn to(team: TeamColor, id: PlayerId, x: f64, y: f64) -> Self {
        Self {
            team,
            id,
            x: Some(x),
            y: Some(y),
            orientation: None,
            v_x: None,
            v_y: None,
            v_angular: None,
            present: None,
            by_force: false,
        }
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Moves the ball. Coordinates are in the (possibly flipped) external frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeleportBall {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub v_x: Option<f64>,
    #[serde(default)]
    pub v_y: Option<f64>,
    #[serde(default)]
    pub v_z: Option<f64>,
    /// Move robots that would overlap with the ball out of the way.
    #[serde(default)]
    pub teleport_safely: bool,
}

impl TeleportBall {
    pub fn to(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, v_x: f64, v_y: f64, v_z: f64) -> Self {
        self.v_x = Some(v_x);
        self.v_y = Some(v_y);
        self.v_z = Some(v_z);
        self
    }
}

/// Administrative settings. Every field is optional, only set fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigCommand {
    #[serde(default)]
    pub time_scaling: Option<f64>,
    #[serde(default)]
    pub flip: Option<bool>,
    #[serde(default)]
    pub charge: Option<bool>,
    #[serde(default)]
    pub perfect_dribbler: Option<bool>,
    #[serde(default)]
    pub realism: Option<RealismConfig>,
    #[serde(default)]
    pub geometry: Option<FieldGeometry>,
    #[serde(default)]
    pub blue_team: Option<Vec<RobotSpecs>>,
    #[serde(default)]
    pub yellow_team: Option<Vec<RobotSpecs>>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Everything the simulator accepts from the outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Team {
        team: TeamColor,
        command: TeamCommand,
    },
    TeleportRobot(TeleportRobot),
    TeleportBall(TeleportBall),
    Config(ConfigCommand),
}
