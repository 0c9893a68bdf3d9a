use std::collections::BTreeSet;

use kicksim_core::{FieldGeometry, PlayerId, RealismConfig, RobotSpecs, TeamColor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of robots per team in the default match
const DEFAULT_TEAM_SIZE: u32 = 6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("invalid field geometry: {0}")]
    Geometry(String),
    #[error("invalid camera setup: {0}")]
    Cameras(String),
    #[error("invalid realism settings: {0}")]
    Realism(String),
    #[error("invalid timing settings: {0}")]
    Timing(String),
    #[error("{team} robot {id} appears more than once")]
    DuplicateRobot { team: TeamColor, id: PlayerId },
    #[error("{team} robot {id}: {reason}")]
    RobotSpecs {
        team: TeamColor,
        id: PlayerId,
        reason: String,
    },
}

/// Layout of the overhead cameras. The field is split into a grid of equally
/// sized regions, one camera above the center of each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSetup {
    pub num_cameras: u32,
    /// Height of the cameras above the ground in mm
    pub height: f64,
}

impl Default for CameraSetup {
    fn default() -> Self {
        Self {
            num_cameras: 4,
            height: 4000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between the timestamp of a team command and the robots receiving
    /// it, in s
    pub command_delay: f64,
    /// Interval for resending the geometry frame, in s
    pub geometry_interval: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_delay: 30.0 / 1000.0,
            geometry_interval: 3.0,
        }
    }
}

/// Everything needed to build a [`crate::Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSetup {
    pub geometry: FieldGeometry,
    pub cameras: CameraSetup,
    pub blue_team: Vec<RobotSpecs>,
    pub yellow_team: Vec<RobotSpecs>,
    pub realism: RealismConfig,
    pub timing: TimingConfig,
    /// Seed of all randomness in the simulation
    pub seed: u64,
    /// Hold the ball with a constraint instead of simulating the dribbler
    pub perfect_dribbler: bool,
    /// Charge the kickers
    pub charge: bool,
    /// Swap the sides of the teams
    pub flip: bool,
}

impl Default for SimulatorSetup {
    fn default() -> Self {
        let team = || -> Vec<RobotSpecs> {
            (0..DEFAULT_TEAM_SIZE)
                .map(|id| RobotSpecs::with_id(PlayerId::new(id)))
                .collect()
        };
        Self {
            geometry: FieldGeometry::default(),
            cameras: CameraSetup::default(),
            blue_team: team(),
            yellow_team: team(),
            realism: RealismConfig::default(),
            timing: TimingConfig::default(),
            seed: 0,
            perfect_dribbler: false,
            charge: true,
            flip: false,
        }
    }
}

impl SimulatorSetup {
    /// A field without robots.
    pub fn empty() -> Self {
        Self {
            blue_team: Vec::new(),
            yellow_team: Vec::new(),
            ..Default::default()
        }
    }

    pub fn team(&self, team: TeamColor) -> &[RobotSpecs] {
        match team {
            TeamColor::Blue => &self.blue_team,
            TeamColor::Yellow => &self.yellow_team,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        validate_geometry(&self.geometry)?;
        validate_realism(&self.realism)?;

        if self.cameras.num_cameras == 0 {
            return Err(SetupError::Cameras("at least one camera is needed".into()));
        }
        if !(self.cameras.height > self.geometry.ball_radius * 2.0) {
            return Err(SetupError::Cameras(format!(
                "camera height {} is below the ball",
                self.cameras.height
            )));
        }

        let timing = &self.timing;
        if !(timing.command_delay >= 0.0 && timing.command_delay.is_finite()) {
            return Err(SetupError::Timing("command delay must be >= 0".into()));
        }
        if !(timing.geometry_interval > 0.0) {
            return Err(SetupError::Timing("geometry interval must be > 0".into()));
        }

        validate_team(TeamColor::Blue, &self.blue_team)?;
        validate_team(TeamColor::Yellow, &self.yellow_team)
    }
}

pub fn validate_geometry(geometry: &FieldGeometry) -> Result<(), SetupError> {
    let positive = [
        ("field_length", geometry.field_length),
        ("field_width", geometry.field_width),
        ("goal_width", geometry.goal_width),
        ("ball_radius", geometry.ball_radius),
    ];
    for (name, value) in positive {
        if !(value > 0.0 && value.is_finite()) {
            return Err(SetupError::Geometry(format!("{} must be > 0", name)));
        }
    }
    let non_negative = [
        ("goal_depth", geometry.goal_depth),
        ("goal_wall_thickness", geometry.goal_wall_thickness),
        ("boundary_width", geometry.boundary_width),
    ];
    for (name, value) in non_negative {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(SetupError::Geometry(format!("{} must be >= 0", name)));
        }
    }
    if geometry.goal_width >= geometry.field_width {
        return Err(SetupError::Geometry(
            "goal is wider than the field".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_realism(realism: &RealismConfig) -> Result<(), SetupError> {
    let probabilities = [
        ("robot_command_loss", realism.robot_command_loss),
        ("robot_response_loss", realism.robot_response_loss),
        ("missing_ball_detections", realism.missing_ball_detections),
        ("ball_visibility_threshold", realism.ball_visibility_threshold),
    ];
    for (name, value) in probabilities {
        if !(0.0..=1.0).contains(&value) {
            return Err(SetupError::Realism(format!("{} must be in [0, 1]", name)));
        }
    }
    let non_negative = [
        ("stddev_ball_p", realism.stddev_ball_p),
        ("stddev_robot_p", realism.stddev_robot_p),
        ("stddev_robot_phi", realism.stddev_robot_phi),
        ("stddev_ball_area", realism.stddev_ball_area),
        ("camera_overlap", realism.camera_overlap),
        ("camera_position_error", realism.camera_position_error),
        ("vision_delay", realism.vision_delay),
        ("vision_processing_time", realism.vision_processing_time),
        ("min_robot_detection_time", realism.min_robot_detection_time),
        ("min_ball_detection_time", realism.min_ball_detection_time),
    ];
    for (name, value) in non_negative {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(SetupError::Realism(format!("{} must be >= 0", name)));
        }
    }
    Ok(())
}

/// Checks the specs of one team. Degenerate wheel layouts are not rejected
/// here; such robots report an error every time they are driven.
pub fn validate_team(team: TeamColor, specs: &[RobotSpecs]) -> Result<(), SetupError> {
    let mut seen = BTreeSet::new();
    for s in specs {
        if !seen.insert(s.id) {
            return Err(SetupError::DuplicateRobot { team, id: s.id });
        }
        let invalid = |reason: &str| SetupError::RobotSpecs {
            team,
            id: s.id,
            reason: reason.to_string(),
        };
        if !(s.radius > 0.0 && s.radius.is_finite()) {
            return Err(invalid("radius must be > 0"));
        }
        if !(s.height > 0.0 && s.height.is_finite()) {
            return Err(invalid("height must be > 0"));
        }
        if !(s.mass > 0.0 && s.mass.is_finite()) {
            return Err(invalid("mass must be > 0"));
        }
        if !(s.dribbler_width >= 0.0) {
            return Err(invalid("dribbler width must be >= 0"));
        }
        if s.wheel_angles.iter().any(|a| !a.is_finite()) {
            return Err(invalid("wheel angles must be finite"));
        }
        let limits = [
            s.v_max,
            s.omega_max,
            s.shot_linear_max,
            s.shot_chip_max,
            s.kicker_recharge_time,
            s.acceleration.speedup_forward,
            s.acceleration.speedup_sideward,
            s.acceleration.speedup_angular,
            s.acceleration.brake_forward,
            s.acceleration.brake_sideward,
            s.acceleration.brake_angular,
        ];
        if limits.iter().any(|l| !(*l >= 0.0)) {
            return Err(invalid("limits must be >= 0"));
        }
    }
    Ok(())
}
