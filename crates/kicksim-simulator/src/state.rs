use kicksim_core::{PlayerId, RobotMode, SimTime, TeamColor, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vector3,
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub team: TeamColor,
    pub id: PlayerId,
    pub generation: u32,
    pub position: Vector3,
    pub yaw: f64,
    pub velocity: Vector3,
    pub angular_velocity: f64,
    pub mode: RobotMode,
    pub dribbler_speed: f64,
    pub is_charged: bool,
    /// The ball is held by the perfect dribbler
    pub holds_ball: bool,
}

/// Kinematic checkpoint of the whole simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorState {
    pub time: SimTime,
    pub ball: BallState,
    pub robots: Vec<RobotState>,
}

impl SimulatorState {
    pub fn robot(&self, team: TeamColor, id: PlayerId) -> Option<&RobotState> {
        self.robots.iter().find(|r| r.team == team && r.id == id)
    }
}
