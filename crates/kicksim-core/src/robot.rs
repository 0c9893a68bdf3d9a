use serde::{Deserialize, Serialize};

use crate::{PlayerId, SimTime};

/// Per-axis acceleration limits of the chassis, in mm/s^2 and rad/s^2.
///
/// Speed-up limits apply while a wheel accelerates in the direction it is
/// already turning, brake limits otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationLimits {
    pub speedup_forward: f64,
    pub speedup_sideward: f64,
    pub speedup_angular: f64,
    pub brake_forward: f64,
    pub brake_sideward: f64,
    pub brake_angular: f64,
}

impl Default for AccelerationLimits {
    fn default() -> Self {
        Self {
            speedup_forward: 3000.0,
            speedup_sideward: 3000.0,
            speedup_angular: 30.0,
            brake_forward: 6000.0,
            brake_sideward: 6000.0,
            brake_angular: 60.0,
        }
    }
}

/// Physical parameters of a robot. Immutable while the robot exists; changing
/// them replaces the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotSpecs {
    pub id: PlayerId,
    /// Radius of the chassis in mm
    pub radius: f64,
    /// Height of the chassis in mm
    pub height: f64,
    /// Mass in kg
    pub mass: f64,
    /// Width of the dribbler bar in mm
    pub dribbler_width: f64,
    /// Half opening angle of the front cut in radians
    pub dribbler_angle: f64,
    /// Wheel mounting angles in radians, measured from the forward axis
    pub wheel_angles: [f64; 4],
    pub acceleration: AccelerationLimits,
    /// Maximum linear speed in mm/s
    pub v_max: f64,
    /// Maximum angular speed in rad/s
    pub omega_max: f64,
    /// Maximum ball speed of a flat kick in mm/s
    pub shot_linear_max: f64,
    /// Maximum ball speed of a chip kick in mm/s
    pub shot_chip_max: f64,
    /// Time the kicker needs to recharge after a kick, in seconds
    pub kicker_recharge_time: f64,
}

impl Default for RobotSpecs {
    fn default() -> Self {
        Self {
            id: PlayerId::new(0),
            radius: 90.0,
            height: 150.0,
            mass: 2.5,
            dribbler_width: 70.0,
            dribbler_angle: 0.4,
            wheel_angles: [
                60.0f64.to_radians(),
                135.0f64.to_radians(),
                225.0f64.to_radians(),
                300.0f64.to_radians(),
            ],
            acceleration: AccelerationLimits::default(),
            v_max: 3500.0,
            omega_max: 10.0,
            shot_linear_max: 6500.0,
            shot_chip_max: 3000.0,
            kicker_recharge_time: 0.5,
        }
    }
}

impl RobotSpecs {
    pub fn with_id(id: PlayerId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Distance from the robot center to the dribbler bar.
    pub fn center_to_dribbler(&self) -> f64 {
        let half = (self.dribbler_width / 2.0).min(self.radius);
        (self.radius * self.radius - half * half).sqrt()
    }
}

/// Operating mode of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RobotMode {
    /// No recent command; the robot brakes to a standstill.
    #[default]
    Standby,
    Active,
    /// A kick was triggered in the current sub-step.
    Kicking,
}

/// Feedback a robot sends back over the radio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioResponse {
    pub id: PlayerId,
    pub generation: u32,
    pub time: SimTime,
    /// Battery level in [0, 1]
    pub battery: f64,
    pub ball_detected: bool,
    pub cap_charged: bool,
    pub packet_loss_rx: f64,
    pub packet_loss_tx: f64,
    /// Estimated local velocity: forward and left in mm/s, angular in rad/s
    pub estimated_forward: f64,
    pub estimated_left: f64,
    pub estimated_angular: f64,
}
