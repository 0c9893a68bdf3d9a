//! Deterministic, tick driven simulation of robot soccer matches.
//!
//! [`Simulation`] owns the robots, the ball and the field inside a
//! [`PhysicsWorld`]. Every call to [`Simulation::handle_tick`] advances the
//! world in fixed sub-steps and returns the vision packets, radio responses
//! and errors produced along the way.

mod ball;
mod config;
mod engine;
mod error_aggregator;
mod field;
mod kinematics;
pub mod physics;
mod robot;
mod robot_map;
mod rng;
mod state;
mod utils;
mod vision;

pub use ball::{
    BallBody, BallDetectionParams, BallMove, BALL_DECELERATION, BALL_MASS, FOCAL_LENGTH,
    MAX_KICK_SPEED,
};
pub use config::{CameraSetup, SetupError, SimulatorSetup, TimingConfig};
pub use engine::{Simulation, TickOutput, MAX_SUB_STEPS, SUB_TIMESTEP};
pub use error_aggregator::ErrorAggregator;
pub use field::FieldBody;
pub use kinematics::{KinematicsError, WheelCoupling};
pub use physics::{IdealWorld, PhysicsWorld, RapierWorld};
pub use robot::{RobotBody, RobotDetectionParams, RobotMove, COMMAND_TIMEOUT};
pub use robot_map::{RobotHandle, RobotMap};
pub use rng::RandomSource;
pub use state::{BallState, RobotState, SimulatorState};
pub use vision::{camera_layout, Camera};
