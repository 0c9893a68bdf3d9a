use serde::{Deserialize, Serialize};

/// Noise, loss and delay settings that make the simulated world look like a
/// real one. All zero means a perfect world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealismConfig {
    /// Standard deviation of ball position noise in mm
    pub stddev_ball_p: f64,
    /// Standard deviation of robot position noise in mm
    pub stddev_robot_p: f64,
    /// Standard deviation of robot orientation noise in rad
    pub stddev_robot_phi: f64,
    /// Standard deviation of the detected ball area in pixels
    pub stddev_ball_area: f64,
    /// Hide the ball when robots occlude it from the camera
    pub enable_invisible_ball: bool,
    /// Minimum visible fraction of the ball silhouette for a detection
    pub ball_visibility_threshold: f64,
    /// Width of the area covered by two neighbouring cameras in mm
    pub camera_overlap: f64,
    /// Standard deviation of the per-camera position error in mm
    pub camera_position_error: f64,
    /// Probability that a robot command is lost on the way to the robot
    pub robot_command_loss: f64,
    /// Probability that a robot response is lost on the way back
    pub robot_response_loss: f64,
    /// Probability that a ball detection is missing in a frame
    pub missing_ball_detections: f64,
    /// Delay between capture and the vision packet reaching the consumer, in s
    pub vision_delay: f64,
    /// Processing time of the vision system, in s
    pub vision_processing_time: f64,
    /// Minimum interval between two detections of the same robot, in s
    pub min_robot_detection_time: f64,
    /// Minimum interval between two detections of the ball, in s
    pub min_ball_detection_time: f64,
}

impl Default for RealismConfig {
    fn default() -> Self {
        Self {
            stddev_ball_p: 0.0,
            stddev_robot_p: 0.0,
            stddev_robot_phi: 0.0,
            stddev_ball_area: 0.0,
            enable_invisible_ball: false,
            ball_visibility_threshold: 0.4,
            camera_overlap: 300.0,
            camera_position_error: 0.0,
            robot_command_loss: 0.0,
            robot_response_loss: 0.0,
            missing_ball_detections: 0.0,
            vision_delay: 0.0,
            vision_processing_time: 0.0,
            min_robot_detection_time: 0.0,
            min_ball_detection_time: 0.0,
        }
    }
}

impl RealismConfig {
    /// Settings close to a typical competition setup.
    pub fn realistic() -> Self {
        Self {
            stddev_ball_p: 1.0,
            stddev_robot_p: 1.5,
            stddev_robot_phi: 0.01,
            stddev_ball_area: 8.0,
            enable_invisible_ball: true,
            ball_visibility_threshold: 0.4,
            camera_overlap: 300.0,
            camera_position_error: 5.0,
            robot_command_loss: 0.03,
            robot_response_loss: 0.1,
            missing_ball_detections: 0.05,
            vision_delay: 0.035,
            vision_processing_time: 0.005,
            min_robot_detection_time: 0.0,
            min_ball_detection_time: 0.0,
        }
    }

    /// Total time between capture and release of a vision packet, in s.
    pub fn total_vision_delay(&self) -> f64 {
        self.vision_delay + self.vision_processing_time
    }
}
