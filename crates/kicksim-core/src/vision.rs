use serde::{Deserialize, Serialize};

use crate::{FieldCircularArc, FieldLineSegment, PlayerId, SimTime, Vector3};

/// A ball seen by a single camera. Positions in mm, pixel values in the
/// camera image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBall {
    pub confidence: f64,
    pub area: f64,
    pub x: f64,
    pub y: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRobot {
    pub confidence: f64,
    pub robot_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub orientation: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub height: f64,
}

/// Everything one camera saw in one capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub frame_number: u32,
    pub t_capture: SimTime,
    pub t_sent: SimTime,
    pub camera_id: u32,
    pub balls: Vec<DetectionBall>,
    pub robots_yellow: Vec<DetectionRobot>,
    pub robots_blue: Vec<DetectionRobot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub camera_id: u32,
    pub focal_length: f64,
    /// Camera position in field coordinates, in mm
    pub position: Vector3,
}

/// Static description of the field and cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryFrame {
    pub field_length: f64,
    pub field_width: f64,
    pub goal_width: f64,
    pub goal_depth: f64,
    pub boundary_width: f64,
    pub penalty_area_depth: f64,
    pub penalty_area_width: f64,
    pub center_circle_radius: f64,
    pub goal_center_to_penalty_mark: f64,
    pub ball_radius: f64,
    pub line_segments: Vec<FieldLineSegment>,
    pub circular_arcs: Vec<FieldCircularArc>,
    pub calibrations: Vec<CameraCalibration>,
}

/// The output of one vision capture: per-camera frames and an optional
/// geometry frame, plus the times it was captured, sent and released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionPacket {
    pub frames: Vec<DetectionFrame>,
    pub geometry: Option<GeometryFrame>,
    pub time_capture: SimTime,
    pub time_sent: SimTime,
    pub time_release: SimTime,
}

impl VisionPacket {
    pub fn ball_detections(&self) -> impl Iterator<Item = &DetectionBall> {
        self.frames.iter().flat_map(|f| f.balls.iter())
    }

    pub fn robot_detections(&self) -> impl Iterator<Item = &DetectionRobot> {
        self.frames
            .iter()
            .flat_map(|f| f.robots_blue.iter().chain(f.robots_yellow.iter()))
    }
}
