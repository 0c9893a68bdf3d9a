use std::collections::{BTreeMap, BTreeSet, VecDeque};

use kicksim_core::{
    nanos_to_secs, CameraCalibration, FieldGeometry, GeometryFrame, SimTime, Vector2, Vector3,
    VisionPacket,
};

use crate::{ball::FOCAL_LENGTH, config::CameraSetup, rng::RandomSource, utils::IntervalTrigger};

/// An overhead camera watching one rectangular region of the field.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: u32,
    pub position: Vector3,
    /// Calibration error, added to everything this camera detects
    pub position_error: Vector2,
    region_min: Vector2,
    region_max: Vector2,
}

impl Camera {
    /// Returns true if `point` is in the region of the camera, grown by half
    /// of `overlap` on every inner edge. Outer regions extend to infinity so
    /// every point is seen by at least one camera.
    pub fn covers(&self, point: &Vector2, overlap: f64) -> bool {
        let half = overlap / 2.0;
        point.x >= self.region_min.x - half
            && point.x <= self.region_max.x + half
            && point.y >= self.region_min.y - half
            && point.y <= self.region_max.y + half
    }

    pub fn calibration(&self) -> CameraCalibration {
        CameraCalibration {
            camera_id: self.id,
            focal_length: FOCAL_LENGTH,
            position: self.position,
        }
    }
}

/// Columns and rows of the camera grid.
fn grid(count: u32) -> (u32, u32) {
    let rows = if count >= 4 && count % 2 == 0 { 2 } else { 1 };
    (count / rows, rows)
}

/// Places `setup.num_cameras` cameras in a grid over the field including the
/// boundary. Cameras are numbered row by row, starting at -x/-y.
pub fn camera_layout(geometry: &FieldGeometry, setup: &CameraSetup) -> Vec<Camera> {
    let count = setup.num_cameras.max(1);
    let (cols, rows) = grid(count);
    let extents = geometry.boundary_half_extents();
    let cell = Vector2::new(
        2.0 * extents.x / cols as f64,
        2.0 * extents.y / rows as f64,
    );
    let edge = |i: u32, n: u32, start: f64, size: f64| -> (f64, f64) {
        let lo = if i == 0 {
            f64::NEG_INFINITY
        } else {
            start + i as f64 * size
        };
        let hi = if i + 1 == n {
            f64::INFINITY
        } else {
            start + (i + 1) as f64 * size
        };
        (lo, hi)
    };

    let mut cameras = Vec::with_capacity(count as usize);
    for row in 0..rows {
        for col in 0..cols {
            let (x_min, x_max) = edge(col, cols, -extents.x, cell.x);
            let (y_min, y_max) = edge(row, rows, -extents.y, cell.y);
            cameras.push(Camera {
                id: row * cols + col,
                position: Vector3::new(
                    -extents.x + (col as f64 + 0.5) * cell.x,
                    -extents.y + (row as f64 + 0.5) * cell.y,
                    setup.height,
                ),
                position_error: Vector2::zeros(),
                region_min: Vector2::new(x_min, y_min),
                region_max: Vector2::new(x_max, y_max),
            });
        }
    }
    cameras
}

/// Builds the geometry frame sent to vision consumers.
pub fn geometry_frame(geometry: &FieldGeometry, cameras: &[Camera]) -> GeometryFrame {
    GeometryFrame {
        field_length: geometry.field_length,
        field_width: geometry.field_width,
        goal_width: geometry.goal_width,
        goal_depth: geometry.goal_depth,
        boundary_width: geometry.boundary_width,
        penalty_area_depth: geometry.penalty_area_depth,
        penalty_area_width: geometry.penalty_area_width,
        center_circle_radius: geometry.center_circle_radius,
        goal_center_to_penalty_mark: geometry.goal_line_to_penalty_mark,
        ball_radius: geometry.ball_radius,
        line_segments: geometry.line_segments(),
        circular_arcs: geometry.circular_arcs(),
        calibrations: cameras.iter().map(Camera::calibration).collect(),
    }
}

/// Camera bookkeeping and the queue of packets waiting for their release
/// time.
#[derive(Debug)]
pub struct VisionPipeline {
    cameras: Vec<Camera>,
    frame_numbers: BTreeMap<u32, u32>,
    geometry_sent: BTreeSet<u32>,
    geometry_trigger: IntervalTrigger,
    queue: VecDeque<VisionPacket>,
}

impl VisionPipeline {
    pub fn new(geometry: &FieldGeometry, setup: &CameraSetup, geometry_interval: f64) -> Self {
        Self {
            cameras: camera_layout(geometry, setup),
            frame_numbers: BTreeMap::new(),
            geometry_sent: BTreeSet::new(),
            geometry_trigger: IntervalTrigger::new(geometry_interval),
            queue: VecDeque::new(),
        }
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Rebuilds the cameras for a new field. Frame numbers keep counting.
    pub fn set_layout(&mut self, geometry: &FieldGeometry, setup: &CameraSetup) {
        let errors: BTreeMap<u32, Vector2> = self
            .cameras
            .iter()
            .map(|c| (c.id, c.position_error))
            .collect();
        self.cameras = camera_layout(geometry, setup);
        for camera in &mut self.cameras {
            camera.position_error = errors.get(&camera.id).copied().unwrap_or_default();
        }
        self.invalidate_geometry();
    }

    /// Draws a new calibration error for every camera.
    pub fn sample_position_errors(&mut self, rng: &mut RandomSource, stddev: f64) {
        for camera in &mut self.cameras {
            camera.position_error = rng.normal_vector(stddev);
        }
    }

    /// Forces the geometry to be sent again to every camera.
    pub fn invalidate_geometry(&mut self) {
        self.geometry_sent.clear();
    }

    pub fn next_frame_number(&mut self, camera_id: u32) -> u32 {
        let counter = self.frame_numbers.entry(camera_id).or_insert(0);
        let number = *counter;
        *counter = counter.wrapping_add(1);
        number
    }

    /// Returns true if a geometry frame has to go out with the packet captured
    /// at `time`, either because some camera has not seen the current geometry
    /// or because the resend interval elapsed. An unscheduled send restarts
    /// the interval.
    pub fn geometry_due(&mut self, time: SimTime) -> bool {
        let secs = nanos_to_secs(time);
        let unsent = self
            .cameras
            .iter()
            .any(|c| !self.geometry_sent.contains(&c.id));
        if unsent {
            self.geometry_trigger.reset(secs);
        }
        self.geometry_trigger.trigger(secs)
    }

    pub fn mark_geometry_sent(&mut self) {
        self.geometry_sent = self.cameras.iter().map(|c| c.id).collect();
    }

    /// Queues a packet, keeping the queue ordered by release time. Packets
    /// released at the same time keep their order.
    pub fn enqueue(&mut self, packet: VisionPacket) {
        let index = self
            .queue
            .iter()
            .rposition(|p| p.time_release <= packet.time_release)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.queue.insert(index, packet);
    }

    /// Removes and returns every packet due at `now`.
    pub fn release(&mut self, now: SimTime) -> Vec<VisionPacket> {
        let mut released = Vec::new();
        while self
            .queue
            .front()
            .map_or(false, |p| p.time_release <= now)
        {
            if let Some(packet) = self.queue.pop_front() {
                released.push(packet);
            }
        }
        released
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drops every queued packet and returns how many there were.
    pub fn reset(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(capture: SimTime, release: SimTime) -> VisionPacket {
        VisionPacket {
            frames: Vec::new(),
            geometry: None,
            time_capture: capture,
            time_sent: capture,
            time_release: release,
        }
    }

    #[test]
    fn test_four_cameras_cover_quadrants() {
        let geometry = FieldGeometry::default();
        let cameras = camera_layout(&geometry, &CameraSetup::default());
        assert_eq!(cameras.len(), 4);
        assert_eq!(
            cameras.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );

        let extents = geometry.boundary_half_extents();
        assert_eq!(cameras[0].position.x, -extents.x / 2.0);
        assert_eq!(cameras[0].position.y, -extents.y / 2.0);
        assert_eq!(cameras[3].position.z, 4000.0);

        let p = Vector2::new(-3000.0, -2000.0);
        let seen: Vec<u32> = cameras
            .iter()
            .filter(|c| c.covers(&p, 0.0))
            .map(|c| c.id)
            .collect();
        assert_eq!(seen, vec![0]);

        // Near the center line, the overlap makes two cameras see it
        let p = Vector2::new(100.0, -2000.0);
        let seen = cameras.iter().filter(|c| c.covers(&p, 300.0)).count();
        assert_eq!(seen, 2);

        // Far outside the field, still seen by a corner camera
        let p = Vector2::new(20000.0, 20000.0);
        assert!(cameras[3].covers(&p, 0.0));
    }

    #[test]
    fn test_odd_camera_count_is_one_row() {
        let setup = CameraSetup {
            num_cameras: 3,
            ..Default::default()
        };
        let cameras = camera_layout(&FieldGeometry::default(), &setup);
        assert_eq!(cameras.len(), 3);
        assert!(cameras.iter().all(|c| c.position.y == 0.0));
    }

    #[test]
    fn test_frame_numbers_per_camera() {
        let mut pipeline =
            VisionPipeline::new(&FieldGeometry::default(), &CameraSetup::default(), 3.0);
        assert_eq!(pipeline.next_frame_number(0), 0);
        assert_eq!(pipeline.next_frame_number(0), 1);
        assert_eq!(pipeline.next_frame_number(1), 0);
        pipeline.set_layout(&FieldGeometry::division_b(), &CameraSetup::default());
        assert_eq!(pipeline.next_frame_number(0), 2);
    }

    #[test]
    fn test_geometry_cadence() {
        let mut pipeline =
            VisionPipeline::new(&FieldGeometry::default(), &CameraSetup::default(), 3.0);
        assert!(pipeline.geometry_due(0));
        pipeline.mark_geometry_sent();
        assert!(!pipeline.geometry_due(1_000_000_000));
        assert!(pipeline.geometry_due(3_000_000_000));
        assert!(!pipeline.geometry_due(3_500_000_000));

        pipeline.invalidate_geometry();
        assert!(pipeline.geometry_due(4_000_000_000));
    }

    #[test]
    fn test_release_in_order() {
        let mut pipeline =
            VisionPipeline::new(&FieldGeometry::default(), &CameraSetup::default(), 3.0);
        pipeline.enqueue(packet(0, 40));
        pipeline.enqueue(packet(10, 20));
        pipeline.enqueue(packet(20, 40));
        assert_eq!(pipeline.release(10).len(), 0);

        let released = pipeline.release(40);
        let captures: Vec<SimTime> = released.iter().map(|p| p.time_capture).collect();
        assert_eq!(captures, vec![10, 0, 20]);
        assert_eq!(pipeline.pending(), 0);
    }

    #[test]
    fn test_reset_drops_queue() {
        let mut pipeline =
            VisionPipeline::new(&FieldGeometry::default(), &CameraSetup::default(), 3.0);
        pipeline.enqueue(packet(0, 100));
        pipeline.enqueue(packet(10, 110));
        assert_eq!(pipeline.reset(), 2);
        assert_eq!(pipeline.pending(), 0);

        pipeline.enqueue(packet(20, 30));
        let captures: Vec<SimTime> = pipeline.release(200).iter().map(|p| p.time_capture).collect();
        assert_eq!(captures, vec![20]);
    }
}
