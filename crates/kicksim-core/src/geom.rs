use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::Vector2;

/// A single field arc -- eg. the center circle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldCircularArc {
    /// Readable name of the arc
    pub name: String,
    /// Center of the arc, in field coordinates
    pub center: Vector2,
    // Radius of the arc, in mm
    pub radius: f64,
    // Start angle in counter-clockwise order, in radians
    pub a1: f64,
    // End angle in counter-clockwise order, in radians
    pub a2: f64,
    // Thickness of the arc stroke, in mm
    pub thickness: f64,
}

/// A single field line segment
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldLineSegment {
    /// Readable name of the line segment
    pub name: String,
    /// Start point of the line segment, in field coordinates
    pub p1: Vector2,
    /// End point of the line segment, in field coordinates
    pub p2: Vector2,
    /// Thickness of the line segment, in mm
    pub thickness: f64,
}

impl FieldLineSegment {
    pub fn new(name: impl Into<String>, p1: Vector2, p2: Vector2, thickness: f64) -> Self {
        Self {
            name: name.into(),
            p1,
            p2,
            thickness,
        }
    }
}

/// Blocked field corners (division B style). Each corner is closed off by a
/// wall running diagonally from the goal line to the touch line.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CornerBlock {
    /// Length of the blocked part of each line, measured from the corner, in mm
    pub cathetus_length: f64,
}

/// The field geometry. All lengths in mm.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FieldGeometry {
    /// Field length (distance between goal lines)
    pub field_length: f64,
    /// Field width (distance between touch lines)
    pub field_width: f64,
    /// Goal width (distance between inner edges of goal posts)
    pub goal_width: f64,
    /// Goal depth (distance from outer goal line edge to inner goal back)
    pub goal_depth: f64,
    /// Goal height
    pub goal_height: f64,
    /// Thickness of goal walls
    pub goal_wall_thickness: f64,
    /// Boundary width (distance from touch/goal line centers to boundary walls)
    pub boundary_width: f64,
    pub line_thickness: f64,
    pub penalty_area_depth: f64,
    pub penalty_area_width: f64,
    pub center_circle_radius: f64,
    pub goal_line_to_penalty_mark: f64,
    pub ball_radius: f64,
    pub corner_block: Option<CornerBlock>,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            field_length: 12000.0,
            field_width: 9000.0,
            goal_width: 1800.0,
            goal_depth: 180.0,
            goal_height: 155.0,
            goal_wall_thickness: 20.0,
            boundary_width: 300.0,
            line_thickness: 10.0,
            penalty_area_depth: 1800.0,
            penalty_area_width: 3600.0,
            center_circle_radius: 500.0,
            goal_line_to_penalty_mark: 8000.0,
            ball_radius: 21.5,
            corner_block: None,
        }
    }
}

impl FieldGeometry {
    /// Smaller field used by division B.
    pub fn division_b() -> Self {
        Self {
            field_length: 9000.0,
            field_width: 6000.0,
            goal_width: 1000.0,
            penalty_area_depth: 1000.0,
            penalty_area_width: 2000.0,
            goal_line_to_penalty_mark: 6000.0,
            ..Default::default()
        }
    }

    pub fn half_length(&self) -> f64 {
        self.field_length / 2.0
    }

    pub fn half_width(&self) -> f64 {
        self.field_width / 2.0
    }

    /// Half extents of the area enclosed by the boundary walls.
    pub fn boundary_half_extents(&self) -> Vector2 {
        Vector2::new(
            self.half_length() + self.boundary_width,
            self.half_width() + self.boundary_width,
        )
    }

    /// Returns true if the point is inside the playing area including the
    /// boundary margin, shrunk by `margin`.
    pub fn contains_with_margin(&self, p: &Vector2, margin: f64) -> bool {
        let half = self.boundary_half_extents();
        p.x.abs() <= half.x - margin && p.y.abs() <= half.y - margin
    }

    /// Field lines as sent in geometry frames.
    pub fn line_segments(&self) -> Vec<FieldLineSegment> {
        let hl = self.half_length();
        let hw = self.half_width();
        let t = self.line_thickness;
        let pd = self.penalty_area_depth;
        let pw = self.penalty_area_width / 2.0;
        vec![
            FieldLineSegment::new("TopTouchLine", Vector2::new(-hl, hw), Vector2::new(hl, hw), t),
            FieldLineSegment::new(
                "BottomTouchLine",
                Vector2::new(-hl, -hw),
                Vector2::new(hl, -hw),
                t,
            ),
            FieldLineSegment::new("LeftGoalLine", Vector2::new(-hl, -hw), Vector2::new(-hl, hw), t),
            FieldLineSegment::new("RightGoalLine", Vector2::new(hl, -hw), Vector2::new(hl, hw), t),
            FieldLineSegment::new("HalfwayLine", Vector2::new(0.0, -hw), Vector2::new(0.0, hw), t),
            FieldLineSegment::new("CenterLine", Vector2::new(-hl, 0.0), Vector2::new(hl, 0.0), t),
            FieldLineSegment::new(
                "LeftPenaltyStretch",
                Vector2::new(-hl + pd, -pw),
                Vector2::new(-hl + pd, pw),
                t,
            ),
            FieldLineSegment::new(
                "RightPenaltyStretch",
                Vector2::new(hl - pd, -pw),
                Vector2::new(hl - pd, pw),
                t,
            ),
            FieldLineSegment::new(
                "LeftFieldLeftPenaltyStretch",
                Vector2::new(-hl, -pw),
                Vector2::new(-hl + pd, -pw),
                t,
            ),
            FieldLineSegment::new(
                "LeftFieldRightPenaltyStretch",
                Vector2::new(-hl, pw),
                Vector2::new(-hl + pd, pw),
                t,
            ),
            FieldLineSegment::new(
                "RightFieldLeftPenaltyStretch",
                Vector2::new(hl, pw),
                Vector2::new(hl - pd, pw),
                t,
            ),
            FieldLineSegment::new(
                "RightFieldRightPenaltyStretch",
                Vector2::new(hl, -pw),
                Vector2::new(hl - pd, -pw),
                t,
            ),
        ]
    }

    pub fn circular_arcs(&self) -> Vec<FieldCircularArc> {
        vec![FieldCircularArc {
            name: "CenterCircle".to_owned(),
            center: Vector2::zeros(),
            radius: self.center_circle_radius,
            a1: 0.0,
            a2: 2.0 * PI,
            thickness: self.line_thickness,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_contains() {
        let geom = FieldGeometry::default();
        assert!(geom.contains_with_margin(&Vector2::new(6200.0, 0.0), 90.0));
        assert!(!geom.contains_with_margin(&Vector2::new(6250.0, 0.0), 90.0));
        assert!(!geom.contains_with_margin(&Vector2::new(0.0, -4800.0), 10.0));
    }

    #[test]
    fn test_lines_follow_dimensions() {
        let geom = FieldGeometry::division_b();
        let lines = geom.line_segments();
        let top = lines
            .iter()
            .find(|l| l.name == "TopTouchLine")
            .expect("top touch line");
        assert_eq!(top.p1, Vector2::new(-4500.0, 3000.0));
        assert_eq!(top.p2, Vector2::new(4500.0, 3000.0));
        assert_eq!(geom.circular_arcs()[0].radius, 500.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let geom: FieldGeometry =
            serde_json::from_str(r#"{"field_length": 9000.0}"#).expect("valid json");
        assert_eq!(geom.field_length, 9000.0);
        assert_eq!(geom.field_width, FieldGeometry::default().field_width);
    }
}
