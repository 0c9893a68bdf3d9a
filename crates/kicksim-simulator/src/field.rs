use std::f64::consts::FRAC_PI_4;

use kicksim_core::{FieldGeometry, Vector2, Vector3};

use crate::physics::{BodyDesc, BodyHandle, PhysicsWorld, Shape};

const GROUND_THICKNESS: f64 = 10.0;
const WALL_HEIGHT: f64 = 1000.0;
const WALL_THICKNESS: f64 = 20.0;
const WALL_RESTITUTION: f64 = 0.5;
const GROUND_FRICTION: f64 = 0.5;

/// Outline of a wall on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Footprint {
    center: Vector2,
    half_extents: Vector2,
    yaw: f64,
}

impl Footprint {
    /// Distance from `point` to the rectangle, zero inside.
    fn distance_to(&self, point: &Vector2) -> f64 {
        let d = point - self.center;
        let (sin, cos) = self.yaw.sin_cos();
        let local = Vector2::new(cos * d.x + sin * d.y, -sin * d.x + cos * d.y);
        let outside = Vector2::new(
            (local.x.abs() - self.half_extents.x).max(0.0),
            (local.y.abs() - self.half_extents.y).max(0.0),
        );
        outside.norm()
    }
}

/// Static collision geometry: ground, boundary walls, goals and optional
/// corner blocks.
#[derive(Debug)]
pub struct FieldBody {
    bodies: Vec<BodyHandle>,
    walls: Vec<Footprint>,
}

impl FieldBody {
    pub fn new(world: &mut dyn PhysicsWorld, geometry: &FieldGeometry) -> Self {
        let mut bodies = Vec::new();
        let mut walls = Vec::new();
        let half = geometry.boundary_half_extents();

        // z=0.0 is the ground surface
        bodies.push(
            world.create_body(
                &BodyDesc::fixed(
                    Shape::Cuboid {
                        half_extents: Vector3::new(
                            half.x + WALL_THICKNESS,
                            half.y + WALL_THICKNESS,
                            GROUND_THICKNESS / 2.0,
                        ),
                    },
                    Vector3::new(0.0, 0.0, -GROUND_THICKNESS / 2.0),
                )
                .with_friction(GROUND_FRICTION),
            ),
        );

        let mut wall = |x: f64, y: f64, half_x: f64, half_y: f64, half_z: f64, yaw: f64| {
            let desc = BodyDesc::fixed(
                Shape::Cuboid {
                    half_extents: Vector3::new(half_x, half_y, half_z),
                },
                Vector3::new(x, y, half_z),
            )
            .with_rotation(yaw)
            .with_restitution(WALL_RESTITUTION);
            bodies.push(world.create_body(&desc));
            walls.push(Footprint {
                center: Vector2::new(x, y),
                half_extents: Vector2::new(half_x, half_y),
                yaw,
            });
        };

        // Boundary
        let t = WALL_THICKNESS / 2.0;
        let wall_h = WALL_HEIGHT / 2.0;
        wall(0.0, half.y + t, half.x + WALL_THICKNESS, t, wall_h, 0.0);
        wall(0.0, -half.y - t, half.x + WALL_THICKNESS, t, wall_h, 0.0);
        wall(half.x + t, 0.0, t, half.y, wall_h, 0.0);
        wall(-half.x - t, 0.0, t, half.y, wall_h, 0.0);

        // Goals
        let hl = geometry.half_length();
        let gt = geometry.goal_wall_thickness / 2.0;
        let gh = geometry.goal_height / 2.0;
        let side_half_x = (geometry.goal_depth + geometry.goal_wall_thickness) / 2.0;
        let side_y = geometry.goal_width / 2.0 + gt;
        let back_half_y = geometry.goal_width / 2.0 + geometry.goal_wall_thickness;
        for sign in [-1.0, 1.0] {
            let side_x = sign * (hl + side_half_x);
            wall(side_x, side_y, side_half_x, gt, gh, 0.0);
            wall(side_x, -side_y, side_half_x, gt, gh, 0.0);
            let back_x = sign * (hl + geometry.goal_depth + gt);
            wall(back_x, 0.0, gt, back_half_y, gh, 0.0);
        }

        if let Some(block) = geometry.corner_block {
            let c = block.cathetus_length;
            let half_len = c * std::f64::consts::SQRT_2 / 2.0;
            let hw = geometry.half_width();
            for (sx, sy) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
                // Diagonal from (hl - c, hw) to (hl, hw - c) mirrored per corner
                let x = sx * (hl - c / 2.0);
                let y = sy * (hw - c / 2.0);
                let yaw = if sx * sy > 0.0 { -FRAC_PI_4 } else { FRAC_PI_4 };
                wall(x, y, half_len, t, wall_h, yaw);
            }
        }

        log::debug!("created field with {} static bodies", bodies.len());
        Self { bodies, walls }
    }

    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    /// Returns true if a disc of `radius` at `point` touches no wall, goal
    /// or corner block.
    pub fn is_clear(&self, point: &Vector2, radius: f64) -> bool {
        self.walls.iter().all(|w| w.distance_to(point) >= radius)
    }

    /// Removes all field bodies from the world.
    pub fn remove(self, world: &mut dyn PhysicsWorld) {
        for body in self.bodies {
            world.remove_body(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::IdealWorld;
    use kicksim_core::CornerBlock;

    #[test]
    fn test_body_count() {
        let mut world = IdealWorld::new();
        let field = FieldBody::new(&mut world, &FieldGeometry::default());
        // ground + 4 walls + 2 * 3 goal walls
        assert_eq!(field.bodies().len(), 11);

        let geometry = FieldGeometry {
            corner_block: Some(CornerBlock {
                cathetus_length: 500.0,
            }),
            ..FieldGeometry::division_b()
        };
        let blocked = FieldBody::new(&mut world, &geometry);
        assert_eq!(blocked.bodies().len(), 15);

        field.remove(&mut world);
        assert_eq!(world.body_count(), 15);
    }

    #[test]
    fn test_goal_walls_block_discs() {
        let mut world = IdealWorld::new();
        let geometry = FieldGeometry::default();
        let field = FieldBody::new(&mut world, &geometry);
        let hl = geometry.half_length();
        let gw = geometry.goal_width / 2.0;

        assert!(field.is_clear(&Vector2::zeros(), 90.0));
        // Inside the goal, away from the walls
        assert!(field.is_clear(&Vector2::new(hl + 60.0, 0.0), 90.0));
        // Touching the back wall from inside the goal
        assert!(!field.is_clear(&Vector2::new(hl + 100.0, 0.0), 90.0));
        // On the side wall of the other goal
        assert!(!field.is_clear(&Vector2::new(-hl - 50.0, -gw - 10.0), 90.0));
        // Through the boundary wall
        let extents = geometry.boundary_half_extents();
        assert!(!field.is_clear(&Vector2::new(0.0, extents.y - 50.0), 90.0));
    }

    #[test]
    fn test_corner_blocks_are_obstacles() {
        let mut world = IdealWorld::new();
        let corner = FieldGeometry {
            corner_block: Some(CornerBlock {
                cathetus_length: 500.0,
            }),
            ..FieldGeometry::division_b()
        };
        let plain = FieldBody::new(&mut world, &FieldGeometry::division_b());
        let blocked = FieldBody::new(&mut world, &corner);

        // Midpoint of the diagonal of the +x/+y corner
        let p = Vector2::new(corner.half_length() - 250.0, corner.half_width() - 250.0);
        assert!(plain.is_clear(&p, 90.0));
        assert!(!blocked.is_clear(&p, 90.0));
    }

    #[test]
    fn test_back_wall_behind_goal() {
        let mut world = IdealWorld::new();
        let geometry = FieldGeometry::default();
        let field = FieldBody::new(&mut world, &geometry);
        let xs: Vec<f64> = field
            .bodies()
            .iter()
            .filter_map(|b| world.pose(*b))
            .map(|p| p.translation.x)
            .collect();
        let expected = geometry.half_length() + geometry.goal_depth + geometry.goal_wall_thickness / 2.0;
        assert!(xs.iter().any(|x| (x - expected).abs() < 1e-9));
        assert!(xs.iter().any(|x| (x + expected).abs() < 1e-9));
    }
}
