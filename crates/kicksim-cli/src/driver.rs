use std::collections::BTreeMap;

use kicksim_core::{
    Angle, DetectionRobot, PlayerId, RobotCommand, SideAssignment, TeamColor, TeamCommand,
    Vector2, VisionPacket,
};

const MAX_SPEED: f64 = 1500.0;
const POSITION_GAIN: f64 = 3.0;
const HEADING_GAIN: f64 = 4.0;
const MAX_ANGULAR: f64 = 6.0;
/// The chaser kicks once it is this close to the ball and aligned with the goal
const KICK_DISTANCE: f64 = 140.0;
const KICK_ALIGNMENT: f64 = 0.15;
const KICK_SPEED: f64 = 4000.0;
/// Distance behind the ball the chaser lines up at
const APPROACH_OFFSET: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeenRobot {
    pub position: Vector2,
    pub yaw: f64,
}

/// What one team knows about the field, built only from vision.
#[derive(Debug, Clone, Default)]
pub struct TeamView {
    pub ball: Option<Vector2>,
    pub own: BTreeMap<PlayerId, SeenRobot>,
}

impl TeamView {
    /// Folds a packet into the view. Detections of the same object from
    /// several cameras are averaged.
    pub fn update(&mut self, team: TeamColor, packet: &VisionPacket) {
        let balls: Vec<Vector2> = packet
            .ball_detections()
            .map(|b| Vector2::new(b.x, b.y))
            .collect();
        if !balls.is_empty() {
            let sum: Vector2 = balls.iter().sum();
            self.ball = Some(sum / balls.len() as f64);
        }

        let mut seen: BTreeMap<PlayerId, Vec<&DetectionRobot>> = BTreeMap::new();
        for frame in &packet.frames {
            let robots = match team {
                TeamColor::Blue => &frame.robots_blue,
                TeamColor::Yellow => &frame.robots_yellow,
            };
            for robot in robots {
                seen.entry(robot.robot_id).or_default().push(robot);
            }
        }
        for (id, detections) in seen {
            let n = detections.len() as f64;
            let position = detections
                .iter()
                .map(|d| Vector2::new(d.x, d.y))
                .sum::<Vector2>()
                / n;
            self.own.insert(
                id,
                SeenRobot {
                    position,
                    yaw: detections[0].orientation,
                },
            );
        }
    }
}

/// Scripted players: the robot closest to the ball lines up behind it and
/// kicks it at the opponent goal, everybody else stands still.
#[derive(Debug)]
pub struct Driver {
    team: TeamColor,
    view: TeamView,
}

impl Driver {
    pub fn new(team: TeamColor) -> Self {
        Self {
            team,
            view: TeamView::default(),
        }
    }

    pub fn team(&self) -> TeamColor {
        self.team
    }

    pub fn observe(&mut self, packet: &VisionPacket) {
        self.view.update(self.team, packet);
    }

    /// Commands for the next tick, or `None` before the ball was seen.
    pub fn commands(&self, sides: SideAssignment, half_length: f64) -> Option<TeamCommand> {
        let ball = self.view.ball?;
        let goal = Vector2::new(sides.attacking_direction_sign(self.team) * half_length, 0.0);

        let chaser = self
            .view
            .own
            .iter()
            .min_by(|a, b| {
                let da = (a.1.position - ball).norm();
                let db = (b.1.position - ball).norm();
                da.total_cmp(&db)
            })
            .map(|(id, _)| *id);

        let commands = self
            .view
            .own
            .iter()
            .map(|(id, robot)| {
                if Some(*id) == chaser {
                    chase(*id, robot, ball, goal)
                } else {
                    RobotCommand::new(*id).with_global_velocity(0.0, 0.0, 0.0)
                }
            })
            .collect();
        Some(TeamCommand::new(commands))
    }
}

fn chase(id: PlayerId, robot: &SeenRobot, ball: Vector2, goal: Vector2) -> RobotCommand {
    let shot = goal - ball;
    let shot_direction = if shot.norm() > 1e-6 {
        shot.normalize()
    } else {
        Vector2::x()
    };
    let heading = Angle::between_points(robot.position, goal);
    let heading_error = (heading - Angle::from_radians(robot.yaw)).radians();
    let angular = (HEADING_GAIN * heading_error).clamp(-MAX_ANGULAR, MAX_ANGULAR);

    let behind = ball - shot_direction * APPROACH_OFFSET;
    let lined_up = (robot.position - behind).norm() < APPROACH_OFFSET / 2.0
        || (robot.position - ball).dot(&shot_direction) < 0.0
            && (robot.position - ball).norm() < KICK_DISTANCE;

    let target = if lined_up { ball } else { behind };
    let velocity = cap(POSITION_GAIN * (target - robot.position), MAX_SPEED);
    let command = RobotCommand::new(id).with_global_velocity(velocity.x, velocity.y, angular);

    if lined_up
        && (robot.position - ball).norm() < KICK_DISTANCE
        && heading_error.abs() < KICK_ALIGNMENT
    {
        command.with_kick(KICK_SPEED, 0.0).with_dribbler(0.5)
    } else {
        command
    }
}

fn cap(v: Vector2, max: f64) -> Vector2 {
    let norm = v.norm();
    if norm > max {
        v * (max / norm)
    } else {
        v
    }
}
