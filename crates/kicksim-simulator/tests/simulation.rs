use approx::assert_relative_eq;
use kicksim_core::{
    Command, ErrorSource, FieldGeometry, PlayerId, RealismConfig, RobotCommand, RobotMode,
    RobotSpecs, TeamColor, TeamCommand, TeleportBall, TeleportRobot, Vector2,
};
use kicksim_simulator::{
    CameraSetup, IdealWorld, PhysicsWorld, RapierWorld, Simulation, SimulatorSetup, TickOutput,
    TimingConfig,
};

fn specs(count: u32) -> Vec<RobotSpecs> {
    (0..count)
        .map(|id| RobotSpecs::with_id(PlayerId::new(id)))
        .collect()
}

/// Match without command delay, `blue` and `yellow` robots per team
fn setup(blue: u32, yellow: u32) -> SimulatorSetup {
    SimulatorSetup {
        blue_team: specs(blue),
        yellow_team: specs(yellow),
        timing: TimingConfig {
            command_delay: 0.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn ideal(setup: SimulatorSetup) -> Simulation<IdealWorld> {
    Simulation::with_world(IdealWorld::new(), setup).unwrap()
}

fn teleport(sim: &mut Simulation<IdealWorld>, team: TeamColor, id: u32, x: f64, y: f64) {
    let command = TeleportRobot::to(team, PlayerId::new(id), x, y).with_orientation(0.0);
    sim.handle_command(Command::TeleportRobot(command), sim.time());
}

fn drive<W: PhysicsWorld>(
    sim: &mut Simulation<W>,
    team: TeamColor,
    commands: Vec<RobotCommand>,
) {
    let time = sim.time();
    sim.handle_command(
        Command::Team {
            team,
            command: TeamCommand::new(commands),
        },
        time,
    );
}

fn forward(id: u32, speed: f64) -> RobotCommand {
    RobotCommand::new(PlayerId::new(id)).with_local_velocity(speed, 0.0, 0.0)
}

/// Runs a busy match for `ticks` ticks and returns everything it produced.
fn run_match<W: PhysicsWorld>(
    world: W,
    seed: u64,
    ticks: u32,
) -> (Vec<TickOutput>, kicksim_simulator::SimulatorState) {
    let setup = SimulatorSetup {
        seed,
        realism: RealismConfig::realistic(),
        ..setup(6, 6)
    };
    let mut sim = Simulation::with_world(world, setup).unwrap();
    let mut outputs = Vec::new();
    for tick in 0..ticks {
        for team in [TeamColor::Blue, TeamColor::Yellow] {
            let commands = (0..6)
                .map(|id| {
                    RobotCommand::new(PlayerId::new(id)).with_local_velocity(
                        500.0 + 10.0 * tick as f64,
                        100.0,
                        1.0,
                    )
                })
                .collect();
            drive(&mut sim, team, commands);
        }
        outputs.push(sim.handle_tick(0.01));
    }
    (outputs, sim.state())
}

#[test]
fn same_seed_same_outputs() {
    let (outputs_a, state_a) = run_match(IdealWorld::new(), 42, 100);
    let (outputs_b, state_b) = run_match(IdealWorld::new(), 42, 100);
    assert_eq!(outputs_a, outputs_b);
    assert_eq!(state_a, state_b);
    assert!(outputs_a.iter().any(|o| !o.vision_packets.is_empty()));

    let (outputs_c, _) = run_match(IdealWorld::new(), 43, 100);
    assert_ne!(outputs_a, outputs_c);
}

#[test]
fn same_seed_same_outputs_with_rapier() {
    let (outputs_a, state_a) = run_match(RapierWorld::new(), 7, 50);
    let (outputs_b, state_b) = run_match(RapierWorld::new(), 7, 50);
    assert_eq!(outputs_a, outputs_b);
    assert_eq!(state_a, state_b);
    assert!(outputs_a.iter().any(|o| !o.vision_packets.is_empty()));
}

#[test]
fn tick_length_does_not_change_physics() {
    let run = |ticks: &[f64]| {
        let mut sim = ideal(setup(2, 0));
        drive(
            &mut sim,
            TeamColor::Blue,
            vec![forward(0, 1500.0), forward(1, -800.0)],
        );
        sim.handle_command(
            Command::TeleportBall(TeleportBall::to(0.0, 0.0).with_velocity(2000.0, 500.0, 0.0)),
            0,
        );
        for dt in ticks {
            sim.handle_tick(*dt);
        }
        sim.state()
    };

    let even = run(&[0.01; 100]);
    let coarse = run(&[0.02; 50]);
    let jittery: Vec<f64> = (0..50).flat_map(|_| [0.003, 0.017]).collect();
    let jittery = run(&jittery);

    assert_eq!(even.time, 1_000_000_000);
    assert_eq!(even, coarse);
    assert_eq!(even, jittery);
}

#[test]
fn time_scaling_adds_sub_steps() {
    let mut sim = ideal(setup(0, 0));
    sim.set_scaling(2.0);
    sim.handle_tick(0.01);
    assert_eq!(sim.time(), 20_000_000);

    sim.set_scaling(0.5);
    sim.handle_tick(0.01);
    assert_eq!(sim.time(), 25_000_000);
}

#[test_log::test]
fn safe_ball_teleport_clears_robots() {
    let mut sim = ideal(setup(6, 6));
    teleport(&mut sim, TeamColor::Blue, 0, -100.0, 0.0);
    teleport(&mut sim, TeamColor::Yellow, 0, 100.0, 0.0);
    teleport(&mut sim, TeamColor::Blue, 1, 0.0, 200.0);
    teleport(&mut sim, TeamColor::Yellow, 1, 0.0, -200.0);
    sim.handle_tick(0.01);

    sim.safely_teleport_ball(0.0, 0.0);
    let output = sim.handle_tick(0.01);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let state = sim.state();
    let ball = state.ball.position.xy();
    assert_relative_eq!(ball, Vector2::zeros(), epsilon = 1e-9);
    let radius = RobotSpecs::default().radius;
    for (i, robot) in state.robots.iter().enumerate() {
        let p = robot.position.xy();
        assert!(
            (p - ball).norm() >= radius + 21.5,
            "{} robot {} overlaps the ball",
            robot.team,
            robot.id
        );
        for other in &state.robots[i + 1..] {
            assert!(
                (p - other.position.xy()).norm() >= 2.0 * radius,
                "{} robot {} overlaps {} robot {}",
                robot.team,
                robot.id,
                other.team,
                other.id
            );
        }
    }

    // Robots that were out of the way stay where they are
    let blue_1 = state.robot(TeamColor::Blue, PlayerId::new(1)).unwrap();
    assert_relative_eq!(blue_1.position.xy(), Vector2::new(0.0, 200.0), epsilon = 1e-9);
}

#[test]
fn safe_ball_teleport_is_reproducible() {
    let run = || {
        let mut sim = ideal(setup(3, 3));
        teleport(&mut sim, TeamColor::Blue, 0, 30.0, 20.0);
        teleport(&mut sim, TeamColor::Yellow, 2, -40.0, -60.0);
        sim.handle_tick(0.01);
        sim.handle_command(
            Command::TeleportBall(TeleportBall {
                teleport_safely: true,
                ..TeleportBall::to(0.0, 0.0)
            }),
            sim.time(),
        );
        sim.handle_tick(0.01);
        sim.state()
    };
    assert_eq!(run(), run());
}

#[test]
fn detections_respect_minimum_interval() {
    let mut sim = ideal(SimulatorSetup {
        cameras: CameraSetup {
            num_cameras: 1,
            ..Default::default()
        },
        realism: RealismConfig {
            min_robot_detection_time: 0.05,
            min_ball_detection_time: 0.05,
            ..Default::default()
        },
        ..setup(1, 0)
    });

    let mut robot_ticks = Vec::new();
    let mut ball_ticks = Vec::new();
    for tick in 0..20 {
        let output = sim.handle_tick(0.01);
        assert_eq!(output.vision_packets.len(), 1);
        let packet = &output.vision_packets[0];
        if packet.robot_detections().count() > 0 {
            robot_ticks.push(tick);
        }
        if packet.ball_detections().count() > 0 {
            ball_ticks.push(tick);
        }
    }
    assert_eq!(robot_ticks, vec![0, 5, 10, 15]);
    assert_eq!(ball_ticks, vec![0, 5, 10, 15]);
}

#[test]
fn overlapping_cameras_both_see_the_ball() {
    let mut sim = ideal(setup(0, 0));
    let output = sim.handle_tick(0.01);
    let packet = &output.vision_packets[0];
    assert_eq!(packet.frames.len(), 4);
    // The ball rests at the center, where all four regions meet
    assert_eq!(packet.ball_detections().count(), 4);
    let frame_numbers: Vec<u32> = packet.frames.iter().map(|f| f.frame_number).collect();
    assert_eq!(frame_numbers, vec![0, 0, 0, 0]);

    let output = sim.handle_tick(0.01);
    assert!(output.vision_packets[0]
        .frames
        .iter()
        .all(|f| f.frame_number == 1));
}

#[test]
fn vision_is_released_after_delay() {
    let mut sim = ideal(SimulatorSetup {
        realism: RealismConfig {
            vision_delay: 0.03,
            vision_processing_time: 0.01,
            ..Default::default()
        },
        ..setup(0, 0)
    });
    let mut released = Vec::new();
    for _ in 0..6 {
        let output = sim.handle_tick(0.01);
        released.push(output.vision_packets.len());
        for packet in output.vision_packets {
            assert_eq!(packet.time_release, packet.time_capture + 40_000_000);
            assert_eq!(packet.time_sent, packet.time_capture + 10_000_000);
            assert!(packet.time_release <= sim.time());
        }
    }
    assert_eq!(released, vec![0, 0, 0, 0, 1, 1]);
    assert_eq!(sim.pending_vision_packets(), 4);
}

#[test]
fn vision_delay_change_drops_pending_packets() {
    let mut sim = ideal(SimulatorSetup {
        realism: RealismConfig {
            vision_delay: 0.1,
            ..Default::default()
        },
        ..setup(0, 0)
    });
    for _ in 0..5 {
        assert!(sim.handle_tick(0.01).vision_packets.is_empty());
    }
    assert_eq!(sim.pending_vision_packets(), 5);

    // Same delay, only noise changes: nothing is dropped
    sim.set_realism(RealismConfig {
        vision_delay: 0.1,
        stddev_ball_p: 1.0,
        ..Default::default()
    });
    assert_eq!(sim.pending_vision_packets(), 5);

    sim.set_realism(RealismConfig::default());
    assert_eq!(sim.pending_vision_packets(), 0);

    let mut captures = Vec::new();
    for _ in 0..12 {
        let output = sim.handle_tick(0.01);
        captures.extend(output.vision_packets.iter().map(|p| p.time_capture));
    }
    assert_eq!(captures.len(), 12);
    assert_eq!(captures[0], 60_000_000);
    assert!(captures.windows(2).all(|w| w[0] < w[1]), "{:?}", captures);
}

#[test]
fn geometry_change_drops_pending_packets() {
    let mut sim = ideal(SimulatorSetup {
        realism: RealismConfig {
            vision_delay: 0.05,
            ..Default::default()
        },
        ..setup(0, 0)
    });
    for _ in 0..3 {
        sim.handle_tick(0.01);
    }
    assert_eq!(sim.pending_vision_packets(), 3);
    sim.set_geometry(FieldGeometry::division_b());
    assert_eq!(sim.pending_vision_packets(), 0);
}

#[test]
fn lost_commands_never_reach_the_robot() {
    let mut sim = ideal(SimulatorSetup {
        realism: RealismConfig {
            robot_command_loss: 1.0,
            ..Default::default()
        },
        ..setup(1, 0)
    });
    let start = sim.state().robots[0].position;
    for _ in 0..20 {
        drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);
        let output = sim.handle_tick(0.01);
        // Responses still come back
        assert_eq!(output.radio_responses.len(), 1);
        assert_eq!(output.radio_responses[0].1.packet_loss_rx, 1.0);
    }
    let state = sim.state();
    assert_eq!(state.robots[0].position, start);
    assert_eq!(state.robots[0].mode, RobotMode::Standby);
}

#[test]
fn lost_responses_never_come_back() {
    let mut sim = ideal(SimulatorSetup {
        realism: RealismConfig {
            robot_response_loss: 1.0,
            ..Default::default()
        },
        ..setup(1, 0)
    });
    let start = sim.state().robots[0].position;
    for _ in 0..20 {
        drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);
        let output = sim.handle_tick(0.01);
        assert!(output.radio_responses.is_empty());
    }
    assert!(sim.state().robots[0].position.x > start.x + 50.0);
}

#[test]
fn perfect_radio_answers_every_command() {
    let mut sim = ideal(setup(2, 1));
    for _ in 0..5 {
        drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0), forward(1, 500.0)]);
        drive(&mut sim, TeamColor::Yellow, vec![forward(0, 1000.0)]);
        let output = sim.handle_tick(0.01);
        let teams: Vec<(TeamColor, u32)> = output
            .radio_responses
            .iter()
            .map(|(team, r)| (*team, r.id.as_u32()))
            .collect();
        assert_eq!(
            teams,
            vec![
                (TeamColor::Blue, 0),
                (TeamColor::Blue, 1),
                (TeamColor::Yellow, 0)
            ]
        );
    }
}

#[test_log::test]
fn robot_kicks_ball() {
    let mut sim = ideal(setup(1, 0));
    let d = RobotSpecs::default().center_to_dribbler();
    teleport(&mut sim, TeamColor::Blue, 0, -(d + 21.5 + 2.0), 0.0);
    sim.handle_tick(0.01);

    drive(
        &mut sim,
        TeamColor::Blue,
        vec![RobotCommand::new(PlayerId::new(0)).with_kick(4000.0, 0.0)],
    );
    let output = sim.handle_tick(0.01);
    let response = output.radio_responses[0].1;
    assert!(response.ball_detected);
    assert!(response.cap_charged);

    let robot = sim.state().robots[0].clone();
    assert!(!robot.is_charged);

    for _ in 0..50 {
        sim.handle_tick(0.01);
    }
    let ball = sim.state().ball;
    assert!(ball.velocity.x > 3700.0 && ball.velocity.x < 3800.0, "{}", ball.velocity);
    assert!(ball.position.x > 1900.0 && ball.position.x < 2050.0, "{}", ball.position);
    assert_relative_eq!(ball.position.y, 0.0, epsilon = 1e-6);

    let output = sim.handle_tick(0.01);
    let seen = output.vision_packets[0].ball_detections().next().copied().unwrap();
    assert!(seen.x > 1800.0);
}

#[test]
fn errors_are_flushed_once_per_tick() {
    let mut sim = ideal(setup(1, 1));
    drive(&mut sim, TeamColor::Blue, vec![forward(9, 100.0), forward(8, 100.0)]);
    sim.set_scaling(-2.0);

    let output = sim.handle_tick(0.01);
    assert_eq!(output.errors.len(), 2);
    assert_eq!(output.errors[0].source, ErrorSource::Blue);
    assert_eq!(output.errors[0].errors.len(), 2);
    assert!(output.errors[0]
        .errors
        .iter()
        .all(|e| e.code == "UNKNOWN_ROBOT"));
    assert_eq!(output.errors[1].source, ErrorSource::Config);
    assert_eq!(output.errors[1].errors[0].code, "INVALID_SCALING");

    let output = sim.handle_tick(0.01);
    assert!(output.errors.is_empty());
}

#[test]
fn degenerate_robot_reports_every_step() {
    let mut broken = RobotSpecs::with_id(PlayerId::new(0));
    broken.wheel_angles = [0.5; 4];
    let mut sim = ideal(SimulatorSetup {
        yellow_team: vec![broken],
        ..setup(0, 0)
    });
    let output = sim.handle_tick(0.01);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].source, ErrorSource::Config);
    assert_eq!(output.errors[0].errors.len(), 2);
    assert_eq!(output.errors[0].errors[0].code, "ROBOT_KINEMATICS");
}

#[test]
fn commands_wait_for_their_delay() {
    let mut sim = ideal(SimulatorSetup {
        timing: TimingConfig::default(),
        ..setup(1, 0)
    });
    let handle = sim.robot_handle(TeamColor::Blue, PlayerId::new(0)).unwrap();
    drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);
    assert_eq!(sim.pending_commands(), 1);

    sim.handle_tick(0.02);
    assert_eq!(sim.robot_state(handle).unwrap().mode, RobotMode::Standby);
    sim.handle_tick(0.02);
    assert_eq!(sim.robot_state(handle).unwrap().mode, RobotMode::Active);
    assert_eq!(sim.pending_commands(), 0);
}

#[test]
fn later_arrival_wins_on_equal_timestamps() {
    let mut sim = ideal(setup(1, 0));
    drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);
    drive(&mut sim, TeamColor::Blue, vec![forward(0, -1000.0)]);
    sim.handle_tick(0.05);
    assert!(sim.state().robots[0].velocity.x < -100.0);
}

#[test]
fn commands_apply_in_timestamp_order() {
    let mut sim = ideal(SimulatorSetup {
        timing: TimingConfig::default(),
        ..setup(1, 0)
    });
    let command = |speed| Command::Team {
        team: TeamColor::Blue,
        command: TeamCommand::new(vec![forward(0, speed)]),
    };
    // Arrives first but is due later
    sim.handle_command(command(1000.0), 10_000_000);
    sim.handle_command(command(-1000.0), 0);
    sim.handle_tick(0.1);
    assert!(sim.state().robots[0].velocity.x > 50.0);
}

#[test]
fn commands_for_replaced_robots_are_rejected() {
    let mut sim = ideal(SimulatorSetup {
        timing: TimingConfig::default(),
        ..setup(1, 0)
    });
    drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);

    let mut heavier = RobotSpecs::with_id(PlayerId::new(0));
    heavier.mass = 3.0;
    sim.set_team(TeamColor::Blue, vec![heavier]);

    let output = sim.handle_tick(0.05);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].source, ErrorSource::Blue);
    assert_eq!(output.errors[0].errors[0].code, "STALE_COMMAND");
}

#[test]
fn checkpoint_restores_the_match() {
    let mut sim = ideal(setup(2, 2));
    sim.handle_command(
        Command::TeleportBall(TeleportBall::to(-500.0, 300.0).with_velocity(1500.0, -400.0, 0.0)),
        0,
    );
    sim.handle_tick(0.05);
    let checkpoint = sim.state();

    for _ in 0..20 {
        sim.handle_tick(0.01);
    }
    let first = sim.state();

    sim.restore_state(&checkpoint);
    assert_eq!(sim.time(), checkpoint.time);
    for _ in 0..20 {
        sim.handle_tick(0.01);
    }
    let second = sim.state();

    assert_eq!(first.time, second.time);
    assert_relative_eq!(first.ball.position, second.ball.position, epsilon = 1e-6);
    assert_relative_eq!(first.ball.velocity, second.ball.velocity, epsilon = 1e-6);
}

#[test_log::test]
fn rapier_match_runs() {
    let mut sim = Simulation::new(SimulatorSetup::default()).unwrap();
    let handle = sim.robot_handle(TeamColor::Blue, PlayerId::new(0)).unwrap();
    let start = sim.robot_state(handle).unwrap().position;

    for _ in 0..100 {
        drive(&mut sim, TeamColor::Blue, vec![forward(0, 1000.0)]);
        let output = sim.handle_tick(0.01);
        assert!(output.errors.is_empty(), "{:?}", output.errors);
    }

    let robot = sim.robot_state(handle).unwrap();
    assert!(robot.position.x > start.x + 300.0, "{}", robot.position);
    assert_relative_eq!(robot.position.y, start.y, epsilon = 20.0);

    let ball = sim.state().ball;
    assert!(ball.position.iter().all(|v| v.is_finite()));
    assert_relative_eq!(ball.position.z, 21.5, epsilon = 2.0);
}
