use std::time::Duration;

use anyhow::{bail, Context, Result};
use kicksim_core::{nanos_to_secs, Command, ErrorReport, TeamColor, VisionPacket};
use kicksim_simulator::{Simulation, SimulatorSetup, TickOutput};
use tokio::{sync::mpsc, time::MissedTickBehavior};

use crate::{
    cli::RunArgs,
    driver::Driver,
    record::{PacketStats, Record, Recorder},
};

/// Something the match loop hands to the consumer.
#[derive(Debug)]
enum Event {
    Vision(VisionPacket),
    Errors(ErrorReport),
}

/// A simulation with scripted players on both teams.
struct Game {
    simulation: Simulation,
    drivers: [Driver; 2],
    responses: usize,
}

impl Game {
    fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            drivers: [Driver::new(TeamColor::Blue), Driver::new(TeamColor::Yellow)],
            responses: 0,
        }
    }

    fn tick(&mut self, dt: f64) -> Vec<Event> {
        let sides = self.simulation.side_assignment();
        let half_length = self.simulation.geometry().half_length();
        for driver in &self.drivers {
            if let Some(command) = driver.commands(sides, half_length) {
                let time = self.simulation.time();
                self.simulation.handle_command(
                    Command::Team {
                        team: driver.team(),
                        command,
                    },
                    time,
                );
            }
        }

        let TickOutput {
            vision_packets,
            radio_responses,
            errors,
        } = self.simulation.handle_tick(dt);
        self.responses += radio_responses.len();

        let mut events = Vec::with_capacity(vision_packets.len() + errors.len());
        for report in errors {
            for error in &report.errors {
                tracing::warn!("{} error {}: {}", report.source, error.code, error.message);
            }
            events.push(Event::Errors(report));
        }
        for packet in vision_packets {
            for driver in &mut self.drivers {
                driver.observe(&packet);
            }
            events.push(Event::Vision(packet));
        }
        events
    }
}

/// Collects statistics and writes the recording.
struct Sink {
    stats: PacketStats,
    recorder: Option<Recorder>,
    error_reports: usize,
}

impl Sink {
    fn consume(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Vision(packet) => {
                self.stats.add(packet);
                if let Some(recorder) = &mut self.recorder {
                    recorder.write(&Record::Vision(packet))?;
                }
            }
            Event::Errors(report) => {
                self.error_reports += 1;
                if let Some(recorder) = &mut self.recorder {
                    recorder.write(&Record::Errors(report))?;
                }
            }
        }
        Ok(())
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    if !(args.duration >= 0.0 && args.duration.is_finite()) {
        bail!("Invalid duration: {}", args.duration);
    }
    let setup = load_setup(&args)?;
    let simulation = Simulation::new(setup).context("Invalid simulator setup")?;
    let mut game = Game::new(simulation);

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let dt = tick.as_secs_f64();
    let ticks = (args.duration / dt).ceil() as u64;
    let sink = Sink {
        stats: PacketStats::default(),
        recorder: args.record.as_deref().map(Recorder::create).transpose()?,
        error_reports: 0,
    };

    tracing::info!(
        "Running {} ticks of {} ms{}",
        ticks,
        tick.as_millis(),
        if args.realtime { " in real time" } else { "" }
    );
    let mut sink = if args.realtime {
        run_realtime(&mut game, sink, ticks, tick).await?
    } else {
        run_batch(&mut game, sink, ticks, dt)?
    };

    let state = game.simulation.state();
    tracing::info!(
        "Stopped at {:.2} s, ball at ({:.0}, {:.0}), {} radio responses, {} error reports",
        nanos_to_secs(state.time),
        state.ball.position.x,
        state.ball.position.y,
        game.responses,
        sink.error_reports
    );
    sink.stats.log();

    if let Some(mut recorder) = sink.recorder.take() {
        recorder.write(&Record::FinalState(&state))?;
        let count = recorder.finish()?;
        tracing::info!("Wrote {} records", count);
    }
    Ok(())
}

fn load_setup(args: &RunArgs) -> Result<SimulatorSetup> {
    let mut setup = match &args.setup {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read setup {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse setup {}", path.display()))?
        }
        None => SimulatorSetup::default(),
    };
    if let Some(seed) = args.seed {
        setup.seed = seed;
    }
    if args.flip {
        setup.flip = true;
    }
    Ok(setup)
}

fn run_batch(game: &mut Game, mut sink: Sink, ticks: u64, dt: f64) -> Result<Sink> {
    for _ in 0..ticks {
        for event in game.tick(dt) {
            sink.consume(&event)?;
        }
    }
    Ok(sink)
}

/// Ticks on a wall clock interval. Packets go to a separate task over a
/// channel so slow recording does not stall the match.
async fn run_realtime(game: &mut Game, mut sink: Sink, ticks: u64, tick: Duration) -> Result<Sink> {
    let (tx, mut rx) = mpsc::channel::<Event>(64);
    let consumer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.consume(&event)?;
        }
        Ok::<_, anyhow::Error>(sink)
    });

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let dt = tick.as_secs_f64();
    'ticks: for _ in 0..ticks {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Shutting down");
                break 'ticks;
            }
            _ = interval.tick() => {
                for event in game.tick(dt) {
                    if tx.send(event).await.is_err() {
                        break 'ticks;
                    }
                }
            }
        }
    }
    drop(tx);

    consumer.await.context("Packet consumer panicked")?
}
