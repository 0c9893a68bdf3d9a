use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use kicksim_core::{ErrorReport, VisionPacket};
use kicksim_simulator::SimulatorState;
use serde::Serialize;

/// One line of a recording.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record<'a> {
    Vision(&'a VisionPacket),
    Errors(&'a ErrorReport),
    FinalState(&'a SimulatorState),
}

/// Writes records as JSON lines.
pub struct Recorder {
    writer: BufWriter<File>,
    count: usize,
}

impl Recorder {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create recording {}", path.display()))?;
        tracing::info!("Recording to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            count: 0,
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("Failed to serialize record")?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush recording")?;
        Ok(self.count)
    }
}

/// Running totals over the released vision packets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketStats {
    pub packets: usize,
    pub frames: usize,
    pub ball_detections: usize,
    pub robot_detections: usize,
    pub geometry_frames: usize,
    /// Sum of release minus capture time, in ns
    total_latency: i64,
}

impl PacketStats {
    pub fn add(&mut self, packet: &VisionPacket) {
        self.packets += 1;
        self.frames += packet.frames.len();
        self.ball_detections += packet.ball_detections().count();
        self.robot_detections += packet.robot_detections().count();
        if packet.geometry.is_some() {
            self.geometry_frames += 1;
        }
        self.total_latency += packet.time_release - packet.time_capture;
    }

    /// Mean delay between capture and release, in ms.
    pub fn mean_latency_ms(&self) -> f64 {
        if self.packets == 0 {
            return 0.0;
        }
        self.total_latency as f64 / self.packets as f64 / 1e6
    }

    pub fn log(&self) {
        tracing::info!(
            "{} vision packets ({} frames, {} geometry), {} ball and {} robot detections, mean latency {:.1} ms",
            self.packets,
            self.frames,
            self.geometry_frames,
            self.ball_detections,
            self.robot_detections,
            self.mean_latency_ms()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(capture: i64, release: i64) -> VisionPacket {
        VisionPacket {
            frames: Vec::new(),
            geometry: None,
            time_capture: capture,
            time_sent: capture,
            time_release: release,
        }
    }

    #[test]
    fn test_stats_latency() {
        let mut stats = PacketStats::default();
        assert_eq!(stats.mean_latency_ms(), 0.0);
        stats.add(&packet(0, 40_000_000));
        stats.add(&packet(10_000_000, 30_000_000));
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.mean_latency_ms(), 30.0);
    }

    #[test]
    fn test_record_is_tagged() {
        let p = packet(5, 10);
        let json = serde_json::to_value(Record::Vision(&p)).unwrap();
        assert_eq!(json["type"], "vision");
        assert_eq!(json["time_release"], 10);
    }
}
