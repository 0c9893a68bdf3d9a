mod angle;
mod commands;
mod error;
mod geom;
mod math;
mod player_id;
mod realism;
mod robot;
mod sides;
mod vision;

pub use angle::*;
pub use commands::*;
pub use error::*;
pub use geom::*;
pub use math::*;
pub use player_id::*;
pub use realism::*;
pub use robot::*;
pub use sides::*;
pub use vision::*;

pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;

/// Simulation time stamp in nanoseconds.
pub type SimTime = i64;

pub const NANOS_PER_SEC: f64 = 1e9;

/// Converts a duration in seconds to [`SimTime`] nanoseconds.
pub fn secs_to_nanos(secs: f64) -> SimTime {
    (secs * NANOS_PER_SEC).round() as SimTime
}

/// Converts [`SimTime`] nanoseconds to seconds.
pub fn nanos_to_secs(nanos: SimTime) -> f64 {
    nanos as f64 / NANOS_PER_SEC
}
