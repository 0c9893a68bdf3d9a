use serde::{Deserialize, Serialize};

use crate::TeamColor;

/// Origin of a simulation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSource {
    Blue,
    Yellow,
    Config,
}

impl ErrorSource {
    pub const ALL: [ErrorSource; 3] = [ErrorSource::Blue, ErrorSource::Yellow, ErrorSource::Config];
}

impl From<TeamColor> for ErrorSource {
    fn from(team: TeamColor) -> Self {
        match team {
            TeamColor::Blue => ErrorSource::Blue,
            TeamColor::Yellow => ErrorSource::Yellow,
        }
    }
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSource::Blue => write!(f, "blue"),
            ErrorSource::Yellow => write!(f, "yellow"),
            ErrorSource::Config => write!(f, "config"),
        }
    }
}

/// A fault that happened inside the simulation. These never abort a tick;
/// they are collected and reported once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimError {
    pub code: String,
    pub message: String,
}

impl SimError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// All errors of one origin collected during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub source: ErrorSource,
    pub errors: Vec<SimError>,
}
