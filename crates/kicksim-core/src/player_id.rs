use serde::{Deserialize, Serialize};

use crate::TeamColor;

/// Robot id, unique within a team.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlayerId(u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColoredPlayerId(pub TeamColor, pub PlayerId);

impl ColoredPlayerId {
    pub fn new(team: TeamColor, id: PlayerId) -> Self {
        Self(team, id)
    }

    pub fn team(&self) -> TeamColor {
        self.0
    }

    pub fn id(&self) -> PlayerId {
        self.1
    }
}

impl std::fmt::Display for ColoredPlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}
