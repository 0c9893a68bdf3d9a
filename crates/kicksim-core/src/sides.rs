use serde::{Deserialize, Serialize};

use crate::Vector2;

/// Team colors of a match. Used as partition key for robots, commands and
/// error reports.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeamColor {
    Blue,
    Yellow,
}

impl TeamColor {
    /// Returns the opposite team color.
    pub fn opposite(&self) -> Self {
        match self {
            TeamColor::Blue => TeamColor::Yellow,
            TeamColor::Yellow => TeamColor::Blue,
        }
    }
}

impl std::fmt::Display for TeamColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamColor::Blue => write!(f, "Blue"),
            TeamColor::Yellow => write!(f, "Yellow"),
        }
    }
}

/// Represents which team defends the positive x side of the field.
///
/// The simulator's own coordinate system never changes. Flipping the field
/// swaps the sides and mirrors everything that crosses the simulator boundary
/// (vision output, teleport targets, global velocity commands).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideAssignment {
    /// Blue team defends the positive x side (+x goal)
    BlueOnPositive,
    /// Yellow team defends the positive x side (+x goal)
    YellowOnPositive,
}

impl SideAssignment {
    /// Side assignment for the given flip setting. Unflipped, blue defends the
    /// negative half.
    pub fn from_flipped(flipped: bool) -> Self {
        if flipped {
            SideAssignment::BlueOnPositive
        } else {
            SideAssignment::YellowOnPositive
        }
    }

    /// Sign of the x axis of the given team's own half: `-1.0` if it defends
    /// the negative side, `1.0` otherwise.
    pub fn own_half_sign(&self, color: TeamColor) -> f64 {
        -self.attacking_direction_sign(color)
    }

    /// Returns the direction multiplier pointing at the opponent's goal.
    ///
    /// # Returns
    /// - `1.0`: Team attacks towards +x
    /// - `-1.0`: Team attacks towards -x
    pub fn attacking_direction_sign(&self, color: TeamColor) -> f64 {
        match (self, color) {
            (SideAssignment::BlueOnPositive, TeamColor::Blue) => -1.0,
            (SideAssignment::BlueOnPositive, TeamColor::Yellow) => 1.0,
            (SideAssignment::YellowOnPositive, TeamColor::Blue) => 1.0,
            (SideAssignment::YellowOnPositive, TeamColor::Yellow) => -1.0,
        }
    }

    pub fn is_on_own_side(&self, color: TeamColor, position: &Vector2) -> bool {
        position.x * self.own_half_sign(color) > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unflipped_blue_defends_negative() {
        let sides = SideAssignment::from_flipped(false);
        assert_eq!(sides.own_half_sign(TeamColor::Blue), -1.0);
        assert_eq!(sides.own_half_sign(TeamColor::Yellow), 1.0);
        assert!(sides.is_on_own_side(TeamColor::Blue, &Vector2::new(-100.0, 0.0)));
        assert!(!sides.is_on_own_side(TeamColor::Yellow, &Vector2::new(-100.0, 0.0)));
    }

    #[test]
    fn test_flipped_swaps_sides() {
        let sides = SideAssignment::from_flipped(true);
        assert_eq!(sides, SideAssignment::BlueOnPositive);
        assert_eq!(sides.attacking_direction_sign(TeamColor::Blue), -1.0);
        assert!(sides.is_on_own_side(TeamColor::Blue, &Vector2::new(2000.0, 300.0)));
    }

    #[test]
    fn test_opposite() {
        assert_eq!(TeamColor::Blue.opposite(), TeamColor::Yellow);
        assert_eq!(TeamColor::Yellow.opposite().opposite(), TeamColor::Yellow);
    }
}
