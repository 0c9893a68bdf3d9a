use std::collections::BTreeMap;

use kicksim_core::{PlayerId, RobotSpecs, TeamColor, Vector2};
use serde::{Deserialize, Serialize};

use crate::{physics::PhysicsWorld, robot::RobotBody};

/// Reference to one incarnation of a robot.
///
/// Replacing a robot bumps its generation, so handles taken before the
/// replacement no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotHandle {
    pub team: TeamColor,
    pub id: PlayerId,
    pub generation: u32,
}

/// The robots of one team, ordered by id.
#[derive(Debug)]
pub struct RobotMap {
    team: TeamColor,
    robots: BTreeMap<PlayerId, RobotBody>,
    /// Last generation handed out per id, kept after removal
    generations: BTreeMap<PlayerId, u32>,
}

impl RobotMap {
    pub fn new(team: TeamColor) -> Self {
        Self {
            team,
            robots: BTreeMap::new(),
            generations: BTreeMap::new(),
        }
    }

    /// Creates a robot, replacing any robot with the same id.
    pub fn insert(
        &mut self,
        world: &mut dyn PhysicsWorld,
        specs: RobotSpecs,
        position: Vector2,
        yaw: f64,
    ) -> RobotHandle {
        let id = specs.id;
        self.remove(world, id);
        let generation = match self.generations.get(&id) {
            Some(g) => g.wrapping_add(1),
            None => 0,
        };
        self.generations.insert(id, generation);
        log::debug!("adding {} robot {} (generation {})", self.team, id, generation);

        let robot = RobotBody::new(world, specs, self.team, generation, position, yaw);
        self.robots.insert(id, robot);
        RobotHandle {
            team: self.team,
            id,
            generation,
        }
    }

    /// Removes the robot and its body. Returns false if there was none.
    pub fn remove(&mut self, world: &mut dyn PhysicsWorld, id: PlayerId) -> bool {
        match self.robots.remove(&id) {
            Some(robot) => {
                robot.remove(world);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, world: &mut dyn PhysicsWorld) {
        let ids: Vec<PlayerId> = self.robots.keys().copied().collect();
        for id in ids {
            self.remove(world, id);
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.robots.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&RobotBody> {
        self.robots.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut RobotBody> {
        self.robots.get_mut(&id)
    }

    pub fn handle(&self, id: PlayerId) -> Option<RobotHandle> {
        self.robots.get(&id).map(|r| RobotHandle {
            team: self.team,
            id,
            generation: r.generation(),
        })
    }

    /// Resolves a handle, failing for other teams and stale generations.
    pub fn resolve(&self, handle: RobotHandle) -> Option<&RobotBody> {
        if handle.team != self.team {
            return None;
        }
        self.robots
            .get(&handle.id)
            .filter(|r| r.generation() == handle.generation)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.robots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RobotBody> {
        self.robots.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RobotBody> {
        self.robots.values_mut()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::IdealWorld;

    fn specs(id: u32) -> RobotSpecs {
        RobotSpecs::with_id(PlayerId::new(id))
    }

    #[test]
    fn test_iterates_in_id_order() {
        let mut world = IdealWorld::new();
        let mut map = RobotMap::new(TeamColor::Yellow);
        for id in [3, 0, 7, 1] {
            map.insert(&mut world, specs(id), Vector2::new(id as f64 * 300.0, 0.0), 0.0);
        }
        let ids: Vec<u32> = map.iter().map(|r| r.specs().id.as_u32()).collect();
        assert_eq!(ids, vec![0, 1, 3, 7]);
        assert_eq!(world.body_count(), 4);
    }

    #[test]
    fn test_replacement_bumps_generation() {
        let mut world = IdealWorld::new();
        let mut map = RobotMap::new(TeamColor::Blue);
        let first = map.insert(&mut world, specs(2), Vector2::zeros(), 0.0);
        assert_eq!(first.generation, 0);
        assert!(map.resolve(first).is_some());

        let second = map.insert(&mut world, specs(2), Vector2::zeros(), 0.0);
        assert_eq!(second.generation, 1);
        assert!(map.resolve(first).is_none());
        assert!(map.resolve(second).is_some());
        assert_eq!(world.body_count(), 1);

        // Generations survive removal
        assert!(map.remove(&mut world, PlayerId::new(2)));
        assert!(!map.remove(&mut world, PlayerId::new(2)));
        let third = map.insert(&mut world, specs(2), Vector2::zeros(), 0.0);
        assert_eq!(third.generation, 2);
        assert_eq!(map.handle(PlayerId::new(2)), Some(third));
    }

    #[test]
    fn test_handle_of_other_team_does_not_resolve() {
        let mut world = IdealWorld::new();
        let mut map = RobotMap::new(TeamColor::Blue);
        let handle = map.insert(&mut world, specs(0), Vector2::zeros(), 0.0);
        let foreign = RobotHandle {
            team: TeamColor::Yellow,
            ..handle
        };
        assert!(map.resolve(foreign).is_none());
        map.clear(&mut world);
        assert!(map.is_empty());
        assert_eq!(world.body_count(), 0);
    }
}
