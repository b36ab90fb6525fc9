//! Breadth-first reachability over the 4-neighbourhood.
//!
//! Obstacle cells are blocked, everything else is passable. Obstacle
//! placement goes through [`place_obstacle_preserving`], which only commits a
//! candidate if the checked start/goal pair stays connected.

use std::collections::{HashMap, VecDeque};

use crate::{EntityId, EntityKind, Position, map::GridError, world::GridWorld};

/// Length in steps of the shortest obstacle-free route, or `None` when the
/// goal cannot be reached (or either endpoint is off the grid).
pub fn shortest_distance(world: &GridWorld, start: Position, goal: Position) -> Option<usize> {
    if !world.in_bounds(start) || !world.in_bounds(goal) {
        return None;
    }

    let mut queue = VecDeque::from([start]);
    let mut distance: HashMap<Position, usize> = HashMap::from([(start, 0)]);

    while let Some(current) = queue.pop_front() {
        let steps = distance[&current];
        if current == goal {
            return Some(steps);
        }
        for next in world.cardinal_neighbors(current) {
            if distance.contains_key(&next) || world.has_obstacle(next) {
                continue;
            }
            distance.insert(next, steps + 1);
            queue.push_back(next);
        }
    }
    None
}

/// Checks if a path exists from start to goal.
pub fn is_connected(world: &GridWorld, start: Position, goal: Position) -> bool {
    shortest_distance(world, start, goal).is_some()
}

/// Tentatively places an obstacle and keeps it only if `start` can still
/// reach `goal`. Returns whether the obstacle was committed.
pub fn place_obstacle_preserving(
    world: &mut GridWorld,
    id: EntityId,
    pos: Position,
    start: Position,
    goal: Position,
) -> Result<bool, GridError> {
    world.place(id, EntityKind::Obstacle, pos)?;
    if is_connected(world, start, goal) {
        return Ok(true);
    }
    world.remove(id)?;
    Ok(false)
}
