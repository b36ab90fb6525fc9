use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use crate::{Position, world::GridWorld};

// For priority queue
#[derive(Clone, Eq, PartialEq)]
struct PrioritizedItem {
    f_score: usize,
    /// Insertion counter; earlier discoveries win ties on `f_score`.
    order: usize,
    position: Position,
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* shortest path between two cells, avoiding obstacles.
///
/// Moves are 4-directional with unit cost and the heuristic is the Manhattan
/// distance. Cells holding game nodes or the agent are passable. The returned
/// path runs from `start` to `goal`, both included. `None` means no path
/// exists, which also covers endpoints outside the grid.
pub fn a_star_path(world: &GridWorld, start: Position, goal: Position) -> Option<Vec<Position>> {
    if !world.in_bounds(start) || !world.in_bounds(goal) {
        return None;
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, usize> = HashMap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut order = 0;

    frontier.push(PrioritizedItem {
        f_score: start.manhattan(&goal),
        order,
        position: start,
    });
    g_score.insert(start, 0);

    let mut goal_reached = false;

    while let Some(PrioritizedItem {
        position: current, ..
    }) = frontier.pop()
    {
        if current == goal {
            goal_reached = true;
            break;
        }
        // Stale heap entries for already expanded cells
        if !closed.insert(current) {
            continue;
        }

        let current_cost = g_score.get(&current).copied().unwrap_or(usize::MAX);
        for neighbor in world.cardinal_neighbors(current) {
            if world.has_obstacle(neighbor) {
                continue;
            }
            let tentative = current_cost.saturating_add(1);
            if g_score.get(&neighbor).is_none_or(|&known| tentative < known) {
                g_score.insert(neighbor, tentative);
                came_from.insert(neighbor, current);
                order += 1;
                frontier.push(PrioritizedItem {
                    f_score: tentative + neighbor.manhattan(&goal),
                    order,
                    position: neighbor,
                });
            }
        }
    }

    if !goal_reached {
        return None;
    }

    // Reconstruct path
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = *came_from.get(&current)?;
        path.push(current);
    }
    path.reverse();
    Some(path)
}
