use serde::{Deserialize, Serialize};

pub mod agent;
pub mod connectivity;
pub mod games;
pub mod map;
pub mod pathfinding;
pub mod simulation;
pub mod snapshot;
pub mod world;

/// Unique identifier for entities (the learning agent, game nodes, obstacles).
pub type EntityId = usize;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// The closed set of things that can occupy a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The navigating, learning agent.
    Learner,
    /// A challenge cell hosting a mini-game.
    GameNode,
    /// Inert blocking marker.
    Obstacle,
}
