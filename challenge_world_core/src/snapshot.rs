use serde::{Deserialize, Serialize};

use crate::{
    EntityId, EntityKind, Position,
    agent::AgentMode,
    simulation::Simulation,
};

/// One entity as seen by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub position: Position,
    pub kind: EntityKind,
    /// Only set for game nodes.
    pub active: Option<bool>,
}

/// Read-only copy of everything an outside consumer needs after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub width: usize,
    pub height: usize,
    pub entities: Vec<EntitySnapshot>,
    pub day: u32,
    pub total_days: u32,
    pub steps_today: u32,
    pub steps_per_day: u32,
    pub score: i64,
    pub mode: AgentMode,
    pub epsilon: f64,
    pub path: Vec<Position>,
    pub last_game_name: Option<String>,
    pub last_game_result: Option<String>,
    pub daily_scores: Vec<i64>,
    pub cumulative_scores: Vec<i64>,
    pub running: bool,
}

/// Summary of the completed days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub days: usize,
    pub total: i64,
    pub average: f64,
    pub best: Option<i64>,
}

impl DailyStats {
    pub fn from_scores(scores: &[i64]) -> Self {
        let total: i64 = scores.iter().sum();
        let average = if scores.is_empty() {
            0.0
        } else {
            total as f64 / scores.len() as f64
        };
        DailyStats {
            days: scores.len(),
            total,
            average,
            best: scores.iter().copied().max(),
        }
    }
}

impl Simulation {
    pub fn snapshot(&self) -> Snapshot {
        let mut entities: Vec<EntitySnapshot> = self
            .registry
            .iter()
            .filter_map(|entity| {
                let position = self.world.position_of(entity.id)?;
                let active = match entity.kind {
                    EntityKind::GameNode => self.nodes.get(&entity.id).map(|n| n.is_active()),
                    EntityKind::Learner | EntityKind::Obstacle => None,
                };
                Some(EntitySnapshot {
                    id: entity.id,
                    position,
                    kind: entity.kind,
                    active,
                })
            })
            .collect();
        // Registry order changes every tick
        entities.sort_by_key(|e| e.id);

        Snapshot {
            width: self.world.width(),
            height: self.world.height(),
            entities,
            day: self.current_day,
            total_days: self.config.total_days,
            steps_today: self.steps_today,
            steps_per_day: self.config.steps_per_day,
            score: self.agent.score(),
            mode: self.agent.mode(),
            epsilon: self.agent.epsilon(),
            path: self.agent.path().to_vec(),
            last_game_name: self.last_game.map(|g| g.kind.title().to_string()),
            last_game_result: self.last_game.map(|g| g.outcome().to_string()),
            daily_scores: self.daily_scores.clone(),
            cumulative_scores: self.cumulative_scores.clone(),
            running: self.running,
        }
    }

    pub fn daily_stats(&self) -> DailyStats {
        DailyStats::from_scores(&self.daily_scores)
    }
}
