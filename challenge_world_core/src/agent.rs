use std::{collections::BTreeMap, fmt};

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    EntityId, EntityKind, Position,
    games::{GameKind, GameNode, GameState, StateKey, Symbol},
    map::GridError,
    pathfinding::a_star_path,
    world::GridWorld,
};

/// Tabular action-value function.
///
/// Unseen `(state, action)` pairs are worth 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QTable {
    values: BTreeMap<StateKey, BTreeMap<Symbol, f64>>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned value of `action` in `state`, or 0 if never updated.
    pub fn value(&self, state: &StateKey, action: Symbol) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_value(&mut self, state: StateKey, action: Symbol, value: f64) {
        self.values.entry(state).or_default().insert(action, value);
    }

    /// Highest value among `actions`; 0 when there are none.
    pub fn best_value(&self, state: &StateKey, actions: &[Symbol]) -> f64 {
        actions
            .iter()
            .map(|a| self.value(state, *a))
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// The action with the highest value; the first one wins ties.
    pub fn best_action(&self, state: &StateKey, actions: &[Symbol]) -> Option<Symbol> {
        let mut best: Option<(Symbol, f64)> = None;
        for &action in actions {
            let value = self.value(state, action);
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// One-step temporal-difference update. Returns the new value.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: Symbol,
        reward: f64,
        next_best: f64,
        learning_rate: f64,
        discount_factor: f64,
    ) -> f64 {
        let current = self.value(state, action);
        let updated = current + learning_rate * (reward + discount_factor * next_best - current);
        self.set_value(state.clone(), action, updated);
        updated
    }

    /// Number of states with at least one learned value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Hyperparameters of the learning agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningParams {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Initial exploration rate.
    pub exploration_rate: f64,
    /// Multiplier applied to the exploration rate after each completed game.
    pub exploration_decay: f64,
    pub min_exploration_rate: f64,
}

impl Default for LearningParams {
    fn default() -> Self {
        LearningParams {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 1.0,
            exploration_decay: 0.99,
            min_exploration_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMode {
    Navigating,
    Playing,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMode::Navigating => f.write_str("NAVIGATING"),
            AgentMode::Playing => f.write_str("PLAYING"),
        }
    }
}

/// What the agent may touch during its step.
pub struct StepContext<'a, R: ?Sized> {
    pub world: &'a mut GridWorld,
    pub nodes: &'a mut BTreeMap<EntityId, GameNode>,
    pub rng: &'a mut R,
}

/// A finished game, reported back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameReport {
    pub node: EntityId,
    pub kind: GameKind,
    pub success: bool,
}

/// The single entity that walks the grid and learns to play the games.
#[derive(Debug, Clone)]
pub struct LearningAgent {
    id: EntityId,
    position: Position,
    score: i64,
    mode: AgentMode,
    path: Vec<Position>,
    path_cursor: usize,
    q_table: QTable,
    params: LearningParams,
    epsilon: f64,
    current_game: Option<EntityId>,
    game_state: Option<GameState>,
}

impl LearningAgent {
    pub fn new(id: EntityId, position: Position, params: LearningParams, q_table: QTable) -> Self {
        LearningAgent {
            id,
            position,
            score: 0,
            mode: AgentMode::Navigating,
            path: Vec::new(),
            path_cursor: 0,
            q_table,
            epsilon: params.exploration_rate,
            params,
            current_game: None,
            game_state: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    /// The full route currently held, starting at the cell it was planned from.
    pub fn path(&self) -> &[Position] {
        &self.path
    }

    /// Waypoints not yet visited.
    pub fn remaining_path(&self) -> &[Position] {
        self.path.get(self.path_cursor..).unwrap_or(&[])
    }

    pub fn game_state(&self) -> Option<&GameState> {
        self.game_state.as_ref()
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn into_q_table(self) -> QTable {
        self.q_table
    }

    /// Drops the held route and any game in progress, without decaying
    /// exploration. Called when the day's nodes are replaced.
    pub fn reset_for_new_day(&mut self) {
        self.clear_path();
        self.abandon_game();
    }

    /// Advances the agent by one tick.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut StepContext<'_, R>,
    ) -> Result<Option<GameReport>, GridError> {
        match self.mode {
            AgentMode::Navigating => {
                self.navigate(ctx)?;
                Ok(None)
            }
            AgentMode::Playing => Ok(self.play(ctx)),
        }
    }

    fn navigate<R: Rng + ?Sized>(&mut self, ctx: &mut StepContext<'_, R>) -> Result<(), GridError> {
        if let Some(node_id) = self.active_node_here(ctx) {
            self.start_game(node_id, ctx);
            return Ok(());
        }

        if self.remaining_path().is_empty() {
            self.plan_route(ctx);
        }

        match self.remaining_path().first().copied() {
            Some(next) => {
                ctx.world.move_entity(self.id, next)?;
                self.position = next;
                self.path_cursor += 1;
                Ok(())
            }
            None => self.wander(ctx),
        }
    }

    fn active_node_here<R: ?Sized>(&self, ctx: &StepContext<'_, R>) -> Option<EntityId> {
        ctx.world
            .contents(self.position)
            .iter()
            .filter(|o| o.kind == EntityKind::GameNode)
            .map(|o| o.id)
            .find(|id| ctx.nodes.get(id).is_some_and(GameNode::is_active))
    }

    /// Routes to the nearest active node, or leaves the path empty if there
    /// is none or it cannot be reached.
    fn plan_route<R: ?Sized>(&mut self, ctx: &StepContext<'_, R>) {
        self.clear_path();

        let nearest = ctx
            .nodes
            .values()
            .filter(|node| node.is_active())
            .filter_map(|node| ctx.world.position_of(node.id()))
            .min_by_key(|pos| pos.manhattan(&self.position));
        let Some(target) = nearest else {
            trace!(agent = self.id, "no active node to route to");
            return;
        };

        match a_star_path(&*ctx.world, self.position, target) {
            Some(path) if path.len() > 1 => {
                trace!(agent = self.id, ?target, steps = path.len() - 1, "route planned");
                self.path = path;
                // The first waypoint is the current cell
                self.path_cursor = 1;
            }
            _ => trace!(agent = self.id, ?target, "no route to target"),
        }
    }

    /// Random step to a neighbouring cell that holds nothing.
    fn wander<R: Rng + ?Sized>(&mut self, ctx: &mut StepContext<'_, R>) -> Result<(), GridError> {
        let candidates: Vec<Position> = ctx
            .world
            .cardinal_neighbors(self.position)
            .into_iter()
            .filter(|pos| ctx.world.is_empty(*pos))
            .collect();
        if let Some(&next) = candidates.choose(&mut *ctx.rng) {
            trace!(agent = self.id, from = ?self.position, to = ?next, "wandering");
            ctx.world.move_entity(self.id, next)?;
            self.position = next;
        }
        Ok(())
    }

    fn start_game<R: Rng + ?Sized>(&mut self, node_id: EntityId, ctx: &mut StepContext<'_, R>) {
        let Some(node) = ctx.nodes.get_mut(&node_id) else {
            return;
        };
        let state = node.start(&mut *ctx.rng);
        debug!(
            agent = self.id,
            node = node_id,
            kind = node.kind().name(),
            difficulty = node.difficulty(),
            "game started"
        );
        self.mode = AgentMode::Playing;
        self.current_game = Some(node_id);
        self.game_state = Some(state);
        self.clear_path();
    }

    fn play<R: Rng + ?Sized>(&mut self, ctx: &mut StepContext<'_, R>) -> Option<GameReport> {
        let (Some(node_id), Some(state)) = (self.current_game, self.game_state.clone()) else {
            self.abandon_game();
            return None;
        };
        let Some(node) = ctx.nodes.get_mut(&node_id) else {
            self.abandon_game();
            return None;
        };

        let key = state.canonical_key();
        let actions = node.possible_actions(Some(&state));
        let Some(action) = self.choose_action(&key, &actions, &mut *ctx.rng) else {
            self.abandon_game();
            return None;
        };

        let outcome = node.submit_action(action);
        self.score += outcome.reward;

        let next_best = match &outcome.next_state {
            Some(next) => {
                let next_actions = node.possible_actions(Some(next));
                self.q_table
                    .best_value(&next.canonical_key(), &next_actions)
            }
            None => 0.0,
        };
        // Rewards are small integers, exact in f64
        let reward = outcome.reward as f64;
        self.q_table.update(
            &key,
            action,
            reward,
            next_best,
            self.params.learning_rate,
            self.params.discount_factor,
        );
        self.game_state = outcome.next_state;

        if !outcome.complete {
            return None;
        }

        let report = GameReport {
            node: node_id,
            kind: node.kind(),
            success: outcome.success,
        };
        self.finish_game();
        debug!(
            agent = self.id,
            node = node_id,
            success = report.success,
            score = self.score,
            epsilon = self.epsilon,
            "game finished"
        );
        Some(report)
    }

    /// Epsilon-greedy choice among the legal actions.
    fn choose_action<R: Rng + ?Sized>(
        &self,
        key: &StateKey,
        actions: &[Symbol],
        rng: &mut R,
    ) -> Option<Symbol> {
        if actions.is_empty() {
            return None;
        }
        if rng.random::<f64>() < self.epsilon {
            actions.choose(rng).copied()
        } else {
            self.q_table.best_action(key, actions)
        }
    }

    fn finish_game(&mut self) {
        self.current_game = None;
        self.game_state = None;
        self.mode = AgentMode::Navigating;
        self.epsilon = (self.epsilon * self.params.exploration_decay)
            .max(self.params.min_exploration_rate);
    }

    fn abandon_game(&mut self) {
        self.current_game = None;
        self.game_state = None;
        self.mode = AgentMode::Navigating;
    }

    fn clear_path(&mut self) {
        self.path.clear();
        self.path_cursor = 0;
    }
}
