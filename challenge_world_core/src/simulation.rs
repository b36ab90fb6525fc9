//! Day/tick scheduler.
//!
//! [`Simulation`] owns the grid, the entity registry and every source of
//! randomness. Each call to [`Simulation::step`] advances exactly one tick;
//! callers must serialize calls (the `&mut self` receiver enforces this
//! within one thread).
//!
//! Within a tick every registered entity acts once, in an order that is
//! re-shuffled every tick from the shared generator.

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::atomic::{AtomicBool, Ordering},
};

use rand::{
    Rng, SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    EntityId, EntityKind, Position,
    agent::{LearningAgent, LearningParams, QTable, StepContext},
    connectivity::place_obstacle_preserving,
    games::{GameKind, GameNode},
    map::GridError,
    world::GridWorld,
};

/// Difficulty range for nodes spawned at the start of each day.
pub const SPAWN_DIFFICULTY: RangeInclusive<u8> = 1..=3;

/// Number of nodes a day may start with.
pub const GAMES_PER_DAY: [usize; 2] = [2, 3];

/// Difficulty of the goal node used for the construction-time connectivity check.
const INITIAL_GOAL_DIFFICULTY: u8 = 1;

/// Construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    pub num_obstacles: usize,
    pub steps_per_day: u32,
    pub total_days: u32,
    /// Seed for the shared generator; a random seed is drawn when absent.
    pub seed: Option<u64>,
    pub learning: LearningParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            width: 10,
            height: 10,
            num_obstacles: 5,
            steps_per_day: 50,
            total_days: 10,
            seed: None,
            learning: LearningParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid must have at least two cells, got {width}x{height}")]
    GridTooSmall { width: usize, height: usize },
    #[error("Grid of {width}x{height} cells is too large to address")]
    GridTooLarge { width: usize, height: usize },
    #[error("Steps per day must be at least 1")]
    ZeroStepsPerDay,
    #[error("Requested {requested} obstacles but only {available} cells are free")]
    TooManyObstacles { requested: usize, available: usize },
    #[error("Placed only {placed} of {requested} obstacles without cutting the spawn off from the goal")]
    ObstaclesUnplaceable { requested: usize, placed: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl SimulationConfig {
    /// Cells left for obstacles once the spawn and the initial goal are taken.
    /// `None` when the cell count overflows.
    pub fn free_cells(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)
            .map(|cells| cells.saturating_sub(2))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(cells) = self.width.checked_mul(self.height) else {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
            });
        };
        if cells < 2 {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.steps_per_day == 0 {
            return Err(ConfigError::ZeroStepsPerDay);
        }
        let available = cells - 2;
        if self.num_obstacles > available {
            return Err(ConfigError::TooManyObstacles {
                requested: self.num_obstacles,
                available,
            });
        }
        Ok(())
    }
}

/// What a call to [`Simulation::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every entity acted once.
    Advanced,
    /// The day's step budget was spent; the day was closed instead of acting.
    DayEnded { day: u32 },
    /// All days are done; nothing happened.
    Finished,
}

/// Per-tick telemetry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub score: i64,
    pub day: u32,
    pub steps_today: u32,
}

/// The most recently completed game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub kind: GameKind,
    pub success: bool,
}

impl GameResult {
    pub const fn outcome(&self) -> &'static str {
        if self.success { "Won" } else { "Lost" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegisteredEntity {
    pub(crate) id: EntityId,
    pub(crate) kind: EntityKind,
}

/// The simulation model: grid, entities and the day schedule.
#[derive(Debug)]
pub struct Simulation {
    pub(crate) config: SimulationConfig,
    initial_q_table: Option<QTable>,
    seed: u64,
    rng: StdRng,
    pub(crate) world: GridWorld,
    pub(crate) agent: LearningAgent,
    pub(crate) nodes: BTreeMap<EntityId, GameNode>,
    pub(crate) registry: Vec<RegisteredEntity>,
    next_entity_id: EntityId,
    spawn: Position,
    initial_goal: Position,
    pub(crate) current_day: u32,
    pub(crate) steps_today: u32,
    pub(crate) daily_scores: Vec<i64>,
    pub(crate) cumulative_scores: Vec<i64>,
    telemetry: Vec<TelemetrySample>,
    pub(crate) last_game: Option<GameResult>,
    pub(crate) running: bool,
}

impl Simulation {
    /// Builds a new run: places the agent, the initial goal and the
    /// obstacles, then starts day 1.
    ///
    /// `q_table` carries learned values over from an earlier run.
    pub fn new(
        config: SimulationConfig,
        q_table: Option<QTable>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut world = GridWorld::new(config.width, config.height);

        let mut cells: Vec<Position> = world.cells().positions().collect();
        cells.shuffle(&mut rng);
        let (Some(spawn), Some(initial_goal)) = (cells.pop(), cells.pop()) else {
            return Err(ConfigError::GridTooSmall {
                width: config.width,
                height: config.height,
            }
            .into());
        };

        let mut next_entity_id: EntityId = 0;
        let mut registry = Vec::new();

        let agent_id = next_entity_id;
        next_entity_id += 1;
        world.place(agent_id, EntityKind::Learner, spawn)?;
        let agent = LearningAgent::new(
            agent_id,
            spawn,
            config.learning,
            q_table.clone().unwrap_or_default(),
        );
        registry.push(RegisteredEntity {
            id: agent_id,
            kind: EntityKind::Learner,
        });

        let goal_id = next_entity_id;
        next_entity_id += 1;
        world.place(goal_id, EntityKind::GameNode, initial_goal)?;
        let mut nodes = BTreeMap::new();
        nodes.insert(
            goal_id,
            GameNode::random(goal_id, INITIAL_GOAL_DIFFICULTY, &mut rng),
        );
        registry.push(RegisteredEntity {
            id: goal_id,
            kind: EntityKind::GameNode,
        });

        let mut placed = 0;
        while placed < config.num_obstacles {
            let Some(candidate) = cells.pop() else {
                return Err(ConfigError::ObstaclesUnplaceable {
                    requested: config.num_obstacles,
                    placed,
                }
                .into());
            };
            let id = next_entity_id;
            if place_obstacle_preserving(&mut world, id, candidate, spawn, initial_goal)? {
                next_entity_id += 1;
                placed += 1;
                registry.push(RegisteredEntity {
                    id,
                    kind: EntityKind::Obstacle,
                });
            } else {
                debug!(?candidate, "obstacle would disconnect spawn from goal, retrying");
            }
        }

        info!(
            seed,
            width = config.width,
            height = config.height,
            obstacles = placed,
            days = config.total_days,
            steps_per_day = config.steps_per_day,
            "simulation created"
        );

        let mut simulation = Simulation {
            running: config.total_days > 0,
            config,
            initial_q_table: q_table,
            seed,
            rng,
            world,
            agent,
            nodes,
            registry,
            next_entity_id,
            spawn,
            initial_goal,
            current_day: 1,
            steps_today: 0,
            daily_scores: Vec::new(),
            cumulative_scores: Vec::new(),
            telemetry: Vec::new(),
            last_game: None,
        };
        simulation.start_day()?;
        Ok(simulation)
    }

    /// Rebuilds the run from the original parameters. With no configured
    /// seed a fresh one is drawn.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        *self = Simulation::new(self.config.clone(), self.initial_q_table.clone())?;
        Ok(())
    }

    /// Advances one tick.
    pub fn step(&mut self) -> Result<TickOutcome, SimulationError> {
        if self.current_day > self.config.total_days {
            self.running = false;
            return Ok(TickOutcome::Finished);
        }
        if self.steps_today >= self.config.steps_per_day {
            let day = self.current_day;
            self.end_day()?;
            return Ok(TickOutcome::DayEnded { day });
        }

        self.registry.shuffle(&mut self.rng);
        let order: Vec<RegisteredEntity> = self.registry.clone();
        for entity in order {
            match entity.kind {
                EntityKind::Learner => {
                    let mut ctx = StepContext {
                        world: &mut self.world,
                        nodes: &mut self.nodes,
                        rng: &mut self.rng,
                    };
                    if let Some(report) = self.agent.step(&mut ctx)? {
                        self.record_game_result(report.kind, report.success);
                        self.complete_game_node(report.node, report.success);
                    }
                }
                // Nodes and obstacles have no behaviour of their own
                EntityKind::GameNode | EntityKind::Obstacle => {}
            }
        }

        self.steps_today += 1;
        self.telemetry.push(TelemetrySample {
            score: self.agent.score(),
            day: self.current_day,
            steps_today: self.steps_today,
        });
        Ok(TickOutcome::Advanced)
    }

    /// Steps until the run finishes or `stop` is raised. The flag is only
    /// checked between ticks. Returns the number of ticks taken.
    pub fn run_until_finished(&mut self, stop: &AtomicBool) -> Result<u64, SimulationError> {
        let mut ticks = 0;
        while self.running && !stop.load(Ordering::Relaxed) {
            if self.step()? == TickOutcome::Finished {
                break;
            }
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Takes a finished node out of play. On success another inactive node
    /// is activated so the agent has something to walk to.
    pub fn complete_game_node(&mut self, node_id: EntityId, success: bool) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.deactivate();
        }
        if success {
            self.activate_random_node();
        }
    }

    fn record_game_result(&mut self, kind: GameKind, success: bool) {
        let result = GameResult { kind, success };
        info!(
            day = self.current_day,
            game = kind.title(),
            outcome = result.outcome(),
            score = self.agent.score(),
            "game completed"
        );
        self.last_game = Some(result);
    }

    fn activate_random_node(&mut self) -> Option<EntityId> {
        let inactive: Vec<EntityId> = self
            .nodes
            .values()
            .filter(|node| !node.is_active())
            .map(GameNode::id)
            .collect();
        let chosen = *inactive.choose(&mut self.rng)?;
        if let Some(node) = self.nodes.get_mut(&chosen) {
            node.activate();
            debug!(node = chosen, kind = node.kind().name(), "node activated");
        }
        Some(chosen)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Replaces all game nodes with 2 or 3 fresh ones on empty cells and
    /// activates one of them.
    fn start_day(&mut self) -> Result<(), GridError> {
        self.steps_today = 0;
        self.agent.reset_for_new_day();

        let stale: Vec<EntityId> = self.nodes.keys().copied().collect();
        for id in stale {
            self.world.remove(id)?;
            self.nodes.remove(&id);
        }
        self.registry.retain(|e| e.kind != EntityKind::GameNode);

        let count = GAMES_PER_DAY.choose(&mut self.rng).copied().unwrap_or(2);
        for _ in 0..count {
            let difficulty = self.rng.random_range(SPAWN_DIFFICULTY);
            let id = self.allocate_id();
            let node = GameNode::random(id, difficulty, &mut self.rng);
            let empty = self.world.empty_cells();
            let Some(&pos) = empty.choose(&mut self.rng) else {
                warn!(day = self.current_day, "no empty cell left for a game node");
                break;
            };
            self.world.place(id, EntityKind::GameNode, pos)?;
            debug!(
                node = id,
                kind = node.kind().name(),
                difficulty = node.difficulty(),
                ?pos,
                "node spawned"
            );
            self.nodes.insert(id, node);
            self.registry.push(RegisteredEntity {
                id,
                kind: EntityKind::GameNode,
            });
        }

        self.activate_random_node();
        info!(day = self.current_day, nodes = self.nodes.len(), "day started");
        Ok(())
    }

    /// Rolls the day's score into the histories and moves to the next day.
    fn end_day(&mut self) -> Result<(), GridError> {
        let total = self.agent.score();
        let previous: i64 = self.daily_scores.iter().sum();
        let day_score = total - previous;
        self.daily_scores.push(day_score);
        self.cumulative_scores.push(total);
        info!(day = self.current_day, day_score, total, "day ended");

        self.current_day += 1;
        if self.current_day <= self.config.total_days {
            self.start_day()
        } else {
            self.running = false;
            info!(total, "all days complete");
            Ok(())
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The seed actually in use, including a drawn one.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    pub fn agent(&self) -> &LearningAgent {
        &self.agent
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GameNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: EntityId) -> Option<&GameNode> {
        self.nodes.get(&id)
    }

    pub fn active_nodes(&self) -> impl Iterator<Item = &GameNode> {
        self.nodes.values().filter(|node| node.is_active())
    }

    /// Where the agent started.
    pub fn spawn(&self) -> Position {
        self.spawn
    }

    /// The goal checked for reachability while placing obstacles.
    pub fn initial_goal(&self) -> Position {
        self.initial_goal
    }

    pub fn current_day(&self) -> u32 {
        self.current_day
    }

    pub fn steps_today(&self) -> u32 {
        self.steps_today
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn daily_scores(&self) -> &[i64] {
        &self.daily_scores
    }

    pub fn cumulative_scores(&self) -> &[i64] {
        &self.cumulative_scores
    }

    pub fn telemetry(&self) -> &[TelemetrySample] {
        &self.telemetry
    }

    pub fn last_game(&self) -> Option<GameResult> {
        self.last_game
    }

    pub fn q_table(&self) -> &QTable {
        self.agent.q_table()
    }

    /// Consumes the run, keeping what the agent learned.
    pub fn into_q_table(self) -> QTable {
        self.agent.into_q_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{agent::AgentMode, connectivity::is_connected};

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn defaults_match_the_classic_setup() {
        let config = SimulationConfig::default();
        assert_eq!((config.width, config.height), (10, 10));
        assert_eq!(config.num_obstacles, 5);
        assert_eq!(config.steps_per_day, 50);
        assert_eq!(config.total_days, 10);
    }

    #[test]
    fn too_many_obstacles_is_a_config_error() {
        let config = SimulationConfig {
            width: 3,
            height: 3,
            num_obstacles: 8,
            ..config(1)
        };
        let err = Simulation::new(config, None).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::TooManyObstacles {
                requested: 8,
                available: 7
            })
        ));
    }

    #[test]
    fn obstacles_that_would_cut_the_grid_are_reported() {
        // Filling every free cell of a 1-wide corridor only works when the
        // spawn and the goal happen to be neighbours.
        let mut rejected = 0;
        for seed in 0..20 {
            let config = SimulationConfig {
                width: 6,
                height: 1,
                num_obstacles: 4,
                ..config(seed)
            };
            match Simulation::new(config, None) {
                Ok(sim) => assert_eq!(sim.spawn().manhattan(&sim.initial_goal()), 1),
                Err(SimulationError::Config(ConfigError::ObstaclesUnplaceable {
                    requested: 4,
                    placed,
                })) => {
                    assert!(placed < 4);
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(rejected > 0);
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        let tiny = SimulationConfig {
            width: 1,
            height: 1,
            num_obstacles: 0,
            ..config(1)
        };
        assert!(matches!(
            Simulation::new(tiny, None),
            Err(SimulationError::Config(ConfigError::GridTooSmall { .. }))
        ));

        let no_steps = SimulationConfig {
            steps_per_day: 0,
            ..config(1)
        };
        assert!(matches!(
            Simulation::new(no_steps, None),
            Err(SimulationError::Config(ConfigError::ZeroStepsPerDay))
        ));
    }

    #[test]
    fn overflowing_grid_is_a_config_error() {
        let huge = SimulationConfig {
            width: usize::MAX,
            height: 2,
            num_obstacles: 0,
            ..config(1)
        };
        assert_eq!(huge.free_cells(), None);
        assert_eq!(
            huge.validate(),
            Err(ConfigError::GridTooLarge {
                width: usize::MAX,
                height: 2
            })
        );
        assert!(matches!(
            Simulation::new(huge, None),
            Err(SimulationError::Config(ConfigError::GridTooLarge { .. }))
        ));
        assert_eq!(config(1).free_cells(), Some(98));
    }

    #[test]
    fn construction_places_every_obstacle_and_keeps_goal_reachable() {
        for seed in 0..20 {
            let config = SimulationConfig {
                num_obstacles: 30,
                ..config(seed)
            };
            let sim = Simulation::new(config, None).unwrap();
            let obstacles = sim
                .registry
                .iter()
                .filter(|e| e.kind == EntityKind::Obstacle)
                .count();
            assert_eq!(obstacles, 30);
            assert!(is_connected(sim.world(), sim.spawn(), sim.initial_goal()));
        }
    }

    #[test]
    fn each_day_starts_with_two_or_three_nodes_and_one_active() {
        let mut sim = Simulation::new(config(5), None).unwrap();
        assert!(GAMES_PER_DAY.contains(&sim.nodes().count()));
        assert_eq!(sim.active_nodes().count(), 1);
        for node in sim.nodes() {
            assert!(SPAWN_DIFFICULTY.contains(&node.difficulty()));
            assert_ne!(sim.world().position_of(node.id()), Some(sim.agent().position()));
        }

        while sim.current_day() == 1 {
            sim.step().unwrap();
        }
        assert_eq!(sim.steps_today(), 0);
        assert!(GAMES_PER_DAY.contains(&sim.nodes().count()));
        assert_eq!(sim.active_nodes().count(), 1);
    }

    #[test]
    fn day_change_abandons_a_game_in_progress() {
        let mut sim = Simulation::new(config(14), None).unwrap();
        while sim.agent().mode() != AgentMode::Playing {
            assert!(sim.is_running(), "agent never reached a game");
            sim.step().unwrap();
        }
        assert!(sim.current_day() < sim.config().total_days);
        let epsilon = sim.agent().epsilon();
        let day = sim.current_day();

        sim.end_day().unwrap();
        assert_eq!(sim.current_day(), day + 1);
        assert_eq!(sim.agent().mode(), AgentMode::Navigating);
        assert!(sim.agent().game_state().is_none());
        assert!(sim.agent().path().is_empty());
        assert_eq!(sim.agent().epsilon(), epsilon);
    }

    #[test]
    fn day_nodes_spawn_on_cells_with_no_other_occupant() {
        let config = SimulationConfig {
            num_obstacles: 30,
            steps_per_day: 2,
            total_days: 12,
            ..config(9)
        };
        let mut sim = Simulation::new(config, None).unwrap();
        let assert_nodes_alone = |sim: &Simulation| {
            for node in sim.nodes() {
                let pos = sim.world().position_of(node.id()).unwrap();
                let contents = sim.world().contents(pos);
                assert_eq!(contents.len(), 1, "node {} shares {pos:?}", node.id());
                assert_eq!(contents[0].kind, EntityKind::GameNode);
            }
        };

        assert_nodes_alone(&sim);
        let mut day_starts = 0;
        loop {
            match sim.step().unwrap() {
                TickOutcome::DayEnded { .. } if sim.is_running() => {
                    assert_nodes_alone(&sim);
                    day_starts += 1;
                }
                TickOutcome::Finished => break,
                _ => {}
            }
        }
        assert_eq!(day_starts, 11);
    }

    #[test]
    fn at_most_one_node_is_active_at_any_tick() {
        let mut sim = Simulation::new(config(8), None).unwrap();
        while sim.step().unwrap() != TickOutcome::Finished {
            assert!(sim.active_nodes().count() <= 1);
        }
    }

    #[test]
    fn day_scores_roll_up_to_the_total() {
        let mut sim = Simulation::new(config(21), None).unwrap();
        let stop = AtomicBool::new(false);
        let ticks = sim.run_until_finished(&stop).unwrap();

        assert!(!sim.is_running());
        assert_eq!(sim.current_day(), 11);
        assert_eq!(ticks, 10 * 51);
        assert_eq!(sim.daily_scores().len(), 10);
        assert_eq!(sim.daily_scores().iter().sum::<i64>(), sim.agent().score());
        assert_eq!(sim.cumulative_scores().last(), Some(&sim.agent().score()));
        assert_eq!(sim.telemetry().len(), 10 * 50);
        assert_eq!(sim.step().unwrap(), TickOutcome::Finished);
    }

    #[test]
    fn day_end_tick_does_not_move_entities() {
        let config = SimulationConfig {
            steps_per_day: 3,
            total_days: 2,
            ..config(4)
        };
        let mut sim = Simulation::new(config, None).unwrap();
        for _ in 0..3 {
            assert_eq!(sim.step().unwrap(), TickOutcome::Advanced);
        }
        let before = sim.agent().position();
        assert_eq!(sim.step().unwrap(), TickOutcome::DayEnded { day: 1 });
        assert_eq!(sim.agent().position(), before);
        assert_eq!(sim.telemetry().len(), 3);
        assert_eq!(sim.current_day(), 2);
    }

    #[test]
    fn stop_flag_is_honoured_between_ticks() {
        let mut sim = Simulation::new(config(2), None).unwrap();
        let stop = AtomicBool::new(true);
        assert_eq!(sim.run_until_finished(&stop).unwrap(), 0);
        assert_eq!(sim.steps_today(), 0);
    }

    #[test]
    fn failed_game_leaves_no_active_node_and_success_activates_one() {
        let mut sim = Simulation::new(config(6), None).unwrap();
        let active = sim.active_nodes().next().unwrap().id();

        sim.complete_game_node(active, false);
        assert_eq!(sim.active_nodes().count(), 0);

        sim.complete_game_node(active, true);
        assert_eq!(sim.active_nodes().count(), 1);
    }

    #[test]
    fn zero_days_finishes_immediately() {
        let config = SimulationConfig {
            total_days: 0,
            ..config(1)
        };
        let mut sim = Simulation::new(config, None).unwrap();
        assert!(!sim.is_running());
        assert_eq!(sim.step().unwrap(), TickOutcome::Finished);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let run = |seed| {
            let mut sim = Simulation::new(config(seed), None).unwrap();
            for _ in 0..300 {
                sim.step().unwrap();
            }
            (sim.telemetry().to_vec(), sim.agent().position(), sim.q_table().clone())
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn reset_rebuilds_the_seeded_start() {
        let mut sim = Simulation::new(config(12), None).unwrap();
        let start = sim.agent().position();
        let nodes: Vec<EntityId> = sim.nodes().map(GameNode::id).collect();
        for _ in 0..120 {
            sim.step().unwrap();
        }
        sim.reset().unwrap();
        assert_eq!(sim.current_day(), 1);
        assert_eq!(sim.agent().position(), start);
        assert_eq!(sim.agent().score(), 0);
        assert_eq!(sim.nodes().map(GameNode::id).collect::<Vec<_>>(), nodes);
        assert!(sim.telemetry().is_empty());
    }

    #[test]
    fn injected_q_table_is_used_and_kept_on_reset() {
        let mut sim = Simulation::new(config(30), None).unwrap();
        for _ in 0..400 {
            sim.step().unwrap();
        }
        let learned = sim.into_q_table();
        assert!(!learned.is_empty());

        let mut next = Simulation::new(config(31), Some(learned.clone())).unwrap();
        assert_eq!(next.q_table(), &learned);
        for _ in 0..50 {
            next.step().unwrap();
        }
        next.reset().unwrap();
        assert_eq!(next.q_table(), &learned);
    }
}
