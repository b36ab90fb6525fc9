//! Mini-games hosted by challenge cells.
//!
//! A [`GameNode`] is eligible to be played while active. Starting it deals a
//! fresh [`GameState`]; each submitted [`Symbol`] yields an [`ActionOutcome`]
//! until the game completes, after which the node holds no state until it is
//! started again.

use std::fmt;

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Difficulty bounds applied to every node.
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 6;

/// Reward returned when an action reaches a node that is not active.
pub const INACTIVE_PENALTY: i64 = -10;

/// The symbols a player can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Orange,
}

pub const PALETTE: [Symbol; 6] = [
    Symbol::Red,
    Symbol::Green,
    Symbol::Blue,
    Symbol::Yellow,
    Symbol::Purple,
    Symbol::Orange,
];

impl Symbol {
    pub const fn name(self) -> &'static str {
        match self {
            Symbol::Red => "red",
            Symbol::Green => "green",
            Symbol::Blue => "blue",
            Symbol::Yellow => "yellow",
            Symbol::Purple => "purple",
            Symbol::Orange => "orange",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    ColorMatch,
    SimonSays,
    SequenceMemory,
    PatternRecognition,
}

impl GameKind {
    pub const ALL: [GameKind; 4] = [
        GameKind::ColorMatch,
        GameKind::SimonSays,
        GameKind::SequenceMemory,
        GameKind::PatternRecognition,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            GameKind::ColorMatch => "color_match",
            GameKind::SimonSays => "simon_says",
            GameKind::SequenceMemory => "sequence_memory",
            GameKind::PatternRecognition => "pattern_recognition",
        }
    }

    /// Human-readable name, e.g. "Color Match".
    pub const fn title(self) -> &'static str {
        match self {
            GameKind::ColorMatch => "Color Match",
            GameKind::SimonSays => "Simon Says",
            GameKind::SequenceMemory => "Sequence Memory",
            GameKind::PatternRecognition => "Pattern Recognition",
        }
    }

    pub const fn win_reward(self, difficulty: u8) -> i64 {
        let d = difficulty as i64;
        match self {
            GameKind::ColorMatch => d * 5,
            GameKind::SimonSays => d * 8,
            GameKind::SequenceMemory => d * 10,
            GameKind::PatternRecognition => d * 12,
        }
    }

    pub const fn loss_reward(self, difficulty: u8) -> i64 {
        let d = difficulty as i64;
        match self {
            GameKind::ColorMatch => -d * 2,
            GameKind::SimonSays => -d * 3,
            GameKind::SequenceMemory => -d * 4,
            GameKind::PatternRecognition => -d * 5,
        }
    }

    /// Reward for a correct answer that does not finish the game. Only the
    /// sequence games have intermediate steps.
    pub const fn step_reward(self) -> Option<i64> {
        match self {
            GameKind::SimonSays => Some(2),
            GameKind::SequenceMemory => Some(3),
            GameKind::ColorMatch | GameKind::PatternRecognition => None,
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Per-kind game progress, as observed by the player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameState {
    ColorMatch {
        target_color: Symbol,
    },
    SimonSays {
        sequence: Vec<Symbol>,
        player_index: usize,
    },
    SequenceMemory {
        sequence: Vec<Symbol>,
        player_index: usize,
    },
    PatternRecognition {
        sequence: Vec<Symbol>,
        correct_next: Symbol,
    },
}

/// Order-independent identity of a [`GameState`], used to index the value
/// table. Fields are rendered as `name=value` pairs sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(String);

impl StateKey {
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        let mut fields: Vec<(&str, String)> = fields.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        let rendered: Vec<String> = fields
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        StateKey(rendered.join(";"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(",")
}

impl GameState {
    pub const fn kind(&self) -> GameKind {
        match self {
            GameState::ColorMatch { .. } => GameKind::ColorMatch,
            GameState::SimonSays { .. } => GameKind::SimonSays,
            GameState::SequenceMemory { .. } => GameKind::SequenceMemory,
            GameState::PatternRecognition { .. } => GameKind::PatternRecognition,
        }
    }

    pub fn canonical_key(&self) -> StateKey {
        let kind = ("type", self.kind().name().to_string());
        match self {
            GameState::ColorMatch { target_color } => {
                StateKey::from_fields([kind, ("target_color", target_color.to_string())])
            }
            GameState::SimonSays {
                sequence,
                player_index,
            }
            | GameState::SequenceMemory {
                sequence,
                player_index,
            } => StateKey::from_fields([
                kind,
                ("sequence", join_symbols(sequence)),
                ("player_index", player_index.to_string()),
            ]),
            GameState::PatternRecognition {
                sequence,
                correct_next,
            } => StateKey::from_fields([
                kind,
                ("sequence", join_symbols(sequence)),
                ("correct_next", correct_next.to_string()),
            ]),
        }
    }
}

/// Result of submitting one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub reward: i64,
    pub complete: bool,
    pub success: bool,
    /// State after the action; `None` once the game is over.
    pub next_state: Option<GameState>,
}

impl ActionOutcome {
    /// The in-band signal for acting on a node that is not being played.
    pub const fn inactive_penalty() -> Self {
        ActionOutcome {
            reward: INACTIVE_PENALTY,
            complete: true,
            success: false,
            next_state: None,
        }
    }
}

/// A challenge cell hosting one mini-game.
#[derive(Debug, Clone)]
pub struct GameNode {
    id: EntityId,
    difficulty: u8,
    kind: GameKind,
    active: bool,
    state: Option<GameState>,
}

impl GameNode {
    /// Creates an inactive node; `difficulty` is clamped to
    /// [`MIN_DIFFICULTY`]..=[`MAX_DIFFICULTY`].
    pub fn new(id: EntityId, difficulty: u8, kind: GameKind) -> Self {
        GameNode {
            id,
            difficulty: difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            kind,
            active: false,
            state: None,
        }
    }

    /// Creates an inactive node of a random kind.
    pub fn random<R: Rng + ?Sized>(id: EntityId, difficulty: u8, rng: &mut R) -> Self {
        let kind = GameKind::ALL
            .choose(rng)
            .copied()
            .unwrap_or(GameKind::ColorMatch);
        Self::new(id, difficulty, kind)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Marks the node as eligible to be played.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Takes the node out of play and discards any game in progress.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.state = None;
    }

    /// Answer symbols available at this difficulty.
    pub fn alphabet(&self) -> &'static [Symbol] {
        let size = (usize::from(self.difficulty) + 1).min(PALETTE.len());
        &PALETTE[..size]
    }

    /// Deals a new game and returns its opening state.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GameState {
        self.active = true;
        let alphabet = self.alphabet();
        let mut draw = |pool: &[Symbol]| pool.choose(&mut *rng).copied().unwrap_or(Symbol::Red);
        let difficulty = usize::from(self.difficulty);

        let state = match self.kind {
            GameKind::ColorMatch => GameState::ColorMatch {
                target_color: draw(alphabet),
            },
            GameKind::SimonSays => GameState::SimonSays {
                sequence: (0..difficulty).map(|_| draw(alphabet)).collect(),
                player_index: 0,
            },
            GameKind::SequenceMemory => GameState::SequenceMemory {
                sequence: (0..difficulty + 1).map(|_| draw(alphabet)).collect(),
                player_index: 0,
            },
            GameKind::PatternRecognition => {
                let base = [draw(&PALETTE[..2]), draw(&PALETTE[..2])];
                let repeats = (difficulty / 2).max(1);
                GameState::PatternRecognition {
                    sequence: base.repeat(repeats),
                    correct_next: base[0],
                }
            }
        };
        self.state = Some(state.clone());
        state
    }

    /// Current game state; `None` when inactive or no game is in progress.
    pub fn game_state(&self) -> Option<&GameState> {
        if self.active { self.state.as_ref() } else { None }
    }

    /// Legal actions in `state`; empty when there is no state.
    pub fn possible_actions(&self, state: Option<&GameState>) -> Vec<Symbol> {
        match state {
            Some(_) => self.alphabet().to_vec(),
            None => Vec::new(),
        }
    }

    /// Plays one action against the current game.
    ///
    /// Acting on an inactive node (or one without a game in progress) is
    /// answered with [`ActionOutcome::inactive_penalty`] rather than an error.
    pub fn submit_action(&mut self, action: Symbol) -> ActionOutcome {
        if !self.active {
            return ActionOutcome::inactive_penalty();
        }
        let Some(state) = self.state.as_mut() else {
            return ActionOutcome::inactive_penalty();
        };

        let kind = self.kind;
        let (complete, success, reward) = match state {
            GameState::ColorMatch { target_color } => {
                let success = action == *target_color;
                (true, success, Self::final_reward(kind, self.difficulty, success))
            }
            GameState::PatternRecognition { correct_next, .. } => {
                let success = action == *correct_next;
                (true, success, Self::final_reward(kind, self.difficulty, success))
            }
            GameState::SimonSays {
                sequence,
                player_index,
            }
            | GameState::SequenceMemory {
                sequence,
                player_index,
            } => {
                if sequence.get(*player_index) == Some(&action) {
                    *player_index += 1;
                    if *player_index >= sequence.len() {
                        (true, true, kind.win_reward(self.difficulty))
                    } else {
                        (false, true, kind.step_reward().unwrap_or(0))
                    }
                } else {
                    (true, false, kind.loss_reward(self.difficulty))
                }
            }
        };

        let next_state = if complete {
            self.state = None;
            None
        } else {
            self.state.clone()
        };

        ActionOutcome {
            reward,
            complete,
            success,
            next_state,
        }
    }

    fn final_reward(kind: GameKind, difficulty: u8, success: bool) -> i64 {
        if success {
            kind.win_reward(difficulty)
        } else {
            kind.loss_reward(difficulty)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn started(kind: GameKind, difficulty: u8, seed: u64) -> (GameNode, GameState) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut node = GameNode::new(1, difficulty, kind);
        node.activate();
        let state = node.start(&mut rng);
        (node, state)
    }

    fn wrong_answer(node: &GameNode, right: Symbol) -> Symbol {
        *node.alphabet().iter().find(|s| **s != right).unwrap()
    }

    #[test]
    fn difficulty_is_clamped() {
        assert_eq!(GameNode::new(0, 0, GameKind::ColorMatch).difficulty(), 1);
        assert_eq!(GameNode::new(0, 9, GameKind::ColorMatch).difficulty(), 6);
        assert_eq!(GameNode::new(0, 4, GameKind::ColorMatch).difficulty(), 4);
    }

    #[test]
    fn alphabet_grows_with_difficulty_up_to_palette() {
        assert_eq!(GameNode::new(0, 1, GameKind::SimonSays).alphabet().len(), 2);
        assert_eq!(GameNode::new(0, 3, GameKind::SimonSays).alphabet().len(), 4);
        assert_eq!(GameNode::new(0, 6, GameKind::SimonSays).alphabet().len(), 6);
    }

    #[test]
    fn reward_tables_are_exact() {
        assert_eq!(GameKind::ColorMatch.win_reward(2), 10);
        assert_eq!(GameKind::ColorMatch.loss_reward(2), -4);
        assert_eq!(GameKind::PatternRecognition.win_reward(3), 36);
        assert_eq!(GameKind::PatternRecognition.loss_reward(3), -15);
        for d in MIN_DIFFICULTY..=MAX_DIFFICULTY {
            let di = i64::from(d);
            assert_eq!(GameKind::ColorMatch.win_reward(d), di * 5);
            assert_eq!(GameKind::ColorMatch.loss_reward(d), -di * 2);
            assert_eq!(GameKind::SimonSays.win_reward(d), di * 8);
            assert_eq!(GameKind::SimonSays.loss_reward(d), -di * 3);
            assert_eq!(GameKind::SequenceMemory.win_reward(d), di * 10);
            assert_eq!(GameKind::SequenceMemory.loss_reward(d), -di * 4);
            assert_eq!(GameKind::PatternRecognition.win_reward(d), di * 12);
            assert_eq!(GameKind::PatternRecognition.loss_reward(d), -di * 5);
        }
    }

    #[test]
    fn color_match_win_and_loss_are_terminal() {
        let (mut node, state) = started(GameKind::ColorMatch, 2, 7);
        let GameState::ColorMatch { target_color } = state else {
            panic!("unexpected state {state:?}");
        };
        let outcome = node.submit_action(target_color);
        assert_eq!(
            outcome,
            ActionOutcome {
                reward: 10,
                complete: true,
                success: true,
                next_state: None
            }
        );
        assert!(node.game_state().is_none());

        let (mut node, _) = started(GameKind::ColorMatch, 2, 7);
        let miss = wrong_answer(&node, target_color);
        let outcome = node.submit_action(miss);
        assert!(outcome.complete && !outcome.success);
        assert_eq!(outcome.reward, -4);
    }

    #[test]
    fn simon_says_pays_steps_then_full_match() {
        let (mut node, state) = started(GameKind::SimonSays, 3, 11);
        let GameState::SimonSays { sequence, .. } = state else {
            panic!("unexpected state {state:?}");
        };
        assert_eq!(sequence.len(), 3);

        let first = node.submit_action(sequence[0]);
        assert_eq!((first.reward, first.complete, first.success), (2, false, true));
        assert_eq!(
            first.next_state,
            Some(GameState::SimonSays {
                sequence: sequence.clone(),
                player_index: 1
            })
        );
        node.submit_action(sequence[1]);
        let last = node.submit_action(sequence[2]);
        assert_eq!((last.reward, last.complete, last.success), (24, true, true));
    }

    #[test]
    fn sequence_memory_mismatch_ends_game() {
        let (mut node, state) = started(GameKind::SequenceMemory, 2, 5);
        let GameState::SequenceMemory { sequence, .. } = state else {
            panic!("unexpected state {state:?}");
        };
        assert_eq!(sequence.len(), 3);

        let first = node.submit_action(sequence[0]);
        assert_eq!(first.reward, 3);
        let miss = wrong_answer(&node, sequence[1]);
        let outcome = node.submit_action(miss);
        assert_eq!((outcome.reward, outcome.complete, outcome.success), (-8, true, false));
        assert_eq!(outcome.next_state, None);
    }

    #[test]
    fn pattern_recognition_expects_first_base_symbol() {
        let (mut node, state) = started(GameKind::PatternRecognition, 4, 9);
        let GameState::PatternRecognition {
            sequence,
            correct_next,
        } = state
        else {
            panic!("unexpected state {state:?}");
        };
        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence[0], correct_next);
        assert_eq!(sequence[0..2], sequence[2..4]);
        assert!(sequence.iter().all(|s| PALETTE[..2].contains(s)));

        let outcome = node.submit_action(correct_next);
        assert_eq!((outcome.reward, outcome.success), (48, true));
    }

    #[test]
    fn pattern_recognition_at_lowest_difficulty_still_shows_a_pattern() {
        let (_, state) = started(GameKind::PatternRecognition, 1, 2);
        let GameState::PatternRecognition { sequence, .. } = state else {
            panic!("unexpected state {state:?}");
        };
        assert_eq!(sequence.len(), 2);
    }

    #[test]
    fn deactivated_node_returns_fixed_penalty() {
        let (mut node, _) = started(GameKind::SimonSays, 2, 1);
        node.deactivate();
        assert_eq!(
            node.submit_action(Symbol::Red),
            ActionOutcome {
                reward: -10,
                complete: true,
                success: false,
                next_state: None
            }
        );
        assert!(node.game_state().is_none());
        assert!(node.possible_actions(node.game_state()).is_empty());
    }

    #[test]
    fn possible_actions_follow_the_state() {
        let (node, state) = started(GameKind::ColorMatch, 3, 4);
        assert_eq!(node.possible_actions(Some(&state)), PALETTE[..4].to_vec());
        assert!(node.possible_actions(None).is_empty());
    }

    #[test]
    fn canonical_key_is_order_independent() {
        let a = StateKey::from_fields([("b", "2".to_string()), ("a", "1".to_string())]);
        let b = StateKey::from_fields([("a", "1".to_string()), ("b", "2".to_string())]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "a=1;b=2");
    }

    #[test]
    fn equal_states_share_a_key_and_distinct_states_do_not() {
        let one = GameState::SimonSays {
            sequence: vec![Symbol::Red, Symbol::Blue],
            player_index: 1,
        };
        assert_eq!(one.canonical_key(), one.clone().canonical_key());
        assert_eq!(
            one.canonical_key().as_str(),
            "player_index=1;sequence=red,blue;type=simon_says"
        );

        let other_kind = GameState::SequenceMemory {
            sequence: vec![Symbol::Red, Symbol::Blue],
            player_index: 1,
        };
        assert_ne!(one.canonical_key(), other_kind.canonical_key());
    }
}
