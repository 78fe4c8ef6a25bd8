//! Computer player: minimax / alpha-beta search with iterative deepening

use crate::combat::{damage_amount, repair_amount};
use crate::error::{Forfeit, ParseError, SearchError};
use crate::eval::{evaluate, evaluate_with_depth, is_decisive, Heuristic};
use crate::game::{Action, Applied, GameState};
use crate::units::UnitType;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Share of the time budget held back for returning the action
const SAFETY_MARGIN: f64 = 0.1;

/// Smallest reserve, for budgets where 10% is below timer noise
const MIN_RESERVE: Duration = Duration::from_millis(5);

/// Bound used as +/- infinity (negation never overflows)
const INFINITY: i64 = i64::MAX;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Search algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Minimax,
    #[default]
    AlphaBeta,
}

impl FromStr for Algorithm {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimax" => Ok(Algorithm::Minimax),
            "alphabeta" | "alpha-beta" | "ab" => Ok(Algorithm::AlphaBeta),
            _ => Err(ParseError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Minimax => "minimax",
            Algorithm::AlphaBeta => "alphabeta",
        })
    }
}

/// Search limits and evaluation choice
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_depth: u32,
    pub time_limit: Duration,
    pub algorithm: Algorithm,
    pub heuristic: Heuristic,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            time_limit: Duration::from_secs(5),
            algorithm: Algorithm::AlphaBeta,
            heuristic: Heuristic::E0,
        }
    }
}

impl SearchConfig {
    pub fn new(max_depth: u32, time_limit: Duration) -> Self {
        Self {
            max_depth,
            time_limit,
            ..Default::default()
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Counters for one search, or accumulated over a game
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes entered (root excluded)
    pub nodes_visited: u64,
    /// Deepest fully completed iteration
    pub depth_reached: u32,
    /// Score of the chosen action, Attacker's perspective
    pub score: i64,
    pub elapsed: Duration,
    /// Evaluator calls keyed by ply from the root
    pub evaluations_per_depth: BTreeMap<u32, u64>,
    /// Nodes that expanded children (root included)
    pub non_leaf_nodes: u64,
    /// Nodes other than the root
    pub non_root_nodes: u64,
    /// An iteration was cut short by the deadline
    pub timed_out: bool,
}

impl SearchStats {
    pub fn evaluations(&self) -> u64 {
        self.evaluations_per_depth.values().sum()
    }

    /// Average number of children per expanded node
    pub fn branching_factor(&self) -> f64 {
        if self.non_leaf_nodes == 0 {
            0.0
        } else {
            self.non_root_nodes as f64 / self.non_leaf_nodes as f64
        }
    }

    /// Evaluations per second
    pub fn evaluation_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.evaluations() as f64 / secs
        } else {
            0.0
        }
    }

    /// Fold another search into running totals
    pub fn accumulate(&mut self, other: &SearchStats) {
        self.nodes_visited += other.nodes_visited;
        self.depth_reached = self.depth_reached.max(other.depth_reached);
        self.score = other.score;
        self.elapsed += other.elapsed;
        for (&depth, &count) in &other.evaluations_per_depth {
            *self.evaluations_per_depth.entry(depth).or_insert(0) += count;
        }
        self.non_leaf_nodes += other.non_leaf_nodes;
        self.non_root_nodes += other.non_root_nodes;
        self.timed_out |= other.timed_out;
    }

    fn record_evaluation(&mut self, ply: u32) {
        *self.evaluations_per_depth.entry(ply).or_insert(0) += 1;
    }
}

/// Chosen action and how it was found
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub action: Action,
    pub stats: SearchStats,
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Pick an action for the active player.
///
/// Deepens one ply at a time up to `max_depth`, keeping the result of the
/// last completed iteration. The first root action of the first iteration is
/// always scored, so a non-terminal state always yields an action.
pub fn choose_action(state: &GameState, config: &SearchConfig) -> Result<SearchOutcome, SearchError> {
    let start = Instant::now();
    if state.is_over() {
        return Err(SearchError::GameOver);
    }
    let mut actions = order_actions(state, state.legal_actions());
    if actions.is_empty() {
        return Err(SearchError::NoLegalActions);
    }

    let reserve = config.time_limit.mul_f64(SAFETY_MARGIN).max(MIN_RESERVE);
    let budget = config.time_limit.saturating_sub(reserve);
    let mut search = Search {
        heuristic: config.heuristic,
        prune: config.algorithm == Algorithm::AlphaBeta,
        deadline: start + budget,
        timed_out: false,
        stats: SearchStats::default(),
    };

    let side = state.active_player().sign();
    let mut best: Option<(Action, i64)> = None;

    for depth in 1..=config.max_depth.max(1) {
        let (found, complete) = search.root(state, &actions, depth);

        if complete {
            best = found;
            search.stats.depth_reached = depth;
        } else if best.is_none() {
            best = found;
        }

        let Some((action, score)) = best else {
            break;
        };
        if !complete || is_decisive(score) {
            break;
        }

        // Principal action first in the next iteration
        if let Some(pos) = actions.iter().position(|a| *a == action) {
            actions[..=pos].rotate_right(1);
        }
    }

    let (action, score) = best.ok_or(SearchError::NoLegalActions)?;
    let mut stats = search.stats;
    stats.score = side * score;
    stats.elapsed = start.elapsed();
    stats.timed_out = search.timed_out;

    Ok(SearchOutcome { action, stats })
}

/// Search for an action and play it, holding the result to the turn rules.
///
/// The mover forfeits when search fails, when the search ran past
/// `time_limit`, or when the chosen action is rejected.
pub fn play_turn(state: &GameState, config: &SearchConfig) -> Result<(SearchOutcome, Applied), Forfeit> {
    let outcome = choose_action(state, config)?;
    let applied = check_turn(state, config, &outcome)?;
    Ok((outcome, applied))
}

fn check_turn(state: &GameState, config: &SearchConfig, outcome: &SearchOutcome) -> Result<Applied, Forfeit> {
    if outcome.stats.elapsed > config.time_limit {
        return Err(Forfeit::Timeout {
            elapsed: outcome.stats.elapsed,
            limit: config.time_limit,
        });
    }
    state.apply(outcome.action).map_err(|rejection| Forfeit::IllegalAction {
        action: outcome.action,
        rejection,
    })
}

/// Uniformly random legal action
pub fn random_action<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Option<Action> {
    state.legal_actions().choose(rng).copied()
}

/// Search-driven player that keeps cumulative statistics across its turns
pub struct ComputerPlayer {
    pub config: SearchConfig,
    pub totals: SearchStats,
}

impl ComputerPlayer {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            totals: SearchStats::default(),
        }
    }

    /// Get the best action for the current position
    pub fn choose_action(&mut self, state: &GameState) -> Result<SearchOutcome, SearchError> {
        let outcome = choose_action(state, &self.config)?;
        self.totals.accumulate(&outcome.stats);
        Ok(outcome)
    }

    /// Search and play one turn; see [`play_turn`]
    pub fn play_turn(&mut self, state: &GameState) -> Result<(SearchOutcome, Applied), Forfeit> {
        let outcome = self.choose_action(state)?;
        let applied = check_turn(state, &self.config, &outcome)?;
        Ok((outcome, applied))
    }

    /// Play both sides until the game ends
    pub fn play_game(&mut self, initial: GameState) -> (GameState, Vec<Action>) {
        let mut state = initial;
        let mut history = Vec::new();

        while !state.is_over() {
            match self.play_turn(&state) {
                Ok((outcome, applied)) => {
                    history.push(outcome.action);
                    state = applied.state;
                }
                Err(_) => {
                    state.forfeit(state.active_player());
                    break;
                }
            }
        }

        (state, history)
    }
}

// ============================================================================
// ACTION ORDERING
// ============================================================================

/// Score an action for ordering (higher = search first).
///
/// Attacks come first, strongest hits (and hits on an AI) leading, then
/// repairs, moves and finally self-destructs.
fn action_score(state: &GameState, action: &Action) -> i64 {
    let rules = state.rules();
    let unit_at = |c| state.get_unit(c);

    match *action {
        Action::Attack { from, target } => match (unit_at(from), unit_at(target)) {
            (Some(attacker), Some(victim)) => {
                let ai_bonus = if victim.unit_type == UnitType::AI { 100 } else { 0 };
                3000 + ai_bonus + damage_amount(&rules.damage_table, attacker, victim) as i64
            }
            _ => 3000,
        },
        Action::Repair { from, target } => match (unit_at(from), unit_at(target)) {
            (Some(repairer), Some(friend)) => {
                2000 + repair_amount(&rules.repair_table, repairer, friend, rules.max_health) as i64
            }
            _ => 2000,
        },
        Action::Move { .. } => 1000,
        Action::SelfDestruct { .. } => 0,
    }
}

/// Stable sort by descending score, keeping generation order among equals
fn order_actions(state: &GameState, mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_by_cached_key(|a| std::cmp::Reverse(action_score(state, a)));
    actions
}

// ============================================================================
// NEGAMAX
// ============================================================================

struct Search {
    heuristic: Heuristic,
    prune: bool,
    deadline: Instant,
    timed_out: bool,
    stats: SearchStats,
}

impl Search {
    fn out_of_time(&mut self) -> bool {
        if !self.timed_out && Instant::now() >= self.deadline {
            self.timed_out = true;
        }
        self.timed_out
    }

    /// Score every root action to `depth`. Returns the best action with its
    /// score from the mover's perspective, and whether the iteration finished.
    ///
    /// Only strictly better scores replace the incumbent, and beta stays
    /// open at the root, so pruning never changes the chosen action.
    fn root(&mut self, state: &GameState, actions: &[Action], depth: u32) -> (Option<(Action, i64)>, bool) {
        self.stats.non_leaf_nodes += 1;
        let mut best: Option<(Action, i64)> = None;
        let mut alpha = -INFINITY;

        for (i, &action) in actions.iter().enumerate() {
            let must_score = depth == 1 && i == 0;
            if !must_score && self.out_of_time() {
                return (best, false);
            }

            let child = state.apply_unchecked(action).state;
            self.stats.non_root_nodes += 1;
            let window = if self.prune { -alpha } else { INFINITY };
            let score = -self.negamax(&child, depth - 1, 1, -INFINITY, window);

            if self.timed_out && !must_score {
                return (best, false);
            }

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((action, score));
                alpha = alpha.max(score);
            }
        }

        (best, true)
    }

    /// Score from the perspective of the player to move in `state`
    fn negamax(&mut self, state: &GameState, depth: u32, ply: u32, mut alpha: i64, beta: i64) -> i64 {
        self.stats.nodes_visited += 1;
        let side = state.active_player().sign();

        if state.is_over() {
            self.stats.record_evaluation(ply);
            return side * evaluate_with_depth(state, self.heuristic, depth);
        }
        if depth == 0 {
            self.stats.record_evaluation(ply);
            return side * evaluate(state, self.heuristic);
        }
        if self.out_of_time() {
            return 0;
        }

        let actions = order_actions(state, state.legal_actions());
        self.stats.non_leaf_nodes += 1;
        let mut best = -INFINITY;

        for action in actions {
            if self.out_of_time() {
                return 0;
            }
            let child = state.apply_unchecked(action).state;
            self.stats.non_root_nodes += 1;
            let score = -self.negamax(&child, depth - 1, ply + 1, -beta, -alpha);
            if self.timed_out {
                return 0;
            }

            best = best.max(score);
            if self.prune {
                alpha = alpha.max(score);
                if alpha >= beta {
                    break;
                }
            }
        }

        best
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Coord;
    use crate::eval::WIN_SCORE;
    use crate::ruleset::{Placement, RuleSet};
    use crate::units::Player;
    use rand_chacha::ChaCha8Rng;

    fn c(s: &str) -> Coord {
        s.parse().unwrap()
    }

    fn opening() -> GameState {
        RuleSet::default().to_game_state(100).unwrap()
    }

    fn midgame() -> GameState {
        RuleSet::default()
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI).with_health(7),
                Placement::new(c("B1"), Player::Defender, UnitType::Tech),
                Placement::new(c("B2"), Player::Defender, UnitType::Program).with_health(4),
                Placement::new(c("C2"), Player::Defender, UnitType::Firewall),
                Placement::new(c("C3"), Player::Attacker, UnitType::Virus).with_health(6),
                Placement::new(c("D3"), Player::Attacker, UnitType::Program),
                Placement::new(c("C4"), Player::Attacker, UnitType::Firewall).with_health(5),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
            ])
            .to_game_state(100)
            .unwrap()
    }

    fn config(depth: u32, algorithm: Algorithm) -> SearchConfig {
        SearchConfig::new(depth, Duration::from_secs(600)).with_algorithm(algorithm)
    }

    #[test]
    fn test_alphabeta_matches_minimax() {
        for state in [opening(), midgame(), midgame().with_active_player(Player::Defender)] {
            for depth in 1..=3 {
                for heuristic in [Heuristic::E0, Heuristic::E2] {
                    let mm = choose_action(&state, &config(depth, Algorithm::Minimax).with_heuristic(heuristic))
                        .unwrap();
                    let ab = choose_action(&state, &config(depth, Algorithm::AlphaBeta).with_heuristic(heuristic))
                        .unwrap();
                    assert_eq!(mm.action, ab.action, "depth {} {}", depth, heuristic);
                    assert_eq!(mm.stats.score, ab.stats.score, "depth {} {}", depth, heuristic);
                    assert!(ab.stats.nodes_visited <= mm.stats.nodes_visited);
                }
            }
        }
    }

    #[test]
    fn test_tiny_budget_still_returns_legal_action() {
        let state = opening();
        let cfg = SearchConfig::new(8, Duration::from_millis(1)).with_heuristic(Heuristic::E2);
        let outcome = choose_action(&state, &cfg).unwrap();
        assert!(state.validate(outcome.action).is_ok());
        assert!(outcome.stats.depth_reached <= 8);
    }

    #[test]
    fn test_zero_budget_still_returns_legal_action() {
        let state = midgame();
        let cfg = SearchConfig::new(5, Duration::ZERO);
        let outcome = choose_action(&state, &cfg).unwrap();
        assert!(state.validate(outcome.action).is_ok());
        assert!(outcome.stats.timed_out);
    }

    #[test]
    fn test_search_finishes_within_time_limit() {
        let mut positions = vec![opening(), midgame()];
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for plies in [6, 14] {
            let mut state = opening();
            for _ in 0..plies {
                let action = random_action(&state, &mut rng).unwrap();
                let next = state.apply(action).unwrap().state;
                if next.is_over() {
                    break;
                }
                state = next;
            }
            positions.push(state);
        }

        for state in &positions {
            for algorithm in [Algorithm::Minimax, Algorithm::AlphaBeta] {
                for ms in [1, 5, 10, 25] {
                    let limit = Duration::from_millis(ms);
                    let cfg = SearchConfig::new(20, limit)
                        .with_heuristic(Heuristic::E2)
                        .with_algorithm(algorithm);
                    let outcome = choose_action(state, &cfg).unwrap();
                    assert!(
                        outcome.stats.elapsed <= limit,
                        "{} with {} ms took {:?}",
                        algorithm,
                        ms,
                        outcome.stats.elapsed
                    );
                }
            }
        }
    }

    #[test]
    fn test_play_turn_forfeits_over_time() {
        let state = midgame();
        let cfg = SearchConfig::new(5, Duration::ZERO);
        match play_turn(&state, &cfg) {
            Err(Forfeit::Timeout { limit, .. }) => assert_eq!(limit, Duration::ZERO),
            other => panic!("expected a timeout forfeit, got {:?}", other.map(|(o, _)| o.action)),
        }
    }

    #[test]
    fn test_play_turn_applies_action() {
        let state = opening();
        let (outcome, applied) = play_turn(&state, &config(2, Algorithm::AlphaBeta)).unwrap();
        assert_eq!(applied.state.turn(), 2);
        assert!(state.validate(outcome.action).is_ok());
    }

    #[test]
    fn test_play_game_forfeits_over_time() {
        let initial = opening();
        let mut ai = ComputerPlayer::new(SearchConfig::new(3, Duration::ZERO));
        let (final_state, history) = ai.play_game(initial);
        assert!(history.is_empty());
        assert!(final_state.is_over());
        assert_eq!(final_state.winner(), Some(Player::Defender));
    }

    #[test]
    fn test_search_does_not_mutate_input() {
        let state = midgame();
        let before = state.to_string();
        let actions_before = state.legal_actions();
        choose_action(&state, &config(3, Algorithm::AlphaBeta)).unwrap();
        assert_eq!(state.to_string(), before);
        assert_eq!(state.legal_actions(), actions_before);
        assert_eq!(state.turn(), 1);
    }

    #[test]
    fn test_finds_winning_attack() {
        let state = RuleSet::default()
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("A2"), Player::Attacker, UnitType::Virus),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
            ])
            .to_game_state(100)
            .unwrap();
        let outcome = choose_action(&state, &config(3, Algorithm::AlphaBeta)).unwrap();
        assert_eq!(outcome.action, Action::Attack { from: c("A2"), target: c("A1") });
        assert!(outcome.stats.score >= WIN_SCORE);
        // Decisive at depth 1, no need to go deeper
        assert_eq!(outcome.stats.depth_reached, 1);
    }

    #[test]
    fn test_defender_avoids_loss_score_sign() {
        // Defender to move; attacker virus threatens the defender AI
        let state = RuleSet::default()
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("B2"), Player::Defender, UnitType::Tech),
                Placement::new(c("A2"), Player::Attacker, UnitType::Virus).with_health(6),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
            ])
            .to_game_state(100)
            .unwrap()
            .with_active_player(Player::Defender);
        let outcome = choose_action(&state, &config(2, Algorithm::AlphaBeta)).unwrap();
        // Tech deals 6 to a virus: the threat is removed
        assert_eq!(outcome.action, Action::Attack { from: c("B2"), target: c("A2") });
        assert!(outcome.stats.score < WIN_SCORE);
    }

    #[test]
    fn test_game_over_is_an_error() {
        let state = RuleSet::default().to_game_state(0).unwrap();
        assert!(matches!(
            choose_action(&state, &SearchConfig::default()),
            Err(SearchError::GameOver)
        ));
    }

    #[test]
    fn test_action_ordering() {
        let state = midgame();
        let ordered = order_actions(&state, state.legal_actions());
        assert!(matches!(ordered[0], Action::Attack { .. }));
        assert!(matches!(ordered.last(), Some(Action::SelfDestruct { .. })));
        let first_move = ordered.iter().position(|a| matches!(a, Action::Move { .. })).unwrap();
        assert!(ordered[..first_move].iter().all(|a| !matches!(a, Action::SelfDestruct { .. })));
    }

    #[test]
    fn test_stats() {
        let outcome = choose_action(&opening(), &config(2, Algorithm::Minimax)).unwrap();
        let stats = &outcome.stats;
        assert_eq!(stats.depth_reached, 2);
        assert!(stats.evaluations_per_depth.contains_key(&1));
        assert!(stats.evaluations_per_depth.contains_key(&2));
        assert!(stats.branching_factor() > 1.0);

        let mut totals = SearchStats::default();
        totals.accumulate(stats);
        totals.accumulate(stats);
        assert_eq!(totals.evaluations(), stats.evaluations() * 2);
    }

    #[test]
    fn test_random_action_is_legal() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let state = opening();
        for _ in 0..20 {
            let action = random_action(&state, &mut rng).unwrap();
            assert!(state.validate(action).is_ok());
        }
    }

    #[test]
    fn test_play_game() {
        let initial = RuleSet::default().to_game_state(10).unwrap();
        let mut ai = ComputerPlayer::new(SearchConfig::new(1, Duration::from_secs(5)));
        let (final_state, history) = ai.play_game(initial);
        assert!(final_state.is_over());
        assert!(!history.is_empty());
        assert!(history.len() <= 10);
        assert!(ai.totals.evaluations() > 0);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("minimax".parse::<Algorithm>(), Ok(Algorithm::Minimax));
        assert_eq!("AlphaBeta".parse::<Algorithm>(), Ok(Algorithm::AlphaBeta));
        assert!("mcts".parse::<Algorithm>().is_err());
    }
}
