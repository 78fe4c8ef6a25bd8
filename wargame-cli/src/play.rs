//! Play command - one game between humans and/or the computer
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: setup_game(), play_game(), report_result()
//! - Level 3: human_turn(), computer_turn()
//! - Level 4: input parsing and configuration helpers

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use wargame_core::{
    play_turn, Action, Algorithm, Applied, CoordPair, GameState, Heuristic, Player, RuleSet,
    SearchConfig, SearchStats,
};

use crate::trace::{TraceHeader, TraceWriter};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

/// Who controls each side
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GameType {
    /// Human vs human
    Manual,
    /// Human attacker vs computer defender
    Attacker,
    /// Computer attacker vs human defender
    Defender,
    /// Computer vs computer
    Comp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Controller {
    Human,
    Computer,
}

impl Controller {
    pub fn label(self) -> &'static str {
        match self {
            Controller::Human => "Human",
            Controller::Computer => "AI",
        }
    }
}

impl GameType {
    pub fn controller(self, player: Player) -> Controller {
        let human = match self {
            GameType::Manual => true,
            GameType::Attacker => player == Player::Attacker,
            GameType::Defender => player == Player::Defender,
            GameType::Comp => false,
        };
        if human {
            Controller::Human
        } else {
            Controller::Computer
        }
    }
}

#[derive(Args)]
pub struct PlayArgs {
    /// Who plays each side
    #[arg(long, value_enum, default_value = "manual")]
    pub game_type: GameType,

    /// Turn limit; the Defender wins when it is reached
    #[arg(long, default_value = "100")]
    pub max_turns: u32,

    /// Seconds the computer may spend per action
    #[arg(long, default_value = "5.0")]
    pub max_time: f64,

    /// Maximum search depth
    #[arg(long, default_value = "5")]
    pub max_depth: u32,

    /// Search algorithm (alphabeta or minimax)
    #[arg(long, default_value = "alphabeta")]
    pub algorithm: Algorithm,

    /// Evaluation heuristic (e0, e1 or e2)
    #[arg(long, default_value = "e0")]
    pub heuristic: Heuristic,

    /// Ruleset JSON file (standard rules when omitted)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Write a game trace to this file
    #[arg(long, value_name = "FILE")]
    pub trace: Option<PathBuf>,
}

impl PlayArgs {
    pub fn search_config(&self) -> Result<SearchConfig> {
        let time_limit = Duration::try_from_secs_f64(self.max_time)
            .with_context(|| format!("Invalid --max-time: {}", self.max_time))?;
        Ok(SearchConfig::new(self.max_depth, time_limit)
            .with_algorithm(self.algorithm)
            .with_heuristic(self.heuristic))
    }
}

/// One side's action for a turn
enum Turn {
    Played {
        action: Action,
        applied: Applied,
        stats: Option<SearchStats>,
    },
    Forfeit(String),
    Quit,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run play command
///
/// 1. Set up the game and optional trace
/// 2. Alternate turns until the game ends
/// 3. Report the winner
pub fn run(args: PlayArgs) -> Result<()> {
    let config = args.search_config()?;
    let (state, mut trace) = setup_game(&args, &config)?;

    tracing::info!(
        "Starting game: {:?} (max turns={}, max time={}s, depth={}, {}, {})",
        args.game_type,
        args.max_turns,
        args.max_time,
        args.max_depth,
        args.algorithm,
        args.heuristic
    );

    let stdin = io::stdin();
    let mut input = stdin.lock().lines();
    let final_state = play_game(state, args.game_type, &config, &mut input, trace.as_mut())?;

    report_result(&final_state, trace.as_mut())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn setup_game(
    args: &PlayArgs,
    config: &SearchConfig,
) -> Result<(GameState, Option<TraceWriter<io::BufWriter<std::fs::File>>>)> {
    let rules = load_rules(args.rules.as_deref())?;
    let state = rules
        .to_game_state(args.max_turns)
        .with_context(|| format!("Invalid layout in ruleset '{}'", rules.name))?;

    let trace = match &args.trace {
        Some(path) => {
            let header = TraceHeader {
                config: config.clone(),
                max_turns: args.max_turns,
                attacker: args.game_type.controller(Player::Attacker).label(),
                defender: args.game_type.controller(Player::Defender).label(),
            };
            let mut writer = TraceWriter::create(path)?;
            writer.header(&header, &state)?;
            Some(writer)
        }
        None => None,
    };

    Ok((state, trace))
}

/// Alternate turns until someone wins, the input ends, or a side forfeits
fn play_game<W: Write>(
    mut state: GameState,
    game_type: GameType,
    config: &SearchConfig,
    input: &mut impl Iterator<Item = io::Result<String>>,
    mut trace: Option<&mut TraceWriter<W>>,
) -> Result<GameState> {
    let mut totals = SearchStats::default();

    while !state.is_over() {
        println!("{}", state);
        let player = state.active_player();
        let turn_number = state.turn();

        let turn = match game_type.controller(player) {
            Controller::Human => human_turn(&state, input)?,
            Controller::Computer => computer_turn(&state, config),
        };

        match turn {
            Turn::Played { action, applied, stats } => {
                if let Some(stats) = &stats {
                    totals.accumulate(stats);
                    print_ai_stats(stats, &totals);
                }
                println!("{}: {}", player, action.describe());
                for destroyed in &applied.destroyed {
                    println!("  {} destroyed at {}", destroyed.unit, destroyed.at);
                }
                if let Some(trace) = trace.as_deref_mut() {
                    trace.turn(turn_number, player, &action, stats.as_ref(), &totals, &applied.state)?;
                }
                state = applied.state;
            }
            Turn::Forfeit(reason) => {
                tracing::warn!("{} forfeits: {}", player, reason);
                if let Some(trace) = trace.as_deref_mut() {
                    trace.forfeit(player, &reason)?;
                }
                state.forfeit(player);
            }
            Turn::Quit => {
                tracing::info!("Input closed, ending game");
                break;
            }
        }
    }

    Ok(state)
}

fn report_result<W: Write>(state: &GameState, trace: Option<&mut TraceWriter<W>>) -> Result<()> {
    println!("{}", state);
    match state.winner() {
        Some(winner) => {
            tracing::info!("{} wins in {} turns", winner, state.turns_played());
            println!("{} wins in {} turns!", winner, state.turns_played());
            if let Some(trace) = trace {
                trace.finish(winner, state.turns_played())?;
            }
        }
        None => println!("Game abandoned after {} turns", state.turns_played()),
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - TURNS
// ============================================================================

/// Read actions until one is accepted. Bad input is a warning, not a loss.
fn human_turn(
    state: &GameState,
    input: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<Turn> {
    loop {
        print!("{} action (e.g. E2 D2): ", state.active_player());
        io::stdout().flush()?;

        let Some(line) = input.next() else {
            return Ok(Turn::Quit);
        };
        let line = line.context("Failed to read action")?;

        match parse_human_action(state, &line) {
            Ok((action, applied)) => {
                return Ok(Turn::Played {
                    action,
                    applied,
                    stats: None,
                })
            }
            Err(message) => {
                tracing::warn!("Rejected '{}': {}", line.trim(), message);
                println!("The move is not valid ({}). Try again.", message);
            }
        }
    }
}

/// Search for an action; an illegal proposal or a blown budget forfeits
fn computer_turn(state: &GameState, config: &SearchConfig) -> Turn {
    match play_turn(state, config) {
        Ok((outcome, applied)) => {
            tracing::debug!(
                "AI chose {} (score={}, depth={}, nodes={}, {:.2?})",
                outcome.action,
                outcome.stats.score,
                outcome.stats.depth_reached,
                outcome.stats.nodes_visited,
                outcome.stats.elapsed
            );
            Turn::Played {
                action: outcome.action,
                applied,
                stats: Some(outcome.stats),
            }
        }
        Err(forfeit) => Turn::Forfeit(forfeit.to_string()),
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Load a ruleset file, or the standard rules
pub fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => RuleSet::load(path)
            .with_context(|| format!("Failed to load rules: {}", path.display())),
        None => Ok(RuleSet::default()),
    }
}

/// Parse and apply one line of human input
fn parse_human_action(state: &GameState, line: &str) -> Result<(Action, Applied), String> {
    let pair = line.parse::<CoordPair>().map_err(|e| e.to_string())?;
    let action = state.action_from_pair(pair).map_err(|e| e.to_string())?;
    let applied = state.apply(action).map_err(|e| e.to_string())?;
    Ok((action, applied))
}

fn print_ai_stats(stats: &SearchStats, totals: &SearchStats) {
    println!(
        "Evals: {} this turn, {} total | depth {} | score {} | {:.1}s | {:.1}k evals/s | branching {:.1}",
        stats.evaluations(),
        totals.evaluations(),
        stats.depth_reached,
        stats.score,
        stats.elapsed.as_secs_f64(),
        stats.evaluation_rate() / 1000.0,
        totals.branching_factor()
    );
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_core::{Coord, GameResult};

    fn lines(input: &[&str]) -> impl Iterator<Item = io::Result<String>> {
        input
            .iter()
            .map(|s| Ok(s.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_game_type_controllers() {
        assert_eq!(GameType::Manual.controller(Player::Defender), Controller::Human);
        assert_eq!(GameType::Attacker.controller(Player::Attacker), Controller::Human);
        assert_eq!(GameType::Attacker.controller(Player::Defender), Controller::Computer);
        assert_eq!(GameType::Defender.controller(Player::Attacker), Controller::Computer);
        assert_eq!(GameType::Comp.controller(Player::Attacker), Controller::Computer);
    }

    #[test]
    fn test_human_turn_retries_after_bad_input() {
        let state = RuleSet::default().to_game_state(100).unwrap();
        let mut input = lines(&["zz", "A1 A2", "E3 E4", "d4-d3"]);
        match human_turn(&state, &mut input).unwrap() {
            Turn::Played { action, applied, .. } => {
                let from: Coord = "D4".parse().unwrap();
                let to: Coord = "D3".parse().unwrap();
                assert_eq!(action, Action::Move { from, to });
                assert_eq!(applied.state.active_player(), Player::Defender);
            }
            _ => panic!("expected a played turn"),
        }
    }

    #[test]
    fn test_human_turn_quits_on_eof() {
        let state = RuleSet::default().to_game_state(100).unwrap();
        let mut input = lines(&["nonsense"]);
        assert!(matches!(human_turn(&state, &mut input).unwrap(), Turn::Quit));
    }

    #[test]
    fn test_computer_game_runs_to_completion() {
        let state = RuleSet::default().to_game_state(6).unwrap();
        let config = SearchConfig::new(2, Duration::from_secs(30));
        let mut input = lines(&[]);
        let final_state =
            play_game::<Vec<u8>>(state, GameType::Comp, &config, &mut input, None).unwrap();
        assert!(final_state.is_over());
        assert_ne!(final_state.result(), GameResult::Ongoing);
    }

    #[test]
    fn test_computer_turn_zero_budget_forfeits() {
        let state = RuleSet::default().to_game_state(100).unwrap();
        let config = SearchConfig::new(3, Duration::ZERO);
        assert!(matches!(computer_turn(&state, &config), Turn::Forfeit(reason) if reason.starts_with("took")));
    }
}
